use std::{collections::BTreeMap, fmt, sync::Mutex};

use crate::disk::{
    error::{DiskError, Result},
    types::BD_NAME_MAX,
};

/// 注册框架分配的块设备主设备号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Major(pub u32);

impl fmt::Display for Major {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 框架侧的磁盘描述，设备就绪后才发布
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenDisk {
    pub disk_name: String,        // 例如 xiprd0
    pub major: Major,
    pub first_minor: u32,
    pub minors: u32,              // 整盘加分区预留的次设备号个数
    pub capacity: u64,            // 以 512 字节为单位
    pub logical_block_size: u32,  // 逻辑扇区大小
}

/// 设备生命周期眼中的注册框架
pub trait BlockRegistrar: Send + Sync {
    /// 注册 `name`，动态分配主设备号
    fn register_blkdev(&self, name: &str) -> Result<Major>;
    fn unregister_blkdev(&self, major: Major, name: &str);
    /// 让磁盘可见，从这之后就可能收到请求
    fn add_disk(&self, disk: GenDisk) -> Result<()>;
    fn del_gendisk(&self, disk_name: &str);
}

#[derive(Debug, Default)]
struct RegistryInner {
    majors: BTreeMap<Major, String>,
    disks: BTreeMap<String, GenDisk>,
}

/// 进程内的注册框架
///
/// 主设备号从 254 开始向下动态分配，和内核 `register_blkdev(0, name)` 一样
#[derive(Debug, Default)]
pub struct BlockRegistry {
    inner: Mutex<RegistryInner>,
}

impl BlockRegistry {
    pub const DYNAMIC_MAJOR_MAX: u32 = 254;
    pub const DYNAMIC_MAJOR_MIN: u32 = 234;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn major_of(&self, name: &str) -> Option<Major> {
        let inner = self.inner.lock().unwrap();
        inner
            .majors
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(m, _)| *m)
    }

    pub fn disk(&self, disk_name: &str) -> Option<GenDisk> {
        self.inner.lock().unwrap().disks.get(disk_name).cloned()
    }

    pub fn registered_count(&self) -> usize {
        self.inner.lock().unwrap().majors.len()
    }

    pub fn disk_count(&self) -> usize {
        self.inner.lock().unwrap().disks.len()
    }
}

impl BlockRegistrar for BlockRegistry {
    fn register_blkdev(&self, name: &str) -> Result<Major> {
        if name.is_empty() || name.len() >= BD_NAME_MAX {
            return Err(DiskError::Registration(format!("bad device name {:?}", name)));
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.majors.values().any(|n| n == name) {
            return Err(DiskError::Registration(format!("{} already registered", name)));
        }

        let major = (Self::DYNAMIC_MAJOR_MIN..=Self::DYNAMIC_MAJOR_MAX)
            .rev()
            .map(Major)
            .find(|m| !inner.majors.contains_key(m))
            .ok_or_else(|| DiskError::Registration("no free dynamic major".to_string()))?;

        inner.majors.insert(major, name.to_string());
        Ok(major)
    }

    fn unregister_blkdev(&self, major: Major, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        if inner.majors.get(&major).is_some_and(|n| n == name) {
            inner.majors.remove(&major);
        }
    }

    fn add_disk(&self, disk: GenDisk) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.majors.contains_key(&disk.major) {
            return Err(DiskError::Registration(format!(
                "major {} not registered",
                disk.major
            )));
        }
        if inner.disks.contains_key(&disk.disk_name) {
            return Err(DiskError::Registration(format!(
                "disk {} already exists",
                disk.disk_name
            )));
        }
        inner.disks.insert(disk.disk_name.clone(), disk);
        Ok(())
    }

    fn del_gendisk(&self, disk_name: &str) {
        self.inner.lock().unwrap().disks.remove(disk_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(name: &str, major: Major) -> GenDisk {
        GenDisk {
            disk_name: name.to_string(),
            major,
            first_minor: 0,
            minors: 16,
            capacity: 2048,
            logical_block_size: 512,
        }
    }

    #[test]
    fn majors_are_dynamic_and_distinct() {
        let reg = BlockRegistry::new();
        let a = reg.register_blkdev("xiprd").unwrap();
        let b = reg.register_blkdev("other").unwrap();
        assert_eq!(a, Major(254));
        assert_eq!(b, Major(253));
        assert_eq!(reg.major_of("other"), Some(b));
    }

    #[test]
    fn duplicate_name_is_refused() {
        let reg = BlockRegistry::new();
        reg.register_blkdev("xiprd").unwrap();
        let err = reg.register_blkdev("xiprd").unwrap_err();
        assert!(matches!(err, DiskError::Registration(_)));
        assert_eq!(reg.registered_count(), 1);
    }

    #[test]
    fn unregister_frees_name_and_major() {
        let reg = BlockRegistry::new();
        let major = reg.register_blkdev("xiprd").unwrap();
        reg.unregister_blkdev(major, "xiprd");
        assert_eq!(reg.registered_count(), 0);
        assert_eq!(reg.register_blkdev("xiprd").unwrap(), major);
    }

    #[test]
    fn unregister_with_wrong_identity_is_ignored() {
        let reg = BlockRegistry::new();
        let major = reg.register_blkdev("xiprd").unwrap();
        reg.unregister_blkdev(Major(1), "xiprd");
        reg.unregister_blkdev(major, "other");
        assert_eq!(reg.major_of("xiprd"), Some(major));
    }

    #[test]
    fn dynamic_range_exhausts() {
        let reg = BlockRegistry::new();
        let span = BlockRegistry::DYNAMIC_MAJOR_MAX - BlockRegistry::DYNAMIC_MAJOR_MIN + 1;
        for i in 0..span {
            reg.register_blkdev(&format!("dev{}", i)).unwrap();
        }
        assert!(reg.register_blkdev("one-too-many").is_err());
    }

    #[test]
    fn disks_need_a_registered_major() {
        let reg = BlockRegistry::new();
        assert!(reg.add_disk(disk("xiprd0", Major(254))).is_err());

        let major = reg.register_blkdev("xiprd").unwrap();
        reg.add_disk(disk("xiprd0", major)).unwrap();
        assert!(reg.add_disk(disk("xiprd0", major)).is_err());
        assert_eq!(reg.disk("xiprd0").unwrap().capacity, 2048);

        reg.del_gendisk("xiprd0");
        assert_eq!(reg.disk_count(), 0);
    }
}
