use std::{fmt, sync::Arc};

use bitflags::bitflags;
use chrono::{DateTime, Local};
use spin::Mutex;
use uuid::Uuid;

use crate::{
    debug_storage,
    disk::{
        backing_store::{BackingStore, StoreAllocator},
        error::{DiskError, Result},
        geometry::Geometry,
        registry::{BlockRegistrar, GenDisk, Major},
        request::{Completion, Request},
        types::{
            bytes_to_kernel_sectors, BD_NAME_MAX, DEFAULT_SECTOR_COUNT, DRV_NAME,
            KERNEL_SECTOR_SIZE, MAX_SECTOR_SIZE, MIN_SECTOR_SIZE, NUM_MINORS, SECTOR_SIZE,
        },
    },
    pr_err, pr_info, pr_warn,
};

/// 创建参数，设备建好后只读
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub name: String,      // 设备名
    pub sector_size: u32,  // 扇区大小（字节）
    pub sector_count: u64, // 扇区总数
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: DRV_NAME.to_string(),
            sector_size: SECTOR_SIZE,
            sector_count: DEFAULT_SECTOR_COUNT,
        }
    }
}

impl DeviceConfig {
    /// 发布给框架的磁盘名：`<name>0`
    pub fn disk_name(&self) -> String {
        format!("{}{}", self.name, 0)
    }

    /// 校验参数，返回容量（字节）
    pub fn validate(&self) -> Result<u64> {
        if self.name.is_empty() {
            return Err(DiskError::InvalidConfig("empty device name".to_string()));
        }
        // 给框架追加的结尾 0 留出位置
        if self.disk_name().len() >= BD_NAME_MAX {
            return Err(DiskError::InvalidConfig(format!(
                "device name {:?} longer than {} bytes",
                self.name,
                BD_NAME_MAX - 2
            )));
        }
        if !self.sector_size.is_power_of_two()
            || !(MIN_SECTOR_SIZE..=MAX_SECTOR_SIZE).contains(&self.sector_size)
        {
            return Err(DiskError::InvalidConfig(format!(
                "sector size {} is not a power of two in {}..={}",
                self.sector_size, MIN_SECTOR_SIZE, MAX_SECTOR_SIZE
            )));
        }
        if self.sector_count == 0 {
            return Err(DiskError::InvalidConfig("zero sectors".to_string()));
        }
        self.sector_count
            .checked_mul(self.sector_size as u64)
            .ok_or_else(|| {
                DiskError::InvalidConfig(format!(
                    "{} sectors of {} B overflow the capacity",
                    self.sector_count, self.sector_size
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Uninitialized,
    Active,
    TornDown,
}

bitflags! {
    /// 设备当前持有的资源
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Resources: u8 {
        const STORE   = 1 << 0;
        const MAJOR   = 1 << 1;
        const GENDISK = 1 << 2;
    }
}

/// 基于内存的 XIP 块设备
///
/// 请求直接在调用方缓冲区和存储区之间拷贝，每个请求只拿一次自旋锁。
/// `service` 取 `&self`，可以多线程同时调用；`destroy` 取 `&mut self`，
/// 所以拆除时不可能还有请求在处理。
pub struct Device {
    config: DeviceConfig,
    disk_name: String,
    capacity: u64,
    uuid: Uuid,
    created_at: DateTime<Local>,
    state: DeviceState,
    store: Option<Mutex<BackingStore>>, // 存储区，释放后为 None
    major: Option<Major>,               // 已注册的主设备号
    disk_added: bool,                   // 磁盘是否已发布
    allocator: Arc<dyn StoreAllocator>,
    registrar: Arc<dyn BlockRegistrar>,
}

impl Device {
    /// 分配存储区 -> 注册主设备号 -> 发布磁盘
    ///
    /// 任何一步失败，都会先释放已经拿到的资源再返回错误
    pub fn create(
        config: DeviceConfig,
        allocator: Arc<dyn StoreAllocator>,
        registrar: Arc<dyn BlockRegistrar>,
    ) -> Result<Self> {
        let capacity = config.validate()?;

        let mut dev = Self {
            disk_name: config.disk_name(),
            config,
            capacity,
            uuid: Uuid::new_v4(),
            created_at: Local::now(),
            state: DeviceState::Uninitialized,
            store: None,
            major: None,
            disk_added: false,
            allocator,
            registrar,
        };

        if let Err(e) = dev.setup() {
            pr_warn!("{} rolling back: {:?}", dev.config.name, dev.resources());
            dev.release_resources();
            return Err(e);
        }

        dev.state = DeviceState::Active;
        pr_info!(
            "{} disk size {} B, {} {}-B sectors",
            dev.config.name,
            dev.capacity,
            dev.config.sector_count,
            dev.config.sector_size
        );
        Ok(dev)
    }

    fn setup(&mut self) -> Result<()> {
        let store = self.allocator.allocate(self.capacity).inspect_err(|_| {
            pr_err!("{} failed allocating RAM backing", self.config.name);
        })?;
        self.store = Some(Mutex::new(store));

        let major = self
            .registrar
            .register_blkdev(&self.config.name)
            .inspect_err(|_| {
                pr_err!("{} failed registering block device", self.config.name);
            })?;
        self.major = Some(major);

        let disk = GenDisk {
            disk_name: self.disk_name.clone(),
            major,
            first_minor: 0,
            minors: NUM_MINORS,
            capacity: self.kernel_sectors(),
            logical_block_size: self.config.sector_size,
        };
        self.registrar.add_disk(disk).inspect_err(|_| {
            pr_err!("{} failed adding disk {}", self.config.name, self.disk_name);
        })?;
        self.disk_added = true;

        Ok(())
    }

    /// 拆除设备，之后的请求都返回 `InvalidState`
    pub fn destroy(&mut self) {
        if self.state == DeviceState::Active {
            pr_info!("{} shutting down", self.config.name);
        }
        self.release_resources();
        self.state = DeviceState::TornDown;
    }

    /// 只归还已获取的资源，每样最多归还一次
    fn release_resources(&mut self) {
        if self.disk_added {
            self.registrar.del_gendisk(&self.disk_name);
            self.disk_added = false;
        }
        if let Some(store) = self.store.take() {
            self.allocator.release(store.into_inner());
        }
        if let Some(major) = self.major.take() {
            self.registrar.unregister_blkdev(major, &self.config.name);
        }
    }

    /// 在请求的各个段和存储区之间拷贝数据
    ///
    /// 先校验整个请求再动第一个字节；整个段列表都在同一次加锁内完成，
    /// 并发请求之间不会交错。
    pub fn service(&self, request: Request<'_>) -> Result<Completion> {
        let store = match (&self.store, self.state) {
            (Some(store), DeviceState::Active) => store,
            _ => return Err(DiskError::InvalidState(self.state)),
        };

        let direction = request.direction();
        let sector = request.sector();
        let len = request.len();
        let sectors = self.check_range(sector, len)?;

        debug_storage!(
            "service(sector={:10}, size={:10}, dir={}, segs={})",
            sector,
            len,
            direction,
            request.segment_count()
        );

        // 已确认在范围内，偏移一定放得进 usize
        let mut offset = (sector * self.config.sector_size as u64) as usize;
        // 加锁前打日志，锁内只做拷贝
        for (ofs, seg_len) in request.segment_spans(offset) {
            debug_storage!("--- ofs={:<10}, len={}", ofs, seg_len);
        }

        let mut store = store.lock();
        match request {
            Request::Write { segments, .. } => {
                for seg in segments {
                    store.copy_in(offset, seg);
                    offset += seg.len();
                }
            }
            Request::Read { segments, .. } => {
                for seg in segments {
                    store.copy_out(offset, seg);
                    offset += seg.len();
                }
            }
        }
        drop(store);

        debug_assert_eq!(sectors * self.config.sector_size as u64, len);
        Ok(Completion {
            direction,
            sector,
            bytes: len,
        })
    }

    /// 校验从 `sector` 开始的 `len` 字节，返回扇区数
    fn check_range(&self, sector: u64, len: u64) -> Result<u64> {
        let sector_size = self.config.sector_size as u64;
        if len % sector_size != 0 {
            return Err(DiskError::Misaligned {
                len,
                sector_size: self.config.sector_size,
            });
        }
        let sectors = len / sector_size;
        let count = self.config.sector_count;
        if sector >= count || sectors > count - sector {
            return Err(DiskError::OutOfRange {
                sector,
                sectors,
                capacity: count,
            });
        }
        Ok(sectors)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn disk_name(&self) -> &str {
        &self.disk_name
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn major(&self) -> Option<Major> {
        self.major
    }

    pub fn sector_size(&self) -> u32 {
        self.config.sector_size
    }

    pub fn sector_count(&self) -> u64 {
        self.config.sector_count
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity
    }

    /// 以 512 字节为单位的容量
    pub fn kernel_sectors(&self) -> u64 {
        bytes_to_kernel_sectors(self.capacity)
    }

    /// 设备扇区数换算成 512 字节单位，溢出 u64 时返回 None
    pub fn to_kernel_sectors(&self, sectors: u64) -> Option<u64> {
        sectors.checked_mul(self.config.sector_size as u64 / KERNEL_SECTOR_SIZE)
    }

    /// 512 字节单位换算回设备扇区，不落在扇区边界上时返回 None
    pub fn from_kernel_sectors(&self, kernel_sectors: u64) -> Option<u64> {
        let ratio = self.config.sector_size as u64 / KERNEL_SECTOR_SIZE;
        (kernel_sectors % ratio == 0).then_some(kernel_sectors / ratio)
    }

    pub fn getgeo(&self) -> Geometry {
        Geometry::from_capacity(self.capacity)
    }

    pub fn resources(&self) -> Resources {
        let mut held = Resources::empty();
        held.set(Resources::STORE, self.store.is_some());
        held.set(Resources::MAJOR, self.major.is_some());
        held.set(Resources::GENDISK, self.disk_added);
        held
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.release_resources();
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.config.name)
            .field("sector_size", &self.config.sector_size)
            .field("sector_count", &self.config.sector_count)
            .field("state", &self.state)
            .field("major", &self.major)
            .field("resources", &self.resources())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_one_gib() {
        let config = DeviceConfig::default();
        assert_eq!(config.validate().unwrap(), 1 << 30);
        assert_eq!(config.disk_name(), "xiprd0");
    }

    #[test]
    fn rejects_bad_sector_sizes() {
        for size in [0, 256, 513, 1000, 8192] {
            let config = DeviceConfig {
                sector_size: size,
                ..DeviceConfig::default()
            };
            assert!(matches!(config.validate(), Err(DiskError::InvalidConfig(_))));
        }
    }

    #[test]
    fn rejects_empty_overflowing_and_long_names() {
        let zero = DeviceConfig {
            sector_count: 0,
            ..DeviceConfig::default()
        };
        assert!(zero.validate().is_err());

        let overflow = DeviceConfig {
            sector_count: u64::MAX,
            ..DeviceConfig::default()
        };
        assert!(overflow.validate().is_err());

        let unnamed = DeviceConfig {
            name: String::new(),
            ..DeviceConfig::default()
        };
        assert!(unnamed.validate().is_err());

        let fits = DeviceConfig {
            name: "a".repeat(BD_NAME_MAX - 2),
            ..DeviceConfig::default()
        };
        assert!(fits.validate().is_ok());
        let too_long = DeviceConfig {
            name: "a".repeat(BD_NAME_MAX - 1),
            ..DeviceConfig::default()
        };
        assert!(too_long.validate().is_err());
    }
}
