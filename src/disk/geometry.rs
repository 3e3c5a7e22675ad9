use crate::disk::types::bytes_to_kernel_sectors;

/// 传统的 CHS 几何信息
///
/// 内存盘没有柱面和磁头，这里的数值只是凑出来的，保证 `heads * sectors * cylinders` 与容量一致。
/// 实际寻址始终按扇区号线性计算，不会用到它。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub heads: u8,
    pub sectors: u8,
    pub cylinders: u64,
}

impl Geometry {
    pub const HEADS: u8 = 1 << 6;
    pub const SECTORS_PER_TRACK: u8 = 1 << 5;

    /// 64 磁头 * 每道 32 扇区 = 每柱面 2^11 个扇区
    const CYLINDER_SHIFT: u32 = 11;

    pub fn from_capacity(capacity_bytes: u64) -> Self {
        Self {
            heads: Self::HEADS,
            sectors: Self::SECTORS_PER_TRACK,
            cylinders: bytes_to_kernel_sectors(capacity_bytes) >> Self::CYLINDER_SHIFT,
        }
    }

    pub fn covered_bytes(&self) -> u64 {
        self.heads as u64 * self.sectors as u64 * self.cylinders * 512
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_gib_is_1024_cylinders() {
        let geo = Geometry::from_capacity(1 << 30);
        assert_eq!(geo.heads, 64);
        assert_eq!(geo.sectors, 32);
        assert_eq!(geo.cylinders, 1024);
        assert_eq!(geo.covered_bytes(), 1 << 30);
    }

    #[test]
    fn partial_cylinders_round_down() {
        // 1 MiB = 2048 个 512 字节单位 = 1 个柱面
        assert_eq!(Geometry::from_capacity(1 << 20).cylinders, 1);
        assert_eq!(Geometry::from_capacity((1 << 20) - 512).cylinders, 0);
        assert_eq!(Geometry::from_capacity(0).cylinders, 0);
    }
}
