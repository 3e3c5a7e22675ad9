/// 驱动名，也是默认设备名
pub const DRV_NAME: &str = "xiprd";

/// 交给注册框架的名字缓冲区大小（含结尾的 0）
pub const BD_NAME_MAX: usize = 32;

/// 每个磁盘预留的次设备号数量（整盘 + 分区）
pub const NUM_MINORS: u32 = 16;

/// 默认扇区大小：512 字节
pub const SECTOR_SHIFT: u32 = 9;
pub const SECTOR_SIZE: u32 = 1 << SECTOR_SHIFT;

/// 框架上报容量固定用 512 字节为单位，与设备的逻辑扇区大小无关
pub const KERNEL_SHIFT: u32 = 9;
pub const KERNEL_SECTOR_SIZE: u64 = 1 << KERNEL_SHIFT;

/// 框架接受的逻辑扇区大小范围
pub const MIN_SECTOR_SIZE: u32 = 512;
pub const MAX_SECTOR_SIZE: u32 = 4096;

/// 默认容量：1 GiB
pub const DEFAULT_CAPACITY: u64 = 1024 * 1024 * 1024;

/// 默认扇区数：1 GiB / 512 B = 2097152 个扇区
pub const DEFAULT_SECTOR_COUNT: u64 = DEFAULT_CAPACITY >> SECTOR_SHIFT;

/// 字节数换算成框架的 512 字节单位
pub const fn bytes_to_kernel_sectors(bytes: u64) -> u64 {
    bytes >> KERNEL_SHIFT
}
