use thiserror::Error;

use crate::disk::device::DeviceState;

/// 块设备引擎的错误类型
///
/// 所有错误都直接返回给调用方；创建失败时，先回滚已获取的资源再报错
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiskError {
    /// 申请不到存储区内存
    #[error("failed allocating {bytes} B of RAM backing")]
    Allocation { bytes: u64 },

    /// 注册框架拒绝（重名、没有空闲主设备号等）
    #[error("registration refused: {0}")]
    Registration(String),

    /// 请求访问的扇区超出设备范围
    #[error("sectors {sector}..+{sectors} out of range (device has {capacity} sectors)")]
    OutOfRange {
        sector: u64,
        sectors: u64,
        capacity: u64,
    },

    /// 当前生命周期状态下不允许该操作
    #[error("device is {0:?}, expected Active")]
    InvalidState(DeviceState),

    /// 创建参数不合法，此时还没有获取任何资源
    #[error("invalid device configuration: {0}")]
    InvalidConfig(String),

    /// 请求长度不是扇区大小的整数倍
    #[error("request length {len} B is not a multiple of the {sector_size} B sector")]
    Misaligned { len: u64, sector_size: u32 },
}

pub type Result<T> = std::result::Result<T, DiskError>;
