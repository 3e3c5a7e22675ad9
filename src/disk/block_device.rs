use crate::disk::{
    device::Device,
    error::Result,
    geometry::Geometry,
    request::{Completion, Request},
};

/// 框架向驱动下发请求的入口
pub trait BlockDevice: Send + Sync {
    fn sector_size(&self) -> u32;
    fn sector_count(&self) -> u64;
    fn submit(&self, request: Request<'_>) -> Result<Completion>;

    fn geometry(&self) -> Geometry {
        Geometry::from_capacity(self.sector_count() * self.sector_size() as u64)
    }

    /// 从 `sector` 开始读整扇区，扇区数由缓冲区长度决定
    fn read_sectors(&self, sector: u64, buf: &mut [u8]) -> Result<u64> {
        Ok(self.submit(Request::read(sector, buf))?.bytes)
    }

    fn write_sectors(&self, sector: u64, buf: &[u8]) -> Result<u64> {
        Ok(self.submit(Request::write(sector, buf))?.bytes)
    }
}

impl BlockDevice for Device {
    fn sector_size(&self) -> u32 {
        Device::sector_size(self)
    }

    fn sector_count(&self) -> u64 {
        Device::sector_count(self)
    }

    fn submit(&self, request: Request<'_>) -> Result<Completion> {
        self.service(request)
    }

    fn geometry(&self) -> Geometry {
        self.getgeo()
    }
}
