pub mod backing_store;
pub mod block_device;
pub mod device;
pub mod error;
pub mod geometry;
pub mod registry;
pub mod request;
pub mod types;


pub use backing_store::{BackingStore, StoreAllocator, VmallocAllocator};
pub use block_device::BlockDevice;
pub use device::{Device, DeviceConfig, DeviceState, Resources};
pub use error::{DiskError, Result};
pub use geometry::Geometry;
pub use registry::{BlockRegistrar, BlockRegistry, GenDisk, Major};
pub use request::{Completion, Direction, Request};
pub use types::*;
