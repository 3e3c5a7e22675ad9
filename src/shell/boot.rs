use std::sync::{mpsc::Sender, Arc};

use xiprd::disk::{BlockRegistry, Device, DeviceConfig, DiskError, VmallocAllocator};

pub enum BootProgress {
    Step(&'static str),
    Progress(u64),
    Finished(Result<Device, DiskError>),
}

/// 在工作线程里创建设备，并把每个阶段汇报给 shell
pub fn perform_device_initialization(
    config: DeviceConfig,
    registry: Arc<BlockRegistry>,
    tx: Sender<BootProgress>,
) {
    // 接收端只有在 shell 放弃启动时才会关闭
    let _ = tx.send(BootProgress::Step("🔍 Checking device parameters..."));
    if let Err(e) = config.validate() {
        let _ = tx.send(BootProgress::Finished(Err(e)));
        return;
    }
    let _ = tx.send(BootProgress::Progress(20));

    let _ = tx.send(BootProgress::Step("🧠 Allocating RAM backing..."));
    let result = Device::create(config, Arc::new(VmallocAllocator), registry);
    let _ = tx.send(BootProgress::Progress(80));

    if result.is_ok() {
        let _ = tx.send(BootProgress::Step("💽 Disk registered"));
    }
    let _ = tx.send(BootProgress::Progress(100));
    let _ = tx.send(BootProgress::Finished(result));
}
