use clap::Parser;
use xiprd::disk::{DeviceConfig, DEFAULT_CAPACITY, DRV_NAME, SECTOR_SIZE};

use crate::shell::start_shell;

mod shell;
mod utils;

#[derive(Parser, Debug)]
#[command(name = "xiprd")]
#[command(about = "Simple XIP-capable RAM-backed block device shell")]
struct Args {
    /// Sector byte size
    #[arg(long, default_value_t = SECTOR_SIZE)]
    sector_size: u32,

    /// Number of sectors. Defaults to 1GiB / sector size
    #[arg(long)]
    num_sectors: Option<u64>,

    /// Device name
    #[arg(long, default_value = DRV_NAME)]
    name: String,

    /// Only print errors from the device
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn device_config(&self) -> DeviceConfig {
        let sector_count = self
            .num_sectors
            .unwrap_or(DEFAULT_CAPACITY / self.sector_size.max(1) as u64);
        DeviceConfig {
            name: self.name.clone(),
            sector_size: self.sector_size,
            sector_count,
        }
    }
}

fn main() {
    let args = Args::parse();
    if args.quiet {
        xiprd::printk::set_console_level(xiprd::printk::LogLevel::Err);
    }
    start_shell(args.device_config());
}
