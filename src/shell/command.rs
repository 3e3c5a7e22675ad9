use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::sync::Arc;

use xiprd::disk::{BlockDevice, BlockRegistry, Device, Request};

use crate::utils::{format_timestamp, human_bytes};

/// `stress` 反复写入的扇区数
const STRESS_SECTORS: u64 = 16;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Info,
    Geo,
    Write { sector: u64, byte: u8, count: u64 },
    Puts { sector: u64, text: String },
    Read { sector: u64, count: u64 },
    Verify { sector: u64, byte: u8, count: u64 },
    Stress { threads: usize, rounds: usize },
    Unload,
    Exit,
}

pub struct Session {
    pub device: Device,
    pub registry: Arc<BlockRegistry>,
}

pub fn execute_command(cmd: &Command, session: &mut Session) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Info => print_info(session),
        Command::Geo => {
            let geo = session.device.getgeo();
            println!(
                "{}: {}  {}: {}  {}: {}  ({} of {})",
                "heads".blue(),
                geo.heads,
                "sectors".blue(),
                geo.sectors,
                "cylinders".blue(),
                geo.cylinders,
                human_bytes(geo.covered_bytes()),
                human_bytes(session.device.capacity_bytes())
            );
        }
        Command::Write {
            sector,
            byte,
            count,
        } => {
            let dev = &session.device;
            let buf = vec![*byte; sector_bytes(dev, *count)?];
            let written = dev.write_sectors(*sector, &buf)?;
            println!(
                "✏️  Wrote {} to sectors {}..{} ({:#04x})",
                human_bytes(written).green(),
                sector,
                sector + count,
                byte
            );
        }
        Command::Puts { sector, text } => {
            let dev = &session.device;
            let sector_size = dev.sector_size() as usize;
            let mut buf = text.as_bytes().to_vec();
            buf.resize(buf.len().div_ceil(sector_size).max(1) * sector_size, 0);
            let written = dev.write_sectors(*sector, &buf)?;
            println!(
                "✏️  Wrote {} bytes of text, {} on disk",
                text.len(),
                human_bytes(written).green()
            );
        }
        Command::Read { sector, count } => {
            let dev = &session.device;
            let mut buf = vec![0u8; sector_bytes(dev, *count)?];
            dev.read_sectors(*sector, &mut buf)?;
            let base = sector * dev.sector_size() as u64;
            for line in hexdump(base, &buf) {
                println!("{}", line);
            }
        }
        Command::Verify {
            sector,
            byte,
            count,
        } => {
            let dev = &session.device;
            let mut buf = vec![0u8; sector_bytes(dev, *count)?];
            dev.read_sectors(*sector, &mut buf)?;
            match buf.iter().position(|b| b != byte) {
                None => println!("{} {} sectors hold {:#04x}", "✅".green(), count, byte),
                Some(i) => println!(
                    "{} byte {} is {:#04x}, expected {:#04x}",
                    "❌ Mismatch:".red().bold(),
                    sector * dev.sector_size() as u64 + i as u64,
                    buf[i],
                    byte
                ),
            }
        }
        Command::Stress { threads, rounds } => stress(&session.device, *threads, *rounds)?,
        Command::Unload => {
            let confirmed = Confirm::new()
                .with_prompt(format!("Tear down {}?", session.device.disk_name()))
                .default(false)
                .interact()?;
            if confirmed {
                session.device.destroy();
                println!("{}", "🗑️ Device torn down".red());
            }
        }
        Command::Exit => println!("{}", "👋 Exiting xiprd shell...".yellow().bold()),
    }

    Ok(())
}

fn sector_bytes(dev: &Device, count: u64) -> Result<usize, Box<dyn Error>> {
    count
        .checked_mul(dev.sector_size() as u64)
        .filter(|&n| n <= dev.capacity_bytes())
        .map(|n| n as usize)
        .ok_or_else(|| format!("{} sectors exceed the device", count).into())
}

fn print_info(session: &Session) {
    let dev = &session.device;
    let major = dev
        .major()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("{}", "📊 Device Info".bright_yellow().bold());
    println!("{}: {}", "Name".blue(), dev.name());
    println!("{}: {}", "Disk".blue(), dev.disk_name());
    println!("{}: {}", "UUID".blue(), dev.uuid());
    println!("{}: {}", "Created".blue(), format_timestamp(&dev.created_at()));
    println!("{}: {:?}", "State".blue(), dev.state());
    println!("{}: {}", "Major".blue(), major);
    println!("{}: {:?}", "Resources".blue(), dev.resources());
    println!(
        "{}: {} ({} B)",
        "Capacity".blue(),
        human_bytes(dev.capacity_bytes()),
        dev.capacity_bytes()
    );
    println!(
        "{}: {} x {} B",
        "Sectors".blue(),
        dev.sector_count(),
        dev.sector_size()
    );
    println!("{}: {}", "512-B units".blue(), dev.kernel_sectors());
    println!(
        "{}: {} majors, {} disks",
        "Registry".blue(),
        session.registry.registered_count(),
        session.registry.disk_count()
    );
}

/// 多线程并发覆盖写同一段扇区
/// 结束后整段必须是同一个线程写入的内容，否则说明出现了撕裂写
fn stress(dev: &Device, threads: usize, rounds: usize) -> Result<(), Box<dyn Error>> {
    let sectors = STRESS_SECTORS.min(dev.sector_count());
    let len = sector_bytes(dev, sectors)?;
    let seg_len = dev.sector_size() as usize;

    let total = threads
        .checked_mul(rounds)
        .ok_or_else(|| format!("{} x {} requests overflow", threads, rounds))?;
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.green/black}] {pos:>6}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let failures = std::thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let pb = pb.clone();
                s.spawn(move || {
                    let fill = vec![(t % 255) as u8 + 1; len];
                    let mut failed = 0usize;
                    for _ in 0..rounds {
                        let segments: Vec<&[u8]> = fill.chunks(seg_len).collect();
                        if dev.service(Request::Write { sector: 0, segments }).is_err() {
                            failed += 1;
                        }
                        pb.inc(1);
                    }
                    failed
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(rounds))
            .sum::<usize>()
    });

    let mut buf = vec![0u8; len];
    dev.read_sectors(0, &mut buf)?;
    if failures == 0 && buf.iter().all(|&b| b == buf[0]) {
        pb.finish_with_message(format!("✅ no torn writes, last writer {:#04x}", buf[0]));
    } else {
        pb.abandon_with_message(format!("❌ {} failed requests or torn range", failures));
    }
    Ok(())
}

/// 仿 `hexdump -C` 输出，重复行折叠为 `*`
pub fn hexdump(base: u64, data: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut prev: Option<&[u8]> = None;
    let mut starred = false;

    for (i, chunk) in data.chunks(16).enumerate() {
        if prev == Some(chunk) {
            if !starred {
                lines.push("*".to_string());
                starred = true;
            }
            continue;
        }
        prev = Some(chunk);
        // 新的一行，重新允许折叠
        starred = false;

        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| {
                if b.is_ascii_graphic() || b == b' ' {
                    b as char
                } else {
                    '.'
                }
            })
            .collect();
        lines.push(format!(
            "{:08x}  {:<47}  |{}|",
            base + (i * 16) as u64,
            hex.join(" "),
            ascii
        ));
    }
    lines.push(format!("{:08x}", base + data.len() as u64));
    lines
}

fn print_help() {
    println!("{}", "📘 xiprd Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  info                       Show device, capacity and registration
  geo                        Show legacy CHS geometry
  write <sector> <byte> [n]  Fill n sectors with a byte value
  puts <sector> <text>       Write text, zero-padded to whole sectors
  read <sector> [n]          Hexdump n sectors
  verify <sector> <byte> [n] Check n sectors hold a byte value
  stress [threads] [rounds]  Concurrent overlapping writes, then check for tearing
  unload                     Tear the device down
  help                       Show this help message
  exit                       Quit the shell
"
        .bright_black()
    );
}
