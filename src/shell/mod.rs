pub mod boot;
pub mod command;
pub mod parse;

use crate::shell::{
    boot::{perform_device_initialization, BootProgress},
    command::{execute_command, Command, Session},
    parse::parse_command,
};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use std::{
    io::stdout,
    path::PathBuf,
    sync::{mpsc, Arc},
    thread,
};
use xiprd::disk::{BlockRegistry, Device, DeviceConfig};

pub fn start_shell(config: DeviceConfig) {
    let registry = Arc::new(BlockRegistry::new());
    let device = match boot(config, registry.clone()) {
        Some(device) => device,
        None => return,
    };
    let mut session = Session { device, registry };

    let username = whoami::username();
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".xiprd_history");

    let mut line_editor = Reedline::create();
    match FileBackedHistory::with_file(100, history_path) {
        Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
        Err(e) => println!("{} {}", "⚠️  History disabled:".yellow(), e),
    }

    let commands = vec![
        "help", "info", "geo", "write", "puts", "read", "verify", "stress", "unload", "exit",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    let completer = DefaultCompleter::new_with_wordlen(commands, 2);
    line_editor = line_editor.with_completer(Box::new(completer));

    loop {
        let full_prompt = format!(
            "{}:{}",
            format!("{}@{}", username, hostname).green().bold(),
            session.device.disk_name().blue()
        );

        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(full_prompt),
            DefaultPromptSegment::Basic("xiprd".bright_blue().bold().to_string()),
        );
        let input = line_editor.read_line(&prompt);

        match input {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut session) {
                            println!("{} {}", "❌ Error:".red().bold(), e);
                        }
                        if matches!(cmd, Command::Exit) {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command. Type 'help' for command list.".yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting xiprd...".yellow());
                break;
            }
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    session.device.destroy();
    println!("{}", "GoodBye!".bright_yellow());
}

///后台创建设备，前台进度条跟随
fn boot(config: DeviceConfig, registry: Arc<BlockRegistry>) -> Option<Device> {
    let mut stdout = stdout();
    let _ = execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0));
    println!("{}", "[xiprd Booting...]".bright_yellow().bold());

    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || perform_device_initialization(config, registry, tx));

    let pb = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% {msg}") {
        pb.set_style(style.progress_chars("=> "));
    }

    let mut outcome = None;
    for msg in rx {
        match msg {
            BootProgress::Step(step) => pb.println(step),
            BootProgress::Progress(pos) => pb.set_position(pos),
            BootProgress::Finished(result) => outcome = Some(result),
        }
    }
    let _ = worker.join();

    match outcome {
        Some(Ok(device)) => {
            pb.finish_with_message("✅ Ready!");
            let _ = execute!(
                stdout,
                SetForegroundColor(Color::Cyan),
                Print(format!(
                    "Welcome to xiprd v{} on /dev/{}\n",
                    env!("CARGO_PKG_VERSION"),
                    device.disk_name()
                )),
                ResetColor
            );
            Some(device)
        }
        Some(Err(e)) => {
            pb.abandon_with_message("❌ Boot failed");
            println!("{} {}", "❌ Error:".red().bold(), e);
            None
        }
        None => {
            pb.abandon_with_message("❌ Boot worker died");
            None
        }
    }
}
