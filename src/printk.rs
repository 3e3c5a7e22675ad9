//! 内核风格的控制台日志
//!
//! `pr_err!` / `pr_warn!` / `pr_info!` 带颜色级别标签输出到 stderr，按控制台级别过滤。
//! `debug_storage!` 只在开启 `debug-storage` feature 时生效，否则编译为空。

use std::{
    fmt,
    sync::atomic::{AtomicU8, Ordering},
};

use colored::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Err = 3,
    Warn = 4,
    Info = 6,
    Debug = 7,
}

impl LogLevel {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0..=3 => Self::Err,
            4..=5 => Self::Warn,
            6 => Self::Info,
            _ => Self::Debug,
        }
    }
}

static CONSOLE_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Debug as u8);

/// 低于 `level` 的消息直接丢弃
pub fn set_console_level(level: LogLevel) {
    CONSOLE_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn console_level() -> LogLevel {
    LogLevel::from_u8(CONSOLE_LEVEL.load(Ordering::Relaxed))
}

#[doc(hidden)]
pub fn _printk(level: LogLevel, args: fmt::Arguments) {
    if level > console_level() {
        return;
    }
    let tag = match level {
        LogLevel::Err => "err".red().bold(),
        LogLevel::Warn => "warn".yellow().bold(),
        LogLevel::Info => "info".cyan(),
        LogLevel::Debug => "debug".bright_black(),
    };
    eprintln!("[{}] {}", tag, args);
}

#[macro_export]
macro_rules! pr_err {
    ($($arg:tt)*) => {
        $crate::printk::_printk($crate::printk::LogLevel::Err, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! pr_warn {
    ($($arg:tt)*) => {
        $crate::printk::_printk($crate::printk::LogLevel::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! pr_info {
    ($($arg:tt)*) => {
        $crate::printk::_printk($crate::printk::LogLevel::Info, format_args!($($arg)*))
    };
}

/// 请求处理路径的逐请求跟踪
#[macro_export]
#[cfg(feature = "debug-storage")]
macro_rules! debug_storage {
    ($($arg:tt)*) => {
        $crate::printk::_printk($crate::printk::LogLevel::Debug, format_args!($($arg)*))
    };
}

#[macro_export]
#[cfg(not(feature = "debug-storage"))]
macro_rules! debug_storage {
    ($($arg:tt)*) => {
        if false {
            let _ = format_args!($($arg)*);
        }
    };
}
