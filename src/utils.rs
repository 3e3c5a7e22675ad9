use chrono::{DateTime, Local};

/// 解析十进制或 `0x` 前缀的十六进制数
pub fn parse_number(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

pub fn parse_byte(s: &str) -> Option<u8> {
    parse_number(s).and_then(|n| u8::try_from(n).ok())
}

/// 字节数转成二进制单位，例如 `1.00 GiB`
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

pub fn format_timestamp(ts: &DateTime<Local>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_in_both_bases() {
        assert_eq!(parse_number("2048"), Some(2048));
        assert_eq!(parse_number("0x800"), Some(2048));
        assert_eq!(parse_number("0XaA"), Some(0xAA));
        assert_eq!(parse_number("-1"), None);
        assert_eq!(parse_byte("0xAA"), Some(0xAA));
        assert_eq!(parse_byte("256"), None);
    }

    #[test]
    fn byte_units() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(1 << 20), "1.00 MiB");
        assert_eq!(human_bytes(1 << 30), "1.00 GiB");
        assert_eq!(human_bytes(1536), "1.50 KiB");
    }
}
