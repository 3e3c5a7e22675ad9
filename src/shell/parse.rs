use crate::shell::command::Command;
use crate::utils::{parse_byte, parse_number};

/// `write` / `read` / `verify` 未给出扇区数时的默认值
const DEFAULT_SECTORS: u64 = 1;

const DEFAULT_STRESS_THREADS: usize = 8;
const DEFAULT_STRESS_ROUNDS: usize = 1000;
const MAX_STRESS_THREADS: usize = 256; // 线程数上限
const MAX_STRESS_ROUNDS: usize = 1_000_000; // 每线程请求数上限

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];
    let count = |i: usize| match args.get(i) {
        Some(s) => parse_number(s),
        None => Some(DEFAULT_SECTORS),
    };

    match cmd {
        "help" => Some(Command::Help),
        "info" => Some(Command::Info),
        "geo" => Some(Command::Geo),
        "write" => Some(Command::Write {
            sector: parse_number(args.first()?)?,
            byte: parse_byte(args.get(1)?)?,
            count: count(2)?,
        }),
        "puts" => {
            if args.len() >= 2 {
                Some(Command::Puts {
                    sector: parse_number(args[0])?,
                    text: args[1..].join(" "),
                })
            } else {
                None
            }
        }
        "read" => Some(Command::Read {
            sector: parse_number(args.first()?)?,
            count: count(1)?,
        }),
        "verify" => Some(Command::Verify {
            sector: parse_number(args.first()?)?,
            byte: parse_byte(args.get(1)?)?,
            count: count(2)?,
        }),
        "stress" => {
            let threads = match args.first() {
                Some(s) => usize::try_from(parse_number(s)?).ok()?,
                None => DEFAULT_STRESS_THREADS,
            };
            let rounds = match args.get(1) {
                Some(s) => usize::try_from(parse_number(s)?).ok()?,
                None => DEFAULT_STRESS_ROUNDS,
            };
            let in_bounds =
                (1..=MAX_STRESS_THREADS).contains(&threads) && rounds <= MAX_STRESS_ROUNDS;
            in_bounds.then_some(Command::Stress { threads, rounds })
        }
        "unload" => Some(Command::Unload),
        "exit" => Some(Command::Exit),
        _ => None,
    }
}
