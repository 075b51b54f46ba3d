//! 交互式监视器
//!
//! 每行一条命令，按首字母分派：
//! `sim`、`run <n>`、`rdump`、`reset`、`mdump <start> <stop>`、
//! `input <reg> <val>`、`print`、`?`（或 `help`）、`quit`。
//! 参数不合法的命令被忽略并重新提示；未知命令输出 `Invalid Command.`。

use std::io::{self, BufRead, Write};

use log::debug;
use thiserror::Error;

use crate::dump::{dump_memory, dump_registers, list_program};
use crate::loader::parse_hex_word;
use crate::sim_env::{SimEnv, StopReason};

pub const PROMPT: &str = "rv32sim> ";

/// 解析后的命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Sim,
    Run(u64),
    RegDump,
    Reset,
    MemDump { start: u32, stop: u32 },
    Input { reg: u32, value: u32 },
    Print,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("missing argument <{0}>")]
    MissingArgument(&'static str),
    #[error("'{0}' is not a valid number")]
    BadNumber(String),
    #[error("unknown command '{0}'")]
    Unknown(String),
}

/// 解析一行输入
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let mut tokens = line.split_whitespace();
    let word = tokens.next().ok_or(CommandError::Empty)?;
    let mut chars = word.chars().map(|c| c.to_ascii_lowercase());
    let first = chars.next().ok_or(CommandError::Empty)?;

    let cmd = match first {
        's' => Command::Sim,
        'm' => {
            let start = parse_hex_arg(tokens.next(), "start")?;
            let stop = parse_hex_arg(tokens.next(), "stop")?;
            Command::MemDump { start, stop }
        }
        '?' | 'h' => Command::Help,
        'q' => Command::Quit,
        'r' => match chars.next() {
            Some('d') => Command::RegDump,
            Some('e') => Command::Reset,
            _ => {
                let token = tokens.next().ok_or(CommandError::MissingArgument("n"))?;
                let n = token
                    .parse::<u64>()
                    .map_err(|_| CommandError::BadNumber(token.to_string()))?;
                Command::Run(n)
            }
        },
        'i' => {
            let token = tokens.next().ok_or(CommandError::MissingArgument("reg"))?;
            let reg = token
                .parse::<u32>()
                .map_err(|_| CommandError::BadNumber(token.to_string()))?;
            let token = tokens.next().ok_or(CommandError::MissingArgument("val"))?;
            let value =
                parse_value(token).ok_or_else(|| CommandError::BadNumber(token.to_string()))?;
            Command::Input { reg, value }
        }
        'p' => Command::Print,
        _ => return Err(CommandError::Unknown(word.to_string())),
    };
    Ok(cmd)
}

fn parse_hex_arg(token: Option<&str>, name: &'static str) -> Result<u32, CommandError> {
    let token = token.ok_or(CommandError::MissingArgument(name))?;
    parse_hex_word(token).ok_or_else(|| CommandError::BadNumber(token.to_string()))
}

/// 十进制或 `0x` 十六进制，可带前导 `-`；结果取 32 位补码
pub fn parse_value(token: &str) -> Option<u32> {
    let (negative, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    if body.starts_with(['-', '+']) {
        return None;
    }
    let magnitude = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => body.parse::<i64>().ok()?,
    };
    let value = if negative { -magnitude } else { magnitude };
    if value < i64::from(i32::MIN) || value > i64::from(u32::MAX) {
        return None;
    }
    Some(value as u32)
}

/// 执行一条命令后是否继续
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// 执行单条命令，输出写到 `out`
pub fn execute<W: Write>(env: &mut SimEnv, cmd: Command, out: &mut W) -> io::Result<Flow> {
    match cmd {
        Command::Sim => {
            if !env.is_running() {
                write!(out, "Simulation Stopped.\n\n")?;
                return Ok(Flow::Continue);
            }
            write!(out, "Simulation Started...\n\n")?;
            let outcome = env.run_to_completion();
            if outcome.reason == StopReason::BudgetExhausted {
                write!(
                    out,
                    "Instruction budget of {} exhausted.\n\n",
                    env.config().max_instructions
                )?;
            } else {
                write!(out, "Simulation Finished.\n\n")?;
            }
        }
        Command::Run(n) => {
            if !env.is_running() {
                write!(out, "Simulation Stopped.\n\n")?;
                return Ok(Flow::Continue);
            }
            write!(out, "Running simulator for {n} cycles...\n\n")?;
            if env.run(n).reason == StopReason::Halted {
                write!(out, "Simulation Stopped.\n\n")?;
            }
        }
        Command::RegDump => {
            dump_registers(out, env.cpu(), env.instruction_count())?;
        }
        Command::Reset => {
            if let Err(err) = env.reset() {
                writeln!(out, "Error: {err}")?;
            }
        }
        Command::MemDump { start, stop } => {
            dump_memory(out, env.memory(), start, stop)?;
            writeln!(out)?;
        }
        Command::Input { reg, value } => {
            if let Err(err) = env.set_register(reg, value) {
                writeln!(out, "Error: {err}")?;
            }
        }
        Command::Print => {
            list_program(out, env.image(), env.memory(), env.cpu().decoder())?;
        }
        Command::Help => out.write_all(help_text().as_bytes())?,
        Command::Quit => {
            writeln!(out, "Bye.")?;
            return Ok(Flow::Quit);
        }
    }
    Ok(Flow::Continue)
}

/// 读取-执行循环，直到 `quit` 或输入结束
pub fn run_console<R: BufRead, W: Write>(env: &mut SimEnv, input: R, mut out: W) -> io::Result<()> {
    let mut lines = input.lines();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            return Ok(());
        };
        let line = line?;

        match parse_command(&line) {
            Ok(cmd) => {
                if execute(env, cmd, &mut out)? == Flow::Quit {
                    return Ok(());
                }
            }
            Err(CommandError::Unknown(_)) => writeln!(out, "Invalid Command.")?,
            Err(err) => debug!("ignoring '{}': {err}", line.trim()),
        }
    }
}

pub fn help_text() -> &'static str {
    "------------------------------------------------------------------\n\
     \n\
     sim\t\t\t-- simulate program to completion\n\
     run <n>\t\t\t-- simulate program for <n> instructions\n\
     rdump\t\t\t-- dump register values\n\
     reset\t\t\t-- clear all registers/memory and re-load the program\n\
     input <reg> <val>\t-- set GPR <reg> to <val>\n\
     mdump <start> <stop>\t-- dump memory from <start> to <stop> address\n\
     print\t\t\t-- print the program loaded into memory\n\
     ? | help\t\t-- display help menu\n\
     quit\t\t\t-- exit the simulator\n\
     \n\
     ------------------------------------------------------------------\n"
}
