//! rv32sim 命令行入口
//!
//! 加载 hex 或 ELF 程序，进入交互式监视器；`--batch` 时运行到结束并打印寄存器。

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::LevelFilter;

use rv32sim::console::run_console;
use rv32sim::cpu::ZeroRegister;
use rv32sim::dump::dump_registers;
use rv32sim::logging;
use rv32sim::sim_env::{IsaExtensions, SimConfig, SimEnv, StopReason};

#[derive(Parser, Debug)]
#[command(name = "rv32sim")]
#[command(about = "Functional RV32IM instruction-set simulator", long_about = None)]
struct Args {
    /// Program image: text file of hex words, or an ELF32 RISC-V executable
    program: PathBuf,

    /// Instruction budget for `sim` / batch runs (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_instructions: u64,

    /// Let instructions write x0 instead of discarding the write
    #[arg(long, action = ArgAction::SetTrue)]
    writable_x0: bool,

    /// Decode base RV32I only (no M extension)
    #[arg(long, action = ArgAction::SetTrue)]
    rv32i: bool,

    /// Clear the run flag when an unrecognized encoding is executed
    #[arg(long, action = ArgAction::SetTrue)]
    halt_on_decode_fault: bool,

    /// Run to completion, dump registers and exit
    #[arg(long, action = ArgAction::SetTrue)]
    batch: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Disable logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    quiet: bool,
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Off;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    fn sim_config(&self) -> SimConfig {
        let extensions = if self.rv32i {
            IsaExtensions::rv32i()
        } else {
            IsaExtensions::rv32im()
        };
        let zero = if self.writable_x0 {
            ZeroRegister::Writable
        } else {
            ZeroRegister::Hardwired
        };
        SimConfig::new()
            .with_extensions(extensions)
            .with_zero_register(zero)
            .with_max_instructions(self.max_instructions)
            .with_halt_on_decode_fault(self.halt_on_decode_fault)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_level()).context("failed to install logger")?;

    let mut env = SimEnv::from_file(args.sim_config(), &args.program)
        .with_context(|| format!("failed to load {}", args.program.display()))?;

    let image = env.image();
    println!(
        "Loaded {} ({:?}, {} word(s), entry 0x{:08x})",
        args.program.display(),
        image.format,
        image.word_count(),
        image.entry
    );

    if args.batch {
        let outcome = env.run_to_completion();
        if outcome.reason == StopReason::BudgetExhausted {
            println!(
                "Instruction budget of {} exhausted.",
                env.config().max_instructions
            );
        }
        let mut stdout = io::stdout().lock();
        dump_registers(&mut stdout, env.cpu(), env.instruction_count())
            .context("failed to write register dump")?;
        return Ok(());
    }

    let stdin = io::stdin();
    run_console(&mut env, stdin.lock(), io::stdout()).context("console I/O failed")?;
    Ok(())
}
