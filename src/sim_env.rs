//! 仿真环境
//!
//! 本模块负责：
//! - 仿真配置（地址布局、ISA 扩展、x0 策略、指令预算）
//! - 初始化 CPU 和内存并写入程序镜像
//! - 驱动循环：单步、按步数运行、运行到结束、复位、寄存器覆写
//!
//! # 示例
//!
//! ```
//! use rv32sim::loader::ProgramImage;
//! use rv32sim::memory::MEM_TEXT_BEGIN;
//! use rv32sim::sim_env::{SimConfig, SimEnv};
//!
//! let image = ProgramImage::from_hex("02a00093\n00000073\n", MEM_TEXT_BEGIN).unwrap();
//! let mut env = SimEnv::new(SimConfig::default(), image).unwrap();
//! env.run_to_completion();
//! assert_eq!(env.cpu().read_reg(1), 42);
//! assert_eq!(env.instruction_count(), 2);
//! ```

use std::path::Path;

use log::info;
use thiserror::Error;

use crate::cpu::{CpuBuilder, CpuCore, StepEvent, ZeroRegister};
use crate::isa::IsaError;
use crate::loader::{LoadError, ProgramImage};
use crate::memory::{MemoryLayout, RegionMemory};

/// 仿真环境错误
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("CPU configuration failed")]
    Isa(#[from] IsaError),
    #[error("register index {index} out of range 0..=31")]
    InvalidRegister { index: u32 },
}

/// ISA 扩展配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IsaExtensions {
    /// 启用 M 扩展（乘除法）
    pub m: bool,
}

impl IsaExtensions {
    pub fn rv32i() -> Self {
        Self::default()
    }

    pub fn rv32im() -> Self {
        Self { m: true }
    }
}

/// 仿真配置
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// 地址布局
    pub layout: MemoryLayout,
    /// ISA 扩展
    pub extensions: IsaExtensions,
    /// x0 行为
    pub zero_register: ZeroRegister,
    /// 运行到结束时的指令预算（0 表示无限制）
    pub max_instructions: u64,
    /// 遇到无法识别的编码时是否清除运行标志
    pub halt_on_decode_fault: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            layout: MemoryLayout::default(),
            extensions: IsaExtensions::rv32im(),
            zero_register: ZeroRegister::default(),
            max_instructions: 0,
            halt_on_decode_fault: false,
        }
    }
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(mut self, layout: MemoryLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_extensions(mut self, ext: IsaExtensions) -> Self {
        self.extensions = ext;
        self
    }

    pub fn with_zero_register(mut self, zero: ZeroRegister) -> Self {
        self.zero_register = zero;
        self
    }

    /// 设置最大执行指令数
    pub fn with_max_instructions(mut self, max: u64) -> Self {
        self.max_instructions = max;
        self
    }

    pub fn with_halt_on_decode_fault(mut self, halt: bool) -> Self {
        self.halt_on_decode_fault = halt;
        self
    }

    /// text 段起始地址，hex 镜像的加载位置
    pub fn text_base(&self) -> u32 {
        self.layout.text().base
    }
}

/// 运行结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 运行标志已清除
    Halted,
    /// 达到请求的步数
    StepLimit,
    /// 耗尽配置的指令预算
    BudgetExhausted,
}

/// 一次 run 调用的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub executed: u64,
    pub reason: StopReason,
}

/// 仿真环境
///
/// 独占 CPU、内存和程序镜像；所有修改都发生在两步之间
pub struct SimEnv {
    cpu: CpuCore,
    memory: RegionMemory,
    image: ProgramImage,
    config: SimConfig,
    instruction_count: u64,
}

impl SimEnv {
    /// 按配置创建环境并写入程序镜像
    pub fn new(config: SimConfig, image: ProgramImage) -> Result<Self, SimError> {
        let mut memory = RegionMemory::new(&config.layout);
        image.load_into(&mut memory)?;
        info!(
            "program loaded: {} word(s), entry 0x{:08x}",
            image.word_count(),
            image.entry
        );

        let cpu = Self::build_cpu(&config, image.entry)?;
        info!("CPU initialized: {} at PC=0x{:08x}", isa_name(&config), image.entry);

        Ok(SimEnv {
            cpu,
            memory,
            image,
            config,
            instruction_count: 0,
        })
    }

    /// 读取程序文件（hex 或 ELF）并创建环境
    pub fn from_file(config: SimConfig, path: impl AsRef<Path>) -> Result<Self, SimError> {
        let image = ProgramImage::from_file(path, config.text_base())?;
        Self::new(config, image)
    }

    fn build_cpu(config: &SimConfig, entry_pc: u32) -> Result<CpuCore, SimError> {
        let mut builder = CpuBuilder::new(entry_pc).with_zero_register(config.zero_register);
        if config.extensions.m {
            builder = builder.with_m_extension();
        }
        Ok(builder.build()?)
    }

    /// 执行一个周期：单步、提交、计数
    ///
    /// 不检查运行标志
    pub fn cycle(&mut self) -> StepEvent {
        let event = self.cpu.step(&mut self.memory);
        self.cpu.commit();
        self.instruction_count += 1;

        if self.config.halt_on_decode_fault && matches!(event, StepEvent::DecodeFault { .. }) {
            self.cpu.halt();
        }
        event
    }

    /// 最多运行 `n` 个周期，运行标志清除时提前停止
    pub fn run(&mut self, n: u64) -> RunOutcome {
        let mut executed = 0;
        while executed < n {
            if !self.cpu.is_running() {
                return RunOutcome {
                    executed,
                    reason: StopReason::Halted,
                };
            }
            self.cycle();
            executed += 1;
        }
        let reason = if self.cpu.is_running() {
            StopReason::StepLimit
        } else {
            StopReason::Halted
        };
        RunOutcome { executed, reason }
    }

    /// 运行直到运行标志清除或指令总数达到预算
    pub fn run_to_completion(&mut self) -> RunOutcome {
        let budget = self.config.max_instructions;
        let mut executed = 0;
        while self.cpu.is_running() {
            if budget != 0 && self.instruction_count >= budget {
                return RunOutcome {
                    executed,
                    reason: StopReason::BudgetExhausted,
                };
            }
            self.cycle();
            executed += 1;
        }
        RunOutcome {
            executed,
            reason: StopReason::Halted,
        }
    }

    /// 清零内存和寄存器，重新写入程序，计数归零，PC 回到入口
    pub fn reset(&mut self) -> Result<(), SimError> {
        self.memory.reset();
        self.image.load_into(&mut self.memory)?;
        self.cpu.reset(self.image.entry);
        self.instruction_count = 0;
        info!("simulator reset, PC=0x{:08x}", self.image.entry);
        Ok(())
    }

    /// 步间寄存器覆写，同时作用于 current 与 next
    pub fn set_register(&mut self, index: u32, value: u32) -> Result<(), SimError> {
        if index > 31 {
            return Err(SimError::InvalidRegister { index });
        }
        self.cpu.set_register(index as u8, value);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.cpu.is_running()
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    pub fn cpu(&self) -> &CpuCore {
        &self.cpu
    }

    pub fn memory(&self) -> &RegionMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut RegionMemory {
        &mut self.memory
    }

    pub fn image(&self) -> &ProgramImage {
        &self.image
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }
}

fn isa_name(config: &SimConfig) -> &'static str {
    if config.extensions.m { "RV32IM" } else { "RV32I" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MEM_TEXT_BEGIN, Memory};

    fn env_with(words: &[u32], config: SimConfig) -> SimEnv {
        let image = ProgramImage::from_words(words, config.text_base());
        SimEnv::new(config, image).expect("failed to create sim env")
    }

    #[test]
    fn test_sim_config_builder() {
        let config = SimConfig::new()
            .with_extensions(IsaExtensions::rv32i())
            .with_zero_register(ZeroRegister::Writable)
            .with_max_instructions(1000)
            .with_halt_on_decode_fault(true);

        assert!(!config.extensions.m);
        assert_eq!(config.zero_register, ZeroRegister::Writable);
        assert_eq!(config.max_instructions, 1000);
        assert!(config.halt_on_decode_fault);
        assert_eq!(config.text_base(), MEM_TEXT_BEGIN);
    }

    #[test]
    fn test_sim_env_basic() {
        let mut env = env_with(&[0x02A00093], SimConfig::default()); // addi x1, x0, 42

        assert_eq!(env.cpu().pc(), MEM_TEXT_BEGIN);
        let event = env.cycle();
        assert!(matches!(event, StepEvent::Retired(_)));
        assert_eq!(env.cpu().read_reg(1), 42);
        assert_eq!(env.instruction_count(), 1);
    }

    #[test]
    fn test_sum_loop_runs_to_completion() {
        let program = [
            0x00000093, // addi x1, x0, 0
            0x00100113, // addi x2, x0, 1
            0x00B00193, // addi x3, x0, 11
            0x002080B3, // loop: add x1, x1, x2
            0x00110113, // addi x2, x2, 1
            0xFE314CE3, // blt x2, x3, -8
            0x00000073, // ecall
        ];
        let mut env = env_with(&program, SimConfig::default());

        let outcome = env.run_to_completion();

        assert_eq!(outcome.reason, StopReason::Halted);
        assert_eq!(env.cpu().read_reg(1), 55);
        // 3 条初始化 + 10 次循环 × 3 + ecall
        assert_eq!(outcome.executed, 34);
        assert_eq!(env.instruction_count(), 34);
        assert!(!env.is_running());
    }

    #[test]
    fn test_run_stops_at_halt() {
        let mut env = env_with(&[0x00000013, 0x00000073, 0x00000013], SimConfig::default());

        let outcome = env.run(10);
        assert_eq!(outcome, RunOutcome { executed: 2, reason: StopReason::Halted });

        let outcome = env.run(10);
        assert_eq!(outcome.executed, 0);
        assert_eq!(env.run_to_completion().executed, 0);
        assert_eq!(env.instruction_count(), 2);
    }

    #[test]
    fn test_run_step_limit() {
        let mut env = env_with(&[0x00000013; 8], SimConfig::default()); // nop × 8

        let outcome = env.run(3);

        assert_eq!(outcome, RunOutcome { executed: 3, reason: StopReason::StepLimit });
        assert_eq!(env.cpu().pc(), MEM_TEXT_BEGIN + 12);
    }

    #[test]
    fn test_instruction_budget() {
        // jal x0, 0：死循环
        let config = SimConfig::default().with_max_instructions(100);
        let mut env = env_with(&[0x0000006F], config);

        let outcome = env.run_to_completion();

        assert_eq!(outcome.reason, StopReason::BudgetExhausted);
        assert_eq!(outcome.executed, 100);
        assert!(env.is_running());
    }

    #[test]
    fn test_decode_fault_policy() {
        let mut lenient = env_with(&[0xFFFF_FFFF, 0x00000073], SimConfig::default());
        assert!(matches!(lenient.cycle(), StepEvent::DecodeFault { .. }));
        assert!(lenient.is_running());
        assert_eq!(lenient.run_to_completion().executed, 1);

        let strict_config = SimConfig::default().with_halt_on_decode_fault(true);
        let mut strict = env_with(&[0xFFFF_FFFF, 0x00000073], strict_config);
        assert!(matches!(strict.cycle(), StepEvent::DecodeFault { .. }));
        assert!(!strict.is_running());
    }

    #[test]
    fn test_reset_reloads_program() {
        let program = [
            0x02A00093, // addi x1, x0, 42
            0x00000073, // ecall
        ];
        let mut env = env_with(&program, SimConfig::default());
        env.run_to_completion();
        env.memory_mut().write32(MEM_TEXT_BEGIN, 0);
        env.memory_mut().write32(0x1000_0000, 0x1234);

        env.reset().unwrap();

        assert!(env.is_running());
        assert_eq!(env.instruction_count(), 0);
        assert_eq!(env.cpu().pc(), MEM_TEXT_BEGIN);
        assert_eq!(env.cpu().read_reg(1), 0);
        assert_eq!(env.memory().read32(MEM_TEXT_BEGIN), 0x02A00093);
        assert_eq!(env.memory().read32(0x1000_0000), 0);

        env.run_to_completion();
        assert_eq!(env.cpu().read_reg(1), 42);
    }

    #[test]
    fn test_set_register() {
        let mut env = env_with(&[0x001080B3], SimConfig::default()); // add x1, x1, x1

        env.set_register(1, 21).unwrap();
        assert!(matches!(
            env.set_register(32, 1),
            Err(SimError::InvalidRegister { index: 32 })
        ));
        env.set_register(0, 5).unwrap();

        env.cycle();
        assert_eq!(env.cpu().read_reg(1), 42);
        assert_eq!(env.cpu().read_reg(0), 0);
    }

    #[test]
    fn test_rv32i_only_faults_on_mul() {
        let config = SimConfig::default().with_extensions(IsaExtensions::rv32i());
        let mut env = env_with(&[0x022081B3], config); // mul x3, x1, x2
        assert!(matches!(env.cycle(), StepEvent::DecodeFault { .. }));
    }

    #[test]
    fn test_oversized_image_is_rejected() {
        let layout = MemoryLayout::new(vec![crate::memory::RegionSpec::new("text", 0, 7)]).unwrap();
        let config = SimConfig::default().with_layout(layout);
        let image = ProgramImage::from_words(&[0x13, 0x13, 0x13], 0);
        assert!(matches!(
            SimEnv::new(config, image),
            Err(SimError::Load(LoadError::DoesNotFit { .. }))
        ));
    }
}
