//! CPU 核心与执行引擎
//!
//! `CpuCore` 持有两份架构状态快照：`current` 与 `next`。
//! 每一步从 `current` 读取操作数、将结果写入 `next`，
//! 由驱动方调用 [`CpuCore::commit`] 原子地提交。
//! 同一步内的读永远看不到本步的写。

use std::sync::Arc;

use log::{trace, warn};

use crate::isa::{DecodedInstr, DecoderRegistry};
use crate::memory::Memory;

mod builder;
mod exu;
mod status;

pub use builder::CpuBuilder;
pub use status::{ArchState, RegFile, ZeroRegister};

/// CPU 执行状态（运行标志）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    /// 正常运行中
    Running,
    /// 执行了 SYSTEM 族指令或被显式停止
    Halted,
}

/// 单步执行的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// 指令正常执行
    Retired(DecodedInstr),
    /// SYSTEM 族指令，运行标志已清除
    Halted(DecodedInstr),
    /// 无法识别的编码，仅 PC 前进 4
    DecodeFault { pc: u32, raw: u32 },
}

/// 单线程 RV32IM CPU 核心
///
/// - 32 个 32-bit 通用寄存器，x0 行为由 [`ZeroRegister`] 决定
/// - 32-bit 程序计数器，字节地址
/// - 不依赖全局变量，多个实例可以并行存在
pub struct CpuCore {
    current: ArchState,
    next: ArchState,
    state: CpuState,
    decoder: Arc<DecoderRegistry>,
}

impl CpuCore {
    /// 使用完整 RV32IM 解码器创建 CPU 核心
    ///
    /// ```
    /// use rv32sim::cpu::CpuCore;
    ///
    /// let cpu = CpuCore::new(0x0040_0000);
    /// assert_eq!(cpu.pc(), 0x0040_0000);
    /// ```
    pub fn new(entry_pc: u32) -> Self {
        Self::with_config(
            entry_pc,
            ZeroRegister::default(),
            Arc::new(DecoderRegistry::with_rv32im()),
        )
    }

    pub(crate) fn with_config(
        entry_pc: u32,
        zero: ZeroRegister,
        decoder: Arc<DecoderRegistry>,
    ) -> Self {
        let current = ArchState::new(entry_pc, zero);
        CpuCore {
            current,
            next: current,
            state: CpuState::Running,
            decoder,
        }
    }

    /// 当前（已提交）的程序计数器
    pub fn pc(&self) -> u32 {
        self.current.pc
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    /// 清除运行标志
    pub fn halt(&mut self) {
        self.state = CpuState::Halted;
    }

    /// 读取已提交状态中的寄存器
    pub fn read_reg(&self, reg: u8) -> u32 {
        self.current.read_reg(reg)
    }

    /// 步间寄存器覆写：同时写入 current 与 next
    ///
    /// 遵循 x0 策略；`reg` 超出 0..=31 时忽略
    pub fn set_register(&mut self, reg: u8, value: u32) {
        if reg >= 32 {
            return;
        }
        self.current.write_reg(reg, value);
        self.next.write_reg(reg, value);
    }

    pub fn regs(&self) -> &[u32; 32] {
        self.current.regs()
    }

    pub fn current(&self) -> &ArchState {
        &self.current
    }

    /// 尚未提交的下一状态
    pub fn next(&self) -> &ArchState {
        &self.next
    }

    pub fn zero_register(&self) -> ZeroRegister {
        self.current.regs.zero_policy()
    }

    pub fn decoder(&self) -> &DecoderRegistry {
        &self.decoder
    }

    /// 寄存器清零，PC 置为 `entry_pc`，重新开始运行
    pub fn reset(&mut self, entry_pc: u32) {
        self.current = ArchState::new(entry_pc, self.zero_register());
        self.next = self.current;
        self.state = CpuState::Running;
    }

    /// 执行单步指令，结果写入 `next`
    ///
    /// 流程：
    /// 1. 从 `current.pc` 取指并解码
    /// 2. `next.pc = current.pc + 4`
    /// 3. 执行：操作数读自 `current`，结果写入 `next`
    ///
    /// 不检查运行标志，也不提交；两者都由驱动方负责。
    pub fn step(&mut self, mem: &mut dyn Memory) -> StepEvent {
        let pc = self.current.pc;
        let raw = mem.read32(pc);
        let decoded = self.decoder.decode(raw);

        self.next = self.current;
        self.next.pc = pc.wrapping_add(4);

        if decoded.instr.is_halt() {
            trace!("0x{pc:08x}: {} (halt)", decoded.instr);
            self.state = CpuState::Halted;
            return StepEvent::Halted(decoded);
        }

        let instr = decoded.instr;
        let handled = exu::rv32i::execute(&self.current, &mut self.next, mem, instr)
            || exu::rv32m::execute(&self.current, &mut self.next, instr);

        if handled {
            trace!("0x{pc:08x}: {instr}");
            StepEvent::Retired(decoded)
        } else {
            warn!("unrecognised instruction 0x{raw:08x} at 0x{pc:08x}; skipping");
            StepEvent::DecodeFault { pc, raw }
        }
    }

    /// 将 `next` 提交为 `current`
    pub fn commit(&mut self) {
        self.current = self.next;
    }
}

impl Default for CpuCore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for CpuCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuCore")
            .field("pc", &format_args!("0x{:08x}", self.current.pc))
            .field("state", &self.state)
            .field("decoder", &self.decoder)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::RvInstr;
    use crate::memory::{MemoryLayout, RegionMemory, RegionSpec};

    fn test_memory() -> RegionMemory {
        let layout = MemoryLayout::new(vec![
            RegionSpec::new("text", 0, 0x3FF),
            RegionSpec::new("data", 0x1000, 0x10FF),
        ])
        .unwrap();
        RegionMemory::new(&layout)
    }

    fn load(mem: &mut RegionMemory, words: &[u32]) {
        for (i, &word) in words.iter().enumerate() {
            mem.write32(i as u32 * 4, word);
        }
    }

    /// step + commit，共 n 次
    fn cycles(cpu: &mut CpuCore, mem: &mut RegionMemory, n: usize) {
        for _ in 0..n {
            cpu.step(mem);
            cpu.commit();
        }
    }

    #[test]
    fn test_addi() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(&mut mem, &[0x02A00093]); // addi x1, x0, 42

        let event = cpu.step(&mut mem);
        assert!(matches!(event, StepEvent::Retired(d) if matches!(d.instr, RvInstr::Addi { .. })));
        cpu.commit();

        assert_eq!(cpu.read_reg(1), 42);
        assert_eq!(cpu.pc(), 4);
    }

    #[test]
    fn test_add_sub() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(
            &mut mem,
            &[
                0x00A00093, // addi x1, x0, 10
                0x01400113, // addi x2, x0, 20
                0x002081B3, // add x3, x1, x2
                0x40110233, // sub x4, x2, x1
            ],
        );

        cycles(&mut cpu, &mut mem, 4);

        assert_eq!(cpu.read_reg(3), 30);
        assert_eq!(cpu.read_reg(4), 10);
    }

    #[test]
    fn test_step_does_not_commit() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(&mut mem, &[0x02A00093]); // addi x1, x0, 42

        cpu.step(&mut mem);
        assert_eq!(cpu.read_reg(1), 0);
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.next().read_reg(1), 42);
        assert_eq!(cpu.next().pc, 4);

        cpu.commit();
        assert_eq!(cpu.current(), cpu.next());
    }

    #[test]
    fn test_read_before_write_isolation() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(&mut mem, &[0x001080B3]); // add x1, x1, x1
        cpu.set_register(1, 5);

        cpu.step(&mut mem);
        assert_eq!(cpu.read_reg(1), 5);
        assert_eq!(cpu.next().read_reg(1), 10);
        cpu.commit();
        assert_eq!(cpu.read_reg(1), 10);
    }

    #[test]
    fn test_lw_sw() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(
            &mut mem,
            &[
                0x04200093, // addi x1, x0, 0x42
                0x06400113, // addi x2, x0, 100
                0x00112023, // sw x1, 0(x2)
                0x00012183, // lw x3, 0(x2)
            ],
        );

        cycles(&mut cpu, &mut mem, 4);

        assert_eq!(cpu.read_reg(3), 0x42);
        assert_eq!(mem.read32(100), 0x42);
    }

    #[test]
    fn test_sub_word_loads_extend() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        mem.write32(0x1000, 0x1234_8680);
        load(
            &mut mem,
            &[
                0x00010083, // lb x1, 0(x2)
                0x00014183, // lbu x3, 0(x2)
                0x00011203, // lh x4, 0(x2)
                0x00015283, // lhu x5, 0(x2)
            ],
        );
        cpu.set_register(2, 0x1000);

        cycles(&mut cpu, &mut mem, 4);

        assert_eq!(cpu.read_reg(1), 0xFFFF_FF80);
        assert_eq!(cpu.read_reg(3), 0x80);
        assert_eq!(cpu.read_reg(4), 0xFFFF_8680);
        assert_eq!(cpu.read_reg(5), 0x8680);
    }

    #[test]
    fn test_sub_word_stores_preserve_neighbours() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        mem.write32(0x1000, 0x1122_3344);
        mem.write32(0x1010, 0x1122_3344);
        load(
            &mut mem,
            &[
                0x001100A3, // sb x1, 1(x2)
                0x00111023, // sh x1, 0(x2)
            ],
        );
        cpu.set_register(1, 0xAB);
        cpu.set_register(2, 0x1000);

        cycles(&mut cpu, &mut mem, 1);
        assert_eq!(mem.read32(0x1000), 0x1122_AB44);

        cpu.set_register(1, 0xDEAD_BEEF);
        cycles(&mut cpu, &mut mem, 1);
        assert_eq!(mem.read32(0x1000), 0x1122_BEEF);
        assert_eq!(mem.read32(0x1010), 0x1122_3344);
    }

    #[test]
    fn test_beq_taken() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(
            &mut mem,
            &[
                0x00500093, // addi x1, x0, 5
                0x00500113, // addi x2, x0, 5
                0x00208463, // beq x1, x2, 8
                0x00100193, // addi x3, x0, 1
            ],
        );

        cycles(&mut cpu, &mut mem, 3);

        assert_eq!(cpu.pc(), 16);
        assert_eq!(cpu.read_reg(3), 0);
    }

    #[test]
    fn test_beq_not_taken() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(
            &mut mem,
            &[
                0x00500093, // addi x1, x0, 5
                0x00A00113, // addi x2, x0, 10
                0x00208463, // beq x1, x2, 8
                0x00100193, // addi x3, x0, 1
            ],
        );

        cycles(&mut cpu, &mut mem, 4);

        assert_eq!(cpu.read_reg(3), 1);
    }

    #[test]
    fn test_signed_vs_unsigned_branch() {
        let mut mem = test_memory();
        load(&mut mem, &[0x0020C463]); // blt x1, x2, 8
        let mut cpu = CpuCore::new(0);
        cpu.set_register(1, -1i32 as u32);
        cpu.set_register(2, 1);
        cycles(&mut cpu, &mut mem, 1);
        assert_eq!(cpu.pc(), 8);

        load(&mut mem, &[0x0020E463]); // bltu x1, x2, 8
        let mut cpu = CpuCore::new(0);
        cpu.set_register(1, -1i32 as u32);
        cpu.set_register(2, 1);
        cycles(&mut cpu, &mut mem, 1);
        assert_eq!(cpu.pc(), 4);
    }

    #[test]
    fn test_jal() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(&mut mem, &[0x008000EF]); // jal x1, 8

        cycles(&mut cpu, &mut mem, 1);

        assert_eq!(cpu.read_reg(1), 4);
        assert_eq!(cpu.pc(), 8);
    }

    #[test]
    fn test_jalr_same_register_and_alignment() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(&mut mem, &[0x000080E7]); // jalr x1, 0(x1)
        cpu.set_register(1, 0x101);

        cycles(&mut cpu, &mut mem, 1);

        assert_eq!(cpu.pc(), 0x100);
        assert_eq!(cpu.read_reg(1), 4);
    }

    #[test]
    fn test_lui_auipc() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0x100);
        mem.write32(0x100, 0x123450B7); // lui x1, 0x12345
        mem.write32(0x104, 0x12345117); // auipc x2, 0x12345

        cycles(&mut cpu, &mut mem, 2);

        assert_eq!(cpu.read_reg(1), 0x12345000);
        assert_eq!(cpu.read_reg(2), 0x104 + 0x12345000);
    }

    #[test]
    fn test_x0_hardwired() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(&mut mem, &[0x02A00013]); // addi x0, x0, 42

        cycles(&mut cpu, &mut mem, 1);
        cpu.set_register(0, 7);

        assert_eq!(cpu.read_reg(0), 0);
    }

    #[test]
    fn test_x0_writable() {
        let mut mem = test_memory();
        let mut cpu = CpuBuilder::new(0)
            .with_zero_register(ZeroRegister::Writable)
            .build()
            .unwrap();
        load(&mut mem, &[0x02A00013]); // addi x0, x0, 42

        cycles(&mut cpu, &mut mem, 1);

        assert_eq!(cpu.read_reg(0), 42);
    }

    #[test]
    fn test_ecall_halts() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        cpu.set_register(5, 9);
        load(&mut mem, &[0x00000073]); // ecall

        let event = cpu.step(&mut mem);
        cpu.commit();

        assert!(matches!(event, StepEvent::Halted(d) if d.instr == RvInstr::Ecall));
        assert_eq!(cpu.state(), CpuState::Halted);
        assert_eq!(cpu.pc(), 4);
        assert_eq!(cpu.read_reg(5), 9);
    }

    #[test]
    fn test_csr_encoding_halts() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(&mut mem, &[0x30009073]); // csrrw x0, mstatus, x1

        let event = cpu.step(&mut mem);

        assert!(matches!(event, StepEvent::Halted(_)));
        assert!(!cpu.is_running());
    }

    #[test]
    fn test_decode_fault_advances_pc_only() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(&mut mem, &[0xFFFF_FFFF]);
        let before = *cpu.regs();

        let event = cpu.step(&mut mem);
        cpu.commit();

        assert_eq!(event, StepEvent::DecodeFault { pc: 0, raw: 0xFFFF_FFFF });
        assert_eq!(cpu.pc(), 4);
        assert_eq!(*cpu.regs(), before);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_mul_without_m_extension_faults() {
        let mut mem = test_memory();
        let mut cpu = CpuBuilder::new(0).build().unwrap();
        load(&mut mem, &[0x022081B3]); // mul x3, x1, x2

        assert!(matches!(cpu.step(&mut mem), StepEvent::DecodeFault { .. }));
    }

    #[test]
    fn test_shift_instructions() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(
            &mut mem,
            &[
                0x01000093, // addi x1, x0, 16
                0x00209113, // slli x2, x1, 2
                0x00115193, // srli x3, x2, 1
            ],
        );

        cycles(&mut cpu, &mut mem, 3);

        assert_eq!(cpu.read_reg(2), 64);
        assert_eq!(cpu.read_reg(3), 32);
    }

    #[test]
    fn test_arithmetic_shifts_and_shift_amount_mask() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(
            &mut mem,
            &[
                0x4020D1B3, // sra x3, x1, x2
                0x4040D213, // srai x4, x1, 4
                0x002312B3, // sll x5, x6, x2
                0x0020D3B3, // srl x7, x1, x2
            ],
        );
        cpu.set_register(1, 0x8000_0000);
        // 只取低 5 位：33 & 0x1F = 1
        cpu.set_register(2, 33);
        cpu.set_register(6, 1);

        cycles(&mut cpu, &mut mem, 4);

        assert_eq!(cpu.read_reg(3), 0xC000_0000);
        assert_eq!(cpu.read_reg(4), 0xF800_0000);
        assert_eq!(cpu.read_reg(5), 2);
        assert_eq!(cpu.read_reg(7), 0x4000_0000);
    }

    #[test]
    fn test_immediate_compare_and_logic() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(
            &mut mem,
            &[
                0xFFF02413, // slti x8, x0, -1
                0xFFF03493, // sltiu x9, x0, -1
                0xFFF0A513, // slti x10, x1, -1
                0xFFF64593, // xori x11, x12, -1
                0x0F066693, // ori x13, x12, 0xf0
                0xFF067713, // andi x14, x12, -16
            ],
        );
        cpu.set_register(1, 0x8000_0000);
        cpu.set_register(12, 0x0F0F_0F0F);

        cycles(&mut cpu, &mut mem, 6);

        assert_eq!(cpu.read_reg(8), 0);
        // -1 按无符号比较为 0xFFFFFFFF
        assert_eq!(cpu.read_reg(9), 1);
        assert_eq!(cpu.read_reg(10), 1);
        assert_eq!(cpu.read_reg(11), 0xF0F0_F0F0);
        assert_eq!(cpu.read_reg(13), 0x0F0F_0FFF);
        assert_eq!(cpu.read_reg(14), 0x0F0F_0F00);
    }

    #[test]
    fn test_remaining_branches() {
        // (编码, 是否跳转)，x1 = -1, x2 = 1
        let cases = [
            (0x00209463, true),  // bne x1, x2, 8
            (0x0020D463, false), // bge x1, x2, 8
            (0x0020F463, true),  // bgeu x1, x2, 8
        ];
        for (word, taken) in cases {
            let mut mem = test_memory();
            let mut cpu = CpuCore::new(0);
            load(&mut mem, &[word]);
            cpu.set_register(1, -1i32 as u32);
            cpu.set_register(2, 1);

            cycles(&mut cpu, &mut mem, 1);

            let expected = if taken { 8 } else { 4 };
            assert_eq!(cpu.pc(), expected, "word 0x{word:08x}");
        }
    }

    #[test]
    fn test_slt() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(
            &mut mem,
            &[
                0xFFB00093, // addi x1, x0, -5
                0x00A00113, // addi x2, x0, 10
                0x0020A1B3, // slt x3, x1, x2
                0x0020B233, // sltu x4, x1, x2
            ],
        );

        cycles(&mut cpu, &mut mem, 4);

        assert_eq!(cpu.read_reg(3), 1);
        assert_eq!(cpu.read_reg(4), 0);
    }

    #[test]
    fn test_division_edge_cases() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(
            &mut mem,
            &[
                0x0220C1B3, // div x3, x1, x2
                0x0220E233, // rem x4, x1, x2
                0x0220D2B3, // divu x5, x1, x2
                0x0220F333, // remu x6, x1, x2
            ],
        );
        cpu.set_register(1, 7);
        cpu.set_register(2, 0);

        cycles(&mut cpu, &mut mem, 4);

        assert_eq!(cpu.read_reg(3), u32::MAX);
        assert_eq!(cpu.read_reg(4), 7);
        assert_eq!(cpu.read_reg(5), u32::MAX);
        assert_eq!(cpu.read_reg(6), 7);
    }

    #[test]
    fn test_signed_division_overflow() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(
            &mut mem,
            &[
                0x0220C1B3, // div x3, x1, x2
                0x0220E233, // rem x4, x1, x2
            ],
        );
        cpu.set_register(1, i32::MIN as u32);
        cpu.set_register(2, -1i32 as u32);

        cycles(&mut cpu, &mut mem, 2);

        assert_eq!(cpu.read_reg(3), i32::MIN as u32);
        assert_eq!(cpu.read_reg(4), 0);
    }

    #[test]
    fn test_multiply_high() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(
            &mut mem,
            &[
                0x022081B3, // mul x3, x1, x2
                0x02209233, // mulh x4, x1, x2
                0x0220A2B3, // mulhsu x5, x1, x2
                0x0220B333, // mulhu x6, x1, x2
            ],
        );
        cpu.set_register(1, u32::MAX);
        cpu.set_register(2, u32::MAX);

        cycles(&mut cpu, &mut mem, 4);

        assert_eq!(cpu.read_reg(3), 1);
        assert_eq!(cpu.read_reg(4), 0);
        assert_eq!(cpu.read_reg(5), u32::MAX);
        assert_eq!(cpu.read_reg(6), 0xFFFF_FFFE);
    }

    #[test]
    fn test_reset() {
        let mut mem = test_memory();
        let mut cpu = CpuCore::new(0);
        load(&mut mem, &[0x02A00093, 0x00000073]);
        cycles(&mut cpu, &mut mem, 2);
        assert!(!cpu.is_running());

        cpu.reset(0);
        assert!(cpu.is_running());
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.read_reg(1), 0);
        assert_eq!(cpu.current(), cpu.next());
    }
}
