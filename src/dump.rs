//! 只读视图：寄存器转储、内存转储与程序反汇编列表
//!
//! 逐行写入调用方给出的 `Write`，不持有也不修改仿真状态。

use std::io::{self, Write};

use crate::cpu::CpuCore;
use crate::isa::DecoderRegistry;
use crate::loader::ProgramImage;
use crate::memory::Memory;

const RULE: &str = "-------------------------------------";

/// 指令计数、PC 与 32 个寄存器
pub fn dump_registers<W: Write>(out: &mut W, cpu: &CpuCore, instruction_count: u64) -> io::Result<()> {
    writeln!(out, "{RULE}")?;
    writeln!(out, "Dumping Register Content")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "# Instructions Executed\t: {instruction_count}")?;
    writeln!(out, "PC\t: 0x{:08x}", cpu.pc())?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "[Register]\t[Value]")?;
    writeln!(out, "{RULE}")?;
    for (i, value) in cpu.regs().iter().enumerate() {
        writeln!(out, "[R{i}]\t: 0x{value:08x}")?;
    }
    writeln!(out, "{RULE}")
}

/// `start..=stop` 之间每个字一行；`stop < start` 时只有表头
pub fn dump_memory<W: Write>(out: &mut W, mem: &dyn Memory, start: u32, stop: u32) -> io::Result<()> {
    writeln!(out, "{RULE}{RULE}")?;
    writeln!(out, "Memory content [0x{start:08x}..0x{stop:08x}] :")?;
    writeln!(out, "{RULE}{RULE}")?;
    writeln!(out, "\t[Address in Hex (Dec) ]\t[Value]")?;

    // u64 避免在地址空间顶端回绕
    let mut addr = u64::from(start);
    while addr <= u64::from(stop) {
        let a = addr as u32;
        writeln!(out, "\t0x{a:08x} ({a}) :\t0x{:08x}", mem.read32(a))?;
        addr += 4;
    }
    Ok(())
}

/// 程序反汇编：按镜像中的可执行字地址从当前内存取字，用 CPU 实际配置的解码器解码
pub fn list_program<W: Write>(
    out: &mut W,
    image: &ProgramImage,
    mem: &dyn Memory,
    decoder: &DecoderRegistry,
) -> io::Result<()> {
    for (addr, _) in image.listing() {
        let word = mem.read32(addr);
        writeln!(out, "[0x{addr:08x}]\t{}", decoder.decode(word).instr)?;
    }
    Ok(())
}
