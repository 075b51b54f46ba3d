use super::super::ArchState;
use crate::isa::{RvInstr, sext};
use crate::memory::Memory;

/// Execute RV32I-base instructions. Returns true if handled.
///
/// Operands come from `cur`; results land in `next`, whose PC already
/// points at the following instruction.
pub fn execute(cur: &ArchState, next: &mut ArchState, mem: &mut dyn Memory, instr: RvInstr) -> bool {
    match instr {
        // ========== R-type 算术/逻辑指令 ==========
        RvInstr::Add { rd, rs1, rs2 } => {
            let result = cur.read_reg(rs1).wrapping_add(cur.read_reg(rs2));
            next.write_reg(rd, result);
        }
        RvInstr::Sub { rd, rs1, rs2 } => {
            let result = cur.read_reg(rs1).wrapping_sub(cur.read_reg(rs2));
            next.write_reg(rd, result);
        }
        RvInstr::And { rd, rs1, rs2 } => {
            let result = cur.read_reg(rs1) & cur.read_reg(rs2);
            next.write_reg(rd, result);
        }
        RvInstr::Or { rd, rs1, rs2 } => {
            let result = cur.read_reg(rs1) | cur.read_reg(rs2);
            next.write_reg(rd, result);
        }
        RvInstr::Xor { rd, rs1, rs2 } => {
            let result = cur.read_reg(rs1) ^ cur.read_reg(rs2);
            next.write_reg(rd, result);
        }
        RvInstr::Slt { rd, rs1, rs2 } => {
            let result = ((cur.read_reg(rs1) as i32) < (cur.read_reg(rs2) as i32)) as u32;
            next.write_reg(rd, result);
        }
        RvInstr::Sltu { rd, rs1, rs2 } => {
            let result = (cur.read_reg(rs1) < cur.read_reg(rs2)) as u32;
            next.write_reg(rd, result);
        }
        RvInstr::Sll { rd, rs1, rs2 } => {
            let shamt = cur.read_reg(rs2) & 0x1F;
            let result = cur.read_reg(rs1) << shamt;
            next.write_reg(rd, result);
        }
        RvInstr::Srl { rd, rs1, rs2 } => {
            let shamt = cur.read_reg(rs2) & 0x1F;
            let result = cur.read_reg(rs1) >> shamt;
            next.write_reg(rd, result);
        }
        RvInstr::Sra { rd, rs1, rs2 } => {
            let shamt = cur.read_reg(rs2) & 0x1F;
            let result = ((cur.read_reg(rs1) as i32) >> shamt) as u32;
            next.write_reg(rd, result);
        }

        // ========== I-type 立即数算术/逻辑指令 ==========
        RvInstr::Addi { rd, rs1, imm } => {
            let result = cur.read_reg(rs1).wrapping_add(imm as u32);
            next.write_reg(rd, result);
        }
        RvInstr::Andi { rd, rs1, imm } => {
            let result = cur.read_reg(rs1) & (imm as u32);
            next.write_reg(rd, result);
        }
        RvInstr::Ori { rd, rs1, imm } => {
            let result = cur.read_reg(rs1) | (imm as u32);
            next.write_reg(rd, result);
        }
        RvInstr::Xori { rd, rs1, imm } => {
            let result = cur.read_reg(rs1) ^ (imm as u32);
            next.write_reg(rd, result);
        }
        RvInstr::Slti { rd, rs1, imm } => {
            let result = ((cur.read_reg(rs1) as i32) < imm) as u32;
            next.write_reg(rd, result);
        }
        RvInstr::Sltiu { rd, rs1, imm } => {
            let result = (cur.read_reg(rs1) < imm as u32) as u32;
            next.write_reg(rd, result);
        }
        RvInstr::Slli { rd, rs1, shamt } => {
            let result = cur.read_reg(rs1) << shamt;
            next.write_reg(rd, result);
        }
        RvInstr::Srli { rd, rs1, shamt } => {
            let result = cur.read_reg(rs1) >> shamt;
            next.write_reg(rd, result);
        }
        RvInstr::Srai { rd, rs1, shamt } => {
            let result = ((cur.read_reg(rs1) as i32) >> shamt) as u32;
            next.write_reg(rd, result);
        }

        // ========== Load 指令 ==========
        RvInstr::Lb { rd, rs1, offset } => {
            let addr = effective_addr(cur, rs1, offset);
            next.write_reg(rd, sext(mem.read32(addr) & 0xFF, 8) as u32);
        }
        RvInstr::Lh { rd, rs1, offset } => {
            let addr = effective_addr(cur, rs1, offset);
            next.write_reg(rd, sext(mem.read32(addr) & 0xFFFF, 16) as u32);
        }
        RvInstr::Lw { rd, rs1, offset } => {
            let addr = effective_addr(cur, rs1, offset);
            next.write_reg(rd, mem.read32(addr));
        }
        RvInstr::Lbu { rd, rs1, offset } => {
            let addr = effective_addr(cur, rs1, offset);
            next.write_reg(rd, mem.read32(addr) & 0xFF);
        }
        RvInstr::Lhu { rd, rs1, offset } => {
            let addr = effective_addr(cur, rs1, offset);
            next.write_reg(rd, mem.read32(addr) & 0xFFFF);
        }

        // ========== Store 指令 ==========
        RvInstr::Sb { rs1, rs2, offset } => {
            let addr = effective_addr(cur, rs1, offset);
            store_masked(mem, addr, cur.read_reg(rs2), 0xFF);
        }
        RvInstr::Sh { rs1, rs2, offset } => {
            let addr = effective_addr(cur, rs1, offset);
            store_masked(mem, addr, cur.read_reg(rs2), 0xFFFF);
        }
        RvInstr::Sw { rs1, rs2, offset } => {
            let addr = effective_addr(cur, rs1, offset);
            mem.write32(addr, cur.read_reg(rs2));
        }

        // ========== U-type 指令 ==========
        RvInstr::Lui { rd, imm } => {
            next.write_reg(rd, imm as u32);
        }
        RvInstr::Auipc { rd, imm } => {
            next.write_reg(rd, cur.pc.wrapping_add(imm as u32));
        }

        // ========== 控制流指令 ==========
        RvInstr::Jal { rd, offset } => {
            next.write_reg(rd, cur.pc.wrapping_add(4));
            next.pc = cur.pc.wrapping_add(offset as u32);
        }
        RvInstr::Jalr { rd, rs1, offset } => {
            // 目标地址基于 current 中的 rs1，rd == rs1 时也不受本次写入影响
            let target = cur.read_reg(rs1).wrapping_add(offset as u32) & !1;
            next.write_reg(rd, cur.pc.wrapping_add(4));
            next.pc = target;
        }
        RvInstr::Beq { rs1, rs2, offset } => {
            branch(cur, next, offset, cur.read_reg(rs1) == cur.read_reg(rs2));
        }
        RvInstr::Bne { rs1, rs2, offset } => {
            branch(cur, next, offset, cur.read_reg(rs1) != cur.read_reg(rs2));
        }
        RvInstr::Blt { rs1, rs2, offset } => {
            branch(cur, next, offset, (cur.read_reg(rs1) as i32) < (cur.read_reg(rs2) as i32));
        }
        RvInstr::Bge { rs1, rs2, offset } => {
            branch(cur, next, offset, (cur.read_reg(rs1) as i32) >= (cur.read_reg(rs2) as i32));
        }
        RvInstr::Bltu { rs1, rs2, offset } => {
            branch(cur, next, offset, cur.read_reg(rs1) < cur.read_reg(rs2));
        }
        RvInstr::Bgeu { rs1, rs2, offset } => {
            branch(cur, next, offset, cur.read_reg(rs1) >= cur.read_reg(rs2));
        }

        // 单核模型中视为立即完成
        RvInstr::Fence { .. } => {}

        _ => return false,
    }

    true
}

#[inline]
fn effective_addr(cur: &ArchState, rs1: u8, offset: i32) -> u32 {
    cur.read_reg(rs1).wrapping_add(offset as u32)
}

#[inline]
fn branch(cur: &ArchState, next: &mut ArchState, offset: i32, taken: bool) {
    if taken {
        next.pc = cur.pc.wrapping_add(offset as u32);
    }
}

/// 子字写入：读出整字，替换低位后写回，相邻字节保持不变
fn store_masked(mem: &mut dyn Memory, addr: u32, value: u32, mask: u32) {
    let old = mem.read32(addr);
    mem.write32(addr, (old & !mask) | (value & mask));
}
