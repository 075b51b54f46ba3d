use super::super::ArchState;
use crate::isa::RvInstr;

/// Execute RV32M (mul/div) instructions. Returns true if handled.
///
/// Division by zero and signed overflow produce the results the M extension
/// defines instead of trapping.
pub fn execute(cur: &ArchState, next: &mut ArchState, instr: RvInstr) -> bool {
    match instr {
        RvInstr::Mul { rd, rs1, rs2 } => {
            let a = cur.read_reg(rs1);
            let b = cur.read_reg(rs2);
            let result = a.wrapping_mul(b);
            next.write_reg(rd, result);
        }
        RvInstr::Mulh { rd, rs1, rs2 } => {
            let a = cur.read_reg(rs1) as i32 as i64;
            let b = cur.read_reg(rs2) as i32 as i64;
            let result = ((a * b) >> 32) as u32;
            next.write_reg(rd, result);
        }
        RvInstr::Mulhsu { rd, rs1, rs2 } => {
            let a = cur.read_reg(rs1) as i32 as i64;
            let b = cur.read_reg(rs2) as u64 as i64;
            let result = ((a * b) >> 32) as u32;
            next.write_reg(rd, result);
        }
        RvInstr::Mulhu { rd, rs1, rs2 } => {
            let a = cur.read_reg(rs1) as u64;
            let b = cur.read_reg(rs2) as u64;
            let result = ((a * b) >> 32) as u32;
            next.write_reg(rd, result);
        }
        RvInstr::Div { rd, rs1, rs2 } => {
            let a = cur.read_reg(rs1) as i32;
            let b = cur.read_reg(rs2) as i32;
            let result = if b == 0 {
                -1i32 as u32
            } else if a == i32::MIN && b == -1 {
                a as u32
            } else {
                (a / b) as u32
            };
            next.write_reg(rd, result);
        }
        RvInstr::Divu { rd, rs1, rs2 } => {
            let a = cur.read_reg(rs1);
            let b = cur.read_reg(rs2);
            let result = if b == 0 { u32::MAX } else { a / b };
            next.write_reg(rd, result);
        }
        RvInstr::Rem { rd, rs1, rs2 } => {
            let a = cur.read_reg(rs1) as i32;
            let b = cur.read_reg(rs2) as i32;
            let result = if b == 0 {
                a as u32
            } else if a == i32::MIN && b == -1 {
                0
            } else {
                (a % b) as u32
            };
            next.write_reg(rd, result);
        }
        RvInstr::Remu { rd, rs1, rs2 } => {
            let a = cur.read_reg(rs1);
            let b = cur.read_reg(rs2);
            let result = if b == 0 { a } else { a % b };
            next.write_reg(rd, result);
        }
        _ => return false,
    }

    true
}
