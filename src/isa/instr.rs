//! 定义指令的语义表达式，用于解码、执行和反汇编阶段

use std::fmt;

/// RV32IM 指令的语义化表示
///
/// 解码阶段一次性完成字段提取与符号扩展，执行阶段只做匹配。
/// 无法识别的 opcode / funct3 / funct7 组合统一解码为 `Illegal`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RvInstr {
    // ========== R-type 算术/逻辑指令 ==========
    /// ADD: rd = rs1 + rs2
    Add { rd: u8, rs1: u8, rs2: u8 },
    /// SUB: rd = rs1 - rs2
    Sub { rd: u8, rs1: u8, rs2: u8 },
    /// AND: rd = rs1 & rs2
    And { rd: u8, rs1: u8, rs2: u8 },
    /// OR: rd = rs1 | rs2
    Or { rd: u8, rs1: u8, rs2: u8 },
    /// XOR: rd = rs1 ^ rs2
    Xor { rd: u8, rs1: u8, rs2: u8 },
    /// SLT: rd = (rs1 < rs2) ? 1 : 0 (有符号比较)
    Slt { rd: u8, rs1: u8, rs2: u8 },
    /// SLTU: rd = (rs1 < rs2) ? 1 : 0 (无符号比较)
    Sltu { rd: u8, rs1: u8, rs2: u8 },
    /// SLL: rd = rs1 << rs2[4:0]
    Sll { rd: u8, rs1: u8, rs2: u8 },
    /// SRL: rd = rs1 >> rs2[4:0] (逻辑右移)
    Srl { rd: u8, rs1: u8, rs2: u8 },
    /// SRA: rd = rs1 >> rs2[4:0] (算术右移)
    Sra { rd: u8, rs1: u8, rs2: u8 },

    // ========== I-type 立即数算术/逻辑指令 ==========
    /// ADDI: rd = rs1 + imm
    Addi { rd: u8, rs1: u8, imm: i32 },
    /// ANDI: rd = rs1 & imm
    Andi { rd: u8, rs1: u8, imm: i32 },
    /// ORI: rd = rs1 | imm
    Ori { rd: u8, rs1: u8, imm: i32 },
    /// XORI: rd = rs1 ^ imm
    Xori { rd: u8, rs1: u8, imm: i32 },
    /// SLTI: rd = (rs1 < imm) ? 1 : 0 (有符号比较)
    Slti { rd: u8, rs1: u8, imm: i32 },
    /// SLTIU: rd = (rs1 < imm) ? 1 : 0 (无符号比较，imm 先符号扩展)
    Sltiu { rd: u8, rs1: u8, imm: i32 },
    /// SLLI: rd = rs1 << shamt
    Slli { rd: u8, rs1: u8, shamt: u8 },
    /// SRLI: rd = rs1 >> shamt (逻辑右移)
    Srli { rd: u8, rs1: u8, shamt: u8 },
    /// SRAI: rd = rs1 >> shamt (算术右移)
    Srai { rd: u8, rs1: u8, shamt: u8 },

    // ========== Load 指令 ==========
    /// LB: rd = sext(mem[rs1 + offset][7:0])
    Lb { rd: u8, rs1: u8, offset: i32 },
    /// LH: rd = sext(mem[rs1 + offset][15:0])
    Lh { rd: u8, rs1: u8, offset: i32 },
    /// LW: rd = mem[rs1 + offset]
    Lw { rd: u8, rs1: u8, offset: i32 },
    /// LBU: rd = zext(mem[rs1 + offset][7:0])
    Lbu { rd: u8, rs1: u8, offset: i32 },
    /// LHU: rd = zext(mem[rs1 + offset][15:0])
    Lhu { rd: u8, rs1: u8, offset: i32 },

    // ========== Store 指令 ==========
    /// SB: mem[rs1 + offset] = rs2[7:0]
    Sb { rs1: u8, rs2: u8, offset: i32 },
    /// SH: mem[rs1 + offset] = rs2[15:0]
    Sh { rs1: u8, rs2: u8, offset: i32 },
    /// SW: mem[rs1 + offset] = rs2
    Sw { rs1: u8, rs2: u8, offset: i32 },

    // ========== U-type 指令 ==========
    /// LUI: rd = imm（已左移 12 位）
    Lui { rd: u8, imm: i32 },
    /// AUIPC: rd = pc + imm（已左移 12 位）
    Auipc { rd: u8, imm: i32 },

    // ========== 控制流指令 ==========
    /// JAL: rd = pc + 4; pc = pc + offset
    Jal { rd: u8, offset: i32 },
    /// JALR: rd = pc + 4; pc = (rs1 + offset) & !1
    Jalr { rd: u8, rs1: u8, offset: i32 },
    /// BEQ: if (rs1 == rs2) pc = pc + offset
    Beq { rs1: u8, rs2: u8, offset: i32 },
    /// BNE: if (rs1 != rs2) pc = pc + offset
    Bne { rs1: u8, rs2: u8, offset: i32 },
    /// BLT: if (rs1 < rs2) pc = pc + offset (有符号)
    Blt { rs1: u8, rs2: u8, offset: i32 },
    /// BGE: if (rs1 >= rs2) pc = pc + offset (有符号)
    Bge { rs1: u8, rs2: u8, offset: i32 },
    /// BLTU: if (rs1 < rs2) pc = pc + offset (无符号)
    Bltu { rs1: u8, rs2: u8, offset: i32 },
    /// BGEU: if (rs1 >= rs2) pc = pc + offset (无符号)
    Bgeu { rs1: u8, rs2: u8, offset: i32 },

    // ========== 系统指令 ==========
    /// ECALL: 终止仿真
    Ecall,
    /// EBREAK: 同样终止仿真
    Ebreak,
    /// 其余 SYSTEM opcode 编码（CSR 等），按终止处理
    System { raw: u32 },
    /// FENCE: 单核模型中视为立即完成
    Fence { pred: u8, succ: u8 },

    // ========== M 扩展（乘除法）==========
    /// MUL: rd = (rs1 * rs2)[31:0]
    Mul { rd: u8, rs1: u8, rs2: u8 },
    /// MULH: rd = (rs1 * rs2)[63:32] (signed * signed)
    Mulh { rd: u8, rs1: u8, rs2: u8 },
    /// MULHSU: rd = (rs1 * rs2)[63:32] (signed * unsigned)
    Mulhsu { rd: u8, rs1: u8, rs2: u8 },
    /// MULHU: rd = (rs1 * rs2)[63:32] (unsigned * unsigned)
    Mulhu { rd: u8, rs1: u8, rs2: u8 },
    /// DIV: rd = rs1 / rs2 (signed)
    Div { rd: u8, rs1: u8, rs2: u8 },
    /// DIVU: rd = rs1 / rs2 (unsigned)
    Divu { rd: u8, rs1: u8, rs2: u8 },
    /// REM: rd = rs1 % rs2 (signed)
    Rem { rd: u8, rs1: u8, rs2: u8 },
    /// REMU: rd = rs1 % rs2 (unsigned)
    Remu { rd: u8, rs1: u8, rs2: u8 },

    // ========== 特殊 ==========
    /// 无法识别的编码
    Illegal { raw: u32 },
}

impl RvInstr {
    /// 是否为终止仿真的 SYSTEM 族指令
    pub fn is_halt(&self) -> bool {
        matches!(self, RvInstr::Ecall | RvInstr::Ebreak | RvInstr::System { .. })
    }
}

/// 反汇编输出，采用标准 RISC-V 汇编语法
impl fmt::Display for RvInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RvInstr::*;

        match *self {
            Add { rd, rs1, rs2 } => r_type(f, "add", rd, rs1, rs2),
            Sub { rd, rs1, rs2 } => r_type(f, "sub", rd, rs1, rs2),
            And { rd, rs1, rs2 } => r_type(f, "and", rd, rs1, rs2),
            Or { rd, rs1, rs2 } => r_type(f, "or", rd, rs1, rs2),
            Xor { rd, rs1, rs2 } => r_type(f, "xor", rd, rs1, rs2),
            Slt { rd, rs1, rs2 } => r_type(f, "slt", rd, rs1, rs2),
            Sltu { rd, rs1, rs2 } => r_type(f, "sltu", rd, rs1, rs2),
            Sll { rd, rs1, rs2 } => r_type(f, "sll", rd, rs1, rs2),
            Srl { rd, rs1, rs2 } => r_type(f, "srl", rd, rs1, rs2),
            Sra { rd, rs1, rs2 } => r_type(f, "sra", rd, rs1, rs2),
            Mul { rd, rs1, rs2 } => r_type(f, "mul", rd, rs1, rs2),
            Mulh { rd, rs1, rs2 } => r_type(f, "mulh", rd, rs1, rs2),
            Mulhsu { rd, rs1, rs2 } => r_type(f, "mulhsu", rd, rs1, rs2),
            Mulhu { rd, rs1, rs2 } => r_type(f, "mulhu", rd, rs1, rs2),
            Div { rd, rs1, rs2 } => r_type(f, "div", rd, rs1, rs2),
            Divu { rd, rs1, rs2 } => r_type(f, "divu", rd, rs1, rs2),
            Rem { rd, rs1, rs2 } => r_type(f, "rem", rd, rs1, rs2),
            Remu { rd, rs1, rs2 } => r_type(f, "remu", rd, rs1, rs2),

            Addi { rd, rs1, imm } => i_type(f, "addi", rd, rs1, imm),
            Andi { rd, rs1, imm } => i_type(f, "andi", rd, rs1, imm),
            Ori { rd, rs1, imm } => i_type(f, "ori", rd, rs1, imm),
            Xori { rd, rs1, imm } => i_type(f, "xori", rd, rs1, imm),
            Slti { rd, rs1, imm } => i_type(f, "slti", rd, rs1, imm),
            Sltiu { rd, rs1, imm } => i_type(f, "sltiu", rd, rs1, imm),
            Slli { rd, rs1, shamt } => i_type(f, "slli", rd, rs1, shamt as i32),
            Srli { rd, rs1, shamt } => i_type(f, "srli", rd, rs1, shamt as i32),
            Srai { rd, rs1, shamt } => i_type(f, "srai", rd, rs1, shamt as i32),

            Lb { rd, rs1, offset } => mem_type(f, "lb", rd, rs1, offset),
            Lh { rd, rs1, offset } => mem_type(f, "lh", rd, rs1, offset),
            Lw { rd, rs1, offset } => mem_type(f, "lw", rd, rs1, offset),
            Lbu { rd, rs1, offset } => mem_type(f, "lbu", rd, rs1, offset),
            Lhu { rd, rs1, offset } => mem_type(f, "lhu", rd, rs1, offset),
            Sb { rs1, rs2, offset } => mem_type(f, "sb", rs2, rs1, offset),
            Sh { rs1, rs2, offset } => mem_type(f, "sh", rs2, rs1, offset),
            Sw { rs1, rs2, offset } => mem_type(f, "sw", rs2, rs1, offset),

            Lui { rd, imm } => write!(f, "lui x{rd}, 0x{:x}", (imm as u32) >> 12),
            Auipc { rd, imm } => write!(f, "auipc x{rd}, 0x{:x}", (imm as u32) >> 12),

            Jal { rd, offset } => write!(f, "jal x{rd}, {offset}"),
            Jalr { rd, rs1, offset } => mem_type(f, "jalr", rd, rs1, offset),
            Beq { rs1, rs2, offset } => b_type(f, "beq", rs1, rs2, offset),
            Bne { rs1, rs2, offset } => b_type(f, "bne", rs1, rs2, offset),
            Blt { rs1, rs2, offset } => b_type(f, "blt", rs1, rs2, offset),
            Bge { rs1, rs2, offset } => b_type(f, "bge", rs1, rs2, offset),
            Bltu { rs1, rs2, offset } => b_type(f, "bltu", rs1, rs2, offset),
            Bgeu { rs1, rs2, offset } => b_type(f, "bgeu", rs1, rs2, offset),

            Ecall => f.write_str("ecall"),
            Ebreak => f.write_str("ebreak"),
            System { raw } => write!(f, "system 0x{raw:08x}"),
            Fence { .. } => f.write_str("fence"),

            Illegal { raw } => write!(f, ".word 0x{raw:08x}"),
        }
    }
}

fn r_type(f: &mut fmt::Formatter<'_>, name: &str, rd: u8, rs1: u8, rs2: u8) -> fmt::Result {
    write!(f, "{name} x{rd}, x{rs1}, x{rs2}")
}

fn i_type(f: &mut fmt::Formatter<'_>, name: &str, rd: u8, rs1: u8, imm: i32) -> fmt::Result {
    write!(f, "{name} x{rd}, x{rs1}, {imm}")
}

// lw x1, 4(x2) / sw x1, 8(x2)
fn mem_type(f: &mut fmt::Formatter<'_>, name: &str, reg: u8, base: u8, offset: i32) -> fmt::Result {
    write!(f, "{name} x{reg}, {offset}(x{base})")
}

fn b_type(f: &mut fmt::Formatter<'_>, name: &str, rs1: u8, rs2: u8, offset: i32) -> fmt::Result {
    write!(f, "{name} x{rs1}, x{rs2}, {offset}")
}

/// 已解码的指令
///
/// 包含原始编码与解码后的语义信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstr {
    /// 原始 32-bit 指令编码
    pub raw: u32,
    /// 解码后的语义表示
    pub instr: RvInstr,
}

impl DecodedInstr {
    pub fn is_illegal(&self) -> bool {
        matches!(self.instr, RvInstr::Illegal { .. })
    }
}
