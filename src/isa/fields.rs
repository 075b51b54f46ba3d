//! 指令字段提取辅助函数
//!
//! 所有格式的字段都处于固定位置；立即数由分散的位组拼接后，
//! 统一经过 [`sext`] 做符号扩展。

/// 符号扩展
///
/// `value` 的有效位宽为 `bits`。若第 `bits - 1` 位为 1，则其上所有位置 1；
/// 否则原样返回。`bits >= 32` 时值本身即为完整宽度。
#[inline]
pub fn sext(value: u32, bits: u32) -> i32 {
    debug_assert!(bits > 0, "sign extension needs at least one bit");
    if bits >= 32 {
        return value as i32;
    }
    if value & (1 << (bits - 1)) != 0 {
        (value | (u32::MAX << bits)) as i32
    } else {
        value as i32
    }
}

/// 提取 opcode 字段 [6:0]
#[inline]
pub fn opcode(raw: u32) -> u32 {
    raw & 0x7F
}

/// 提取 rd 字段 [11:7]
#[inline]
pub fn rd(raw: u32) -> u8 {
    ((raw >> 7) & 0x1F) as u8
}

/// 提取 funct3 字段 [14:12]
#[inline]
pub fn funct3(raw: u32) -> u32 {
    (raw >> 12) & 0x7
}

/// 提取 rs1 字段 [19:15]
#[inline]
pub fn rs1(raw: u32) -> u8 {
    ((raw >> 15) & 0x1F) as u8
}

/// 提取 rs2 字段 [24:20]
#[inline]
pub fn rs2(raw: u32) -> u8 {
    ((raw >> 20) & 0x1F) as u8
}

/// 提取 funct7 字段 [31:25]
#[inline]
pub fn funct7(raw: u32) -> u32 {
    (raw >> 25) & 0x7F
}

/// I-type 立即数，imm[11:0] = raw[31:20]
#[inline]
pub fn imm_i(raw: u32) -> i32 {
    sext(raw >> 20, 12)
}

/// S-type 立即数
/// imm[11:5] = raw[31:25], imm[4:0] = raw[11:7]
#[inline]
pub fn imm_s(raw: u32) -> i32 {
    sext((funct7(raw) << 5) | rd(raw) as u32, 12)
}

/// B-type 立即数（13 位，bit 0 恒为 0）
/// imm[12] = raw[31], imm[10:5] = raw[30:25], imm[4:1] = raw[11:8], imm[11] = raw[7]
#[inline]
pub fn imm_b(raw: u32) -> i32 {
    let imm_12 = (raw >> 31) & 0x1;
    let imm_10_5 = (raw >> 25) & 0x3F;
    let imm_4_1 = (raw >> 8) & 0xF;
    let imm_11 = (raw >> 7) & 0x1;
    sext(
        (imm_12 << 12) | (imm_11 << 11) | (imm_10_5 << 5) | (imm_4_1 << 1),
        13,
    )
}

/// U-type 立即数，20 位扩展后左移 12 位
#[inline]
pub fn imm_u(raw: u32) -> i32 {
    ((sext(raw >> 12, 20) as u32) << 12) as i32
}

/// J-type 立即数（21 位，bit 0 恒为 0）
/// imm[20] = raw[31], imm[10:1] = raw[30:21], imm[11] = raw[20], imm[19:12] = raw[19:12]
#[inline]
pub fn imm_j(raw: u32) -> i32 {
    let imm_20 = (raw >> 31) & 0x1;
    let imm_10_1 = (raw >> 21) & 0x3FF;
    let imm_11 = (raw >> 20) & 0x1;
    let imm_19_12 = (raw >> 12) & 0xFF;
    sext(
        (imm_20 << 20) | (imm_19_12 << 12) | (imm_11 << 11) | (imm_10_1 << 1),
        21,
    )
}

/// 移位量 shamt [24:20]
#[inline]
pub fn shamt(raw: u32) -> u8 {
    ((raw >> 20) & 0x1F) as u8
}

// ========== Opcode 常量 ==========
pub const OP_LUI: u32 = 0b0110111;
pub const OP_AUIPC: u32 = 0b0010111;
pub const OP_JAL: u32 = 0b1101111;
pub const OP_JALR: u32 = 0b1100111;
pub const OP_BRANCH: u32 = 0b1100011;
pub const OP_LOAD: u32 = 0b0000011;
pub const OP_STORE: u32 = 0b0100011;
pub const OP_MISC_MEM: u32 = 0b0001111;
pub const OP_IMM: u32 = 0b0010011;
pub const OP_REG: u32 = 0b0110011;
pub const OP_SYSTEM: u32 = 0b1110011;

/// 主 opcode 所属的指令族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Lui,
    Auipc,
    Jal,
    Jalr,
    Branch,
    Load,
    Store,
    MiscMem,
    OpImm,
    Op,
    System,
}

impl Opcode {
    /// 所有已知的指令族
    pub const ALL: [Opcode; 11] = [
        Opcode::Lui,
        Opcode::Auipc,
        Opcode::Jal,
        Opcode::Jalr,
        Opcode::Branch,
        Opcode::Load,
        Opcode::Store,
        Opcode::MiscMem,
        Opcode::OpImm,
        Opcode::Op,
        Opcode::System,
    ];

    /// 从指令字中识别指令族，未知 opcode 返回 `None`
    pub fn from_raw(raw: u32) -> Option<Self> {
        match opcode(raw) {
            OP_LUI => Some(Opcode::Lui),
            OP_AUIPC => Some(Opcode::Auipc),
            OP_JAL => Some(Opcode::Jal),
            OP_JALR => Some(Opcode::Jalr),
            OP_BRANCH => Some(Opcode::Branch),
            OP_LOAD => Some(Opcode::Load),
            OP_STORE => Some(Opcode::Store),
            OP_MISC_MEM => Some(Opcode::MiscMem),
            OP_IMM => Some(Opcode::OpImm),
            OP_REG => Some(Opcode::Op),
            OP_SYSTEM => Some(Opcode::System),
            _ => None,
        }
    }

    /// 7 位编码
    pub const fn bits(self) -> u32 {
        match self {
            Opcode::Lui => OP_LUI,
            Opcode::Auipc => OP_AUIPC,
            Opcode::Jal => OP_JAL,
            Opcode::Jalr => OP_JALR,
            Opcode::Branch => OP_BRANCH,
            Opcode::Load => OP_LOAD,
            Opcode::Store => OP_STORE,
            Opcode::MiscMem => OP_MISC_MEM,
            Opcode::OpImm => OP_IMM,
            Opcode::Op => OP_REG,
            Opcode::System => OP_SYSTEM,
        }
    }
}
