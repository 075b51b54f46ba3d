//! RISC-V ISA 抽象与解码框架
//!
//! - `RvInstr`: 指令的语义表示，解码时已完成符号扩展
//! - `InstrDef`: 统一的指令定义，同时用于解码和冲突检测
//! - `InstrDecoder` / `DecoderRegistry`: 按指令族分桶的解码器
//! - `IsaConfig`: 选择扩展并构建注册表

mod config;
mod decoder;
mod fields;
mod instr;
mod instr_def;
mod rv32i;
mod rv32m;

pub use config::{ConflictInfo, InstrSignature, IsaConfig, IsaError, IsaExtension};
pub use decoder::{DecoderRegistry, InstrDecoder, RegisterError};
pub use fields::*;
pub use instr::{DecodedInstr, RvInstr};
pub use instr_def::{InstrDef, TableDrivenDecoder};
pub use rv32i::{RV32I_DECODER, RV32I_INSTRS, RV32I_OPCODES};
pub use rv32m::{RV32M_DECODER, RV32M_INSTRS, RV32M_OPCODES};

/// 便捷函数：按完整 RV32IM 解码单条指令
///
/// 无法识别的编码返回 `Illegal`
pub fn decode(raw: u32) -> DecodedInstr {
    RV32I_DECODER
        .decode(raw)
        .or_else(|| RV32M_DECODER.decode(raw))
        .unwrap_or(DecodedInstr {
            raw,
            instr: RvInstr::Illegal { raw },
        })
}
