//! 解码器框架
//!
//! 按指令族分桶的解码器注册表

use std::sync::Arc;

use log::trace;
use thiserror::Error;

use crate::isa::{DecodedInstr, Opcode, RvInstr};

/// 指令解码器 trait
pub trait InstrDecoder: Send + Sync {
    /// 解码器名称
    fn name(&self) -> &str;

    /// 尝试解码指令
    ///
    /// 返回 `Some(decoded)` 如果能解码，否则返回 `None`
    fn decode(&self, raw: u32) -> Option<DecodedInstr>;

    /// 此解码器处理的指令族
    fn handled_opcodes(&self) -> &[Opcode];

    /// 是否允许与其他解码器在同一指令族上共存
    fn allow_opcode_overlap(&self) -> bool {
        false
    }
}

/// 注册解码器失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("opcode family {opcode:?} already handled; rejecting decoder {decoder}")]
pub struct RegisterError {
    pub opcode: Opcode,
    pub decoder: String,
}

/// 解码器注册表
///
/// 按注册顺序尝试同一指令族内的解码器，首个命中者胜出
pub struct DecoderRegistry {
    decoders: Vec<Arc<dyn InstrDecoder>>,
    /// 下标即 `Opcode` 的声明顺序
    opcode_map: [Vec<usize>; Opcode::ALL.len()],
}

impl DecoderRegistry {
    /// 创建空的解码器注册表
    pub fn new() -> Self {
        Self {
            decoders: Vec::new(),
            opcode_map: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// 创建只含 RV32I 的注册表
    pub fn with_rv32i() -> Self {
        let mut registry = Self::new();
        registry.insert(Arc::new(super::rv32i::RV32I_DECODER));
        registry
    }

    /// 创建完整 RV32IM 注册表
    pub fn with_rv32im() -> Self {
        let mut registry = Self::with_rv32i();
        // RV32M 与 RV32I 都允许在 OP 上共存
        registry.insert(Arc::new(super::rv32m::RV32M_DECODER));
        registry
    }

    /// 注册一个解码器；若声明的指令族已被独占则返回 Err
    pub fn register(&mut self, decoder: Arc<dyn InstrDecoder>) -> Result<(), RegisterError> {
        // 先做冲突检测，避免错误时污染注册表
        for &op in decoder.handled_opcodes() {
            let bucket = &self.opcode_map[op as usize];
            if bucket.is_empty() {
                continue;
            }
            let existing_conflict = bucket
                .iter()
                .any(|&i| !self.decoders[i].allow_opcode_overlap());
            if existing_conflict || !decoder.allow_opcode_overlap() {
                return Err(RegisterError {
                    opcode: op,
                    decoder: decoder.name().to_string(),
                });
            }
        }

        self.insert(decoder);
        Ok(())
    }

    /// 不做独占检查直接加入
    fn insert(&mut self, decoder: Arc<dyn InstrDecoder>) {
        let idx = self.decoders.len();
        for &op in decoder.handled_opcodes() {
            self.opcode_map[op as usize].push(idx);
        }
        self.decoders.push(decoder);
    }

    /// 解码指令
    ///
    /// 未知指令族或无解码器命中时返回 `Illegal`，从不 panic
    pub fn decode(&self, raw: u32) -> DecodedInstr {
        let Some(family) = Opcode::from_raw(raw) else {
            trace!("unknown opcode 0x{:02x} in 0x{raw:08x}", raw & 0x7F);
            return illegal(raw);
        };

        for &idx in &self.opcode_map[family as usize] {
            if let Some(decoded) = self.decoders[idx].decode(raw) {
                return decoded;
            }
        }

        trace!("no decoder accepted 0x{raw:08x} in family {family:?}");
        illegal(raw)
    }

    /// 获取已注册的解码器数量
    pub fn decoder_count(&self) -> usize {
        self.decoders.len()
    }

    /// 列出所有已注册的解码器名称
    pub fn decoder_names(&self) -> Vec<&str> {
        self.decoders.iter().map(|d| d.name()).collect()
    }
}

fn illegal(raw: u32) -> DecodedInstr {
    DecodedInstr {
        raw,
        instr: RvInstr::Illegal { raw },
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_rv32i()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("decoders", &self.decoder_names())
            .finish()
    }
}
