//! ISA 配置与冲突检测
//!
//! 选择启用的扩展，检测编码冲突，并构建解码器注册表

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::decoder::{DecoderRegistry, RegisterError};
use super::instr_def::InstrDef;
use super::rv32i::{RV32I_DECODER, RV32I_INSTRS};
use super::rv32m::{RV32M_DECODER, RV32M_INSTRS};

/// 支持的 ISA 扩展
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IsaExtension {
    /// RV32I 基础整数指令集（必选）
    RV32I,
    /// M 扩展：乘除法
    RV32M,
}

impl fmt::Display for IsaExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsaExtension::RV32I => write!(f, "I"),
            IsaExtension::RV32M => write!(f, "M"),
        }
    }
}

/// 指令模式描述（用于冲突检测）
#[derive(Debug, Clone)]
pub struct InstrSignature {
    pub extension: IsaExtension,
    pub name: &'static str,
    pub mask: u32,
    pub match_val: u32,
}

impl InstrSignature {
    pub const fn new(
        extension: IsaExtension,
        name: &'static str,
        mask: u32,
        match_val: u32,
    ) -> Self {
        Self {
            extension,
            name,
            mask,
            match_val,
        }
    }

    pub fn from_def(def: &InstrDef, extension: IsaExtension) -> Self {
        Self::new(extension, def.name, def.mask, def.match_val)
    }

    /// 存在某个指令字同时匹配两者即为冲突
    pub fn conflicts_with(&self, other: &InstrSignature) -> bool {
        let common_mask = self.mask & other.mask;
        (self.match_val & common_mask) == (other.match_val & common_mask)
    }
}

/// 冲突信息
#[derive(Debug, Clone)]
pub struct ConflictInfo {
    pub instr1: InstrSignature,
    pub instr2: InstrSignature,
    /// 冲突的示例指令编码
    pub example_raw: u32,
}

impl fmt::Display for ConflictInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} overlaps {}:{} (e.g. 0x{:08X})",
            self.instr1.extension,
            self.instr1.name,
            self.instr2.extension,
            self.instr2.name,
            self.example_raw
        )
    }
}

/// 构建解码器失败
#[derive(Debug, Error)]
pub enum IsaError {
    #[error("{} encoding conflict(s), first: {}", .0.len(), .0[0])]
    Conflicts(Vec<ConflictInfo>),
    #[error(transparent)]
    Register(#[from] RegisterError),
}

/// ISA 配置构建器
///
/// # 示例
///
/// ```
/// use rv32sim::isa::IsaConfig;
///
/// let registry = IsaConfig::new()
///     .with_m_extension()
///     .build()
///     .expect("RV32IM has no conflicts");
/// assert_eq!(registry.decoder_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct IsaConfig {
    extensions: BTreeSet<IsaExtension>,
    signatures: Vec<InstrSignature>,
}

impl IsaConfig {
    /// 创建新的 ISA 配置（默认只有 RV32I）
    pub fn new() -> Self {
        let mut extensions = BTreeSet::new();
        extensions.insert(IsaExtension::RV32I);
        Self {
            extensions,
            signatures: signatures(RV32I_INSTRS, IsaExtension::RV32I),
        }
    }

    /// 启用 M 扩展（乘除法）
    pub fn with_m_extension(mut self) -> Self {
        if self.extensions.insert(IsaExtension::RV32M) {
            self.signatures
                .extend(signatures(RV32M_INSTRS, IsaExtension::RV32M));
        }
        self
    }

    /// 检测跨扩展的指令冲突
    pub fn detect_conflicts(&self) -> Vec<ConflictInfo> {
        let mut conflicts = Vec::new();

        for (i, sig1) in self.signatures.iter().enumerate() {
            for sig2 in self.signatures.iter().skip(i + 1) {
                // 扩展内部按表顺序匹配，不算冲突
                if sig1.extension == sig2.extension {
                    continue;
                }
                if sig1.conflicts_with(sig2) {
                    let example = (sig1.match_val & sig1.mask) | (sig2.match_val & sig2.mask);
                    conflicts.push(ConflictInfo {
                        instr1: sig1.clone(),
                        instr2: sig2.clone(),
                        example_raw: example,
                    });
                }
            }
        }

        conflicts
    }

    pub fn is_valid(&self) -> bool {
        self.detect_conflicts().is_empty()
    }

    pub fn has_extension(&self, ext: IsaExtension) -> bool {
        self.extensions.contains(&ext)
    }

    /// ISA 字符串，如 "RV32IM"
    pub fn isa_string(&self) -> String {
        let mut s = String::from("RV32");
        for ext in &self.extensions {
            s.push_str(&ext.to_string());
        }
        s
    }

    /// 构建解码器注册表
    pub fn build(self) -> Result<DecoderRegistry, IsaError> {
        let conflicts = self.detect_conflicts();
        if !conflicts.is_empty() {
            return Err(IsaError::Conflicts(conflicts));
        }

        let mut registry = DecoderRegistry::new();
        registry.register(Arc::new(RV32I_DECODER))?;
        if self.has_extension(IsaExtension::RV32M) {
            registry.register(Arc::new(RV32M_DECODER))?;
        }
        Ok(registry)
    }
}

impl Default for IsaConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn signatures(table: &[InstrDef], extension: IsaExtension) -> Vec<InstrSignature> {
    table
        .iter()
        .map(|def| InstrSignature::from_def(def, extension))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_config() {
        let config = IsaConfig::new();
        assert!(config.is_valid());
        assert_eq!(config.isa_string(), "RV32I");
        assert_eq!(config.build().unwrap().decoder_count(), 1);
    }

    #[test]
    fn test_with_m_extension() {
        let config = IsaConfig::new().with_m_extension();
        assert!(config.is_valid());
        assert_eq!(config.isa_string(), "RV32IM");

        let registry = config.build().unwrap();
        assert_eq!(registry.decoder_count(), 2);
        assert_eq!(registry.decoder_names(), vec!["RV32I", "RV32M"]);
    }

    #[test]
    fn test_m_extension_is_idempotent() {
        let once = IsaConfig::new().with_m_extension();
        let twice = IsaConfig::new().with_m_extension().with_m_extension();
        assert_eq!(once.signatures.len(), twice.signatures.len());
    }

    #[test]
    fn test_conflict_detection() {
        let sig1 = InstrSignature::new(IsaExtension::RV32I, "A", 0x707F, 0x0033);
        let sig2 = InstrSignature::new(IsaExtension::RV32M, "B", 0x707F, 0x0033);
        assert!(sig1.conflicts_with(&sig2));
    }

    #[test]
    fn test_no_conflict_different_funct7() {
        let add_sig = InstrSignature::new(IsaExtension::RV32I, "ADD", 0xFE00707F, 0x0033);
        let mul_sig = InstrSignature::new(IsaExtension::RV32M, "MUL", 0xFE00707F, 0x02000033);
        assert!(!add_sig.conflicts_with(&mul_sig));
    }
}
