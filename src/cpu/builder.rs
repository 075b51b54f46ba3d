//! CPU 配置器
//!
//! 统一配置 CPU 的指令集、解码器和寄存器策略。
//!
//! # 示例
//!
//! ```
//! use rv32sim::cpu::{CpuBuilder, ZeroRegister};
//!
//! let cpu = CpuBuilder::new(0x0040_0000)
//!     .with_m_extension()
//!     .with_zero_register(ZeroRegister::Writable)
//!     .build()
//!     .expect("RV32IM has no conflicts");
//! assert_eq!(cpu.decoder().decoder_count(), 2);
//! ```

use std::sync::Arc;

use super::{CpuCore, ZeroRegister};
use crate::isa::{ConflictInfo, IsaConfig, IsaError};

/// CPU 构建器
///
/// 默认只启用 RV32I，x0 硬连线为 0
#[derive(Debug, Clone)]
pub struct CpuBuilder {
    entry_pc: u32,
    isa_config: IsaConfig,
    zero: ZeroRegister,
}

impl CpuBuilder {
    pub fn new(entry_pc: u32) -> Self {
        Self {
            entry_pc,
            isa_config: IsaConfig::new(),
            zero: ZeroRegister::default(),
        }
    }

    /// 启用 M 扩展（乘除法）
    pub fn with_m_extension(mut self) -> Self {
        self.isa_config = self.isa_config.with_m_extension();
        self
    }

    pub fn with_zero_register(mut self, zero: ZeroRegister) -> Self {
        self.zero = zero;
        self
    }

    /// 检测配置中的指令冲突
    pub fn detect_conflicts(&self) -> Vec<ConflictInfo> {
        self.isa_config.detect_conflicts()
    }

    /// 如 "RV32IM"
    pub fn isa_string(&self) -> String {
        self.isa_config.isa_string()
    }

    /// 构建 CPU 核心，检测到指令冲突时返回 `Err`
    pub fn build(self) -> Result<CpuCore, IsaError> {
        let decoder = Arc::new(self.isa_config.build()?);
        Ok(CpuCore::with_config(self.entry_pc, self.zero, decoder))
    }
}

impl Default for CpuBuilder {
    fn default() -> Self {
        Self::new(0)
    }
}
