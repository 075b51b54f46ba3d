//! CPU architectural state: register file and the current/next snapshot.

/// Behaviour of register x0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroRegister {
    /// x0 always reads as zero, writes are discarded.
    #[default]
    Hardwired,
    /// x0 is an ordinary register.
    Writable,
}

/// Integer register file x0..x31.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegFile {
    regs: [u32; 32],
    zero: ZeroRegister,
}

impl RegFile {
    pub fn new(zero: ZeroRegister) -> Self {
        Self { regs: [0; 32], zero }
    }

    #[inline]
    pub fn read(&self, reg: u8) -> u32 {
        self.regs[reg as usize & 0x1F]
    }

    #[inline]
    pub fn write(&mut self, reg: u8, value: u32) {
        if reg == 0 && self.zero == ZeroRegister::Hardwired {
            return;
        }
        self.regs[reg as usize & 0x1F] = value;
    }

    pub fn snapshot(&self) -> &[u32; 32] {
        &self.regs
    }

    pub fn zero_policy(&self) -> ZeroRegister {
        self.zero
    }

    pub fn clear(&mut self) {
        self.regs = [0; 32];
    }
}

impl Default for RegFile {
    fn default() -> Self {
        Self::new(ZeroRegister::default())
    }
}

/// One architectural snapshot: registers plus PC.
///
/// `CpuCore` keeps two of these; a step reads `current` and writes `next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchState {
    pub regs: RegFile,
    pub pc: u32,
}

impl ArchState {
    pub fn new(pc: u32, zero: ZeroRegister) -> Self {
        Self {
            regs: RegFile::new(zero),
            pc,
        }
    }

    #[inline]
    pub fn read_reg(&self, reg: u8) -> u32 {
        self.regs.read(reg)
    }

    #[inline]
    pub fn write_reg(&mut self, reg: u8, value: u32) {
        self.regs.write(reg, value)
    }

    pub fn regs(&self) -> &[u32; 32] {
        self.regs.snapshot()
    }
}
