//! 内存抽象层
//!
//! 模拟的地址空间由若干静态配置、互不重叠的区域（text / data / stack）组成，
//! 每个区域由独立的字节缓冲区支撑，按线性查找定位地址所属区域。
//!
//! 访存策略：
//! - `read32` / `write32` 是引擎使用的静默接口：未映射地址读出 0，写入被丢弃
//! - `try_read32` / `try_write32` 返回 `MemError`，供加载器和严格调用方使用
//! - 不做对齐检查；字访问越过区域末尾的字节按未映射处理

use log::debug;
use thiserror::Error;

/// 默认 text 段起始地址
pub const MEM_TEXT_BEGIN: u32 = 0x0040_0000;
/// 默认 text 段结束地址（含）
pub const MEM_TEXT_END: u32 = 0x004F_FFFF;
/// 默认 data 段起始地址
pub const MEM_DATA_BEGIN: u32 = 0x1000_0000;
/// 默认 data 段结束地址（含）
pub const MEM_DATA_END: u32 = 0x100F_FFFF;
/// 默认 stack 段起始地址
pub const MEM_STACK_BEGIN: u32 = 0x7FF0_0000;
/// 默认 stack 段结束地址（含）
pub const MEM_STACK_END: u32 = 0x7FFF_FFFF;

/// 内存访问错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemError {
    /// 地址不属于任何区域
    #[error("unmapped access at 0x{addr:08x}")]
    Unmapped { addr: u32 },
    /// 批量写入跨出了起始地址所在的区域
    #[error("range 0x{addr:08x}+{len:#x} crosses the end of region '{region}'")]
    CrossesRegion {
        addr: u32,
        len: usize,
        region: &'static str,
    },
}

pub type MemResult<T> = Result<T, MemError>;

/// 地址布局配置错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("region '{name}' is empty (end 0x{end:08x} < base 0x{base:08x})")]
    Empty { name: &'static str, base: u32, end: u32 },
    #[error("regions '{first}' and '{second}' overlap")]
    Overlap {
        first: &'static str,
        second: &'static str,
    },
    #[error("layout has no region named 'text'")]
    MissingText,
}

/// 内存访问的统一接口
///
/// 引擎只依赖 32 位读写；字节/半字访问由执行单元通过掩码组合实现。
pub trait Memory {
    /// 读取从 `addr` 开始的 4 字节（小端序）
    fn try_read32(&self, addr: u32) -> MemResult<u32>;

    /// 向 `addr` 开始的 4 字节写入 `value`（小端序）
    fn try_write32(&mut self, addr: u32, value: u32) -> MemResult<()>;

    /// 静默读取：未映射地址返回 0
    fn read32(&self, addr: u32) -> u32 {
        self.try_read32(addr).unwrap_or_else(|err| {
            debug!("{err}; reading as zero");
            0
        })
    }

    /// 静默写入：未映射地址的写入被丢弃
    fn write32(&mut self, addr: u32, value: u32) {
        if let Err(err) = self.try_write32(addr, value) {
            debug!("{err}; dropping write of 0x{value:08x}");
        }
    }
}

/// 单个区域的静态描述，`end` 为包含边界
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionSpec {
    pub name: &'static str,
    pub base: u32,
    pub end: u32,
}

impl RegionSpec {
    pub const fn new(name: &'static str, base: u32, end: u32) -> Self {
        Self { name, base, end }
    }

    /// 区域字节数
    pub fn size(&self) -> usize {
        (self.end - self.base) as usize + 1
    }

    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr <= self.end
    }

    fn overlaps(&self, other: &RegionSpec) -> bool {
        self.base <= other.end && other.base <= self.end
    }
}

/// 地址空间布局：一组互不重叠的命名区域，其中必须有一个 `text` 区域
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLayout {
    regions: Vec<RegionSpec>,
    text: usize,
}

impl MemoryLayout {
    /// 校验并创建布局
    pub fn new(regions: Vec<RegionSpec>) -> Result<Self, LayoutError> {
        for spec in &regions {
            if spec.end < spec.base {
                return Err(LayoutError::Empty {
                    name: spec.name,
                    base: spec.base,
                    end: spec.end,
                });
            }
        }
        for (i, a) in regions.iter().enumerate() {
            for b in regions.iter().skip(i + 1) {
                if a.overlaps(b) {
                    return Err(LayoutError::Overlap {
                        first: a.name,
                        second: b.name,
                    });
                }
            }
        }
        let text = regions
            .iter()
            .position(|spec| spec.name == "text")
            .ok_or(LayoutError::MissingText)?;
        Ok(Self { regions, text })
    }

    pub fn regions(&self) -> &[RegionSpec] {
        &self.regions
    }

    /// 程序加载所在的 text 区域
    pub fn text(&self) -> &RegionSpec {
        &self.regions[self.text]
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            regions: vec![
                RegionSpec::new("text", MEM_TEXT_BEGIN, MEM_TEXT_END),
                RegionSpec::new("data", MEM_DATA_BEGIN, MEM_DATA_END),
                RegionSpec::new("stack", MEM_STACK_BEGIN, MEM_STACK_END),
            ],
            text: 0,
        }
    }
}

/// 由字节缓冲区支撑的区域
#[derive(Debug, Clone)]
struct Region {
    spec: RegionSpec,
    data: Vec<u8>,
}

impl Region {
    fn new(spec: RegionSpec) -> Self {
        Self {
            spec,
            data: vec![0; spec.size()],
        }
    }

    fn offset(&self, addr: u32) -> usize {
        (addr - self.spec.base) as usize
    }
}

/// 分区域的内存实现
#[derive(Debug, Clone)]
pub struct RegionMemory {
    regions: Vec<Region>,
}

impl RegionMemory {
    /// 按布局分配所有区域并清零
    pub fn new(layout: &MemoryLayout) -> Self {
        Self {
            regions: layout.regions().iter().copied().map(Region::new).collect(),
        }
    }

    fn region(&self, addr: u32) -> Option<&Region> {
        self.regions.iter().find(|r| r.spec.contains(addr))
    }

    fn region_mut(&mut self, addr: u32) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| r.spec.contains(addr))
    }

    /// 各区域的静态描述
    pub fn specs(&self) -> impl Iterator<Item = &RegionSpec> {
        self.regions.iter().map(|r| &r.spec)
    }

    /// 将所有区域清零
    pub fn reset(&mut self) {
        for region in &mut self.regions {
            region.data.fill(0);
        }
    }

    /// 批量写入，整个范围必须落在同一个区域内
    pub fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> MemResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let region = self.region_mut(addr).ok_or(MemError::Unmapped { addr })?;
        let start = region.offset(addr);
        let end = start + bytes.len();
        if end > region.data.len() {
            return Err(MemError::CrossesRegion {
                addr,
                len: bytes.len(),
                region: region.spec.name,
            });
        }
        region.data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    /// 将指定范围填充为固定字节
    pub fn fill(&mut self, addr: u32, len: usize, value: u8) -> MemResult<()> {
        if len == 0 {
            return Ok(());
        }
        let region = self.region_mut(addr).ok_or(MemError::Unmapped { addr })?;
        let start = region.offset(addr);
        let end = start + len;
        if end > region.data.len() {
            return Err(MemError::CrossesRegion {
                addr,
                len,
                region: region.spec.name,
            });
        }
        region.data[start..end].fill(value);
        Ok(())
    }
}

impl Memory for RegionMemory {
    fn try_read32(&self, addr: u32) -> MemResult<u32> {
        let region = self.region(addr).ok_or(MemError::Unmapped { addr })?;
        let offset = region.offset(addr);
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = region.data.get(offset + i).copied().unwrap_or(0);
        }
        Ok(u32::from_le_bytes(bytes))
    }

    fn try_write32(&mut self, addr: u32, value: u32) -> MemResult<()> {
        let region = self.region_mut(addr).ok_or(MemError::Unmapped { addr })?;
        let offset = region.offset(addr);
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            if let Some(slot) = region.data.get_mut(offset + i) {
                *slot = byte;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_layout() -> MemoryLayout {
        MemoryLayout::new(vec![
            RegionSpec::new("text", 0x1000, 0x10FF),
            RegionSpec::new("data", 0x2000, 0x20FF),
        ])
        .unwrap()
    }

    #[test]
    fn test_read_write_little_endian() {
        let mut mem = RegionMemory::new(&small_layout());

        mem.write32(0x1004, 0x78ABCDEF);
        assert_eq!(mem.read32(0x1004), 0x78ABCDEF);
        // 最低字节位于最低地址
        assert_eq!(mem.read32(0x1004) & 0xFF, 0xEF);
        assert_eq!(mem.read32(0x1005) & 0xFF, 0xCD);
        assert_eq!(mem.read32(0x1006) & 0xFF, 0xAB);
        assert_eq!(mem.read32(0x1007) & 0xFF, 0x78);
    }

    #[test]
    fn test_unmapped_access_is_silent() {
        let mut mem = RegionMemory::new(&small_layout());

        mem.write32(0x3000, 0xDEADBEEF);
        assert_eq!(mem.read32(0x3000), 0);
        assert_eq!(
            mem.try_read32(0x3000),
            Err(MemError::Unmapped { addr: 0x3000 })
        );
        assert!(mem.try_write32(0x0FFF, 1).is_err());
    }

    #[test]
    fn test_word_straddling_region_end() {
        let mut mem = RegionMemory::new(&small_layout());

        mem.write32(0x10FE, 0x44332211);
        // 只有落在区域内的两个字节被写入
        assert_eq!(mem.read32(0x10FC), 0x2211_0000);
        assert_eq!(mem.read32(0x10FE), 0x0000_2211);
    }

    #[test]
    fn test_regions_are_independent() {
        let mut mem = RegionMemory::new(&small_layout());

        mem.write32(0x1000, 1);
        mem.write32(0x2000, 2);
        assert_eq!(mem.read32(0x1000), 1);
        assert_eq!(mem.read32(0x2000), 2);

        mem.reset();
        assert_eq!(mem.read32(0x1000), 0);
        assert_eq!(mem.read32(0x2000), 0);
    }

    #[test]
    fn test_write_bytes() {
        let mut mem = RegionMemory::new(&small_layout());
        mem.write_bytes(0x2000, &[0x01, 0x02, 0x03, 0x04]).unwrap();
        assert_eq!(mem.read32(0x2000), 0x04030201);

        let err = mem.write_bytes(0x20FE, &[0; 4]).unwrap_err();
        assert!(matches!(err, MemError::CrossesRegion { region: "data", .. }));
    }

    #[test]
    fn test_fill() {
        let mut mem = RegionMemory::new(&small_layout());
        mem.fill(0x2010, 4, 0xAA).unwrap();
        assert_eq!(mem.read32(0x2010), 0xAAAA_AAAA);
        assert!(mem.fill(0x5000, 4, 0).is_err());
    }

    #[test]
    fn test_layout_validation() {
        let overlap = MemoryLayout::new(vec![
            RegionSpec::new("text", 0x0, 0xFF),
            RegionSpec::new("data", 0x80, 0x17F),
        ]);
        assert_eq!(
            overlap,
            Err(LayoutError::Overlap {
                first: "text",
                second: "data"
            })
        );

        let empty = MemoryLayout::new(vec![RegionSpec::new("text", 0x100, 0x0)]);
        assert!(matches!(empty, Err(LayoutError::Empty { .. })));

        let no_text = MemoryLayout::new(vec![RegionSpec::new("data", 0x0, 0xFF)]);
        assert_eq!(no_text, Err(LayoutError::MissingText));
    }

    #[test]
    fn test_default_layout() {
        let layout = MemoryLayout::default();
        assert_eq!(layout.text().base, MEM_TEXT_BEGIN);
        assert_eq!(layout.regions().len(), 3);
        assert!(MemoryLayout::new(layout.regions().to_vec()).is_ok());
    }
}
