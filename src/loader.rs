//! 程序镜像加载
//!
//! 支持两种格式：
//! - 文本 hex 镜像：空白分隔的 32 位十六进制字，可带 `0x` 前缀，
//!   按顺序放在 text 段起始处
//! - ELF32 RISC-V 可执行文件：每个 `PT_LOAD` 段写到其虚拟地址，bss 清零，
//!   入口点取自 ELF 头
//!
//! 解析是纯函数（字节 → [`ProgramImage`]），写入内存是单独一步，复位时重复使用。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use elf::ElfBytes;
use elf::abi::{EM_RISCV, PF_X, PT_LOAD};
use elf::endian::AnyEndian;
use log::{debug, info};
use thiserror::Error;

use crate::memory::{MemError, RegionMemory};

const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// 加载错误
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read program file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: '{token}' is not a 32-bit hexadecimal word")]
    Parse { line: usize, token: String },
    #[error("program image is neither ELF nor UTF-8 text")]
    NotText,
    #[error("failed to parse ELF: {0}")]
    Elf(String),
    #[error("unsupported ELF: {0}")]
    UnsupportedElf(String),
    #[error("{len} bytes at 0x{addr:08x} do not fit in simulated memory")]
    DoesNotFit {
        addr: u32,
        len: usize,
        #[source]
        source: MemError,
    },
}

/// 镜像来源格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Hex,
    Elf,
}

/// 一段需要写入内存的连续数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub vaddr: u32,
    /// 文件中的内容
    pub data: Vec<u8>,
    /// 内存中的大小，超出 `data` 的部分清零
    pub mem_size: usize,
    pub executable: bool,
}

/// 解析后的程序镜像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    pub format: ImageFormat,
    pub entry: u32,
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    /// 由指令字序列构造，放在 `base` 开始的连续字地址上
    pub fn from_words(words: &[u32], base: u32) -> Self {
        let data: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        let mem_size = data.len();
        Self {
            format: ImageFormat::Hex,
            entry: base,
            segments: vec![Segment {
                vaddr: base,
                data,
                mem_size,
                executable: true,
            }],
        }
    }

    /// 解析文本 hex 镜像
    pub fn from_hex(text: &str, base: u32) -> Result<Self, LoadError> {
        Ok(Self::from_words(&parse_hex(text)?, base))
    }

    /// 解析 ELF32 RISC-V 小端可执行文件
    pub fn from_elf_bytes(data: &[u8]) -> Result<Self, LoadError> {
        let file = ElfBytes::<AnyEndian>::minimal_parse(data)
            .map_err(|e| LoadError::Elf(e.to_string()))?;
        let header = &file.ehdr;

        if header.e_machine != EM_RISCV {
            return Err(LoadError::UnsupportedElf(format!(
                "machine type 0x{:x}, expected RISC-V (0x{:x})",
                header.e_machine, EM_RISCV
            )));
        }
        if header.class != elf::file::Class::ELF32 {
            return Err(LoadError::UnsupportedElf("only 32-bit ELF is supported".into()));
        }
        if header.endianness != AnyEndian::Little {
            return Err(LoadError::UnsupportedElf("only little-endian ELF is supported".into()));
        }

        let mut segments = Vec::new();
        if let Some(phdrs) = file.segments() {
            for phdr in phdrs.iter().filter(|p| p.p_type == PT_LOAD) {
                let bytes = file
                    .segment_data(&phdr)
                    .map_err(|e| LoadError::Elf(e.to_string()))?;
                segments.push(Segment {
                    vaddr: phdr.p_vaddr as u32,
                    data: bytes.to_vec(),
                    mem_size: phdr.p_memsz as usize,
                    executable: phdr.p_flags & PF_X != 0,
                });
            }
        }

        Ok(Self {
            format: ImageFormat::Elf,
            entry: header.e_entry as u32,
            segments,
        })
    }

    /// 根据 ELF 魔数自动选择格式
    pub fn from_bytes(data: &[u8], text_base: u32) -> Result<Self, LoadError> {
        if data.starts_with(&ELF_MAGIC) {
            return Self::from_elf_bytes(data);
        }
        let text = std::str::from_utf8(data).map_err(|_| LoadError::NotText)?;
        Self::from_hex(text, text_base)
    }

    /// 读取并解析程序文件
    pub fn from_file(path: impl AsRef<Path>, text_base: u32) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let image = Self::from_bytes(&data, text_base)?;
        info!(
            "parsed {} ({:?}, {} segment(s), entry 0x{:08x})",
            path.display(),
            image.format,
            image.segments.len(),
            image.entry
        );
        Ok(image)
    }

    /// 将镜像写入内存；不清零其他区域
    pub fn load_into(&self, mem: &mut RegionMemory) -> Result<(), LoadError> {
        for seg in &self.segments {
            let file_len = seg.data.len().min(seg.mem_size);
            mem.write_bytes(seg.vaddr, &seg.data[..file_len])
                .map_err(|source| LoadError::DoesNotFit {
                    addr: seg.vaddr,
                    len: seg.mem_size,
                    source,
                })?;

            let bss = seg.mem_size - file_len;
            if bss > 0 {
                let bss_start = seg.vaddr.wrapping_add(file_len as u32);
                mem.fill(bss_start, bss, 0)
                    .map_err(|source| LoadError::DoesNotFit {
                        addr: seg.vaddr,
                        len: seg.mem_size,
                        source,
                    })?;
            }
            debug!(
                "loaded segment 0x{:08x} ({} bytes, {} bss)",
                seg.vaddr, file_len, bss
            );
        }
        Ok(())
    }

    /// 可执行段中的 (地址, 指令字) 序列
    pub fn listing(&self) -> Vec<(u32, u32)> {
        self.segments
            .iter()
            .filter(|seg| seg.executable)
            .flat_map(|seg| {
                seg.data.chunks_exact(4).enumerate().map(move |(i, chunk)| {
                    let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    (seg.vaddr.wrapping_add(i as u32 * 4), word)
                })
            })
            .collect()
    }

    /// 可执行段中的指令字数
    pub fn word_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|seg| seg.executable)
            .map(|seg| seg.data.len() / 4)
            .sum()
    }
}

/// 解析空白分隔的十六进制字
pub fn parse_hex(text: &str) -> Result<Vec<u32>, LoadError> {
    let mut words = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        for token in line.split_whitespace() {
            let word = parse_hex_word(token).ok_or_else(|| LoadError::Parse {
                line: idx + 1,
                token: token.to_string(),
            })?;
            words.push(word);
        }
    }
    Ok(words)
}

/// 单个十六进制字，可带 `0x`/`0X` 前缀，不接受符号
pub fn parse_hex_word(token: &str) -> Option<u32> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.starts_with(['+', '-']) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}
