//! rv32sim: RV32IM 功能级指令集仿真库
//!
//! 每条指令从"当前"架构状态读取、写入"下一"状态，再整体提交，
//! 与硬件寄存器在时钟沿更新的方式一致。
//!
//! # 模块结构
//!
//! - `isa`: 字段提取、表驱动解码与反汇编
//! - `cpu`: 双快照架构状态与执行引擎
//! - `memory`: 分区内存（text / data / stack）
//! - `loader`: 十六进制文本与 ELF32 程序镜像
//! - `sim_env`: 仿真环境（配置、运行、复位）
//! - `dump`: 寄存器/内存转储与程序列表
//! - `console`: 交互式监视器
//! - `logging`: stderr 日志后端

pub mod console;
pub mod cpu;
pub mod dump;
pub mod isa;
pub mod loader;
pub mod logging;
pub mod memory;
pub mod sim_env;
