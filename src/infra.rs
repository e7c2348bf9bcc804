//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for Example Runner,
//! including process execution with timeouts, incremental output decoding,
//! crash artifact recovery and file system operations.
//!
//! 此模块为 Example Runner 提供基础设施服务，
//! 包括带超时的进程执行、增量输出解码、崩溃产物恢复和文件系统操作。

pub mod command;
pub mod coredump;
pub mod decode;
pub mod fs;
pub mod process;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
