//! # Reporting Module / 报告模块
//!
//! This module handles the display and persistence of job outcomes.
//! It prints colorful, localized progress lines and summaries to the console
//! and appends machine-readable records to the result sink.
//!
//! 此模块处理任务结果的显示和持久化。
//! 它在控制台打印彩色的本地化进度行和摘要，并将机器可读的记录追加到结果接收器。

pub mod console;
pub mod sink;

// Re-export common reporting functions
pub use console::{print_completion, print_summary, print_unexpected_failure_details};
pub use sink::ResultSink;
