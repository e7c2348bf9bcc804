//! # Example Runner Library / Example Runner 库
//!
//! This library provides the core functionality for the Example Runner tool,
//! a parallel executor for the example projects of a multibody simulation suite.
//! It runs every example through its execution path, enforces a wall-clock
//! timeout per job and compares the produced numeric datasets against stored
//! reference datasets.
//!
//! 此库为 Example Runner 工具提供核心功能，
//! 这是一个多体仿真套件示例项目的并行执行器。
//! 它以对应的执行路径运行每个示例，为每个任务强制执行超时，
//! 并将生成的数值数据集与参考数据集进行比较。
//!
//! ## Modules / 模块
//!
//! - `core` - Data models, comparison engine, discovery and the job scheduler
//! - `infra` - Process spawning, output decoding and file system operations
//! - `reporting` - Console output and the JSON-lines result sink
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 数据模型、比较引擎、示例发现和任务调度器
//! - `infra` - 进程派生、输出解码和文件系统操作
//! - `reporting` - 控制台输出和 JSON-lines 结果接收器
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::comparison;
pub use core::config;
pub use core::dataset;
pub use core::models;
pub use core::scheduler;

/// Initializes the application's internationalization (i18n) based on the system locale.
///
/// This function detects the user's system locale and sets the appropriate
/// language for the application's user interface. It attempts to match the full
/// locale (e.g., "zh-CN"), then just the language code (e.g., "en"), and
/// finally falls back to the default language ("en").
pub fn init() {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    set_language(&locale);
}

/// Sets the active locale, falling back from a full tag to its language part and then to "en".
pub fn set_language(locale: &str) {
    let available_locales = rust_i18n::available_locales!();

    let lang = if available_locales.contains(&locale) {
        locale
    } else {
        locale
            .split('-')
            .next()
            .filter(|lang_code| available_locales.contains(lang_code))
            .unwrap_or("en")
    };

    rust_i18n::set_locale(lang);
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
