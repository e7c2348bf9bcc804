//! # Configuration Initialization Module / 配置初始化模块
//!
//! This module provides an interactive command-line wizard that creates a
//! `RunExamples.toml` file: the tool directory, the time limit, the
//! comparison tolerances and the examples selected by default.
//!
//! 此模块提供一个交互式命令行向导，用于创建 `RunExamples.toml` 文件：
//! 工具目录、时间限制、比较容差以及默认选择的示例。
//!
//! ## Features / 功能特性
//!
//! - **Interactive Wizard**: Step-by-step guidance for configuration setup
//! - **Kind Selection**: Restrict the run to some execution paths
//! - **Overwrite Protection**: Confirmation prompts before overwriting existing configurations
//!
//! - **交互式向导**: 配置设置的逐步指导
//! - **类型选择**: 将运行限制为某些执行路径
//! - **覆盖保护**: 覆盖现有配置前的确认提示

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, MultiSelect};
use std::path::Path;

use crate::core::config::{RunnerConfig, ToleranceConfig};
use crate::infra::{fs::write_atomic, t};

const KIND_NAMES: [&str; 5] = ["compiled", "xml", "flat-xml", "fmi-xml", "fmi-source"];

/// Runs the interactive wizard to generate a configuration file at `config_path`.
///
/// With `non_interactive` the default configuration is written without any prompt.
///
/// 运行交互式向导以在 `config_path` 生成配置文件。`non_interactive` 时不提示，直接写入默认配置。
pub fn run_init_wizard(config_path: &Path, language: &str, non_interactive: bool) -> Result<()> {
    let mut config = RunnerConfig {
        language: language.to_string(),
        ..RunnerConfig::default()
    };

    if non_interactive {
        return write_config(config_path, &config, language);
    }

    let theme = ColorfulTheme::default();
    println!("\n{}", t!("init.wizard_welcome", locale = language).cyan().bold());
    println!("{}", t!("init.wizard_description", locale = language));

    if config_path.exists() {
        let confirmation = Confirm::with_theme(&theme)
            .with_prompt(t!("init.overwrite_prompt", locale = language, path = config_path.display()))
            .default(false)
            .interact()
            .context(t!("init.user_confirmation_failed", locale = language).to_string())?;
        if !confirmation {
            println!("{}", t!("init.aborted", locale = language));
            return Ok(());
        }
    }

    config.bin_dir = Input::with_theme(&theme)
        .with_prompt(t!("init.bin_dir_prompt", locale = language))
        .allow_empty(true)
        .default(config.bin_dir.clone())
        .interact_text()?;

    config.max_execution_time = Input::with_theme(&theme)
        .with_prompt(t!("init.max_execution_time_prompt", locale = language))
        .default(config.max_execution_time)
        .validate_with(|v: &f64| {
            if *v >= 0.0 {
                Ok(())
            } else {
                Err(t!("init.non_negative", locale = language).to_string())
            }
        })
        .interact_text()?;

    loop {
        config.atol = Input::with_theme(&theme)
            .with_prompt(t!("init.atol_prompt", locale = language))
            .default(config.atol)
            .interact_text()?;
        config.rtol = Input::with_theme(&theme)
            .with_prompt(t!("init.rtol_prompt", locale = language))
            .default(config.rtol)
            .interact_text()?;
        match ToleranceConfig::new(config.atol, config.rtol) {
            Ok(_) => break,
            Err(e) => println!("{}", e.to_string().red()),
        }
    }

    let selections = MultiSelect::with_theme(&theme)
        .with_prompt(t!("init.kind_selection_prompt", locale = language))
        .items(&KIND_NAMES)
        .interact()
        .context(t!("init.user_confirmation_failed", locale = language).to_string())?;
    if selections.is_empty() {
        println!("{}", t!("init.no_kinds_selected", locale = language).yellow());
    } else if selections.len() < KIND_NAMES.len() {
        config.filter.kinds = selections.into_iter().map(|i| KIND_NAMES[i].to_string()).collect();
    }

    config.print_to_console = Confirm::with_theme(&theme)
        .with_prompt(t!("init.print_to_console_prompt", locale = language))
        .default(false)
        .interact()?;

    write_config(config_path, &config, language)
}

fn write_config(path: &Path, config: &RunnerConfig, language: &str) -> Result<()> {
    let toml_string = toml::to_string_pretty(config)
        .context(t!("init.serialize_failed", locale = language).to_string())?;

    write_atomic(path, toml_string.as_bytes())
        .with_context(|| t!("init.write_failed", locale = language, path = path.display()).to_string())?;

    println!(
        "\n{} {}",
        "✔".green(),
        t!("init.success_created", locale = language, path = path.display()).bold()
    );
    println!("{}", t!("init.usage_hint", locale = language));

    Ok(())
}
