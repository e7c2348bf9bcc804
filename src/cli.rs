//! # Command-Line Interface / 命令行接口
//!
//! Builds the clap command tree and dispatches to the command implementations.
//! The language is pre-parsed so that help texts are already localized.
//!
//! 构建 clap 命令树并分派到各命令实现。语言会被预先解析，以便帮助文本已经本地化。

pub mod commands;

use anyhow::Result;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf};

use crate::core::config::CONFIG_FILE_NAME;
use crate::infra::t;
use commands::{ConfigOverrides, ConfigSource};

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` argument.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    let pos = args.iter().position(|arg| arg == "--lang")?;
    args.get(pos + 1).cloned()
}

fn config_arg(locale: &str) -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .help(t!("cli.arg_config", locale = locale).to_string())
        .value_name("CONFIG")
        .default_value(CONFIG_FILE_NAME)
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

fn examples_dir_arg(locale: &str) -> Arg {
    Arg::new("examples-dir")
        .long("examples-dir")
        .help(t!("cli.arg_examples_dir", locale = locale).to_string())
        .value_name("EXAMPLES_DIR")
        .default_value(".")
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

fn dirs_arg(locale: &str) -> Arg {
    Arg::new("dirs")
        .help(t!("cli.arg_dirs", locale = locale).to_string())
        .value_name("DIRS")
        .num_args(0..)
        .action(ArgAction::Append)
}

fn list_arg(name: &'static str, help: String) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .value_name("LIST")
        .value_delimiter(',')
        .action(ArgAction::Set)
}

fn filter_args(locale: &str) -> [Arg; 3] {
    [
        list_arg("labels", t!("cli.arg_labels", locale = locale).to_string()),
        list_arg("exclude-labels", t!("cli.arg_exclude_labels", locale = locale).to_string()),
        list_arg("kinds", t!("cli.arg_kinds", locale = locale).to_string()),
    ]
}

fn tolerance_args(locale: &str) -> [Arg; 3] {
    [
        Arg::new("atol")
            .long("atol")
            .help(t!("cli.arg_atol", locale = locale).to_string())
            .value_name("ATOL")
            .value_parser(clap::value_parser!(f64))
            .action(ArgAction::Set),
        Arg::new("rtol")
            .long("rtol")
            .help(t!("cli.arg_rtol", locale = locale).to_string())
            .value_name("RTOL")
            .value_parser(clap::value_parser!(f64))
            .action(ArgAction::Set),
        Arg::new("max-compare-failure")
            .long("max-compare-failure")
            .help(t!("cli.arg_max_compare_failure", locale = locale).to_string())
            .value_name("COUNT")
            .value_parser(clap::value_parser!(usize))
            .action(ArgAction::Set),
    ]
}

fn flag(name: &'static str, help: String) -> Arg {
    Arg::new(name).long(name).help(help).action(ArgAction::SetTrue)
}

fn build_cli(locale: &str) -> Command {
    Command::new("example-runner")
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli.about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli.arg_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cli.cmd_run_about", locale = locale).to_string())
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help(t!("cli.arg_jobs", locale = locale).to_string())
                        .value_name("JOBS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(config_arg(locale))
                .arg(examples_dir_arg(locale))
                .arg(dirs_arg(locale))
                .arg(
                    Arg::new("total-runners")
                        .long("total-runners")
                        .help(t!("cli.arg_total_runners", locale = locale).to_string())
                        .value_name("TOTAL_RUNNERS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set)
                        .requires("runner-index"),
                )
                .arg(
                    Arg::new("runner-index")
                        .long("runner-index")
                        .help(t!("cli.arg_runner_index", locale = locale).to_string())
                        .value_name("RUNNER_INDEX")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set)
                        .requires("total-runners"),
                )
                .arg(
                    Arg::new("bin-dir")
                        .long("bin-dir")
                        .help(t!("cli.arg_bin_dir", locale = locale).to_string())
                        .value_name("BIN_DIR")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("max-execution-time")
                        .long("max-execution-time")
                        .help(t!("cli.arg_max_execution_time", locale = locale).to_string())
                        .value_name("MINUTES")
                        .value_parser(clap::value_parser!(f64))
                        .action(ArgAction::Set),
                )
                .args(tolerance_args(locale))
                .arg(
                    Arg::new("report-dir")
                        .long("report-dir")
                        .help(t!("cli.arg_report_dir", locale = locale).to_string())
                        .value_name("REPORT_DIR")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(flag("disable-run", t!("cli.arg_disable_run", locale = locale).to_string()))
                .arg(flag(
                    "disable-make-clean",
                    t!("cli.arg_disable_make_clean", locale = locale).to_string(),
                ))
                .arg(flag("disable-compare", t!("cli.arg_disable_compare", locale = locale).to_string()))
                .arg(flag("print-to-console", t!("cli.arg_print_to_console", locale = locale).to_string()))
                .args(filter_args(locale)),
        )
        .subcommand(
            Command::new("list")
                .about(t!("cli.cmd_list_about", locale = locale).to_string())
                .arg(config_arg(locale))
                .arg(examples_dir_arg(locale))
                .arg(dirs_arg(locale))
                .args(filter_args(locale)),
        )
        .subcommand(
            Command::new("compare")
                .about(t!("cli.cmd_compare_about", locale = locale).to_string())
                .arg(
                    Arg::new("reference")
                        .help(t!("cli.arg_reference", locale = locale).to_string())
                        .value_name("REFERENCE")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("current")
                        .help(t!("cli.arg_current", locale = locale).to_string())
                        .value_name("CURRENT")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(config_arg(locale))
                .args(tolerance_args(locale)),
        )
        .subcommand(
            Command::new("copy-to-reference")
                .about(t!("cli.cmd_copy_to_reference_about", locale = locale).to_string())
                .arg(config_arg(locale))
                .arg(examples_dir_arg(locale))
                .arg(dirs_arg(locale))
                .args(filter_args(locale)),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cli.cmd_init_about", locale = locale).to_string())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help(t!("cli.arg_output", locale = locale).to_string())
                        .value_name("OUTPUT")
                        .default_value(CONFIG_FILE_NAME)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(flag(
                    "non-interactive",
                    t!("cli.arg_non_interactive", locale = locale).to_string(),
                )),
        )
}

fn config_source(matches: &ArgMatches) -> ConfigSource {
    ConfigSource {
        path: matches
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME)),
        required: matches.value_source("config") == Some(ValueSource::CommandLine),
    }
}

fn strings(matches: &ArgMatches, name: &str) -> Option<Vec<String>> {
    matches
        .try_get_many::<String>(name)
        .ok()
        .flatten()
        .map(|values| values.cloned().collect())
}

fn flag_set(matches: &ArgMatches, name: &str) -> bool {
    matches.try_get_one::<bool>(name).ok().flatten().copied().unwrap_or(false)
}

fn value<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, name: &str) -> Option<T> {
    matches.try_get_one::<T>(name).ok().flatten().cloned()
}

/// Collects the flags that override configuration file values.
/// Subcommands without a given flag simply leave the value untouched.
fn overrides(matches: &ArgMatches, language: Option<String>) -> ConfigOverrides {
    ConfigOverrides {
        language,
        jobs: value(matches, "jobs"),
        bin_dir: value(matches, "bin-dir"),
        max_execution_time: value(matches, "max-execution-time"),
        atol: value(matches, "atol"),
        rtol: value(matches, "rtol"),
        max_compare_failure: value(matches, "max-compare-failure"),
        report_dir: value(matches, "report-dir"),
        disable_run: flag_set(matches, "disable-run"),
        disable_make_clean: flag_set(matches, "disable-make-clean"),
        disable_compare: flag_set(matches, "disable-compare"),
        print_to_console: flag_set(matches, "print-to-console"),
        labels: strings(matches, "labels"),
        exclude_labels: strings(matches, "exclude-labels"),
        kinds: strings(matches, "kinds"),
    }
}

pub async fn run() -> Result<()> {
    // Pre-parse language and initialize i18n first.
    let cli_language = pre_parse_language();
    match &cli_language {
        Some(language) => crate::set_language(language),
        None => crate::init(),
    }
    let locale = rust_i18n::locale().to_string();

    let matches = build_cli(&locale).get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let total_runners = value::<usize>(run_matches, "total-runners");
            let runner_index = value::<usize>(run_matches, "runner-index");
            commands::run::execute(commands::run::RunArgs {
                source: config_source(run_matches),
                overrides: overrides(run_matches, cli_language),
                examples_dir: value(run_matches, "examples-dir").unwrap_or_else(|| PathBuf::from(".")),
                dirs: strings(run_matches, "dirs").unwrap_or_default(),
                total_runners,
                runner_index,
            })
            .await?;
        }
        Some(("list", list_matches)) => {
            commands::list::execute(
                &config_source(list_matches),
                overrides(list_matches, cli_language),
                &value(list_matches, "examples-dir").unwrap_or_else(|| PathBuf::from(".")),
                &strings(list_matches, "dirs").unwrap_or_default(),
            )?;
        }
        Some(("compare", compare_matches)) => {
            let reference = value::<PathBuf>(compare_matches, "reference").unwrap_or_default();
            let current = value::<PathBuf>(compare_matches, "current").unwrap_or_default();
            commands::compare::execute(
                &config_source(compare_matches),
                overrides(compare_matches, cli_language),
                &reference,
                &current,
            )?;
        }
        Some(("copy-to-reference", copy_matches)) => {
            commands::reference::execute(
                &config_source(copy_matches),
                overrides(copy_matches, cli_language),
                &value(copy_matches, "examples-dir").unwrap_or_else(|| PathBuf::from(".")),
                &strings(copy_matches, "dirs").unwrap_or_default(),
            )?;
        }
        Some(("init", init_matches)) => {
            let output = value::<PathBuf>(init_matches, "output")
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            let non_interactive = flag_set(init_matches, "non-interactive");

            // Show language detection message if it was auto-detected
            if cli_language.is_none() && !non_interactive {
                println!("{}", t!("init.system_language_detected", lang = &locale));
            }
            commands::init::run_init_wizard(&output, &locale, non_interactive)?;
        }
        _ => {
            // subcommand_required: clap has already printed the help.
        }
    }
    Ok(())
}
