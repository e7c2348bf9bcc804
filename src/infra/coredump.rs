//! # Core Dump Recovery / 核心转储恢复
//!
//! After a simulation crashes the operating system may leave a core file in the
//! example's working directory. This module detects such files, asks `file` which
//! executable produced them and extracts a backtrace with `gdb`. Every step is
//! best effort: a missing tool only means no backtrace.
//!
//! 仿真崩溃后，操作系统可能会在示例的工作目录中留下核心转储文件。
//! 此模块检测这些文件，通过 `file` 查询生成它们的可执行文件，并使用 `gdb` 提取回溯。
//! 每一步都是尽力而为：缺少工具仅意味着没有回溯。

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// ELF `e_type` value of a core file.
const ET_CORE: u16 = 4;

/// A backtrace extracted from one core file.
/// 从一个核心转储文件中提取的回溯。
#[derive(Debug, Clone)]
pub struct CoreBacktrace {
    pub core_file: PathBuf,
    pub executable: String,
    pub backtrace: String,
}

impl CoreBacktrace {
    /// Formats the backtrace as a block that is appended to the captured job output.
    pub fn to_output_block(&self) -> String {
        format!(
            "\n\n\n******************** START: CORE DUMP BACKTRACE OF {} ********************\n\n\n{}\n\n\n******************** END: CORE DUMP BACKTRACE ********************\n\n\n",
            self.executable, self.backtrace
        )
    }
}

/// Checks whether `path` is an ELF core file by reading its header.
/// 通过读取文件头检查 `path` 是否为 ELF 核心转储文件。
pub fn is_core_file(path: &Path) -> bool {
    let mut header = [0u8; 18];
    let Ok(mut file) = fs::File::open(path) else {
        return false;
    };
    if file.read_exact(&mut header).is_err() {
        return false;
    }
    if &header[..4] != b"\x7fELF" {
        return false;
    }
    let e_type = match header[5] {
        1 => u16::from_le_bytes([header[16], header[17]]),
        2 => u16::from_be_bytes([header[16], header[17]]),
        _ => return false,
    };
    e_type == ET_CORE
}

/// Lists the core files directly inside `dir` (file names containing "core").
pub fn find_core_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut cores: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.contains("core"))
                && is_core_file(path)
        })
        .collect();
    cores.sort();
    cores
}

/// Removes core files left over from previous runs so they are not attributed to the next one.
/// 删除先前运行遗留的核心转储文件，以免它们被归因于下一次运行。
pub fn remove_stale_core_files(dir: &Path) {
    for core in find_core_files(dir) {
        if let Err(e) = fs::remove_file(&core) {
            tracing::warn!(core = %core.display(), error = %e, "cannot remove stale core file");
        }
    }
}

/// Extracts the producing executable from the output of `file <core>`,
/// e.g. `core: ELF 64-bit LSB core file, x86-64, ..., from './main --flag', real uid: ...`.
pub fn parse_file_executable(description: &str) -> Option<String> {
    if !description.contains("core file") {
        return None;
    }
    let start = description.find("from '")? + "from '".len();
    let end = description[start..].find('\'')? + start;
    description[start..end]
        .split(' ')
        .next()
        .filter(|exe| !exe.is_empty())
        .map(str::to_string)
}

/// Collects a backtrace for every core file in `dir`.
/// 为 `dir` 中的每个核心转储文件收集回溯。
pub async fn collect_backtraces(dir: &Path) -> Vec<CoreBacktrace> {
    let mut backtraces = Vec::new();
    for core_file in find_core_files(dir) {
        match backtrace_of(dir, &core_file).await {
            Some(bt) => backtraces.push(bt),
            None => {
                tracing::warn!(core = %core_file.display(), "core dump found but no backtrace could be extracted");
            }
        }
    }
    backtraces
}

async fn backtrace_of(dir: &Path, core_file: &Path) -> Option<CoreBacktrace> {
    let description = Command::new("file")
        .arg(core_file)
        .current_dir(dir)
        .output()
        .await
        .ok()?;
    let executable = parse_file_executable(&String::from_utf8_lossy(&description.stdout))?;

    let gdb = Command::new("gdb")
        .args(["-q", "-n", "-ex", "bt", "-batch"])
        .arg(&executable)
        .arg(core_file)
        .current_dir(dir)
        .output()
        .await;
    let gdb = match gdb {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!(error = %e, "gdb is not available");
            return None;
        }
    };

    Some(CoreBacktrace {
        core_file: core_file.to_path_buf(),
        executable,
        backtrace: String::from_utf8_lossy(&gdb.stdout).into_owned(),
    })
}
