//! # Core Dump Unit Tests / 核心转储单元测试
//!
//! Tests for core file detection, `file` output parsing and the backtrace
//! block appended to a command's output.
//!
//! 核心转储文件检测、`file` 输出解析以及附加到命令输出的回溯块的测试。

#![cfg(unix)]

mod common;

use common::write_script;
use example_runner::infra::command::{spawn_and_capture, CommandPolicy, OutputSink};
use example_runner::infra::coredump::{
    find_core_files, is_core_file, parse_file_executable, remove_stale_core_files,
};
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tokio::process::Command;

/// Writes an 18-byte ELF header with the given byte order (1 = LE, 2 = BE) and `e_type`.
fn write_elf_header(path: &Path, byte_order: u8, e_type: u16) {
    let mut header = vec![0x7f, b'E', b'L', b'F', 2, byte_order, 1];
    header.resize(16, 0);
    if byte_order == 2 {
        header.extend(e_type.to_be_bytes());
    } else {
        header.extend(e_type.to_le_bytes());
    }
    fs::write(path, header).unwrap();
}

#[test]
fn test_is_core_file_reads_elf_type() {
    let dir = tempdir().unwrap();
    let core = dir.path().join("core.101");
    let executable = dir.path().join("main");
    let core_be = dir.path().join("core.102");
    write_elf_header(&core, 1, 4);
    write_elf_header(&executable, 1, 2);
    write_elf_header(&core_be, 2, 4);

    assert!(is_core_file(&core));
    assert!(!is_core_file(&executable));
    assert!(is_core_file(&core_be));
}

#[test]
fn test_is_core_file_rejects_short_and_foreign_files() {
    let dir = tempdir().unwrap();
    let short = dir.path().join("core.short");
    fs::write(&short, b"\x7fELF\x02\x01").unwrap();
    let text = dir.path().join("core.txt");
    fs::write(&text, "this is not an ELF file at all").unwrap();

    assert!(!is_core_file(&short));
    assert!(!is_core_file(&text));
    assert!(!is_core_file(&dir.path().join("missing")));
}

#[test]
fn test_parse_file_executable() {
    let description = "core.4711: ELF 64-bit LSB core file, x86-64, version 1 (SYSV), \
                       SVR4-style, from './main --x', real uid: 1000, effective uid: 1000";
    assert_eq!(parse_file_executable(description).as_deref(), Some("./main"));

    let no_core = "main: ELF 64-bit LSB pie executable, x86-64, from './main --x'";
    assert_eq!(parse_file_executable(no_core), None);
    assert_eq!(parse_file_executable("core: LSB core file, x86-64"), None);
}

#[test]
fn test_remove_stale_core_files_keeps_other_files() {
    let dir = tempdir().unwrap();
    write_elf_header(&dir.path().join("core"), 1, 4);
    write_elf_header(&dir.path().join("core.77"), 1, 4);
    // Named like a core file but an executable.
    write_elf_header(&dir.path().join("corelib.so"), 1, 3);
    // A core file without "core" in its name is not looked at.
    write_elf_header(&dir.path().join("dump.bin"), 1, 4);
    fs::write(dir.path().join("core.txt"), "notes").unwrap();

    assert_eq!(
        find_core_files(dir.path()),
        vec![dir.path().join("core"), dir.path().join("core.77")]
    );

    remove_stale_core_files(dir.path());
    assert!(!dir.path().join("core").exists());
    assert!(!dir.path().join("core.77").exists());
    assert!(dir.path().join("corelib.so").exists());
    assert!(dir.path().join("dump.bin").exists());
    assert!(dir.path().join("core.txt").exists());
}

/// A command that exits successfully but leaves a core file behind still gets
/// the backtrace appended. `file` and `gdb` are replaced by scripts.
#[tokio::test]
async fn test_backtrace_is_appended_after_successful_command() {
    let tools = tempdir().unwrap();
    write_script(
        &tools.path().join("file"),
        r#"echo "$1: ELF 64-bit LSB core file, x86-64, version 1 (SYSV), from './main --x', real uid: 0""#,
    );
    write_script(&tools.path().join("gdb"), r##"echo "#0 crash_here () at main.cc:12""##);
    let path = std::env::var_os("PATH").unwrap_or_default();
    let mut paths = vec![tools.path().to_path_buf()];
    paths.extend(std::env::split_paths(&path));
    // The only test in this binary that spawns processes.
    unsafe { std::env::set_var("PATH", std::env::join_paths(paths).unwrap()) };

    let work = tempdir().unwrap();
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(r"printf '\177ELF\002\001\001\000\000\000\000\000\000\000\000\000\004\000' > core.4711; echo done")
        .current_dir(work.path());
    let sink = OutputSink::memory();
    let policy = CommandPolicy::default().inspect_core_dumps(true);

    let outcome = spawn_and_capture(cmd, &policy, &sink).await.unwrap();
    assert!(outcome.state.is_success());
    let output = sink.contents().await;
    assert!(output.starts_with("done"));
    assert!(output.contains("START: CORE DUMP BACKTRACE OF ./main"));
    assert!(output.contains("#0 crash_here ()"));
}
