//! # Command Execution Module / 命令执行模块
//!
//! Spawns a child process, streams its stdout and stderr into a job-scoped
//! output sink and enforces a wall-clock limit. When the limit expires the
//! process tree receives a graceful terminate request, gets a fixed grace
//! period and is then force-killed.
//!
//! 派生子进程，将其 stdout 和 stderr 流式写入任务范围的输出接收器，并强制执行时间限制。
//! 超时后进程树会先收到优雅终止请求，经过固定的宽限期后被强制终止。

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::core::models::ExitState;
use crate::infra::{coredump, decode::Utf8Decoder, process, t};

/// Time a process gets between the terminate request and the force-kill.
/// 进程在收到终止请求和被强制终止之间的时间。
pub const TERMINATE_GRACE: Duration = Duration::from_secs(30);

/// Upper bound for collecting the remaining output after the process is gone.
/// A detached grandchild may keep the pipe open forever.
const READER_DRAIN_LIMIT: Duration = Duration::from_secs(5);

const READ_CHUNK: usize = 8192;

/// Limits and options applied to a single spawned command.
/// 应用于单个派生命令的限制和选项。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPolicy {
    /// Wall-clock limit; `None` disables the timeout.
    /// 墙钟时间限制；`None` 表示禁用超时。
    pub limit: Option<Duration>,
    /// Grace period between terminate and kill.
    /// 终止与强制终止之间的宽限期。
    pub grace: Duration,
    /// Look for core dumps in the working directory and append their backtraces.
    /// 在工作目录中查找核心转储并附加其回溯。
    pub inspect_core_dumps: bool,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self {
            limit: None,
            grace: TERMINATE_GRACE,
            inspect_core_dumps: false,
        }
    }
}

impl CommandPolicy {
    pub fn with_limit(limit: Option<Duration>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn inspect_core_dumps(mut self, enabled: bool) -> Self {
        self.inspect_core_dumps = enabled;
        self
    }
}

/// The outcome of one spawned command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub state: ExitState,
    pub elapsed: Duration,
}

struct SinkState {
    text: String,
    file: Option<File>,
    echo: bool,
}

/// Job-scoped output sink shared by the stdout and stderr readers.
///
/// Everything written is kept in memory for the `ExecutionResult`, mirrored to
/// the job's output file when one is attached, and optionally echoed to the console.
///
/// 由 stdout 和 stderr 读取任务共享的任务范围输出接收器。
/// 写入的所有内容都保存在内存中，如果附加了输出文件则同步写入文件，并可选地回显到控制台。
#[derive(Clone)]
pub struct OutputSink {
    inner: Arc<tokio::sync::Mutex<SinkState>>,
}

impl OutputSink {
    /// A sink that only keeps the output in memory.
    pub fn memory() -> Self {
        Self::new(None, false)
    }

    /// A sink that additionally writes to `path` (truncated first).
    /// 一个额外写入 `path`（先截断）的接收器。
    pub fn to_file(path: &Path, echo: bool) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(Some(file), echo))
    }

    fn new(file: Option<File>, echo: bool) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(SinkState {
                text: String::new(),
                file,
                echo,
            })),
        }
    }

    pub async fn write(&self, text: &str) {
        let mut state = self.inner.lock().await;
        state.text.push_str(text);
        if let Some(file) = state.file.as_mut() {
            if let Err(e) = file.write_all(text.as_bytes()) {
                tracing::warn!(error = %e, "failed to write job output file");
                state.file = None;
            }
        }
        if state.echo {
            print!("{}", text);
        }
    }

    /// Returns a copy of everything written so far.
    pub async fn contents(&self) -> String {
        self.inner.lock().await.text.clone()
    }
}

/// Spawns `cmd`, captures its stdout and stderr into `sink` and enforces `policy`.
///
/// Both streams are read concurrently in raw chunks and decoded incrementally,
/// so a multi-byte character split across two reads is reassembled. On timeout
/// the returned state is [`ExitState::TimedOut`] regardless of how the process
/// finally died.
///
/// Only a failure to spawn is returned as an error.
///
/// 派生 `cmd`，将其 stdout 和 stderr 捕获到 `sink` 中并强制执行 `policy`。
/// 两个流以原始块并发读取并增量解码，因此跨两次读取被拆分的多字节字符会被重新组合。
/// 超时时返回的状态总是 [`ExitState::TimedOut`]，与进程最终的结束方式无关。
/// 只有派生失败才会作为错误返回。
pub async fn spawn_and_capture(
    mut cmd: Command,
    policy: &CommandPolicy,
    sink: &OutputSink,
) -> std::io::Result<CommandOutcome> {
    let working_dir = cmd.as_std().get_current_dir().map(Path::to_path_buf);
    if policy.inspect_core_dumps {
        if let Some(dir) = &working_dir {
            coredump::remove_stale_core_files(dir);
        }
    }

    tracing::debug!(command = ?cmd.as_std(), limit = ?policy.limit, "spawning");
    let start_time = Instant::now();
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other(t!("command.capture_stdout_failed").to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other(t!("command.capture_stderr_failed").to_string()))?;

    let stdout_handle = tokio::spawn(pump(stdout, sink.clone()));
    let stderr_handle = tokio::spawn(pump(stderr, sink.clone()));

    let deadline = CancellationToken::new();
    let timer = policy.limit.map(|limit| {
        let deadline = deadline.clone();
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            deadline.cancel();
        })
    });

    let state = tokio::select! {
        status = child.wait() => ExitState::from_status(status?),
        _ = deadline.cancelled() => {
            escalate(&mut child, policy, sink).await;
            ExitState::TimedOut
        }
    };
    if let Some(timer) = timer {
        timer.abort();
    }

    for handle in [stdout_handle, stderr_handle] {
        let abort = handle.abort_handle();
        match tokio::time::timeout(READER_DRAIN_LIMIT, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "output reader task failed"),
            Err(_) => {
                tracing::warn!("output pipe still open after the process exited; dropping the reader");
                abort.abort();
            }
        }
    }
    let elapsed = start_time.elapsed();

    // A wrapper may exit cleanly while a child it started dumped core.
    if policy.inspect_core_dumps {
        if let Some(dir) = &working_dir {
            for backtrace in coredump::collect_backtraces(dir).await {
                sink.write(&backtrace.to_output_block()).await;
            }
        }
    }

    Ok(CommandOutcome { state, elapsed })
}

/// Terminate, wait for the grace period, then kill.
async fn escalate(child: &mut Child, policy: &CommandPolicy, sink: &OutputSink) {
    let limit = policy.limit.unwrap_or_default();
    sink.write(&format!(
        "\n\n\n******************** {} ********************\n\n\n",
        t!("command.timed_out_terminating", secs = limit.as_secs())
    ))
    .await;

    let Some(pid) = child.id() else {
        return;
    };
    let signalled = signal_tree(pid, process::terminate_process_tree).await;
    tracing::debug!(pid, signalled, "sent terminate to timed out process tree");

    if tokio::time::timeout(policy.grace, child.wait()).await.is_ok() {
        return;
    }

    sink.write(&format!(
        "\n\n\n******************** {} ********************\n\n\n",
        t!("command.grace_expired_killing", secs = policy.grace.as_secs())
    ))
    .await;
    tracing::warn!(pid, "process ignored terminate request, force-killing");
    signal_tree(pid, process::kill_process_tree).await;
    if let Err(e) = child.kill().await {
        tracing::warn!(pid, error = %e, "failed to kill timed out process");
    }
}

async fn signal_tree(pid: u32, signal: fn(u32) -> usize) -> usize {
    tokio::task::spawn_blocking(move || signal(pid))
        .await
        .unwrap_or_default()
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, sink: OutputSink) {
    let mut decoder = Utf8Decoder::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = decoder.decode(&buf[..n]);
                if !text.is_empty() {
                    sink.write(&text).await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read child output");
                break;
            }
        }
    }
    let tail = decoder.finish();
    if !tail.is_empty() {
        sink.write(&tail).await;
    }
}
