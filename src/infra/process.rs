//! # Process Tree Signalling / 进程树信号
//!
//! Simulation commands are often wrappers (`make`, `wine`, `valgrind`) whose
//! real work happens in grandchildren. Terminating only the direct child would
//! leave those running and keep the output pipes open, so signals are delivered
//! to the whole tree, children first.
//!
//! 仿真命令通常是包装器（`make`、`wine`、`valgrind`），真正的工作在孙进程中进行。
//! 因此信号会发送给整个进程树，先子进程后父进程。

use std::collections::HashMap;
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};

/// Sends a graceful terminate request (`SIGTERM` on Unix) to the process tree rooted at `pid`.
/// Returns the number of processes that were signalled.
///
/// 向以 `pid` 为根的进程树发送优雅终止请求（Unix 上为 `SIGTERM`）。
/// 返回收到信号的进程数量。
pub fn terminate_process_tree(pid: u32) -> usize {
    signal_process_tree(pid, Signal::Term)
}

/// Force-kills the process tree rooted at `pid`.
/// 强制终止以 `pid` 为根的进程树。
pub fn kill_process_tree(pid: u32) -> usize {
    signal_process_tree(pid, Signal::Kill)
}

fn signal_process_tree(pid: u32, signal: Signal) -> usize {
    let root = Pid::from_u32(pid);

    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let mut children_map: HashMap<Pid, Vec<Pid>> = HashMap::new();
    for (p, proc_) in sys.processes() {
        if let Some(parent) = proc_.parent() {
            children_map.entry(parent).or_default().push(*p);
        }
    }

    let mut tree = Vec::new();
    collect_process_tree(root, &children_map, &mut tree);

    let mut signalled = 0;
    // Children first, so a parent cannot respawn them after it is gone.
    for pid in tree.into_iter().rev() {
        let Some(proc_) = sys.process(pid) else {
            continue;
        };
        match proc_.kill_with(signal) {
            Some(true) => signalled += 1,
            Some(false) => {
                tracing::warn!(pid = pid.as_u32(), ?signal, "failed to deliver signal");
            }
            // The platform has no such signal; a hard kill is the only option left.
            None => {
                if proc_.kill() {
                    signalled += 1;
                }
            }
        }
    }
    signalled
}

fn collect_process_tree(pid: Pid, children_map: &HashMap<Pid, Vec<Pid>>, out: &mut Vec<Pid>) {
    out.push(pid);
    if let Some(children) = children_map.get(&pid) {
        for child in children {
            collect_process_tree(*child, children_map, out);
        }
    }
}
