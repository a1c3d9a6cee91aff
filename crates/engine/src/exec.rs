// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocesses started by stage code.
//!
//! Children are asked to receive SIGKILL when the adapter dies, so a killed
//! or crashed adapter never leaves orphans running on the node.

use std::ffi::OsStr;
use std::process::Command;

/// A command whose child is killed if this process dies.
pub fn command(program: impl AsRef<OsStr>) -> Command {
    let mut cmd = Command::new(program);
    set_parent_death_signal(&mut cmd);
    cmd
}

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
fn set_parent_death_signal(cmd: &mut Command) {
    use nix::sys::prctl;
    use nix::sys::signal::Signal;
    use std::os::unix::process::CommandExt as _;

    // SAFETY: the hook runs between fork and exec and only issues the prctl
    // syscall, which is async-signal-safe; it allocates nothing and takes no locks.
    unsafe {
        cmd.pre_exec(|| prctl::set_pdeathsig(Signal::SIGKILL).map_err(std::io::Error::from));
    }
}

#[cfg(not(target_os = "linux"))]
fn set_parent_death_signal(_cmd: &mut Command) {}

/// `program arg1 arg2 ...` for the `exec` log line.
pub fn command_line(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
