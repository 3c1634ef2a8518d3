//! Process inspection and external program helpers.
//!
//! Command lines of running applications are read from procfs. Helper
//! programs (`grim`, `slurp`, `xdg-open`, ...) are started with
//! `std::process::Command`; viewers are detached into their own session so
//! they outlive wayctl.

use std::borrow::Cow;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Resolve a process id to its current argv
pub trait ProcessInspector {
    fn cmdline_of(&self, pid: u32) -> io::Result<Vec<String>>;
}

/// Reads `/proc/<pid>/cmdline`
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Use a different procfs mount point
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessInspector for ProcFs {
    fn cmdline_of(&self, pid: u32) -> io::Result<Vec<String>> {
        let raw = std::fs::read(self.root.join(pid.to_string()).join("cmdline"))?;

        // Each argument ends in a NUL, so only the last one is stripped;
        // empty arguments in between are kept. Zombies and kernel threads
        // have no arguments at all.
        let raw = raw.strip_suffix(b"\0").unwrap_or(&raw);
        if raw.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("process {} has no command line", pid),
            ));
        }

        let args = raw
            .split(|b| *b == 0)
            .map(|arg| match String::from_utf8_lossy(arg) {
                Cow::Borrowed(arg) => arg.to_string(),
                Cow::Owned(arg) => {
                    log::warn!("pid {}: argument {:?} is not valid UTF-8", pid, arg);
                    arg
                }
            })
            .collect();
        Ok(args)
    }
}

/// Join argv into one command line for `sh -c`, quoting where needed
pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-.,:/@%+=".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Spawn a program detached from wayctl's session
pub fn spawn_detached(program: &str, args: &[&str]) -> io::Result<()> {
    log::info!("Spawning {} {:?}", program, args);

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    // Start a new session so the child survives wayctl exiting
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
    }

    cmd.spawn()
        .map(drop)
        .map_err(|e| io::Error::new(e.kind(), format!("Failed to spawn {}: {}", program, e)))
}

/// Spawn a whitespace-separated command line detached, expanding `~`
pub fn spawn_command_line(command: &str) -> io::Result<()> {
    let expanded = shellexpand::tilde(command);
    let parts: Vec<&str> = expanded.split_whitespace().collect();
    match parts.split_first() {
        Some((program, args)) => spawn_detached(program, args),
        None => Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command")),
    }
}

/// Run a program to completion, failing on a non-zero exit
pub fn run_status(program: &str, args: &[&str]) -> io::Result<()> {
    log::debug!("Running {} {:?}", program, args);
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| io::Error::new(e.kind(), format!("Failed to run {}: {}", program, e)))?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("{} exited with {}", program, status)))
    }
}

/// Run a program to completion and return its stdout
pub fn run_output(program: &str, args: &[&str]) -> io::Result<Vec<u8>> {
    log::debug!("Running {} {:?}", program, args);
    let output = Command::new(program)
        .args(args)
        .stderr(Stdio::inherit())
        .output()
        .map_err(|e| io::Error::new(e.kind(), format!("Failed to run {}: {}", program, e)))?;
    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(io::Error::other(format!("{} exited with {}", program, output.status)))
    }
}
