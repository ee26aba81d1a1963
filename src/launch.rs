use std::ffi::OsString;
use std::io;
use std::io::Write;
use std::os::fd::{AsRawFd, RawFd};

use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, ForkResult, Pid};
use tracing::debug;

use crate::descriptor;
use crate::error::{ParseError, ShellError};
use crate::job;
use crate::parser::DETACH;
use crate::types::{Mode, Redirections, Segment};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Outcome {
	Exited(i32),
	Detached(Pid),
}

/// Removes a trailing detach marker. A marker anywhere else is an error.
pub fn strip_detach(tokens: &mut Vec<OsString>) -> Result<Mode, ParseError> {
	let mode = if tokens.last().map_or(false, |t| t == DETACH) {
		tokens.pop();
		Mode::Detached
	} else {
		Mode::Foreground
	};
	if tokens.iter().any(|t| t == DETACH) {
		return Err(ParseError::MisplacedDetach);
	}
	Ok(mode)
}

/// Moves every descriptor of the plan onto its slot in the calling process.
///
/// Sources are first lifted above the highest target so that no `dup2`
/// clobbers a source still waiting to be moved. The originals and the
/// lifted copies are all close-on-exec and vanish at `execvp`.
fn install(redirections: &Redirections, append_stderr: bool) -> nix::Result<()> {
	let mut moves: Vec<(RawFd, RawFd)> = vec![];
	if let Some(ref fd) = redirections.stdin {
		moves.push((fd.as_raw_fd(), libc::STDIN_FILENO));
	}
	if let Some(ref fd) = redirections.stdout {
		moves.push((fd.as_raw_fd(), libc::STDOUT_FILENO));
	}
	if let Some(ref fd) = redirections.stderr {
		moves.push((fd.as_raw_fd(), libc::STDERR_FILENO));
	}
	for &(target, ref fd) in &redirections.numbered {
		moves.push((fd.as_raw_fd(), target));
	}

	let highest = moves.iter().map(|&(_, target)| target).max().unwrap_or(libc::STDERR_FILENO);
	let floor = highest.checked_add(1).ok_or(Errno::EBADF)?;
	for m in moves.iter_mut() {
		if m.0 < floor {
			m.0 = descriptor::dup_above(m.0, floor)?;
		}
	}
	for &(source, target) in &moves {
		unistd::dup2(source, target)?;
	}

	if append_stderr && redirections.append {
		unistd::dup2(libc::STDOUT_FILENO, libc::STDERR_FILENO)?;
	}
	for &(target, source) in &redirections.dups {
		unistd::dup2(source, target)?;
	}
	Ok(())
}

/// The Rust runtime starts with SIGPIPE ignored, and an ignored signal stays
/// ignored across `execvp`.
fn reset_signals() -> nix::Result<()> {
	// Safety: SIG_DFL installs no handler.
	unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) }?;
	Ok(())
}

/// Child side of a launch: rewire, replace the process image, or report
/// and die. Never returns.
pub fn exec_segment(segment: &Segment, redirections: Redirections, append_stderr: bool) -> ! {
	if let Err(e) = reset_signals().and_then(|()| install(&redirections, append_stderr)) {
		let _ = writeln!(&mut io::stderr(), "pipesh: {}: {}", segment.name(), e.desc());
		unsafe { libc::_exit(1) }
	}
	let e = match unistd::execvp(&segment.argv[0], &segment.argv) {
		Ok(never) => match never {},
		Err(e) => e,
	};
	let status = if e == Errno::ENOENT { 127 } else { 126 };
	let _ = writeln!(&mut io::stderr(), "pipesh: {}: {}", segment.name(), e.desc());
	unsafe { libc::_exit(status) }
}

/// Runs one segment in a new process.
///
/// The parent's copies of the plan's descriptors are closed as soon as the
/// child exists. A foreground launch blocks until that child terminates.
pub fn launch(segment: &Segment, redirections: Redirections, mode: Mode, append_stderr: bool) -> Result<Outcome, ShellError> {
	// Safety: the shell is single-threaded; the child only rewires
	// descriptors before exec or _exit.
	let child = match unsafe { unistd::fork() } {
		Ok(ForkResult::Child) => exec_segment(segment, redirections, append_stderr),
		Ok(ForkResult::Parent { child }) => child,
		Err(e) => return Err(ShellError::resource("fork", e)),
	};
	drop(redirections);
	debug!(pid = %child, program = %segment.name(), mode = ?mode, "launched");

	match mode {
		Mode::Foreground => job::wait_for(child).map(Outcome::Exited),
		Mode::Detached => Ok(Outcome::Detached(child)),
	}
}
