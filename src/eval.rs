use std::ffi::OsString;

use nix::fcntl::OFlag;
use nix::unistd::{self, ForkResult, Pid};
use tracing::debug;

use crate::builtin;
use crate::descriptor::Snapshot;
use crate::error::{ParseError, ShellError};
use crate::global;
use crate::job;
use crate::launch::{self, Outcome};
use crate::parser::PIPE;
use crate::redirect;
use crate::types::{Mode, Redirections, Segment};

pub enum EvalResult {
	/// Foreground pipeline or builtin finished with this status.
	Done(i32),
	/// Detached pipeline recorded under this job number.
	Running(usize),
}

fn check_segments(tokens: &[OsString]) -> Result<(), ParseError> {
	if tokens.split(|t| t == PIPE).any(|segment| segment.is_empty()) {
		Err(ParseError::EmptySegment)
	} else {
		Ok(())
	}
}

struct Builder<'a> {
	snapshot: &'a Snapshot,
	append_stderr: bool,
	mode: Mode,
	/// Left-branch processes of a detached pipeline, left to right.
	detached: Vec<Pid>,
}

impl<'a> Builder<'a> {
	/// Splits at the first pipe: the left segment runs in a forked child
	/// writing into the pipe, the rest is built recursively reading from it.
	fn run(&mut self, tokens: &[OsString], redirections: Redirections) -> Result<Outcome, ShellError> {
		let snapshot = self.snapshot;
		let _restore = snapshot.restore_on_exit(&redirections);

		let split = match tokens.iter().position(|t| t == PIPE) {
			Some(k) => k,
			None => {
				let segment = Segment::new(tokens)?;
				return launch::launch(&segment, redirections, self.mode, self.append_stderr);
			},
		};
		let segment = Segment::new(&tokens[.. split])?;
		let (pipe_read, pipe_write) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(|e| ShellError::resource("pipe", e))?;

		// Safety: see `launch::launch`.
		match unsafe { unistd::fork() } {
			Ok(ForkResult::Child) => {
				drop(pipe_read);
				launch::exec_segment(&segment, redirections.with_stdout(pipe_write), self.append_stderr)
			},
			Ok(ForkResult::Parent { child }) => {
				drop(pipe_write);
				debug!(pid = %child, program = %segment.name(), "launched pipeline stage");
				let outcome = self.run(&tokens[split + 1 ..], redirections.with_stdin(pipe_read));
				match self.mode {
					Mode::Foreground => {
						job::wait_for(child)?;
					},
					Mode::Detached => self.detached.insert(0, child),
				}
				outcome
			},
			Err(e) => Err(ShellError::resource("fork", e)),
		}
	}
}

/// Runs one tokenized command line.
///
/// Parse errors are reported before anything is opened or spawned. Every
/// error is scoped to this command line; the session goes on.
pub fn eval(state: &mut global::State, mut tokens: Vec<OsString>) -> Result<EvalResult, ShellError> {
	let command = tokens.iter().map(|t| t.to_string_lossy()).collect::<Vec<_>>().join(" ");
	let mode = launch::strip_detach(&mut tokens)?;
	let redirects = redirect::parse(&mut tokens)?;
	check_segments(&tokens)?;

	if mode == Mode::Foreground && redirects.is_empty() && !tokens.iter().any(|t| t == PIPE) {
		if let Some(builtin) = builtin::match_builtin(&tokens[0]) {
			return Ok(EvalResult::Done(builtin(state, &tokens[1 ..])));
		}
	}

	let redirections = redirect::open(&redirects, Redirections::default())?;
	let mut builder = Builder {
		snapshot: &state.snapshot,
		append_stderr: state.config.append_stderr,
		mode: mode,
		detached: vec![],
	};
	let outcome = builder.run(&tokens, redirections);
	let mut pids = builder.detached;
	match outcome {
		Ok(Outcome::Exited(status)) => Ok(EvalResult::Done(status)),
		Ok(Outcome::Detached(pid)) => {
			pids.push(pid);
			let id = state.job_set.push(pids.clone(), command);
			let list: Vec<String> = pids.iter().map(|pid| pid.to_string()).collect();
			eprintln!("[{}] {}", id, list.join(" "));
			Ok(EvalResult::Running(id))
		},
		Err(e) => {
			if !pids.is_empty() {
				state.job_set.push(pids, command);
			}
			Err(e)
		},
	}
}
