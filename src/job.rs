use nix::errno::Errno;
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{info, warn};

use crate::error::ShellError;

pub trait WaitStatusExt {
	fn is_terminated(self) -> bool;
	/// Shell-style status: the exit code, or 128 + signal number.
	fn code(self) -> Option<i32>;
}

impl WaitStatusExt for WaitStatus {
	fn is_terminated(self) -> bool {
		match self {
			WaitStatus::Exited(..) | WaitStatus::Signaled(..) => true,
			_ => false,
		}
	}

	fn code(self) -> Option<i32> {
		match self {
			WaitStatus::Exited(_, code) => Some(code),
			WaitStatus::Signaled(_, sig, _) => Some(128 + sig as i32),
			_ => None,
		}
	}
}

/// Blocks until `pid` terminates and returns its status.
pub fn wait_for(pid: Pid) -> Result<i32, ShellError> {
	loop {
		match wait::waitpid(pid, None) {
			Ok(status) => if let Some(code) = status.code() {
				return Ok(code);
			},
			Err(Errno::EINTR) => {},
			Err(e) => return Err(ShellError::resource("waitpid", e)),
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Process {
	pub pid: Pid,
	pub status: WaitStatus,
}

/// A detached pipeline. Processes are ordered left to right.
#[derive(Debug)]
pub struct Job {
	pub id: usize,
	pub command: String,
	pub processes: Vec<Process>,
}

impl Job {
	pub fn is_terminated(&self) -> bool {
		self.processes.iter().all(|pr| pr.status.is_terminated())
	}

	/// Status of the rightmost process, once it has terminated.
	pub fn status(&self) -> Option<i32> {
		self.processes.last().and_then(|pr| pr.status.code())
	}

	fn poll(&mut self) {
		for pr in self.processes.iter_mut().filter(|pr| !pr.status.is_terminated()) {
			match wait::waitpid(pr.pid, Some(WaitPidFlag::WNOHANG)) {
				Ok(WaitStatus::StillAlive) => {},
				Ok(status) => pr.status = status,
				Err(Errno::ECHILD) => {
					// someone else reaped it; nothing left to wait for
					warn!(pid = %pr.pid, "detached process vanished");
					pr.status = WaitStatus::Exited(pr.pid, 0);
				},
				Err(e) => warn!(pid = %pr.pid, error = %e, "waitpid failed"),
			}
		}
	}
}

/// Registry of detached pipelines that have not been reaped yet.
#[derive(Debug, Default)]
pub struct JobSet {
	jobs: Vec<Option<Job>>,
}

impl JobSet {
	pub fn new() -> JobSet {
		JobSet { jobs: vec![] }
	}

	/// Records a detached pipeline and returns its job number.
	pub fn push(&mut self, pids: Vec<Pid>, command: String) -> usize {
		let processes = pids.into_iter().map(|pid| Process { pid: pid, status: WaitStatus::StillAlive }).collect();
		let jobs = &mut self.jobs;
		let idx = match jobs.iter().position(|o| o.is_none()) {
			Some(i) => i,
			None => {
				jobs.push(None);
				jobs.len() - 1
			},
		};
		jobs[idx] = Some(Job { id: idx + 1, command: command, processes: processes });
		info!(job = idx + 1, "detached pipeline");
		idx + 1
	}

	/// Collects every job whose processes have all terminated, without
	/// blocking.
	pub fn reap(&mut self) -> Vec<Job> {
		let mut finished = vec![];
		for slot in self.jobs.iter_mut() {
			let done = match *slot {
				Some(ref mut job) => {
					job.poll();
					job.is_terminated()
				},
				None => false,
			};
			if done {
				finished.extend(slot.take());
			}
		}
		let len = self.jobs.iter().rposition(|o| o.is_some()).map_or(0, |i| i + 1);
		self.jobs.truncate(len);
		for job in &finished {
			info!(job = job.id, status = ?job.status(), "reaped detached pipeline");
		}
		finished
	}

	pub fn len(&self) -> usize {
		self.jobs.iter().filter(|o| o.is_some()).count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
