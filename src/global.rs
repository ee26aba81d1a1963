use crate::config::Config;
use crate::descriptor::Snapshot;
use crate::error::ShellError;
use crate::job;

/// Everything the REPL carries from one command line to the next.
pub struct State {
	pub snapshot: Snapshot,
	pub job_set: job::JobSet,
	pub config: Config,
	pub last_status: i32,
	/// Set by the `exit` builtin.
	pub exit: Option<i32>,
}

impl State {
	pub fn new(config: Config) -> Result<State, ShellError> {
		let snapshot = Snapshot::capture().map_err(|e| ShellError::resource("dup", e))?;
		let job_set = job::JobSet::new();
		Ok(State { snapshot: snapshot, job_set: job_set, config: config, last_status: 0, exit: None })
	}
}
