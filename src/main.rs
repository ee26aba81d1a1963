mod builtin;
mod config;
mod descriptor;
mod error;
mod eval;
mod global;
mod job;
mod launch;
mod parser;
mod redirect;
mod types;

use std::io;
use std::io::{BufRead, IsTerminal, Write};
use std::os::unix::ffi::OsStrExt;
use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;

fn init_logging(config: &Config) {
	let filter = match config.log {
		Some(ref directives) => EnvFilter::new(directives),
		None => EnvFilter::try_from_env(config::LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
	};
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.without_time()
		.init();
}

fn run_line(state: &mut global::State, line: &[u8]) -> i32 {
	let tokens = parser::tokenize(line);
	if tokens.is_empty() {
		return state.last_status;
	}
	let status = match eval::eval(state, tokens) {
		Ok(eval::EvalResult::Done(status)) => status,
		Ok(eval::EvalResult::Running(_)) => 0,
		Err(e) => {
			eprintln!("pipesh: {}", e);
			e.status()
		},
	};
	state.last_status = status;
	status
}

fn report_finished(state: &mut global::State) {
	for job in state.job_set.reap() {
		match job.status() {
			Some(status) => eprintln!("[{}] done (status {})  {}", job.id, status, job.command),
			None => eprintln!("[{}] done  {}", job.id, job.command),
		}
	}
}

fn repl(state: &mut global::State) -> i32 {
	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let interactive = stdin.is_terminal();
	let mut stdin_locked = stdin.lock();
	loop {
		report_finished(state);
		if interactive {
			let _ = stdout.write_all(state.config.prompt.as_bytes());
			let _ = stdout.flush();
		}
		let mut line: Vec<u8> = vec![];
		match stdin_locked.read_until(b'\n', &mut line) {
			Ok(0) => return 0,
			Ok(_) => {},
			Err(e) => {
				error!(error = %e, "failed to read command line");
				return 1;
			},
		}
		run_line(state, &line);
		if let Some(status) = state.exit {
			return status;
		}
	}
}

fn main() {
	let config = Config::parse();
	init_logging(&config);

	let mut state = match global::State::new(config) {
		Ok(state) => state,
		Err(e) => {
			eprintln!("pipesh: {}", e);
			process::exit(1);
		},
	};
	let status = match state.config.command.clone() {
		Some(line) => run_line(&mut state, line.as_bytes()),
		None => repl(&mut state),
	};
	if !state.job_set.is_empty() {
		info!(jobs = state.job_set.len(), "leaving detached jobs running");
	}
	process::exit(status)
}
