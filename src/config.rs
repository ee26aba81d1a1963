use std::ffi::OsString;

use clap::Parser;

pub const DEFAULT_PROMPT: &str = "pipesh> ";
pub const LOG_ENV: &str = "PIPESH_LOG";

/// A small line shell: pipelines, redirections and detached commands.
#[derive(Parser, Debug, Clone)]
#[command(name = "pipesh", version)]
pub struct Config {
	/// Run one command line and exit with its status
	#[arg(short = 'c', long = "command", value_name = "LINE")]
	pub command: Option<OsString>,

	/// Prompt shown before each line when stdin is a terminal
	#[arg(long, default_value = DEFAULT_PROMPT)]
	pub prompt: String,

	/// Let `>>` capture standard error as well as standard output
	#[arg(long)]
	pub append_stderr: bool,

	/// Log filter, e.g. `debug` or `pipesh=trace` (overrides PIPESH_LOG)
	#[arg(long, value_name = "FILTER")]
	pub log: Option<String>,
}

impl Default for Config {
	fn default() -> Config {
		Config { command: None, prompt: DEFAULT_PROMPT.to_string(), append_stderr: false, log: None }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn defaults_match_bare_invocation() {
		let parsed = Config::parse_from(["pipesh"]);
		let default = Config::default();
		assert_eq!(parsed.command, default.command);
		assert_eq!(parsed.prompt, default.prompt);
		assert_eq!(parsed.append_stderr, default.append_stderr);
	}

	#[test]
	fn command_and_flags() {
		let parsed = Config::parse_from(["pipesh", "-c", "ls | wc -l", "--append-stderr", "--log", "debug"]);
		assert_eq!(parsed.command, Some(OsString::from("ls | wc -l")));
		assert!(parsed.append_stderr);
		assert_eq!(parsed.log.as_deref(), Some("debug"));
	}
}
