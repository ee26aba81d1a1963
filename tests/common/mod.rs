#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

pub fn pipesh() -> Command {
	let mut cmd = Command::new(env!("CARGO_BIN_EXE_pipesh"));
	cmd.env_remove("PIPESH_LOG");
	cmd
}

/// Runs a single command line with `-c`.
pub fn run(dir: &Path, line: &str) -> Output {
	pipesh().arg("-c").arg(line).current_dir(dir).stdin(Stdio::null()).output().unwrap()
}

/// Feeds `input` to an interactive session on stdin.
pub fn session<I: AsRef<[u8]>>(dir: &Path, args: &[&str], input: I) -> Output {
	let mut child = pipesh()
		.args(args)
		.current_dir(dir)
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
		.unwrap();
	child.stdin.take().unwrap().write_all(input.as_ref()).unwrap();
	child.wait_with_output().unwrap()
}

pub fn stdout(output: &Output) -> String {
	String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
	String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Writes `body` to `name` inside `dir`, to be run as `sh name`.
pub fn script(dir: &Path, name: &str, body: &str) -> String {
	std::fs::write(dir.join(name), body).unwrap();
	name.to_string()
}
