use std::env;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use tracing::debug;

use crate::global;

pub const HELP: &str = "\
pipesh - a small line shell
Usage: command [arguments]
Built-in commands:
  help               display this help message
  exit [status]      leave the shell
  cd [dir]           change the working directory
Redirections and pipes:
  command < file     read standard input from file
  command > file     write standard output to file
  command >> file    append standard output to file
  command n> file    write descriptor n to file
  command n>> file   append descriptor n to file
  command n>&m       make descriptor n a copy of descriptor m
  cmd1 | cmd2        pipe the output of cmd1 into cmd2
  command &          run without waiting for it
";

pub type Builtin = fn(&mut global::State, &[OsString]) -> i32;

pub fn builtin_exit(state: &mut global::State, args: &[OsString]) -> i32 {
	let status = match args.first() {
		None => 0,
		Some(arg) => match arg.to_str().and_then(|s| s.parse::<u8>().ok()) {
			Some(n) => i32::from(n),
			None => {
				eprintln!("pipesh: exit: {}: numeric argument required", arg.to_string_lossy());
				2
			},
		},
	};
	state.exit = Some(status);
	status
}

pub fn builtin_help(_: &mut global::State, _: &[OsString]) -> i32 {
	print!("{}", HELP);
	0
}

pub fn builtin_cd(_: &mut global::State, args: &[OsString]) -> i32 {
	let dir = match args.first() {
		Some(dir) => PathBuf::from(dir),
		None => match env::var_os("HOME") {
			Some(home) => PathBuf::from(home),
			None => {
				eprintln!("pipesh: cd: HOME not set");
				return 1;
			},
		},
	};
	match env::set_current_dir(&dir) {
		Ok(()) => {
			debug!(dir = %dir.display(), "changed directory");
			0
		},
		Err(e) => {
			eprintln!("pipesh: cd: {}: {}", dir.display(), e);
			1
		},
	}
}

pub fn match_builtin(name: &OsStr) -> Option<Builtin> {
	match name.to_str() {
		Some("exit") => Some(builtin_exit),
		Some("help") => Some(builtin_help),
		Some("cd") => Some(builtin_cd),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::Config;

	fn state() -> global::State {
		global::State::new(Config::default()).unwrap()
	}

	#[test]
	fn only_known_names_are_builtins() {
		assert!(match_builtin(OsStr::new("exit")).is_some());
		assert!(match_builtin(OsStr::new("cd")).is_some());
		assert!(match_builtin(OsStr::new("ls")).is_none());
	}

	#[test]
	fn exit_records_status() {
		let mut s = state();
		assert_eq!(builtin_exit(&mut s, &[]), 0);
		assert_eq!(s.exit, Some(0));
		assert_eq!(builtin_exit(&mut s, &[OsString::from("3")]), 3);
		assert_eq!(s.exit, Some(3));
		assert_eq!(builtin_exit(&mut s, &[OsString::from("x")]), 2);
	}

	#[test]
	fn exit_status_must_fit_a_byte() {
		let mut s = state();
		assert_eq!(builtin_exit(&mut s, &[OsString::from("255")]), 255);
		assert_eq!(builtin_exit(&mut s, &[OsString::from("256")]), 2);
		assert_eq!(s.exit, Some(2));
		assert_eq!(builtin_exit(&mut s, &[OsString::from("99999")]), 2);
		assert_eq!(builtin_exit(&mut s, &[OsString::from("-1")]), 2);
	}

	#[test]
	fn cd_into_missing_directory_fails() {
		let mut s = state();
		assert_eq!(builtin_cd(&mut s, &[OsString::from("/nonexistent/dir")]), 1);
	}
}
