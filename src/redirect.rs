use std::ffi::OsString;
use std::fs;
use std::mem;
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ParseError, ShellError};
use crate::parser::{self, Operator, Token};
use crate::types::{Destination, Redirect, RedirectType, Redirections, Target};

const CREATE_MODE: u32 = 0o644;

/// Scans `tokens` left to right and removes every redirection operator
/// together with its operand, returning the redirections in scan order.
///
/// Pipe and detach tokens are left in place. On error `tokens` is emptied;
/// the whole line is rejected anyway.
pub fn parse(tokens: &mut Vec<OsString>) -> Result<Vec<Redirect>, ParseError> {
	let mut redirects: Vec<Redirect> = vec![];
	let mut kept: Vec<OsString> = Vec::with_capacity(tokens.len());
	let mut iter = mem::take(tokens).into_iter();

	while let Some(token) = iter.next() {
		match parser::classify(&token)? {
			Token::Redirect(Operator::File { typ, destination }) => {
				let path = match iter.next() {
					Some(path) if parser::classify(&path) == Ok(Token::Word) => path,
					_ => return Err(ParseError::MissingTarget(token.to_string_lossy().into_owned())),
				};
				redirects.push(Redirect { typ: typ, target: Target::Path(PathBuf::from(path)), destination: destination });
			},
			Token::Redirect(Operator::Dup { destination, source }) => {
				redirects.push(Redirect { typ: RedirectType::Output, target: Target::Fd(source), destination: destination });
			},
			Token::Word | Token::Pipe | Token::Detach => kept.push(token),
		}
	}

	*tokens = kept;
	Ok(redirects)
}

fn open_target(path: &Path, typ: RedirectType) -> Result<OwnedFd, ShellError> {
	let mut oopt = fs::OpenOptions::new();
	let _ = match typ {
		RedirectType::Input => oopt.read(true),
		RedirectType::Output => oopt.write(true).create(true).truncate(true).mode(CREATE_MODE),
		RedirectType::Append => oopt.append(true).create(true).mode(CREATE_MODE),
	};
	let file = oopt.open(path).map_err(|e| ShellError::Open { path: path.to_owned(), source: e })?;
	Ok(OwnedFd::from(file))
}

/// Opens every file target and folds the redirections into `defaults`,
/// later entries overriding earlier ones for the same destination.
///
/// A replaced descriptor is closed immediately, so `> a > b` creates both
/// files but only `b` stays open.
pub fn open(redirects: &[Redirect], defaults: Redirections) -> Result<Redirections, ShellError> {
	let mut plan = defaults;
	for redirect in redirects {
		match redirect.target {
			Target::Path(ref path) => {
				let fd = open_target(path, redirect.typ)?;
				debug!(path = %path.display(), destination = ?redirect.destination, "opened redirection target");
				plan.set_file(redirect.destination, fd);
			},
			Target::Fd(source) => plan.set_dup(redirect.destination, source),
		}
		if redirect.typ == RedirectType::Append && redirect.destination == Destination::Stdout {
			plan.append = true;
		}
	}
	Ok(plan)
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use std::io::{Read, Write};
	use tempfile::TempDir;

	fn tokens(line: &str) -> Vec<OsString> {
		parser::tokenize(line)
	}

	#[test]
	fn parse_strips_operators_and_operands() {
		let mut t = tokens("sort < in.txt -r | uniq > out.txt 2>> err.txt");
		let redirects = parse(&mut t).unwrap();
		assert_eq!(t, vec!["sort", "-r", "|", "uniq"]);
		assert_eq!(redirects, vec![
			Redirect { typ: RedirectType::Input, target: Target::Path(PathBuf::from("in.txt")), destination: Destination::Stdin },
			Redirect { typ: RedirectType::Output, target: Target::Path(PathBuf::from("out.txt")), destination: Destination::Stdout },
			Redirect { typ: RedirectType::Append, target: Target::Path(PathBuf::from("err.txt")), destination: Destination::Stderr },
		]);
	}

	#[test]
	fn parse_keeps_numbered_and_dup_forms() {
		let mut t = tokens("prog 5> five.txt 2>&1 &");
		let redirects = parse(&mut t).unwrap();
		assert_eq!(t, vec!["prog", "&"]);
		assert_eq!(redirects[0].destination, Destination::Fd(5));
		assert_eq!(redirects[1].target, Target::Fd(1));
		assert_eq!(redirects[1].destination, Destination::Stderr);
	}

	#[test]
	fn parse_rejects_missing_target() {
		assert_eq!(parse(&mut tokens("echo x >")), Err(ParseError::MissingTarget(">".to_string())));
		assert_eq!(parse(&mut tokens("cat < | wc")), Err(ParseError::MissingTarget("<".to_string())));
		assert_eq!(parse(&mut tokens("ls 2> >> f")), Err(ParseError::MissingTarget("2>".to_string())));
		assert_eq!(parse(&mut tokens("ls > &")), Err(ParseError::MissingTarget(">".to_string())));
	}

	#[test]
	fn clean_sequence_is_left_alone() {
		let mut t = tokens("ls -l | wc -l");
		let orig = t.clone();
		let redirects = parse(&mut t).unwrap();
		assert!(redirects.is_empty());
		assert_eq!(t, orig);

		let plan = open(&redirects, Redirections::default()).unwrap();
		assert!(plan.stdin.is_none() && plan.stdout.is_none() && plan.stderr.is_none());
		assert!(plan.numbered.is_empty() && plan.dups.is_empty());
		assert!(!plan.append);
	}

	#[test]
	fn output_truncates_and_append_appends() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("f");
		fs::write(&path, "old content\n").unwrap();
		
		let plan = open(&[Redirect { typ: RedirectType::Output, target: Target::Path(path.clone()), destination: Destination::Stdout }], Redirections::default()).unwrap();
		let mut f = fs::File::from(plan.stdout.unwrap());
		f.write_all(b"a\n").unwrap();
		drop(f);
		assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");

		let plan = open(&[Redirect { typ: RedirectType::Append, target: Target::Path(path.clone()), destination: Destination::Stdout }], Redirections::default()).unwrap();
		assert!(plan.append);
		let mut f = fs::File::from(plan.stdout.unwrap());
		f.write_all(b"b\n").unwrap();
		drop(f);
		assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
	}

	#[test]
	fn last_redirection_wins() {
		let dir = TempDir::new().unwrap();
		let first = dir.path().join("first");
		let second = dir.path().join("second");
		fs::write(&second, "input").unwrap();
		let line = format!("cat < {} > {} < {}", first.display(), first.display(), second.display());
		let mut t = tokens(&line);
		let redirects = parse(&mut t).unwrap();
		// `< first` fails before `> first` creates it
		assert!(matches!(open(&redirects, Redirections::default()), Err(ShellError::Open { .. })));

		let line = format!("cat > {} < {}", first.display(), second.display());
		let mut t = tokens(&line);
		let redirects = parse(&mut t).unwrap();
		let plan = open(&redirects, Redirections::default()).unwrap();
		assert!(first.exists());
		let mut s = String::new();
		fs::File::from(plan.stdin.unwrap()).read_to_string(&mut s).unwrap();
		assert_eq!(s, "input");
	}

	#[test]
	fn missing_input_is_an_open_error() {
		let err = open(&[Redirect { typ: RedirectType::Input, target: Target::Path(PathBuf::from("/nonexistent/x")), destination: Destination::Stdin }], Redirections::default()).unwrap_err();
		assert!(err.to_string().starts_with("/nonexistent/x: "));
		assert_eq!(err.status(), 1);
	}
}
