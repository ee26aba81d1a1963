use std::ffi::{OsStr, OsString};
use std::os::fd::RawFd;
use std::os::unix::ffi::{OsStrExt, OsStringExt};

use crate::error::ParseError;
use crate::types::{Destination, RedirectType};

pub const PIPE: &str = "|";
pub const DETACH: &str = "&";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operator {
	/// `<`, `[N]>`, `[N]>>`; consumes the following token as a path.
	File { typ: RedirectType, destination: Destination },
	/// `[N]>&M`, self-contained.
	Dup { destination: Destination, source: RawFd },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Token {
	Word,
	Pipe,
	Detach,
	Redirect(Operator),
}

/// Splits a raw line on spaces. No quoting, no escaping.
///
/// Bytes are kept as read, so words need not be valid UTF-8.
pub fn tokenize<B: AsRef<[u8]> + ?Sized>(line: &B) -> Vec<OsString> {
	let mut line = line.as_ref();
	while let Some((&c, rest)) = line.split_last() {
		if c != b'\n' && c != b'\r' { break; }
		line = rest;
	}
	line.split(|&c| c == b' ')
		.filter(|t| !t.is_empty())
		.map(|t| OsString::from_vec(t.to_vec()))
		.collect()
}

struct Scanner<'a> {
	token: &'a [u8],
	i: usize,
}

impl<'a> Scanner<'a> {
	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.token.get(self.i) {
			if !f(*c) { break; }
			self.i += 1;
		}
	}

	fn read_number(&mut self) -> Option<&'a [u8]> {
		let orig = self.i;
		self.proceed_while(|c| c.is_ascii_digit());
		if orig == self.i {
			None
		} else {
			Some(&self.token[orig .. self.i])
		}
	}

	fn eat(&mut self, c: u8) -> bool {
		if self.token.get(self.i) == Some(&c) {
			self.i += 1;
			true
		} else {
			false
		}
	}

	fn at_end(&self) -> bool {
		self.i == self.token.len()
	}
}

fn lossy(token: &OsStr) -> String {
	token.to_string_lossy().into_owned()
}

fn parse_fd(digits: &[u8], token: &OsStr) -> Result<RawFd, ParseError> {
	std::str::from_utf8(digits).ok()
		.and_then(|s| s.parse().ok())
		.ok_or_else(|| ParseError::DescriptorRange(lossy(token)))
}

/// Classifies one token of the pipeline grammar.
///
/// Anything that does not have the exact shape of an operator is a word,
/// so `a>b` or `>>>` are passed through to the program untouched.
pub fn classify<S: AsRef<OsStr> + ?Sized>(token: &S) -> Result<Token, ParseError> {
	let token = token.as_ref();
	match token.as_bytes() {
		b"|" => return Ok(Token::Pipe),
		b"&" => return Ok(Token::Detach),
		b"<" => return Ok(Token::Redirect(Operator::File { typ: RedirectType::Input, destination: Destination::Stdin })),
		_ => {},
	}

	let mut s = Scanner { token: token.as_bytes(), i: 0 };
	let number = s.read_number();
	if !s.eat(b'>') {
		return Ok(Token::Word);
	}
	if s.eat(b'&') {
		let source = match s.read_number() {
			Some(digits) if s.at_end() => parse_fd(digits, token)?,
			_ => return Err(ParseError::BadDuplication(lossy(token))),
		};
		let destination = destination_of(number, token)?;
		return Ok(Token::Redirect(Operator::Dup { destination: destination, source: source }));
	}
	let typ = if s.eat(b'>') { RedirectType::Append } else { RedirectType::Output };
	if !s.at_end() {
		return Ok(Token::Word);
	}
	let destination = destination_of(number, token)?;
	Ok(Token::Redirect(Operator::File { typ: typ, destination: destination }))
}

fn destination_of(number: Option<&[u8]>, token: &OsStr) -> Result<Destination, ParseError> {
	match number {
		None => Ok(Destination::Stdout),
		Some(digits) => parse_fd(digits, token).map(Destination::from_fd),
	}
}
