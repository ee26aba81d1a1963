use std::ffi::{CString, NulError, OsString};
use std::os::fd::{OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectType { Input, Output, Append }

/// The descriptor slot a redirection lands on inside the launched program.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Destination {
	Stdin,
	Stdout,
	Stderr,
	Fd(RawFd),
}

impl Destination {
	pub fn from_fd(fd: RawFd) -> Destination {
		match fd {
			libc::STDIN_FILENO => Destination::Stdin,
			libc::STDOUT_FILENO => Destination::Stdout,
			libc::STDERR_FILENO => Destination::Stderr,
			n => Destination::Fd(n),
		}
	}

	pub fn fd(self) -> RawFd {
		match self {
			Destination::Stdin => libc::STDIN_FILENO,
			Destination::Stdout => libc::STDOUT_FILENO,
			Destination::Stderr => libc::STDERR_FILENO,
			Destination::Fd(n) => n,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Target {
	Path(PathBuf),
	Fd(RawFd),
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Redirect {
	pub typ: RedirectType,
	pub target: Target,
	pub destination: Destination,
}

/// The redirection plan of one pipeline.
///
/// `None` in a standard slot means the canonical stream is inherited. Every
/// descriptor held here is owned, so dropping the plan (or the half of it a
/// process does not need after `fork`) closes it exactly once.
#[derive(Debug, Default)]
pub struct Redirections {
	pub stdin: Option<OwnedFd>,
	pub stdout: Option<OwnedFd>,
	pub stderr: Option<OwnedFd>,
	/// `(target, file)` for descriptors other than 0, 1 and 2.
	pub numbered: Vec<(RawFd, OwnedFd)>,
	/// `(target, source)` pairs from `N>&M`, applied after every file.
	pub dups: Vec<(RawFd, RawFd)>,
	pub append: bool,
}

impl Redirections {
	pub fn set_file(&mut self, destination: Destination, fd: OwnedFd) {
		let target = destination.fd();
		self.dups.retain(|&(t, _)| t != target);
		match destination {
			Destination::Stdin => self.stdin = Some(fd),
			Destination::Stdout => self.stdout = Some(fd),
			Destination::Stderr => self.stderr = Some(fd),
			Destination::Fd(n) => {
				self.numbered.retain(|&(t, _)| t != n);
				self.numbered.push((n, fd));
			},
		}
	}

	pub fn set_dup(&mut self, destination: Destination, source: RawFd) {
		let target = destination.fd();
		match destination {
			Destination::Stdin => self.stdin = None,
			Destination::Stdout => self.stdout = None,
			Destination::Stderr => self.stderr = None,
			Destination::Fd(n) => self.numbered.retain(|&(t, _)| t != n),
		}
		self.dups.retain(|&(t, _)| t != target);
		self.dups.push((target, source));
	}

	pub fn with_stdin(self, fd: OwnedFd) -> Redirections {
		Redirections { stdin: Some(fd), ..self }
	}

	pub fn with_stdout(self, fd: OwnedFd) -> Redirections {
		Redirections { stdout: Some(fd), ..self }
	}

	/// Whether launching with this plan rewires the standard slot `fd`.
	pub fn rewires(&self, fd: RawFd) -> bool {
		let slot = match Destination::from_fd(fd) {
			Destination::Stdin => self.stdin.is_some(),
			Destination::Stdout => self.stdout.is_some(),
			Destination::Stderr => self.stderr.is_some(),
			Destination::Fd(_) => false,
		};
		slot || self.dups.iter().any(|&(t, _)| t == fd)
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Mode { Foreground, Detached }

/// One pipeline stage, ready for `execvp`.
#[derive(Debug, PartialEq, Eq)]
pub struct Segment {
	pub argv: Vec<CString>,
}

impl Segment {
	pub fn new(tokens: &[OsString]) -> Result<Segment, NulError> {
		let argv: Result<Vec<CString>, NulError> = tokens.iter().map(|t| CString::new(t.as_bytes())).collect();
		Ok(Segment { argv: argv? })
	}

	pub fn name(&self) -> String {
		self.argv.first().map_or_else(String::new, |s| s.to_string_lossy().into_owned())
	}
}
