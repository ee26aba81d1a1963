use std::ffi::NulError;
use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// A command line that cannot be run as written. Nothing has been opened or
/// spawned when one of these is returned.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
	#[error("missing target after '{0}'")]
	MissingTarget(String),

	#[error("descriptor number out of range in '{0}'")]
	DescriptorRange(String),

	#[error("malformed duplication '{0}'")]
	BadDuplication(String),

	#[error("empty command in pipeline")]
	EmptySegment,

	#[error("'&' is only allowed at the end of a command line")]
	MisplacedDetach,
}

#[derive(Error, Debug)]
pub enum ShellError {
	#[error(transparent)]
	Parse(#[from] ParseError),

	#[error("{}: {source}", .path.display())]
	Open {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("{op}: {source}")]
	Resource {
		op: &'static str,
		#[source]
		source: Errno,
	},

	#[error("argument contains a nul byte")]
	Nul(#[from] NulError),
}

impl ShellError {
	pub fn resource(op: &'static str, source: Errno) -> ShellError {
		ShellError::Resource { op: op, source: source }
	}

	/// Status reported for a command line that failed before running.
	pub fn status(&self) -> i32 {
		match *self {
			ShellError::Parse(_) => 2,
			_ => 1,
		}
	}
}
