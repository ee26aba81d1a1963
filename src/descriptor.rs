use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use nix::fcntl::{self, FcntlArg};
use nix::unistd;
use tracing::warn;

use crate::types::Redirections;

/// Saved copies live at or above this number, clear of the low descriptors
/// users address with `N>`.
const SAVE_FLOOR: RawFd = 10;

const STANDARD: [RawFd; 3] = [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO];

/// Close-on-exec duplicate of `fd` numbered `floor` or higher.
pub fn dup_above(fd: RawFd, floor: RawFd) -> nix::Result<RawFd> {
	fcntl::fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(floor))
}

/// The session's canonical standard streams, captured once at startup.
#[derive(Debug)]
pub struct Snapshot {
	saved: [OwnedFd; 3],
}

impl Snapshot {
	pub fn capture() -> nix::Result<Snapshot> {
		let save = |fd: RawFd| -> nix::Result<OwnedFd> {
			let copy = dup_above(fd, SAVE_FLOOR)?;
			Ok(unsafe { OwnedFd::from_raw_fd(copy) })
		};
		Ok(Snapshot { saved: [save(STANDARD[0])?, save(STANDARD[1])?, save(STANDARD[2])?] })
	}

	/// Returns a guard that puts the canonical streams back on every
	/// standard slot `redirections` rewires, when it goes out of scope.
	pub fn restore_on_exit(&self, redirections: &Redirections) -> Restore<'_> {
		let mut slots = [false; 3];
		for (slot, &fd) in slots.iter_mut().zip(STANDARD.iter()) {
			*slot = redirections.rewires(fd);
		}
		Restore { snapshot: self, slots: slots }
	}

	fn restore(&self, fd: RawFd) -> nix::Result<()> {
		unistd::dup2(self.saved[fd as usize].as_raw_fd(), fd).map(|_| ())
	}
}

#[must_use]
pub struct Restore<'a> {
	snapshot: &'a Snapshot,
	slots: [bool; 3],
}

impl<'a> Drop for Restore<'a> {
	fn drop(&mut self) {
		for (&rewired, &fd) in self.slots.iter().zip(STANDARD.iter()) {
			if !rewired { continue; }
			if let Err(e) = self.snapshot.restore(fd) {
				warn!(fd = fd, error = %e, "failed to restore standard stream");
			}
		}
	}
}
