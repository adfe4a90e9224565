//! The error taxonomy shared by every tool in this workspace.

use std::path::PathBuf;
use thiserror::Error;

/// An error produced by an ext2 operation on the image.
#[derive(Debug, Error)]
pub enum Error {
	/// Bad argument count, or a path that doesn't begin with `/`.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// A path component doesn't exist, on the image or on the host.
	#[error("{0}: no such file or directory")]
	NotFound(PathBuf),

	/// The leaf of a path already exists where a new entry was to be created.
	#[error("{0}: file exists")]
	AlreadyExists(PathBuf),

	/// A non-final path component, or an operation's target, is not a directory.
	#[error("{0}: not a directory")]
	NotADirectory(PathBuf),

	/// The operation's target is a directory, and the operation forbids that.
	#[error("{0}: is a directory")]
	IsADirectory(PathBuf),

	/// The inode or block bitmap is exhausted, or a file needs more than 12 direct blocks.
	#[error("no space left on device")]
	NoSpace,

	/// Failure to open or map the host file.
	#[error(transparent)]
	IoError(#[from] std::io::Error),

	/// The on-disk structure is unparseable: a `rec_len` not a multiple of 4, a chain whose
	/// `rec_len`s don't sum to the block size, or a cycle in a directory chain.
	#[error("corrupt image: {0}")]
	CorruptImage(String),
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
	/// Returns the `errno`-style magnitude used by the CLI front-ends as a process exit code.
	///
	/// Process exit codes are unsigned on every platform Rust targets, so this is the positive
	/// errno magnitude rather than the source's negative-errno convention.
	pub fn exit_code(&self) -> i32 {
		match self {
			Self::InvalidArgument(_) => libc::EINVAL,
			Self::NotFound(_) => libc::ENOENT,
			Self::AlreadyExists(_) => libc::EEXIST,
			Self::NotADirectory(_) => libc::ENOTDIR,
			Self::IsADirectory(_) => libc::EISDIR,
			Self::NoSpace => libc::ENOSPC,
			Self::IoError(_) => libc::EIO,
			Self::CorruptImage(_) => libc::EIO,
		}
	}
}
