/*
 * Copyright 2025 Luc Lenôtre
 *
 * This file is part of Maestro.
 *
 * Maestro is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Maestro is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Maestro. If not, see <https://www.gnu.org/licenses/>.
 */

//! Errors produced by the filesystem core.

use std::fmt;
use std::io;

/// An error returned by a filesystem operation.
///
/// Each variant corresponds to one of the error classes from the design: a host binding (e.g. a
/// FUSE layer) is expected to map these to the matching errno.
#[derive(Debug)]
pub enum FsError {
	/// The path does not resolve to an existing entry.
	NoEntry,
	/// The target name is already taken in the intended directory.
	Exists,
	/// The operation is forbidden by policy (e.g. `mkdir` below root, `mknod` at root).
	NotPermitted,
	/// A file was expected but a directory was found.
	IsADirectory,
	/// A directory was expected but a file was found.
	NotADirectory,
	/// `rmdir` was called on a non-empty directory.
	NotEmpty,
	/// A name or extension exceeds the length limit.
	NameTooLong,
	/// A write's offset is past the current file size.
	FileTooBig,
	/// The allocator could not find a large enough run of free blocks.
	///
	/// `free_blocks` carries the total free-bit count observed during the failed scan, mirroring
	/// the diagnostic value the allocator reports on failure.
	OutOfSpace {
		/// Number of free blocks seen while scanning, even though no run of the requested size
		/// exists.
		free_blocks: u64,
	},
	/// The path is malformed, or a caller violated an internal precondition.
	Invalid,
	/// The backing block device failed.
	Io(io::Error),
}

impl fmt::Display for FsError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::NoEntry => write!(f, "no such file or directory"),
			Self::Exists => write!(f, "file exists"),
			Self::NotPermitted => write!(f, "operation not permitted"),
			Self::IsADirectory => write!(f, "is a directory"),
			Self::NotADirectory => write!(f, "not a directory"),
			Self::NotEmpty => write!(f, "directory not empty"),
			Self::NameTooLong => write!(f, "name too long"),
			Self::FileTooBig => write!(f, "file too large"),
			Self::OutOfSpace { free_blocks } => {
				write!(f, "no space left on device ({free_blocks} blocks free)")
			}
			Self::Invalid => write!(f, "invalid argument"),
			Self::Io(e) => write!(f, "{e}"),
		}
	}
}

impl std::error::Error for FsError {}

impl From<io::Error> for FsError {
	fn from(e: io::Error) -> Self {
		Self::Io(e)
	}
}

/// Result type used throughout the filesystem core.
pub type FsResult<T> = Result<T, FsError>;
