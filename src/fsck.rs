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

//! A read-only consistency checker: walks the bitmap and every reachable chain and reports
//! violations of the invariants in spec.md §8. It never writes to the image.

use std::collections::HashSet;
use std::fmt;

use crate::bitmap::Bitmap;
use crate::block::BlockDevice;
use crate::block::NO_NEXT;
use crate::dirent;
use crate::dirent::EntryKind;
use crate::error::FsResult;
use crate::superblock::Superblock;

/// One detected inconsistency.
#[derive(Debug, PartialEq, Eq)]
pub enum Problem {
	/// A block is reachable from a chain but its bitmap bit is clear.
	ReachableButFree(i64),
	/// A block is reachable from two different chains (shared or cyclic storage).
	ReachableTwice(i64),
	/// A directory block's `size` is not a multiple of the entry size.
	MisalignedDirectorySize(i64),
	/// An entry's `start_block` lies outside the image or inside the reserved region.
	StartBlockOutOfRange(i64),
}

impl fmt::Display for Problem {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::ReachableButFree(b) => write!(f, "block {b} is in use but marked free"),
			Self::ReachableTwice(b) => write!(f, "block {b} is referenced by more than one chain"),
			Self::MisalignedDirectorySize(b) => {
				write!(f, "directory block {b} has a size not aligned to the entry size")
			}
			Self::StartBlockOutOfRange(b) => {
				write!(f, "entry start block {b} is out of range")
			}
		}
	}
}

/// A full report produced by [`check`].
#[derive(Debug, Default)]
pub struct Report {
	pub problems: Vec<Problem>,
	pub blocks_visited: u64,
}

impl Report {
	pub fn is_clean(&self) -> bool {
		self.problems.is_empty()
	}
}

fn walk_chain(
	dev: &BlockDevice,
	bitmap: &Bitmap,
	sb: &Superblock,
	start: i64,
	seen: &mut HashSet<i64>,
	report: &mut Report,
	is_directory: bool,
) -> FsResult<()> {
	let mut blk = start;
	while blk != NO_NEXT {
		if blk < sb.first_blk || blk >= sb.fs_size {
			report.problems.push(Problem::StartBlockOutOfRange(blk));
			return Ok(());
		}
		if !seen.insert(blk) {
			report.problems.push(Problem::ReachableTwice(blk));
			return Ok(());
		}
		if !bitmap.get_bit(blk)? {
			report.problems.push(Problem::ReachableButFree(blk));
		}
		report.blocks_visited += 1;

		let block = dev.read_block(blk)?;
		if is_directory && block.size as usize % dirent::ENTRY_SIZE != 0 {
			report.problems.push(Problem::MisalignedDirectorySize(blk));
		}
		blk = block.next;
	}
	Ok(())
}

/// Walks the whole tree (root, every root-level directory, every file chain) and reports every
/// inconsistency found. Read-only: it never mutates the image.
pub fn check(dev: &BlockDevice) -> FsResult<Report> {
	let sb = Superblock::read(dev)?;
	let bitmap = Bitmap::new(dev, sb);
	let mut seen = HashSet::new();
	let mut report = Report::default();

	walk_chain(dev, &bitmap, &sb, sb.first_blk, &mut seen, &mut report, true)?;

	for entry in dirent::list_all(dev, sb.first_blk)? {
		let is_dir = entry.flag == EntryKind::Directory;
		walk_chain(
			dev,
			&bitmap,
			&sb,
			entry.start_block,
			&mut seen,
			&mut report,
			is_dir,
		)?;
		if is_dir {
			for child in dirent::list_all(dev, entry.start_block)? {
				walk_chain(
					dev,
					&bitmap,
					&sb,
					child.start_block,
					&mut seen,
					&mut report,
					false,
				)?;
			}
		}
	}

	Ok(report)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::block::BLOCK_SIZE;
	use crate::fmt::format_image;
	use crate::fs::FileSystem;

	fn mounted(blocks: i64) -> (tempfile::NamedTempFile, FileSystem) {
		let file = tempfile::NamedTempFile::new().unwrap();
		std::fs::File::create(file.path())
			.unwrap()
			.set_len(blocks as u64 * BLOCK_SIZE as u64)
			.unwrap();
		let dev = BlockDevice::open(file.path());
		format_image(&dev, blocks).unwrap();
		let fs = FileSystem::mount(file.path()).unwrap();
		(file, fs)
	}

	#[test]
	fn fresh_image_is_clean() {
		let (file, _fs) = mounted(4096);
		let dev = BlockDevice::open(file.path());
		let report = check(&dev).unwrap();
		assert!(report.is_clean());
		assert_eq!(report.blocks_visited, 1);
	}

	#[test]
	fn populated_image_is_clean() {
		let (file, fs) = mounted(8192);
		fs.mkdir("/d").unwrap();
		fs.mknod("/d/a").unwrap();
		fs.write("/d/a", &vec![1u8; 1000], 0).unwrap();
		drop(fs);
		let dev = BlockDevice::open(file.path());
		let report = check(&dev).unwrap();
		assert!(report.is_clean(), "{:?}", report.problems);
		assert!(report.blocks_visited >= 4);
	}

	#[test]
	fn detects_block_marked_free_while_reachable() {
		let (file, fs) = mounted(4096);
		fs.mkdir("/d").unwrap();
		drop(fs);

		let dev = BlockDevice::open(file.path());
		let sb = Superblock::read(&dev).unwrap();
		let bitmap = Bitmap::new(&dev, sb);
		let (_, entry) = dirent::lookup(&dev, sb.first_blk, "d", "").unwrap().unwrap();
		bitmap.set_bit(entry.start_block, false).unwrap();

		let report = check(&dev).unwrap();
		assert!(report
			.problems
			.contains(&Problem::ReachableButFree(entry.start_block)));
	}
}
