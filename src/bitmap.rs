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

//! The free-space bitmap: one bit per block, MSB-first within each byte, stored starting at
//! block 1.

use crate::block::BlockDevice;
use crate::block::BLOCK_SIZE;
use crate::block::NO_NEXT;
use crate::error::FsError;
use crate::error::FsResult;
use crate::superblock::Superblock;

/// Bit-level access to the allocation bitmap of one mounted image.
pub struct Bitmap<'a> {
	dev: &'a BlockDevice,
	sb: Superblock,
}

impl<'a> Bitmap<'a> {
	/// Wraps `dev`'s bitmap region as described by `sb`.
	pub fn new(dev: &'a BlockDevice, sb: Superblock) -> Self {
		Self { dev, sb }
	}

	/// Byte offset, within the backing file, of the byte holding bit `n`.
	fn byte_offset(n: i64) -> u64 {
		BLOCK_SIZE as u64 + (n as u64 / 8)
	}

	/// Reads bit `n`: `true` if block `n` is allocated.
	pub fn get_bit(&self, n: i64) -> FsResult<bool> {
		if n == NO_NEXT {
			return Err(FsError::Invalid);
		}
		let mut byte = [0u8; 1];
		self.dev.read_raw(Self::byte_offset(n), &mut byte)?;
		let mask = 0x80u8 >> (n % 8);
		Ok(byte[0] & mask != 0)
	}

	/// Sets or clears bit `n`.
	pub fn set_bit(&self, n: i64, value: bool) -> FsResult<()> {
		if n == NO_NEXT {
			return Err(FsError::Invalid);
		}
		let offset = Self::byte_offset(n);
		let mut byte = [0u8; 1];
		self.dev.read_raw(offset, &mut byte)?;
		let mask = 0x80u8 >> (n % 8);
		if value {
			byte[0] |= mask;
		} else {
			byte[0] &= !mask;
		}
		self.dev.write_raw(offset, &byte)
	}

	/// Scans for the first run of `count` consecutive free blocks, at or after the first
	/// eligible data block (`1 + bitmap_blocks + 1`, i.e. one past the root directory's first
	/// block), and marks them allocated on success.
	///
	/// On failure returns [`FsError::OutOfSpace`] carrying the total number of free blocks
	/// observed during the scan, for diagnostics.
	pub fn find_run(&self, count: i64) -> FsResult<i64> {
		if count <= 0 {
			return Err(FsError::Invalid);
		}
		let first_data_blk = 1 + self.sb.bitmap + 1;
		let last = self.sb.fs_size - 1;

		let mut free_count: u64 = 0;
		let mut run_len: i64 = 0;
		let mut run_start = first_data_blk;

		let mut blk = first_data_blk;
		while blk < last {
			if !self.get_bit(blk)? {
				run_len += 1;
				free_count += 1;
				if run_len == count {
					for i in 0..count {
						self.set_bit(run_start + i, true)?;
					}
					return Ok(run_start);
				}
			} else {
				run_len = 0;
				run_start = blk + 1;
			}
			blk += 1;
		}

		Err(FsError::OutOfSpace {
			free_blocks: free_count,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::fmt::format_image;
	use tempfile::NamedTempFile;

	fn image(blocks: i64) -> (NamedTempFile, Superblock) {
		let file = NamedTempFile::new().unwrap();
		let path = file.path();
		std::fs::File::create(path)
			.unwrap()
			.set_len(blocks as u64 * BLOCK_SIZE as u64)
			.unwrap();
		let dev = BlockDevice::open(path);
		format_image(&dev, blocks).unwrap();
		let sb = Superblock::read(&dev).unwrap();
		(file, sb)
	}

	#[test]
	fn set_and_get_bit() {
		let (file, sb) = image(4096);
		let dev = BlockDevice::open(file.path());
		let bm = Bitmap::new(&dev, sb);
		let blk = sb.first_blk + 10;
		assert!(!bm.get_bit(blk).unwrap());
		bm.set_bit(blk, true).unwrap();
		assert!(bm.get_bit(blk).unwrap());
		bm.set_bit(blk, false).unwrap();
		assert!(!bm.get_bit(blk).unwrap());
	}

	#[test]
	fn find_run_first_fit() {
		let (file, sb) = image(4096);
		let dev = BlockDevice::open(file.path());
		let bm = Bitmap::new(&dev, sb);
		let start = bm.find_run(1).unwrap();
		assert_eq!(start, sb.first_blk + 1);
		assert!(bm.get_bit(start).unwrap());
	}

	#[test]
	fn find_run_reports_free_count_on_failure() {
		let (file, sb) = image(2048);
		let dev = BlockDevice::open(file.path());
		let bm = Bitmap::new(&dev, sb);
		let err = bm.find_run(sb.fs_size).unwrap_err();
		match err {
			FsError::OutOfSpace { free_blocks } => assert!(free_blocks > 0),
			other => panic!("expected OutOfSpace, got {other:?}"),
		}
	}
}
