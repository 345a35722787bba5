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

//! The superblock: block 0's global geometry.

use crate::block::BlockDevice;
use crate::error::FsResult;

/// The number of bytes the superblock actually occupies within block 0.
pub const SUPERBLOCK_USED_BYTES: usize = 24;

/// The image's global geometry, read once at mount time and treated as immutable afterwards
/// (spec.md §5).
#[derive(Clone, Copy, Debug)]
pub struct Superblock {
	/// Total number of blocks in the image.
	pub fs_size: i64,
	/// Block number of the root directory's first block.
	pub first_blk: i64,
	/// Number of blocks reserved for the bitmap.
	pub bitmap: i64,
}

impl Superblock {
	/// Reads the superblock from block 0 of `dev`.
	pub fn read(dev: &BlockDevice) -> FsResult<Self> {
		let mut buf = [0u8; SUPERBLOCK_USED_BYTES];
		dev.read_raw(0, &mut buf)?;
		Ok(Self {
			fs_size: i64::from_le_bytes(buf[0..8].try_into().unwrap()),
			first_blk: i64::from_le_bytes(buf[8..16].try_into().unwrap()),
			bitmap: i64::from_le_bytes(buf[16..24].try_into().unwrap()),
		})
	}

	/// Writes the superblock to block 0 of `dev`. Only used by the formatter: the superblock is
	/// never rewritten once an image is in use.
	pub fn write(&self, dev: &BlockDevice) -> FsResult<()> {
		let mut buf = [0u8; SUPERBLOCK_USED_BYTES];
		buf[0..8].copy_from_slice(&self.fs_size.to_le_bytes());
		buf[8..16].copy_from_slice(&self.first_blk.to_le_bytes());
		buf[16..24].copy_from_slice(&self.bitmap.to_le_bytes());
		dev.write_raw(0, &buf)
	}
}
