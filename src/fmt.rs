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

//! The one-shot disk-image formatter: writes the initial superblock, bitmap and root directory
//! block of a fresh image.
//!
//! spec.md treats the formatter as an external collaborator scoped out of the core; it is kept
//! here anyway, grounded directly on `diskimg_init.c`, because it is short, makes the on-disk
//! contract from spec.md §6 directly testable, and backs the `mkfs` subcommand.

use crate::block::Block;
use crate::block::BlockDevice;
use crate::block::BITMAP_BLOCKS;
use crate::block::BLOCK_SIZE;
use crate::error::FsResult;
use crate::superblock::Superblock;

/// Formats `dev` as a fresh image of `fs_size` blocks.
///
/// Writes, in order: the superblock (block 0), the bitmap region (blocks `1..=bitmap_blocks`,
/// with the reserved range -- superblock, bitmap blocks and the root's first block -- marked
/// allocated and the rest cleared), and an empty root directory block at `first_blk`.
pub fn format_image(dev: &BlockDevice, fs_size: i64) -> FsResult<()> {
	let bitmap_blocks = BITMAP_BLOCKS as i64;
	let first_blk = 1 + bitmap_blocks;

	let sb = Superblock {
		fs_size,
		first_blk,
		bitmap: bitmap_blocks,
	};
	sb.write(dev)?;

	// Blocks 0..bitmap_blocks (superblock plus every bitmap block) are reserved, so their bits
	// are set for free. bitmap_blocks/8 whole bytes cover blocks 0..bitmap_blocks-1; one more
	// byte covers bitmap_blocks (the last bitmap block) and bitmap_blocks+1 (the root's first
	// block, i.e. first_blk). The rest of the region is cleared.
	let region_bytes = bitmap_blocks as usize * BLOCK_SIZE;
	let mut region = vec![0u8; region_bytes];
	let reserved_whole_bytes = (bitmap_blocks / 8) as usize;
	for byte in region.iter_mut().take(reserved_whole_bytes) {
		*byte = 0xFF;
	}
	region[reserved_whole_bytes] = 0b1100_0000;
	dev.write_raw(BLOCK_SIZE as u64, &region)?;

	dev.write_block(first_blk, &Block::empty())?;

	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::bitmap::Bitmap;

	fn formatted(blocks: i64) -> (tempfile::NamedTempFile, BlockDevice) {
		let file = tempfile::NamedTempFile::new().unwrap();
		std::fs::File::create(file.path())
			.unwrap()
			.set_len(blocks as u64 * BLOCK_SIZE as u64)
			.unwrap();
		let dev = BlockDevice::open(file.path());
		format_image(&dev, blocks).unwrap();
		(file, dev)
	}

	#[test]
	fn writes_consistent_superblock() {
		let (_f, dev) = formatted(20480);
		let sb = Superblock::read(&dev).unwrap();
		assert_eq!(sb.fs_size, 20480);
		assert_eq!(sb.bitmap, BITMAP_BLOCKS as i64);
		assert_eq!(sb.first_blk, 1 + BITMAP_BLOCKS as i64);
	}

	#[test]
	fn root_block_is_empty() {
		let (_f, dev) = formatted(20480);
		let sb = Superblock::read(&dev).unwrap();
		let root = dev.read_block(sb.first_blk).unwrap();
		assert_eq!(root.size, 0);
		assert_eq!(root.next, crate::block::NO_NEXT);
	}

	#[test]
	fn reserved_blocks_are_marked_allocated() {
		let (_f, dev) = formatted(20480);
		let sb = Superblock::read(&dev).unwrap();
		let bitmap = Bitmap::new(&dev, sb);
		for blk in 1..=sb.bitmap {
			assert!(bitmap.get_bit(blk).unwrap(), "block {blk} should be reserved");
		}
		assert!(bitmap.get_bit(sb.first_blk).unwrap());
		assert!(!bitmap.get_bit(sb.first_blk + 1).unwrap());
	}
}
