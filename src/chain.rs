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

//! The block chain: a singly-linked list of blocks belonging to one stream (directory or file).

use crate::bitmap::Bitmap;
use crate::block::Block;
use crate::block::BlockDevice;
use crate::block::NO_NEXT;
use crate::error::FsResult;

/// Allocates one free block, links it after `tail_blk`, and returns its number.
///
/// `tail` must be the in-memory image of block `tail_blk` as currently on disk; this function
/// updates its `next` pointer and persists it, then formats and persists the new block. The
/// caller is expected to continue from the new block rather than reuse `tail` (see spec.md §9,
/// open question 1: never trust a stale `next`/`curr` pair after an enlarge).
pub fn enlarge(dev: &BlockDevice, bitmap: &Bitmap, tail_blk: i64, tail: &mut Block) -> FsResult<i64> {
	let new_blk = bitmap.find_run(1)?;
	dev.write_block(new_blk, &Block::empty())?;
	tail.next = new_blk;
	dev.write_block(tail_blk, tail)?;
	Ok(new_blk)
}

/// Frees every block reachable from `start_blk` along `next` links, clearing each block's
/// bitmap bit and header. Safe to call with [`NO_NEXT`]: it returns immediately.
pub fn release_chain(dev: &BlockDevice, bitmap: &Bitmap, start_blk: i64) -> FsResult<()> {
	let mut curr = start_blk;
	while curr != NO_NEXT {
		let block = dev.read_block(curr)?;
		let next = block.next;
		dev.write_block(curr, &Block::empty())?;
		bitmap.set_bit(curr, false)?;
		curr = next;
	}
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::fmt::format_image;
	use crate::superblock::Superblock;

	fn setup(blocks: i64) -> (tempfile::NamedTempFile, BlockDevice, Superblock) {
		let file = tempfile::NamedTempFile::new().unwrap();
		std::fs::File::create(file.path())
			.unwrap()
			.set_len(blocks as u64 * crate::block::BLOCK_SIZE as u64)
			.unwrap();
		let dev = BlockDevice::open(file.path());
		format_image(&dev, blocks).unwrap();
		let sb = Superblock::read(&dev).unwrap();
		(file, dev, sb)
	}

	#[test]
	fn enlarge_links_and_allocates() {
		let (_file, dev, sb) = setup(4096);
		let bitmap = Bitmap::new(&dev, sb);
		let mut tail = dev.read_block(sb.first_blk).unwrap();
		let new_blk = enlarge(&dev, &bitmap, sb.first_blk, &mut tail).unwrap();
		assert!(bitmap.get_bit(new_blk).unwrap());
		let persisted = dev.read_block(sb.first_blk).unwrap();
		assert_eq!(persisted.next, new_blk);
		let fresh = dev.read_block(new_blk).unwrap();
		assert_eq!(fresh.size, 0);
		assert_eq!(fresh.next, NO_NEXT);
	}

	#[test]
	fn release_chain_frees_every_block() {
		let (_file, dev, sb) = setup(4096);
		let bitmap = Bitmap::new(&dev, sb);
		let mut tail = dev.read_block(sb.first_blk).unwrap();
		let b1 = enlarge(&dev, &bitmap, sb.first_blk, &mut tail).unwrap();
		let mut tail2 = dev.read_block(b1).unwrap();
		let b2 = enlarge(&dev, &bitmap, b1, &mut tail2).unwrap();

		release_chain(&dev, &bitmap, b1).unwrap();

		assert!(!bitmap.get_bit(b1).unwrap());
		assert!(!bitmap.get_bit(b2).unwrap());
		let cleared = dev.read_block(b1).unwrap();
		assert_eq!(cleared.size, 0);
		assert_eq!(cleared.next, NO_NEXT);
	}

	#[test]
	fn release_chain_on_empty_is_a_noop() {
		let (_file, dev, sb) = setup(4096);
		let bitmap = Bitmap::new(&dev, sb);
		release_chain(&dev, &bitmap, NO_NEXT).unwrap();
	}
}
