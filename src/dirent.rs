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

//! The directory entry engine: a block chain treated as a packed, append-structured table of
//! fixed-size records.

use crate::bitmap::Bitmap;
use crate::block::Block;
use crate::block::BlockDevice;
use crate::block::MAX_DATA_PER_BLOCK;
use crate::block::MAX_EXTENSION;
use crate::block::MAX_FILENAME;
use crate::block::NO_NEXT;
use crate::chain;
use crate::error::FsError;
use crate::error::FsResult;

/// On-disk size of one directory entry (name + ext + fsize + start_block + flag, naturally
/// aligned: 9 + 4 + 3 pad + 8 + 8 + 4 + 4 pad = 40 bytes, matching spec.md §6).
pub const ENTRY_SIZE: usize = 40;

/// The kind an entry denotes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
	Unused,
	File,
	Directory,
}

impl EntryKind {
	fn from_i32(v: i32) -> FsResult<Self> {
		match v {
			0 => Ok(Self::Unused),
			1 => Ok(Self::File),
			2 => Ok(Self::Directory),
			_ => Err(FsError::Invalid),
		}
	}

	fn to_i32(self) -> i32 {
		match self {
			Self::Unused => 0,
			Self::File => 1,
			Self::Directory => 2,
		}
	}
}

/// One directory record: a child file or directory.
#[derive(Clone, Debug)]
pub struct DirEntry {
	pub name: [u8; MAX_FILENAME + 1],
	pub ext: [u8; MAX_EXTENSION + 1],
	pub fsize: u64,
	pub start_block: i64,
	pub flag: EntryKind,
}

impl DirEntry {
	/// Builds an entry from trusted, already-validated `name`/`ext` strings (ASCII, within the
	/// length limits; see [`crate::path`] for validation).
	pub fn new(name: &str, ext: &str, fsize: u64, start_block: i64, flag: EntryKind) -> Self {
		let mut n = [0u8; MAX_FILENAME + 1];
		n[..name.len()].copy_from_slice(name.as_bytes());
		let mut e = [0u8; MAX_EXTENSION + 1];
		e[..ext.len()].copy_from_slice(ext.as_bytes());
		Self {
			name: n,
			ext: e,
			fsize,
			start_block,
			flag,
		}
	}

	/// The NUL-trimmed name, as stored.
	pub fn name_str(&self) -> String {
		trimmed(&self.name)
	}

	/// The NUL-trimmed extension, as stored (empty for directories).
	pub fn ext_str(&self) -> String {
		trimmed(&self.ext)
	}

	/// The display name: `name` alone, or `name.ext` when an extension is present.
	pub fn display_name(&self) -> String {
		let ext = self.ext_str();
		if ext.is_empty() {
			self.name_str()
		} else {
			format!("{}.{}", self.name_str(), ext)
		}
	}

	fn matches(&self, name: &str, ext: &str) -> bool {
		self.name_str() == name && self.ext_str() == ext
	}

	fn from_bytes(buf: &[u8; ENTRY_SIZE]) -> FsResult<Self> {
		let mut name = [0u8; MAX_FILENAME + 1];
		name.copy_from_slice(&buf[0..9]);
		let mut ext = [0u8; MAX_EXTENSION + 1];
		ext.copy_from_slice(&buf[9..13]);
		let fsize = u64::from_le_bytes(buf[16..24].try_into().unwrap());
		let start_block = i64::from_le_bytes(buf[24..32].try_into().unwrap());
		let flag = i32::from_le_bytes(buf[32..36].try_into().unwrap());
		Ok(Self {
			name,
			ext,
			fsize,
			start_block,
			flag: EntryKind::from_i32(flag)?,
		})
	}

	fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
		let mut buf = [0u8; ENTRY_SIZE];
		buf[0..9].copy_from_slice(&self.name);
		buf[9..13].copy_from_slice(&self.ext);
		buf[16..24].copy_from_slice(&self.fsize.to_le_bytes());
		buf[24..32].copy_from_slice(&self.start_block.to_le_bytes());
		buf[32..36].copy_from_slice(&self.flag.to_i32().to_le_bytes());
		buf
	}
}

fn trimmed(buf: &[u8]) -> String {
	let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
	String::from_utf8_lossy(&buf[..end]).into_owned()
}

fn entries_in(block: &Block) -> FsResult<Vec<DirEntry>> {
	let count = block.size as usize / ENTRY_SIZE;
	let mut out = Vec::with_capacity(count);
	for i in 0..count {
		let off = i * ENTRY_SIZE;
		let raw: [u8; ENTRY_SIZE] = block.data[off..off + ENTRY_SIZE].try_into().unwrap();
		out.push(DirEntry::from_bytes(&raw)?);
	}
	Ok(out)
}

fn write_entry_at(block: &mut Block, index: usize, entry: &DirEntry) {
	let off = index * ENTRY_SIZE;
	block.data[off..off + ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
}

/// Finds `(containing_block, entry)` for the child named `(name, ext)` within the directory
/// chain rooted at `chain_head`.
pub fn lookup(
	dev: &BlockDevice,
	chain_head: i64,
	name: &str,
	ext: &str,
) -> FsResult<Option<(i64, DirEntry)>> {
	let mut blk = chain_head;
	while blk != NO_NEXT {
		let block = dev.read_block(blk)?;
		for entry in entries_in(&block)? {
			if entry.matches(name, ext) {
				return Ok(Some((blk, entry)));
			}
		}
		blk = block.next;
	}
	Ok(None)
}

/// Appends `entry` to the last block of the chain rooted at `chain_head`, enlarging the chain
/// if the last block is full. The caller must have already ensured no duplicate `(name, ext)`
/// exists.
pub fn insert(
	dev: &BlockDevice,
	bitmap: &Bitmap,
	chain_head: i64,
	entry: &DirEntry,
) -> FsResult<()> {
	let mut blk = chain_head;
	let mut block = dev.read_block(blk)?;
	while block.next != NO_NEXT {
		blk = block.next;
		block = dev.read_block(blk)?;
	}

	if block.size as usize + ENTRY_SIZE > MAX_DATA_PER_BLOCK {
		let new_blk = chain::enlarge(dev, bitmap, blk, &mut block)?;
		blk = new_blk;
		block = Block::empty();
	}

	let index = block.size as usize / ENTRY_SIZE;
	write_entry_at(&mut block, index, entry);
	block.size += ENTRY_SIZE as u64;
	dev.write_block(blk, &block)
}

/// Rewrites an existing entry, matched by `(flag, name, ext)`, within `containing_block`.
pub fn update(dev: &BlockDevice, containing_block: i64, entry: &DirEntry) -> FsResult<()> {
	let mut block = dev.read_block(containing_block)?;
	let count = block.size as usize / ENTRY_SIZE;
	for i in 0..count {
		let off = i * ENTRY_SIZE;
		let raw: [u8; ENTRY_SIZE] = block.data[off..off + ENTRY_SIZE].try_into().unwrap();
		let existing = DirEntry::from_bytes(&raw)?;
		if existing.flag == entry.flag && existing.matches(&entry.name_str(), &entry.ext_str()) {
			write_entry_at(&mut block, i, entry);
			return dev.write_block(containing_block, &block);
		}
	}
	Err(FsError::NoEntry)
}

/// Removes the entry matching `(flag, name, ext)` of `entry` from `containing_block`: frees its
/// own chain, swap-deletes it against the last live entry in the block, and compacts across
/// blocks so every directory block (but the last) stays full (spec.md §4.4).
pub fn remove(
	dev: &BlockDevice,
	bitmap: &Bitmap,
	containing_block: i64,
	entry: &DirEntry,
) -> FsResult<()> {
	let mut block = dev.read_block(containing_block)?;
	let count = block.size as usize / ENTRY_SIZE;
	let mut found = None;
	for i in 0..count {
		let off = i * ENTRY_SIZE;
		let raw: [u8; ENTRY_SIZE] = block.data[off..off + ENTRY_SIZE].try_into().unwrap();
		let existing = DirEntry::from_bytes(&raw)?;
		if existing.flag == entry.flag && existing.matches(&entry.name_str(), &entry.ext_str()) {
			found = Some(i);
			break;
		}
	}
	let index = found.ok_or(FsError::NoEntry)?;

	chain::release_chain(dev, bitmap, entry.start_block)?;

	let last_index = count - 1;
	if index != last_index {
		let off = last_index * ENTRY_SIZE;
		let raw: [u8; ENTRY_SIZE] = block.data[off..off + ENTRY_SIZE].try_into().unwrap();
		let last = DirEntry::from_bytes(&raw)?;
		write_entry_at(&mut block, index, &last);
	}
	block.size -= ENTRY_SIZE as u64;
	dev.write_block(containing_block, &block)?;

	let mut curr_blk = containing_block;
	let mut curr = dev.read_block(curr_blk)?;
	loop {
		let next_blk = curr.next;
		if next_blk == NO_NEXT {
			break;
		}
		let mut next = dev.read_block(next_blk)?;
		let next_count = next.size as usize / ENTRY_SIZE;
		if next_count == 0 {
			curr.next = NO_NEXT;
			dev.write_block(curr_blk, &curr)?;
			chain::release_chain(dev, bitmap, next_blk)?;
			break;
		}

		let pulled_off = (next_count - 1) * ENTRY_SIZE;
		let raw: [u8; ENTRY_SIZE] = next.data[pulled_off..pulled_off + ENTRY_SIZE]
			.try_into()
			.unwrap();
		let pulled = DirEntry::from_bytes(&raw)?;
		next.size -= ENTRY_SIZE as u64;

		let curr_index = curr.size as usize / ENTRY_SIZE;
		write_entry_at(&mut curr, curr_index, &pulled);
		curr.size += ENTRY_SIZE as u64;

		dev.write_block(curr_blk, &curr)?;

		if next.size == 0 {
			curr.next = NO_NEXT;
			dev.write_block(curr_blk, &curr)?;
			chain::release_chain(dev, bitmap, next_blk)?;
			break;
		}
		dev.write_block(next_blk, &next)?;

		curr_blk = next_blk;
		curr = next;
	}

	Ok(())
}

/// Lists every live entry in the directory chain rooted at `chain_head`, in on-disk order.
pub fn list_all(dev: &BlockDevice, chain_head: i64) -> FsResult<Vec<DirEntry>> {
	let mut out = Vec::new();
	let mut blk = chain_head;
	while blk != NO_NEXT {
		let block = dev.read_block(blk)?;
		out.extend(entries_in(&block)?);
		blk = block.next;
	}
	Ok(out)
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
	fn insert_then_lookup() {
		let (_f, dev, sb) = setup(4096);
		let bitmap = Bitmap::new(&dev, sb);
		let e = DirEntry::new("foo", "txt", 0, 999, EntryKind::File);
		insert(&dev, &bitmap, sb.first_blk, &e).unwrap();
		let (blk, found) = lookup(&dev, sb.first_blk, "foo", "txt").unwrap().unwrap();
		assert_eq!(blk, sb.first_blk);
		assert_eq!(found.start_block, 999);
		assert_eq!(found.flag, EntryKind::File);
	}

	#[test]
	fn insert_overflows_into_second_block() {
		let (_f, dev, sb) = setup(8192);
		let bitmap = Bitmap::new(&dev, sb);
		let per_block = MAX_DATA_PER_BLOCK / ENTRY_SIZE;
		for i in 0..(per_block + 1) {
			let name = format!("f{i}");
			let e = DirEntry::new(&name, "", 0, sb.first_blk + 100 + i as i64, EntryKind::File);
			insert(&dev, &bitmap, sb.first_blk, &e).unwrap();
		}
		let all = list_all(&dev, sb.first_blk).unwrap();
		assert_eq!(all.len(), per_block + 1);
		let first = dev.read_block(sb.first_blk).unwrap();
		assert_ne!(first.next, NO_NEXT);
	}

	#[test]
	fn remove_swap_deletes_and_compacts() {
		let (_f, dev, sb) = setup(8192);
		let bitmap = Bitmap::new(&dev, sb);
		let per_block = MAX_DATA_PER_BLOCK / ENTRY_SIZE;
		let total = per_block + 5;
		for i in 0..total {
			let name = format!("f{i}");
			let start = bitmap.find_run(1).unwrap();
			let e = DirEntry::new(&name, "", 0, start, EntryKind::File);
			insert(&dev, &bitmap, sb.first_blk, &e).unwrap();
		}
		let (blk0, victim) = lookup(&dev, sb.first_blk, "f0", "").unwrap().unwrap();
		remove(&dev, &bitmap, blk0, &victim).unwrap();

		let all = list_all(&dev, sb.first_blk).unwrap();
		assert_eq!(all.len(), total - 1);
		assert!(lookup(&dev, sb.first_blk, "f0", "").unwrap().is_none());

		for block_no in [sb.first_blk] {
			let b = dev.read_block(block_no).unwrap();
			assert_eq!(b.size % ENTRY_SIZE as u64, 0);
		}
	}
}
