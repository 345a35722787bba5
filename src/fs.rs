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

//! The path engine and the high-level filesystem operations built on top of the block device,
//! bitmap, chain and directory-entry layers.

use std::path::Path;

use crate::bitmap::Bitmap;
use crate::block::Block;
use crate::block::BlockDevice;
use crate::block::BLOCK_SIZE;
use crate::block::MAX_DATA_PER_BLOCK;
use crate::block::NO_NEXT;
use crate::chain;
use crate::dirent;
use crate::dirent::DirEntry;
use crate::dirent::EntryKind;
use crate::error::FsError;
use crate::error::FsResult;
use crate::path::parse;
use crate::path::ParsedPath;
use crate::superblock::Superblock;

/// Fixed permission bits reported for every entry (spec.md §4.5: no permission model).
const MODE_BITS: u32 = 0o666;
/// `S_IFDIR`.
const S_IFDIR: u32 = 0o040000;
/// `S_IFREG`.
const S_IFREG: u32 = 0o100000;

/// The kind of filesystem object an [`Attr`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
	Directory,
	File,
}

/// The result of `getattr`: type, size and the fixed mode bits.
#[derive(Clone, Copy, Debug)]
pub struct Attr {
	pub kind: FileKind,
	pub size: u64,
	pub mode: u32,
}

/// A mounted filesystem image.
///
/// `sb` is read once at mount time and never rewritten; it is the only process-wide state the
/// core keeps (spec.md §5).
pub struct FileSystem {
	dev: BlockDevice,
	sb: Superblock,
}

/// Where a resolved directory entry lives, together with its containing block.
struct Resolved {
	containing_block: i64,
	entry: DirEntry,
}

impl FileSystem {
	/// Mounts the image at `path`, reading and caching its superblock.
	pub fn mount<P: AsRef<Path>>(path: P) -> FsResult<Self> {
		let dev = BlockDevice::open(path);
		let sb = Superblock::read(&dev)?;
		Ok(Self { dev, sb })
	}

	fn bitmap(&self) -> Bitmap<'_> {
		Bitmap::new(&self.dev, self.sb)
	}

	/// Total size reported for the root directory: the whole image.
	fn root_size(&self) -> u64 {
		self.sb.fs_size as u64 * BLOCK_SIZE as u64
	}

	fn lookup_root(&self, name: &str, ext: &str) -> FsResult<Option<Resolved>> {
		Ok(dirent::lookup(&self.dev, self.sb.first_blk, name, ext)?
			.map(|(containing_block, entry)| Resolved {
				containing_block,
				entry,
			}))
	}

	fn lookup_subdir(&self, dir: &str) -> FsResult<DirEntry> {
		match self.lookup_root(dir, "")? {
			Some(r) if r.entry.flag == EntryKind::Directory => Ok(r.entry),
			_ => Err(FsError::NoEntry),
		}
	}

	fn resolve(&self, path: &str) -> FsResult<Option<Resolved>> {
		match parse(path)? {
			ParsedPath::Root => Ok(None),
			ParsedPath::RootChild { name, ext } => self.lookup_root(&name, &ext),
			ParsedPath::SubChild { dir, name, ext } => {
				let subdir = match self.lookup_root(&dir, "")? {
					Some(r) if r.entry.flag == EntryKind::Directory => r.entry,
					_ => return Ok(None),
				};
				Ok(
					dirent::lookup(&self.dev, subdir.start_block, &name, &ext)?.map(
						|(containing_block, entry)| Resolved {
							containing_block,
							entry,
						},
					),
				)
			}
		}
	}

	fn resolve_file(&self, path: &str) -> FsResult<Resolved> {
		let resolved = self.resolve(path)?.ok_or(FsError::NoEntry)?;
		if resolved.entry.flag == EntryKind::Directory {
			return Err(FsError::IsADirectory);
		}
		Ok(resolved)
	}

	/// `getattr`: type, size and fixed mode for `path`.
	pub fn getattr(&self, path: &str) -> FsResult<Attr> {
		match parse(path)? {
			ParsedPath::Root => Ok(Attr {
				kind: FileKind::Directory,
				size: self.root_size(),
				mode: S_IFDIR | MODE_BITS,
			}),
			_ => {
				let resolved = self.resolve(path)?.ok_or(FsError::NoEntry)?;
				Ok(match resolved.entry.flag {
					EntryKind::Directory => Attr {
						kind: FileKind::Directory,
						size: resolved.entry.fsize,
						mode: S_IFDIR | MODE_BITS,
					},
					EntryKind::File => Attr {
						kind: FileKind::File,
						size: resolved.entry.fsize,
						mode: S_IFREG | MODE_BITS,
					},
					EntryKind::Unused => return Err(FsError::NoEntry),
				})
			}
		}
	}

	/// `readdir`: `.`, `..`, then every child's display name, in on-disk order.
	pub fn readdir(&self, path: &str) -> FsResult<Vec<String>> {
		let chain_head = match parse(path)? {
			ParsedPath::Root => self.sb.first_blk,
			ParsedPath::RootChild { name, ext } if ext.is_empty() => {
				self.lookup_subdir(&name)?.start_block
			}
			_ => return Err(FsError::NoEntry),
		};
		let mut out = vec![".".to_string(), "..".to_string()];
		for entry in dirent::list_all(&self.dev, chain_head)? {
			out.push(entry.display_name());
		}
		Ok(out)
	}

	/// `mkdir`: only directly under root, and only for names without `.`.
	pub fn mkdir(&self, path: &str) -> FsResult<()> {
		let name = match parse(path)? {
			ParsedPath::RootChild { name, ext } if ext.is_empty() => name,
			_ => return Err(FsError::NotPermitted),
		};
		if self.lookup_root(&name, "")?.is_some() {
			return Err(FsError::Exists);
		}

		let bitmap = self.bitmap();
		let new_blk = bitmap.find_run(1)?;
		self.dev.write_block(new_blk, &Block::empty())?;

		let entry = DirEntry::new(
			&name,
			"",
			BLOCK_SIZE as u64,
			new_blk,
			EntryKind::Directory,
		);
		dirent::insert(&self.dev, &bitmap, self.sb.first_blk, &entry)
	}

	/// `rmdir`: only directly under root, and only when empty.
	pub fn rmdir(&self, path: &str) -> FsResult<()> {
		let (name, ext) = match parse(path)? {
			ParsedPath::RootChild { name, ext } => (name, ext),
			_ => return Err(FsError::NotPermitted),
		};
		let resolved = self.lookup_root(&name, &ext)?.ok_or(FsError::NoEntry)?;
		if resolved.entry.flag != EntryKind::Directory {
			return Err(FsError::NotADirectory);
		}
		if !dirent::list_all(&self.dev, resolved.entry.start_block)?.is_empty() {
			return Err(FsError::NotEmpty);
		}
		let bitmap = self.bitmap();
		dirent::remove(&self.dev, &bitmap, resolved.containing_block, &resolved.entry)
	}

	/// `mknod`: only inside an existing subdirectory.
	pub fn mknod(&self, path: &str) -> FsResult<()> {
		let (dir, name, ext) = match parse(path)? {
			ParsedPath::SubChild { dir, name, ext } => (dir, name, ext),
			_ => return Err(FsError::NotPermitted),
		};
		let subdir = self.lookup_subdir(&dir).map_err(|_| FsError::NotPermitted)?;
		if dirent::lookup(&self.dev, subdir.start_block, &name, &ext)?.is_some() {
			return Err(FsError::Exists);
		}

		let bitmap = self.bitmap();
		let new_blk = bitmap.find_run(1)?;
		self.dev.write_block(new_blk, &Block::empty())?;

		let entry = DirEntry::new(&name, &ext, 0, new_blk, EntryKind::File);
		dirent::insert(&self.dev, &bitmap, subdir.start_block, &entry)
	}

	/// `unlink`: files only, at depth 1 or depth 2.
	pub fn unlink(&self, path: &str) -> FsResult<()> {
		match parse(path)? {
			ParsedPath::Root => Err(FsError::NotPermitted),
			ParsedPath::RootChild { name, ext } => {
				let resolved = self.lookup_root(&name, &ext)?.ok_or(FsError::NoEntry)?;
				if resolved.entry.flag == EntryKind::Directory {
					return Err(FsError::IsADirectory);
				}
				let bitmap = self.bitmap();
				dirent::remove(&self.dev, &bitmap, resolved.containing_block, &resolved.entry)
			}
			ParsedPath::SubChild { dir, name, ext } => {
				let subdir = self.lookup_subdir(&dir)?;
				let (containing_block, entry) =
					dirent::lookup(&self.dev, subdir.start_block, &name, &ext)?
						.ok_or(FsError::NoEntry)?;
				if entry.flag == EntryKind::Directory {
					return Err(FsError::IsADirectory);
				}
				let bitmap = self.bitmap();
				dirent::remove(&self.dev, &bitmap, containing_block, &entry)
			}
		}
	}

	/// `open`: a no-op stub, per spec.md §4.5.
	pub fn open(&self, _path: &str) -> FsResult<()> {
		Ok(())
	}

	/// `flush`: a no-op stub, per spec.md §4.5.
	pub fn flush(&self, _path: &str) -> FsResult<()> {
		Ok(())
	}

	/// `read`: copies up to `size` bytes starting at `offset` into a freshly allocated buffer,
	/// stopping early if the chain ends before `offset + size` (spec.md §9, note 5: this
	/// asymmetry against `fsize` is preserved, it reflects physical truth).
	pub fn read(&self, path: &str, size: usize, offset: u64) -> FsResult<Vec<u8>> {
		let resolved = self.resolve_file(path)?;
		let entry = resolved.entry;
		if offset >= entry.fsize {
			return Ok(Vec::new());
		}

		let mut blk = entry.start_block;
		let skip = (offset / MAX_DATA_PER_BLOCK as u64) as usize;
		let mut block = self.dev.read_block(blk)?;
		for _ in 0..skip {
			if block.next == NO_NEXT {
				return Ok(Vec::new());
			}
			blk = block.next;
			block = self.dev.read_block(blk)?;
		}

		let mut out = Vec::with_capacity(size.min(MAX_DATA_PER_BLOCK * 4));
		let mut remaining = size;
		let mut intra_offset = (offset % MAX_DATA_PER_BLOCK as u64) as usize;
		loop {
			if remaining == 0 {
				break;
			}
			let avail = MAX_DATA_PER_BLOCK - intra_offset;
			let take = remaining.min(avail);
			out.extend_from_slice(&block.data[intra_offset..intra_offset + take]);
			remaining -= take;
			intra_offset = 0;
			if remaining == 0 {
				break;
			}
			if block.next == NO_NEXT {
				break;
			}
			blk = block.next;
			block = self.dev.read_block(blk)?;
		}
		Ok(out)
	}

	/// `write`: copies `data` into the file's chain starting at `offset`, extending the chain
	/// and `fsize` as needed.
	///
	/// After each [`chain::enlarge`] call the walk explicitly re-reads the new tail block rather
	/// than trusting in-memory `next`/`curr` state left over from before the enlarge (spec.md
	/// §9, open question 1).
	pub fn write(&self, path: &str, data: &[u8], offset: u64) -> FsResult<()> {
		let resolved = self.resolve_file(path)?;
		let mut entry = resolved.entry;
		if offset > entry.fsize {
			return Err(FsError::FileTooBig);
		}
		if offset + data.len() as u64 > entry.fsize {
			entry.fsize = offset + data.len() as u64;
			dirent::update(&self.dev, resolved.containing_block, &entry)?;
		}

		let bitmap = self.bitmap();
		let mut blk = entry.start_block;
		let mut block = self.dev.read_block(blk)?;

		let skip = (offset / MAX_DATA_PER_BLOCK as u64) as usize;
		for _ in 0..skip {
			if block.next == NO_NEXT {
				let new_blk = chain::enlarge(&self.dev, &bitmap, blk, &mut block)?;
				blk = new_blk;
				block = self.dev.read_block(blk)?;
			} else {
				blk = block.next;
				block = self.dev.read_block(blk)?;
			}
		}

		let mut remaining = data;
		let mut intra_offset = (offset % MAX_DATA_PER_BLOCK as u64) as usize;
		loop {
			if remaining.is_empty() {
				break;
			}
			let avail = MAX_DATA_PER_BLOCK - intra_offset;
			let take = remaining.len().min(avail);
			block.data[intra_offset..intra_offset + take].copy_from_slice(&remaining[..take]);
			self.dev.write_block(blk, &block)?;
			remaining = &remaining[take..];
			intra_offset = 0;
			if remaining.is_empty() {
				break;
			}
			if block.next == NO_NEXT {
				let new_blk = chain::enlarge(&self.dev, &bitmap, blk, &mut block)?;
				blk = new_blk;
			} else {
				blk = block.next;
			}
			block = self.dev.read_block(blk)?;
		}
		Ok(())
	}

	/// `truncate`: unlike the original's no-op, shrinking releases tail blocks and growing only
	/// adjusts `fsize` (spec.md §9, open question 2).
	pub fn truncate(&self, path: &str, new_size: u64) -> FsResult<()> {
		let resolved = self.resolve_file(path)?;
		let mut entry = resolved.entry;

		if new_size < entry.fsize {
			let blocks_needed = if new_size == 0 {
				1
			} else {
				((new_size as usize + MAX_DATA_PER_BLOCK - 1) / MAX_DATA_PER_BLOCK).max(1)
			};

			let bitmap = self.bitmap();
			let mut blk = entry.start_block;
			let mut block = self.dev.read_block(blk)?;
			for _ in 1..blocks_needed {
				if block.next == NO_NEXT {
					break;
				}
				blk = block.next;
				block = self.dev.read_block(blk)?;
			}
			let tail = block.next;
			if tail != NO_NEXT {
				block.next = NO_NEXT;
				self.dev.write_block(blk, &block)?;
				chain::release_chain(&self.dev, &bitmap, tail)?;
			}
		}

		entry.fsize = new_size;
		dirent::update(&self.dev, resolved.containing_block, &entry)
	}
}
