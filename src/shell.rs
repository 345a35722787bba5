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

//! A small interactive, line-oriented driver over [`FileSystem`]. It plays the role the FUSE
//! binding plays outside this crate's boundary, without pulling in a FUSE dependency: each line
//! is one command, dispatched straight onto the path-engine operations.

use std::io;
use std::io::BufRead;
use std::io::Write;

use crate::fs::FileKind;
use crate::fs::FileSystem;

/// Runs the interactive loop against an already-mounted `fs`, reading commands from `input` and
/// writing output to `output` until EOF or `quit`.
///
/// Recognized commands: `ls PATH`, `cat PATH`, `mkdir PATH`, `rmdir PATH`, `touch PATH`,
/// `rm PATH`, `write PATH TEXT`, `truncate PATH SIZE`, `stat PATH`, `quit`.
pub fn run<R: BufRead, W: Write>(fs: &FileSystem, input: R, mut output: W) -> io::Result<()> {
	for line in input.lines() {
		let line = line?;
		let line = line.trim();
		if line.is_empty() {
			continue;
		}
		let mut parts = line.splitn(3, ' ');
		let cmd = parts.next().unwrap_or("");
		let arg1 = parts.next();
		let arg2 = parts.next();

		if cmd == "quit" || cmd == "exit" {
			break;
		}

		let result = dispatch(fs, cmd, arg1, arg2, &mut output);
		if let Err(e) = result {
			writeln!(output, "error: {e}")?;
		}
	}
	Ok(())
}

fn dispatch<W: Write>(
	fs: &FileSystem,
	cmd: &str,
	arg1: Option<&str>,
	arg2: Option<&str>,
	output: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
	match cmd {
		"ls" => {
			let path = arg1.ok_or("usage: ls PATH")?;
			for name in fs.readdir(path)? {
				writeln!(output, "{name}")?;
			}
		}
		"stat" => {
			let path = arg1.ok_or("usage: stat PATH")?;
			let attr = fs.getattr(path)?;
			let kind = match attr.kind {
				FileKind::Directory => "directory",
				FileKind::File => "file",
			};
			writeln!(output, "{kind} size={} mode={:o}", attr.size, attr.mode)?;
		}
		"mkdir" => {
			fs.mkdir(arg1.ok_or("usage: mkdir PATH")?)?;
		}
		"rmdir" => {
			fs.rmdir(arg1.ok_or("usage: rmdir PATH")?)?;
		}
		"touch" => {
			fs.mknod(arg1.ok_or("usage: touch PATH")?)?;
		}
		"rm" => {
			fs.unlink(arg1.ok_or("usage: rm PATH")?)?;
		}
		"cat" => {
			let path = arg1.ok_or("usage: cat PATH")?;
			let size = fs.getattr(path)?.size as usize;
			let data = fs.read(path, size, 0)?;
			output.write_all(&data)?;
			writeln!(output)?;
		}
		"write" => {
			let path = arg1.ok_or("usage: write PATH TEXT")?;
			let text = arg2.unwrap_or("");
			fs.write(path, text.as_bytes(), 0)?;
		}
		"truncate" => {
			let path = arg1.ok_or("usage: truncate PATH SIZE")?;
			let size: u64 = arg2.ok_or("usage: truncate PATH SIZE")?.parse()?;
			fs.truncate(path, size)?;
		}
		other => {
			writeln!(output, "unknown command: {other}")?;
		}
	}
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::block::BLOCK_SIZE;
	use crate::block::BlockDevice;
	use crate::fmt::format_image;
	use std::io::Cursor;

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
	fn mkdir_touch_write_cat() {
		let (_f, fs) = mounted(4096);
		let script = "mkdir /d\ntouch /d/a\nwrite /d/a hello\ncat /d/a\nls /d\n";
		let mut out = Vec::new();
		run(&fs, Cursor::new(script), &mut out).unwrap();
		let text = String::from_utf8(out).unwrap();
		assert!(text.contains("hello"));
		assert!(text.contains("a"));
	}

	#[test]
	fn unknown_command_is_reported_and_loop_continues() {
		let (_f, fs) = mounted(4096);
		let script = "bogus\nmkdir /d\nls /\n";
		let mut out = Vec::new();
		run(&fs, Cursor::new(script), &mut out).unwrap();
		let text = String::from_utf8(out).unwrap();
		assert!(text.contains("unknown command"));
		assert!(text.contains("d"));
	}

	#[test]
	fn error_on_missing_path_is_reported_not_fatal() {
		let (_f, fs) = mounted(4096);
		let script = "rm /nope\nmkdir /ok\n";
		let mut out = Vec::new();
		run(&fs, Cursor::new(script), &mut out).unwrap();
		let text = String::from_utf8(out).unwrap();
		assert!(text.contains("error:"));
		assert!(fs.getattr("/ok").is_ok());
	}
}
