//! Command-line front end: `mkfs` formats a fresh image, `fsck` checks one, `shell` drives one
//! interactively. The FUSE binding that would normally sit in front of [`blockfs::fs`] is outside
//! this crate's boundary.

use std::env;
use std::fmt;
use std::io;
use std::process::exit;

use blockfs::block::BlockDevice;
use blockfs::fmt::format_image;
use blockfs::fs::FileSystem;
use blockfs::fsck;
use blockfs::shell;

const BIN: &str = "blockfs";

fn error<M: fmt::Display>(msg: M) -> ! {
	eprintln!("{BIN}: error: {msg}");
	exit(1);
}

fn main() {
	let mut args = env::args().skip(1);
	let command = args.next().unwrap_or_else(|| error("missing command"));

	match command.as_str() {
		"mkfs" => {
			let image = args
				.next()
				.unwrap_or_else(|| error("usage: mkfs IMAGE BLOCKS"));
			let blocks: i64 = args
				.next()
				.unwrap_or_else(|| error("usage: mkfs IMAGE BLOCKS"))
				.parse()
				.unwrap_or_else(|e| error(format!("invalid block count: {e}")));
			if let Err(e) = std::fs::File::create(&image)
				.and_then(|f| f.set_len(blocks as u64 * blockfs::block::BLOCK_SIZE as u64))
			{
				error(e);
			}
			let dev = BlockDevice::open(&image);
			if let Err(e) = format_image(&dev, blocks) {
				error(e);
			}
		}
		"fsck" => {
			let image = args.next().unwrap_or_else(|| error("usage: fsck IMAGE"));
			let dev = BlockDevice::open(&image);
			match fsck::check(&dev) {
				Ok(report) => {
					println!("{} blocks visited", report.blocks_visited);
					for problem in &report.problems {
						println!("{problem}");
					}
					if !report.is_clean() {
						exit(1);
					}
				}
				Err(e) => error(e),
			}
		}
		"shell" => {
			let image = args.next().unwrap_or_else(|| error("usage: shell IMAGE"));
			let fs = FileSystem::mount(&image).unwrap_or_else(|e| error(e));
			let stdin = io::stdin();
			if let Err(e) = shell::run(&fs, stdin.lock(), io::stdout()) {
				error(e);
			}
		}
		other => error(format!("unknown command: {other}")),
	}
}
