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

//! A self-contained, block-based filesystem backed by a single regular file.
//!
//! The crate is organized bottom-up: [`block`] is the raw block device, [`superblock`] and
//! [`bitmap`] describe and manage the image's global layout, [`chain`] links blocks into
//! streams, [`dirent`] treats a directory's stream as a packed table of fixed-size records, and
//! [`path`] parses the two-level naming grammar. [`fs`] ties all of it together into the
//! operations a caller actually wants: `mkdir`, `read`, `write`, and so on. [`fmt`] formats a
//! fresh image and [`fsck`] checks one without mutating it.

pub mod bitmap;
pub mod block;
pub mod chain;
pub mod dirent;
pub mod error;
pub mod fmt;
pub mod fs;
pub mod fsck;
pub mod path;
pub mod shell;
pub mod superblock;
