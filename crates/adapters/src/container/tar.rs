// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tar packaging for file injection.
//!
//! `copy_to_container` addresses files with a tar archive unpacked at a
//! destination path. The runner core hands this module a logical
//! `{path: bytes}` map and stays ignorant of the archive format. Output is
//! plain ustar: one 512-byte header per file, data padded to 512, two zero
//! blocks at the end.

use std::collections::BTreeMap;
use thiserror::Error;

const BLOCK: usize = 512;
const NAME_LEN: usize = 100;
const PREFIX_LEN: usize = 155;

#[derive(Debug, Error)]
pub enum TarError {
    #[error("path too long for ustar header: {0}")]
    PathTooLong(String),
    #[error("file too large for ustar header: {0}")]
    FileTooLarge(String),
}

/// Build a ustar archive of the given files. Paths are stored relative
/// (a leading `/` is stripped), so the archive unpacks against whatever
/// destination the copy call addresses.
pub fn archive(files: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>, TarError> {
    let mut out = Vec::new();
    for (path, data) in files {
        let stored = path.trim_start_matches('/');
        out.extend_from_slice(&header(stored, data)?);
        out.extend_from_slice(data);
        let pad = (BLOCK - data.len() % BLOCK) % BLOCK;
        out.extend(std::iter::repeat_n(0u8, pad));
    }
    // End-of-archive marker
    out.extend(std::iter::repeat_n(0u8, BLOCK * 2));
    Ok(out)
}

fn header(path: &str, data: &[u8]) -> Result<[u8; BLOCK], TarError> {
    let (prefix, name) = split_path(path)?;
    if data.len() > 0o77777777777 {
        return Err(TarError::FileTooLarge(path.to_string()));
    }

    let mut block = [0u8; BLOCK];
    block[..name.len()].copy_from_slice(name.as_bytes());
    write_octal(&mut block[100..108], 0o755, 7); // mode
    write_octal(&mut block[108..116], 0, 7); // uid
    write_octal(&mut block[116..124], 0, 7); // gid
    write_octal(&mut block[124..136], data.len() as u64, 11); // size
    write_octal(&mut block[136..148], 0, 11); // mtime
    block[148..156].fill(b' '); // checksum placeholder
    block[156] = b'0'; // regular file
    block[257..262].copy_from_slice(b"ustar");
    block[263..265].copy_from_slice(b"00");
    block[345..345 + prefix.len()].copy_from_slice(prefix.as_bytes());

    let sum: u64 = block.iter().map(|&b| u64::from(b)).sum();
    write_octal(&mut block[148..155], sum, 6);
    block[155] = b' ';

    Ok(block)
}

/// Split a path into ustar (prefix, name) fields, preferring name-only.
fn split_path(path: &str) -> Result<(&str, &str), TarError> {
    if path.len() <= NAME_LEN {
        return Ok(("", path));
    }
    // Split at a slash so prefix + '/' + name reassembles the path
    for (i, _) in path.match_indices('/') {
        let (prefix, rest) = path.split_at(i);
        let name = &rest[1..];
        if prefix.len() <= PREFIX_LEN && !name.is_empty() && name.len() <= NAME_LEN {
            return Ok((prefix, name));
        }
    }
    Err(TarError::PathTooLong(path.to_string()))
}

/// Write a zero-padded octal field with a trailing NUL.
fn write_octal(field: &mut [u8], value: u64, width: usize) {
    let text = format!("{value:0width$o}");
    field[..text.len()].copy_from_slice(text.as_bytes());
    field[text.len()] = 0;
}

#[cfg(test)]
#[path = "tar_tests.rs"]
mod tests;
