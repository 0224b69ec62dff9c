//! 8.3 basis-name generation and the LFN checksum

use super::constants::*;
use super::dir_entry::display_name_of;

/// Largest `~N` tail that still leaves one character of the primary name
pub const MAX_NUMERIC_TAIL: u32 = 999_999;

/// Characters a short name may not contain
const ILLEGAL_SHORT_CHARS: &[u8] = b"\"*+,/:;<=>?[\\]|";

/// Builds the 11-byte basis name for `long_name`, with a `~tail` suffix
/// when `tail` is nonzero. Deciding whether a tail is needed is up to the
/// caller.
pub fn basis_name(long_name: &str, tail: u32) -> [u8; 11] {
    let stripped = long_name.trim_start_matches(|c: char| c.is_whitespace() || c == '.');
    let mut chars = [0u8; MAX_LFN_LENGTH];
    let mut len = 0;
    for c in stripped.chars().filter(|c| !c.is_whitespace()) {
        if len == chars.len() {
            break;
        }
        chars[len] = short_char(c);
        len += 1;
    }
    let chars = &chars[..len];

    let mut out = [b' '; 11];
    let primary_end = chars.iter().position(|&b| b == b'.').unwrap_or(len);
    let primary_len = primary_end.min(MAX_FILENAME_LENGTH);
    out[..primary_len].copy_from_slice(&chars[..primary_len]);

    if let Some(last_dot) = chars.iter().rposition(|&b| b == b'.') {
        let ext = &chars[last_dot + 1..];
        let ext: &[u8] = &ext[..ext.len().min(MAX_EXTENSION_LENGTH)];
        out[8..8 + ext.len()].copy_from_slice(ext);
    }

    if tail != 0 {
        let tail = tail.min(MAX_NUMERIC_TAIL);
        let digits = (tail.ilog10() + 1) as usize;
        let at = primary_len.min(MAX_FILENAME_LENGTH - digits - 1);
        out[at] = b'~';
        let mut n = tail;
        for i in (0..digits).rev() {
            out[at + 1 + i] = b'0' + (n % 10) as u8;
            n /= 10;
        }
        out[at + 1 + digits..MAX_FILENAME_LENGTH].fill(b' ');
    }

    out
}

/// Uppercases and replaces characters that cannot appear in a short name
fn short_char(c: char) -> u8 {
    if !c.is_ascii() {
        return CREATE_PLACEHOLDER;
    }
    let b = c.to_ascii_uppercase() as u8;
    if b < 0x20 || ILLEGAL_SHORT_CHARS.contains(&b) {
        CREATE_PLACEHOLDER
    } else {
        b
    }
}

/// True when at least one character of `name` survives into a short name
/// as something other than a placeholder for a forbidden character
pub fn has_legal_char(name: &str) -> bool {
    name.chars().any(|c| {
        if c.is_whitespace() || c == '.' {
            false
        } else if c.is_ascii() {
            short_char(c) != CREATE_PLACEHOLDER || c == '_'
        } else {
            true
        }
    })
}

/// True when `name` is stored exactly by its basis name (ignoring case), so
/// no numeric tail is required
pub fn is_lossless(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    let basis = basis_name(name, 0);
    display_name_of(&basis).eq_ignore_ascii_case(name)
}

/// Rotate-right-then-add checksum binding LFN fragments to their short entry
pub fn lfn_checksum(short_name: &[u8; 11]) -> u8 {
    short_name.iter().fold(0u8, |sum, &b| {
        (if sum & 1 != 0 { 0x80u8 } else { 0 })
            .wrapping_add(sum >> 1)
            .wrapping_add(b)
    })
}
