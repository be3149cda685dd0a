//! Streaming MBOX splitter.
//!
//! Reads MBOX files line by line. Never loads the entire file into memory and
//! tolerates malformed input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use crate::error::{DraftError, Result};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Walk an MBOX file, calling `message_callback` with the raw bytes of each
/// message (including its `From ` separator line).
///
/// The callback returns `true` to continue or `false` to stop early.
/// Every line starting with `From ` begins a new message; one not preceded by
/// a blank line is still split on but logged. `>From ` escapes are left alone.
///
/// Returns the number of messages delivered.
pub fn for_each_message(
    path: &Path,
    message_callback: &mut dyn FnMut(&[u8]) -> bool,
) -> Result<u64> {
    let file = File::open(path).map_err(|e| DraftError::io(path, e))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

    let mut count: u64 = 0;
    let mut message_buf: Vec<u8> = Vec::with_capacity(64 * 1024);
    let mut line_buf: Vec<u8> = Vec::with_capacity(4096);
    let mut prev_line_was_empty = true;
    let mut offset: u64 = 0;

    loop {
        line_buf.clear();
        let read = reader
            .read_until(b'\n', &mut line_buf)
            .map_err(|e| DraftError::io(path, e))?;
        if read == 0 {
            break; // EOF
        }

        if is_mbox_separator(&line_buf) {
            if !prev_line_was_empty {
                warn!(offset, "Found 'From ' separator without preceding blank line");
            }
            if !message_buf.is_empty() {
                if !message_callback(&message_buf) {
                    return Ok(count);
                }
                count += 1;
                message_buf.clear();
            }
        }

        message_buf.extend_from_slice(&line_buf);
        prev_line_was_empty = is_blank_line(&line_buf);
        offset += read as u64;
    }

    if !message_buf.is_empty() && message_callback(&message_buf) {
        count += 1;
    }

    Ok(count)
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}
