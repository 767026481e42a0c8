//! Sysex framing and `.syx` stream splitting.

use tracing::debug;

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

/// Whether `msg` is a single F0..F7 framed message.
#[inline]
pub fn is_framed(msg: &[u8]) -> bool {
    msg.len() >= 2 && msg[0] == SYSEX_START && msg[msg.len() - 1] == SYSEX_END
}

/// Cut a byte stream into F0..F7 messages, start and end bytes included.
///
/// Bytes outside any framing and messages cut short by a new F0 or by the end
/// of the stream are skipped.
pub fn split_messages(bytes: &[u8]) -> Vec<&[u8]> {
    let mut messages = Vec::new();
    let mut start: Option<usize> = None;
    let mut skipped = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        match (b, start) {
            (SYSEX_START, Some(s)) => {
                debug!("Dropping unterminated sysex at {} ({} bytes)", s, i - s);
                skipped += i - s;
                start = Some(i);
            }
            (SYSEX_START, None) => start = Some(i),
            (SYSEX_END, Some(s)) => {
                messages.push(&bytes[s..=i]);
                start = None;
            }
            (_, None) => skipped += 1,
            _ => {}
        }
    }
    if let Some(s) = start {
        debug!("Dropping unterminated sysex tail at {} ({} bytes)", s, bytes.len() - s);
        skipped += bytes.len() - s;
    }
    if skipped > 0 {
        debug!("Skipped {} bytes outside sysex framing", skipped);
    }
    messages
}
