//! Payload rendering for error messages and logs
//!
//! Payloads are arbitrary bytes. UTF-8 text is rendered on one line with
//! control characters escaped; anything else is rendered as hex.

use std::fmt::Write;

use bytes::Bytes;

/// Binary payloads longer than this are cut when rendered as hex
pub const MAX_HEX_BYTES: usize = 256;

/// Render one payload as a single escaped line
pub fn escape_payload(payload: &[u8]) -> String {
    let mut buf = String::with_capacity(payload.len());
    append_escaped_payload(&mut buf, payload);
    buf
}

/// Render a payload batch as `["first", "second", ...]`
pub fn render_payloads(payloads: &[Bytes]) -> String {
    let mut buf = String::from("[");
    for (i, payload) in payloads.iter().enumerate() {
        if i > 0 {
            buf.push_str(", ");
        }
        buf.push('"');
        append_escaped_payload(&mut buf, payload);
        buf.push('"');
    }
    buf.push(']');
    buf
}

fn append_escaped_payload(buf: &mut String, payload: &[u8]) {
    if let Ok(text) = std::str::from_utf8(payload) {
        for ch in text.chars() {
            match ch {
                '\n' => buf.push_str("\\n"),
                '\r' => buf.push_str("\\r"),
                '\t' => buf.push_str("\\t"),
                '\\' => buf.push_str("\\\\"),
                '"' => buf.push_str("\\\""),
                c if c.is_control() => {
                    let _ = write!(buf, "\\x{:02x}", c as u32);
                }
                c => buf.push(c),
            }
        }
    } else {
        let truncated = payload.len() > MAX_HEX_BYTES;
        let shown = if truncated { MAX_HEX_BYTES } else { payload.len() };

        buf.push_str("0x");
        for byte in &payload[..shown] {
            let _ = write!(buf, "{byte:02x}");
        }
        if truncated {
            let _ = write!(buf, "...(+{} bytes)", payload.len() - MAX_HEX_BYTES);
        }
    }
}
