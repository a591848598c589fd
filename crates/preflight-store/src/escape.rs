//! Filename escaping for qualified test names.
//!
//! Qualified names contain `::` and arbitrary identifier characters, so they
//! are percent-escaped before use as file stems. The encoding is injective:
//! every byte outside `[A-Za-z0-9._-]` (including `%` itself) becomes `%XX`,
//! so distinct names never collide on disk.

/// Escapes a qualified test name into a safe file stem.
pub fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                out.push(byte as char);
            }
            other => {
                out.push('%');
                out.push_str(&format!("{:02X}", other));
            }
        }
    }
    out
}

/// Reverses [`escape_name`]. Returns `None` for stems this store never
/// produced (bad hex, truncated escape, invalid UTF-8).
pub fn unescape_name(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
