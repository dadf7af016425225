//! Escaping helpers shared by selector, declaration, and rule serialization.

use std::fmt::Write;

/// Append `ident` to `dest` as a CSS identifier, escaping as needed.
///
/// A leading digit (optionally after a single `-`) is written as a hex escape
/// followed by a space. Control characters are hex-escaped; other ASCII
/// punctuation gets a backslash.
pub fn write_ident(dest: &mut String, ident: &str) {
    let mut chars = ident.chars().peekable();
    if chars.peek() == Some(&'-') {
        dest.push('-');
        chars.next();
    }
    if let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            let _ = write!(dest, "\\{:X} ", c as u32);
            chars.next();
        }
    }
    for c in chars {
        if (c as u32) < 0x20 || ('\u{7f}'..'\u{a0}').contains(&c) {
            let _ = write!(dest, "\\{:X} ", c as u32);
            continue;
        }
        if c.is_ascii() && !(c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            dest.push('\\');
        }
        dest.push(c);
    }
}

/// Append `value` to `dest` as a double-quoted CSS string.
pub fn write_string(dest: &mut String, value: &str) {
    dest.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                dest.push('\\');
                dest.push(c);
            }
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(dest, "\\{:X} ", c as u32);
            }
            c => dest.push(c),
        }
    }
    dest.push('"');
}

/// Convenience wrapper around [`write_ident`].
pub fn escape_ident(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    write_ident(&mut out, ident);
    out
}

/// Resolve backslash escapes in identifier or string source text.
///
/// Hex escapes consume up to six digits and one following whitespace char.
/// A zero or out-of-range code point becomes U+FFFD. An escaped newline
/// (line continuation inside strings) is dropped.
pub fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let mut hex = String::new();
        while hex.len() < 6 {
            match chars.peek() {
                Some(h) if h.is_ascii_hexdigit() => {
                    hex.push(*h);
                    chars.next();
                }
                _ => break,
            }
        }
        if hex.is_empty() {
            match chars.next() {
                Some('\n') | None => {}
                Some(other) => out.push(other),
            }
            continue;
        }
        if matches!(chars.peek(), Some(' ' | '\t' | '\n')) {
            chars.next();
        }
        let code = u32::from_str_radix(&hex, 16).unwrap_or(0);
        match char::from_u32(code) {
            Some(ch) if code != 0 => out.push(ch),
            _ => out.push('\u{fffd}'),
        }
    }
    out
}
