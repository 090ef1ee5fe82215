// Shell Quoting
// Renders paths for the operation log so the log can be replayed as a script

use std::fmt::Write;
use std::path::Path;

/// Single-quote a path, escaping embedded `'` as `\'` and `\` as `\\`
///
/// These are the escapes fish understands inside single quotes, and fish is the
/// default interpreter for script output. On Unix, bytes that are not valid
/// UTF-8 are written between quoted runs as `\xHH`, which fish reads back as
/// the raw byte.
pub fn quote(path: &Path) -> String {
    let mut out = String::from("'");
    push_path(&mut out, path);
    out.push('\'');
    out
}

fn push_text(out: &mut String, text: &str) {
    for c in text.chars() {
        if matches!(c, '\'' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
}

#[cfg(unix)]
fn push_path(out: &mut String, path: &Path) {
    use std::os::unix::ffi::OsStrExt;

    let mut rest = path.as_os_str().as_bytes();
    loop {
        match std::str::from_utf8(rest) {
            Ok(text) => {
                push_text(out, text);
                return;
            }
            Err(e) => {
                let (valid, tail) = rest.split_at(e.valid_up_to());
                push_text(out, std::str::from_utf8(valid).unwrap_or_default());

                let bad = e.error_len().unwrap_or(tail.len());
                for byte in &tail[..bad] {
                    let _ = write!(out, "'\\x{byte:02x}'");
                }
                rest = &tail[bad..];
            }
        }
    }
}

#[cfg(not(unix))]
fn push_path(out: &mut String, path: &Path) {
    push_text(out, &path.to_string_lossy());
}
