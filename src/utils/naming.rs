use rand::Rng;
use std::path::Path;

/// Upper bound (inclusive) of the random tie-breaker in stored names
pub const MAX_RANDOM_SUFFIX: u32 = 999_999_999;

/// Strips any directory part from a client-supplied filename and replaces
/// characters that are unsafe in a path component. Never fails: an empty
/// result becomes "unnamed".
pub fn sanitize_filename(filename: &str) -> String {
    // Clients on Windows may send backslash separated paths
    let last_segment = filename.rsplit(['/', '\\']).next().unwrap_or("");
    let name = Path::new(last_segment)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path components stripped from upload name: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';')
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    let sanitized = truncate_keeping_extension(&sanitized, MAX_NAME_BYTES);

    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        "unnamed".to_string()
    } else {
        sanitized
    }
}

/// Leaves room for the `-<ms>-<random>` suffix within a 255 byte component
const MAX_NAME_BYTES: usize = 200;

/// Shortens the basename so that basename and extension fit in `max` bytes.
/// An extension that alone does not fit is cut along with the rest.
fn truncate_keeping_extension(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    let (basename, extension) = split_extension(name);
    if extension.len() < max {
        let basename = truncate_at_char_boundary(basename, max - extension.len());
        format!("{}{}", basename, extension)
    } else {
        truncate_at_char_boundary(name, max).to_string()
    }
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Splits `name` into (basename, extension) the way Node's `path.extname`
/// does: the extension starts at the last dot unless that dot opens the
/// name, so `a.tar.gz` yields `.gz`, `..a` yields `.a` and `.bashrc` has no
/// extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && name != ".." => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Builds `<basename>-<timestamp_ms>-<random><ext>` from an already
/// sanitized name.
pub fn unique_name(sanitized: &str, timestamp_ms: i64, random: u32) -> String {
    let (basename, extension) = split_extension(sanitized);
    format!("{}-{}-{}{}", basename, timestamp_ms, random, extension)
}

/// Stored name for `original` using the current wall clock and a fresh
/// random suffix.
pub fn generate_stored_name(original: &str) -> String {
    let timestamp_ms = chrono::Utc::now().timestamp_millis();
    let random = rand::thread_rng().gen_range(0..=MAX_RANDOM_SUFFIX);
    unique_name(&sanitize_filename(original), timestamp_ms, random)
}
