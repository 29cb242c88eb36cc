// src/utils/naming.rs
// Canonical naming helpers shared across the crate.

/// Convert an arbitrary string to an ASCII kebab-case identifier suitable for
/// canonical context codes.
/// Rules:
/// - Non-ASCII characters are transliterated to ASCII via `deunicode`
///   (e.g., é -> e, Å -> A, ü -> u); untransliterable input becomes a separator
/// - ASCII letters/digits are kept and lowercased
/// - Every other character becomes a single `-` separator
/// - Consecutive separators collapse, leading/trailing `-` are trimmed
/// - Returns "default" if the result would be empty
pub fn to_kebab_ascii(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_dash = false;

    let mut push_char = |c: char, out: &mut String, last_dash: &mut bool| {
        let lc = c.to_ascii_lowercase();
        if lc.is_ascii_alphanumeric() {
            out.push(lc);
            *last_dash = false;
        } else if !*last_dash && !out.is_empty() {
            out.push('-');
            *last_dash = true;
        }
    };

    for ch in s.chars() {
        if ch.is_ascii() {
            push_char(ch, &mut out, &mut last_dash);
        } else {
            let translit = deunicode::deunicode_char(ch).unwrap_or("-");
            for tc in translit.chars() {
                push_char(tc, &mut out, &mut last_dash);
            }
        }
    }

    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        "default".to_string()
    } else {
        out
    }
}
