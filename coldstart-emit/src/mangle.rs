// coldstart-emit - Identifier mangling
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Turns symbol and literal text into identifier-safe declaration names.

/// Replacement tokens, longest operators first so `<=` wins over `<`.
const TOKENS: &[(&str, &str)] = &[
    ("_", "US"),
    ("?", "Q"),
    ("!", "BANG"),
    ("<=", "LE"),
    (">=", "GE"),
    ("<", "LT"),
    (">", "GT"),
    ("=", "EQ"),
    ("'", "APOS"),
    ("+", "PLUS"),
    ("-", "DASH"),
    ("*", "STAR"),
    ("/", "SLASH"),
    ("&", "AMP"),
    ("#", "HASH"),
    (".", "DOT"),
    ("%", "PCT"),
];

/// Mangle `name` into an identifier fragment.
///
/// Each special token becomes `_TOKEN_`. Underscores are escaped first, so
/// distinct inputs give distinct outputs for the characters covered.
#[must_use]
pub fn mangle(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    'outer: while let Some(c) = rest.chars().next() {
        for (token, replacement) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push('_');
                out.push_str(replacement);
                out.push('_');
                rest = tail;
                continue 'outer;
            }
        }
        if c.is_alphanumeric() {
            out.push(c);
        } else {
            out.push_str(&format!("_U{:X}_", c as u32));
        }
        rest = &rest[c.len_utf8()..];
    }
    out
}
