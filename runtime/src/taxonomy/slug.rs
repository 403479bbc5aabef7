// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Category name normalisation.

/// Lowercase, hyphen-separated form of a display name.
///
/// Apostrophes vanish (`Women's` → `womens`), `&` and `+` read as `and`,
/// every other run of non-alphanumerics becomes a single hyphen.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;

    for ch in text.chars() {
        match ch {
            '\'' | '\u{2019}' | '\u{2018}' | '`' => {}
            '&' | '+' => {
                push_word(&mut slug, "and", true);
                pending_sep = true;
            }
            c if c.is_alphanumeric() => {
                let lower: String = c.to_lowercase().collect();
                push_word(&mut slug, &lower, pending_sep);
                pending_sep = false;
            }
            _ => pending_sep = true,
        }
    }
    slug
}

fn push_word(slug: &mut String, word: &str, separate: bool) {
    if separate && !slug.is_empty() {
        slug.push('-');
    }
    slug.push_str(word);
}

/// Slug tokens, split on hyphens.
pub fn tokens(slug: &str) -> Vec<&str> {
    slug.split('-').filter(|t| !t.is_empty()).collect()
}
