// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structural selector derivation.

use super::PathSegment;

/// Escape an identifier the way `CSS.escape` does, so ids such as
/// `filter:color[red]` or `2col` survive being put back into a selector.
pub fn css_escape(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    if chars.len() == 1 && chars[0] == '-' {
        return "\\-".to_string();
    }

    let mut out = String::with_capacity(ident.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        let leading_digit = c.is_ascii_digit() && (i == 0 || (i == 1 && chars[0] == '-'));
        if c == '\0' {
            out.push('\u{FFFD}');
        } else if ('\u{1}'..='\u{1f}').contains(&c) || c == '\u{7f}' || leading_digit {
            out.push_str(&format!("\\{:x} ", c as u32));
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Build a selector from an element's ancestry.
///
/// The path is anchored at the nearest ancestor (or the element itself) with
/// an id, falling back to the document root. Each remaining step is a
/// `tag:nth-of-type(n)` child combinator, so the selector stays valid even
/// when the page's classes are generated or collide.
pub fn structural_selector(ancestry: &[PathSegment]) -> String {
    if ancestry.is_empty() {
        return String::new();
    }

    let anchor = ancestry
        .iter()
        .rposition(|seg| seg.id.as_deref().is_some_and(|id| !id.is_empty()));

    let (mut parts, rest) = match anchor {
        Some(i) => {
            let id = ancestry[i].id.as_deref().unwrap_or_default();
            (vec![format!("#{}", css_escape(id))], &ancestry[i + 1..])
        }
        None => {
            let root = &ancestry[0];
            (vec![root.tag.clone()], &ancestry[1..])
        }
    };

    for seg in rest {
        parts.push(format!("{}:nth-of-type({})", seg.tag, seg.nth_of_type.max(1)));
    }
    parts.join(" > ")
}

/// Split a selector list on its top-level commas.
pub fn split_selector_list(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '(') | (None, '[') => depth += 1,
            (None, ')') | (None, ']') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(list[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Scope every selector in `list` under `root`, so `"ul, .menu"` under
/// `#nav` becomes `"#nav ul, #nav .menu"`. Relative selectors starting with
/// a combinator (`> a`) attach directly.
pub fn scoped(root: &str, list: &str) -> String {
    split_selector_list(list)
        .into_iter()
        .map(|part| format!("{root} {part}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(tag: &str, id: Option<&str>, nth: usize) -> PathSegment {
        PathSegment {
            tag: tag.to_string(),
            id: id.map(String::from),
            nth_of_type: nth,
        }
    }

    #[test]
    fn test_css_escape_special_characters() {
        assert_eq!(css_escape("plain-id_1"), "plain-id_1");
        assert_eq!(css_escape("filter:color[red]"), "filter\\:color\\[red\\]");
        assert_eq!(css_escape("a.b c"), "a\\.b\\ c");
    }

    #[test]
    fn test_css_escape_leading_digits() {
        assert_eq!(css_escape("2col"), "\\32 col");
        assert_eq!(css_escape("-3x"), "-\\33 x");
        assert_eq!(css_escape("-"), "\\-");
    }

    #[test]
    fn test_structural_selector_from_root() {
        let path = vec![
            seg("html", None, 1),
            seg("body", None, 1),
            seg("ul", None, 2),
            seg("li", None, 3),
        ];
        assert_eq!(
            structural_selector(&path),
            "html > body:nth-of-type(1) > ul:nth-of-type(2) > li:nth-of-type(3)"
        );
    }

    #[test]
    fn test_structural_selector_anchors_on_nearest_id() {
        let path = vec![
            seg("html", None, 1),
            seg("body", Some("page"), 1),
            seg("nav", Some("main:nav"), 1),
            seg("li", None, 4),
        ];
        assert_eq!(structural_selector(&path), "#main\\:nav > li:nth-of-type(4)");
    }

    #[test]
    fn test_scoped_selector_list() {
        assert_eq!(scoped("#nav", "ul, .menu"), "#nav ul, #nav .menu");
        assert_eq!(scoped("#nav", "> a"), "#nav > a");
        assert_eq!(
            scoped("li:nth-of-type(2)", r#"a[data-x="1,2"], :is(b, i)"#),
            r#"li:nth-of-type(2) a[data-x="1,2"], li:nth-of-type(2) :is(b, i)"#
        );
    }

    #[test]
    fn test_structural_selector_empty() {
        assert_eq!(structural_selector(&[]), "");
    }
}
