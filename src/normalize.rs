//! Lexical normalizer.
//!
//! Strips, from every instruction line and before any pattern matching:
//! debug-location (`!dbg`) and type-based-alias (`!tbaa`) annotations,
//! bare metadata references (`!N`), and a fixed set of attribute words.
//! Runs of whitespace collapse to one space. Quoted identifiers
//! (`@"…"`, `%"…"`) are kept intact as a single atom rather than split on
//! their internal whitespace.
//!
//! This replaces the regex-based filter in the original tool with a plain
//! tokenizer, per the "lex once, drop attribute tokens structurally" design
//! direction: no pattern re-matching against a growing blacklist.

const ATTR_TOKENS: &[&str] = &[
    "nsw",
    "nuw",
    "noundef",
    "dso_local",
    "local_unnamed_addr",
    "volatile",
];

/// Normalize one source line. Returns `None` for blank lines and comments
/// (first non-whitespace character is `;`), matching the parser's policy of
/// dropping them before they ever reach pattern matching.
pub fn normalize_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(';') {
        return None;
    }

    let tokens = tokenize_preserving_quotes(trimmed);
    let mut out: Vec<&str> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i].as_str();
        let bare = tok.trim_end_matches(',');

        if bare == "!dbg" || bare == "!tbaa" {
            drop_trailing_comma(&mut out);
            i += 1;
            if i < tokens.len() && is_metadata_ref(tokens[i].trim_end_matches(',')) {
                i += 1;
            }
            continue;
        }
        if is_metadata_ref(bare) {
            drop_trailing_comma(&mut out);
            i += 1;
            continue;
        }
        if ATTR_TOKENS.contains(&bare) {
            i += 1;
            continue;
        }
        out.push(tok);
        i += 1;
    }

    if out.is_empty() {
        None
    } else {
        Some(out.join(" "))
    }
}

fn drop_trailing_comma(out: &mut [&str]) {
    if let Some(last) = out.last_mut() {
        if let Some(stripped) = last.strip_suffix(',') {
            *last = stripped;
        }
    }
}

fn is_metadata_ref(tok: &str) -> bool {
    let rest = match tok.strip_prefix('!') {
        Some(rest) => rest,
        None => return false,
    };
    !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
}

/// Split on ASCII whitespace, but treat `@"…"` / `%"…"` as one token so a
/// quoted LLVM identifier's internal spaces don't get split apart.
fn tokenize_preserving_quotes(s: &str) -> Vec<String> {
    let bytes = s.as_bytes();
    let n = bytes.len();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < n {
        while i < n && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= n {
            break;
        }
        let start = i;
        if bytes[i] == b'@' || bytes[i] == b'%' {
            let sigil_end = i + 1;
            if sigil_end < n && bytes[sigil_end] == b'"' {
                i = sigil_end + 1;
                while i < n && bytes[i] != b'"' {
                    i += 1;
                }
                if i < n {
                    i += 1; // closing quote
                }
                // Keep any directly-attached punctuation (comma, paren) in
                // the same token rather than inserting a space that wasn't
                // in the source.
                while i < n && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                tokens.push(s[start..i].to_string());
                continue;
            }
        }
        while i < n && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        tokens.push(s[start..i].to_string());
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_blank_and_comment_lines() {
        assert_eq!(normalize_line("   "), None);
        assert_eq!(normalize_line("; a comment"), None);
    }

    #[test]
    fn strips_dbg_and_tbaa_with_their_comma() {
        assert_eq!(
            normalize_line("%a = add i32 %x, %y, !dbg !12"),
            Some("%a = add i32 %x, %y".to_string())
        );
        assert_eq!(
            normalize_line("%p = load i32, ptr %q, !tbaa !4"),
            Some("%p = load i32, ptr %q".to_string())
        );
    }

    #[test]
    fn strips_attribute_words() {
        assert_eq!(
            normalize_line("%a = add nsw i32 %x, %y"),
            Some("%a = add i32 %x, %y".to_string())
        );
        assert_eq!(
            normalize_line("store volatile i32 %x, ptr %p"),
            Some("store i32 %x, ptr %p".to_string())
        );
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(
            normalize_line("  %a   =   add  i32 %x,  %y  "),
            Some("%a = add i32 %x, %y".to_string())
        );
    }

    #[test]
    fn preserves_quoted_identifiers_as_one_atom() {
        assert_eq!(
            normalize_line("%a = call i32 @\"weird name\"(i32 %x)"),
            Some("%a = call i32 @\"weird name\"(i32 %x)".to_string())
        );
    }

    #[test]
    fn drops_bare_metadata_refs() {
        assert_eq!(
            normalize_line("call void @foo(i32 %x), !1"),
            Some("call void @foo(i32 %x)".to_string())
        );
    }
}
