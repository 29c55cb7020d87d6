//! Stateless CSS text utilities: comment stripping, brace-counted
//! `@font-face` extraction, `@import` matching, and `url(...)` rebasing.
//!
//! These operate on raw stylesheet text. Offsets are tracked in bytes; every
//! search needle is ASCII, so slicing at a match is always a char boundary.

use url::Url;

/// Case-insensitive substring search starting at `from`. Needles are ASCII.
fn find_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() || from > h.len() - n.len() {
        return None;
    }
    (from..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// Remove `/* ... */` comments. An unterminated comment swallows the rest of
/// the source.
pub fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let bytes = css.as_bytes();
    let mut seg = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'/' && bytes[i + 1] == b'*' {
            out.push_str(&css[seg..i]);
            match css[i + 2..].find("*/") {
                Some(e) => {
                    i = i + 2 + e + 2;
                    seg = i;
                }
                None => {
                    seg = css.len();
                    break;
                }
            }
        } else {
            i += 1;
        }
    }
    out.push_str(&css[seg..]);
    out
}

/// Extract every complete `@font-face { ... }` block, matching braces by
/// depth so nested braces and multi-line bodies survive. Extraction stops at
/// the first unbalanced block and returns whatever was found up to that
/// point.
pub fn extract_font_face_blocks(css: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut pos = 0;
    while let Some(start) = find_ci(css, "@font-face", pos) {
        let open = match css[start..].find('{') {
            Some(rel) => start + rel,
            None => break,
        };
        let mut depth = 0i32;
        let mut end = None;
        for (i, ch) in css[open..].char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(open + i + ch.len_utf8());
                        break;
                    }
                }
                _ => {}
            }
        }
        match end {
            Some(e) => {
                blocks.push(css[start..e].trim().to_string());
                pos = e;
            }
            // Unbalanced braces: stop scanning this source entirely.
            None => break,
        }
    }
    blocks
}

/// Find the targets of every `@import` directive, covering both the
/// `url(...)` form and the bare-string form.
pub fn find_imports(css: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(start) = find_ci(css, "@import", pos) {
        let after = start + "@import".len();
        let rest = css[after..].trim_start();
        let target = if rest.len() >= 4 && rest.as_bytes()[..4].eq_ignore_ascii_case(b"url(") {
            read_url_token(&rest[4..]).map(|(raw, _)| strip_quotes(raw.trim()).1.trim().to_string())
        } else if let Some(q) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') {
            rest[1..].find(q).map(|e| rest[1..1 + e].to_string())
        } else {
            None
        };
        if let Some(t) = target {
            if !t.is_empty() {
                out.push(t);
            }
        }
        pos = after;
    }
    out
}

/// Rewrite every `url(...)` reference in `css` to an absolute URL resolved
/// against `base`. References that are already absolute (any scheme,
/// including `data:` and `blob:`), protocol-relative, or fragment-only are
/// left untouched, as is anything the URL parser rejects.
pub fn rebase_urls(css: &str, base: &Url) -> String {
    let mut out = String::with_capacity(css.len());
    let mut pos = 0;
    while let Some(start) = find_ci(css, "url(", pos) {
        out.push_str(&css[pos..start]);
        let inner = start + 4;
        let (raw, consumed) = match read_url_token(&css[inner..]) {
            Some(tok) => tok,
            None => {
                // No closing paren; emit verbatim and stop rewriting.
                out.push_str(&css[start..]);
                return out;
            }
        };
        let (quote, target) = strip_quotes(raw.trim());
        let target = target.trim();
        let rebased = if keep_verbatim(target) {
            target.to_string()
        } else {
            match base.join(target) {
                Ok(abs) => abs.to_string(),
                Err(_) => target.to_string(),
            }
        };
        out.push_str("url(");
        match quote {
            Some(q) => {
                out.push(q);
                out.push_str(&rebased);
                out.push(q);
            }
            None => out.push_str(&rebased),
        }
        out.push(')');
        pos = inner + consumed;
    }
    out.push_str(&css[pos..]);
    out
}

/// Resolve an href against a base URL; `None` for anything unparseable.
pub fn resolve_href(href: &str, base: &Url) -> Option<Url> {
    base.join(href.trim()).ok()
}

/// Read the body of a `url(...)` token, given the text just past `url(`.
/// Returns the raw token (quotes included) and the byte count consumed
/// through the closing paren. Quoted bodies may contain `)`.
fn read_url_token(rest: &str) -> Option<(&str, usize)> {
    let trimmed = rest.trim_start();
    let lead = rest.len() - trimmed.len();
    let first = trimmed.chars().next()?;
    if first == '\'' || first == '"' {
        let body = &trimmed[1..];
        let endq = body.find(first)?;
        let close = body[endq + 1..].find(')')?;
        Some((&trimmed[..endq + 2], lead + endq + 2 + close + 1))
    } else {
        let close = trimmed.find(')')?;
        Some((&trimmed[..close], lead + close + 1))
    }
}

/// Split a possibly-quoted value into its quote char and inner text.
fn strip_quotes(s: &str) -> (Option<char>, &str) {
    let mut chars = s.chars();
    match (chars.next(), s.chars().last()) {
        (Some(q @ ('\'' | '"')), Some(last)) if last == q && s.len() >= 2 => {
            (Some(q), &s[1..s.len() - 1])
        }
        _ => (None, s),
    }
}

fn keep_verbatim(target: &str) -> bool {
    target.is_empty() || target.starts_with('#') || target.starts_with("//") || has_scheme(target)
}

/// RFC 3986 scheme check: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":".
/// Covers `http:`, `https:`, `data:`, `blob:`, and friends.
fn has_scheme(s: &str) -> bool {
    match s.find(':') {
        Some(i) if i > 0 => s[..i].chars().enumerate().all(|(j, c)| {
            if j == 0 {
                c.is_ascii_alphabetic()
            } else {
                c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')
            }
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/styles/x.css").unwrap()
    }

    #[test]
    fn strips_block_comments() {
        assert_eq!(strip_comments("a /* b */ c"), "a  c");
        assert_eq!(strip_comments("/* x */y/* z */"), "y");
        // Unterminated comment drops the remainder.
        assert_eq!(strip_comments("a /* never closed"), "a ");
    }

    #[test]
    fn extracts_multiline_font_face_blocks() {
        let css = "body{color:red}\n@font-face {\n  font-family: 'A';\n  src: url(a.woff2);\n}\n@FONT-FACE{font-family:B;src:url(b.woff2)}";
        let blocks = extract_font_face_blocks(css);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("font-family: 'A'"));
        assert!(blocks[1].starts_with("@FONT-FACE"));
    }

    #[test]
    fn unbalanced_block_truncates_extraction() {
        let css = "@font-face{font-family:A;src:url(a.woff2)}\n@font-face{font-family:B;src:url(b.woff2)\n@font-face{font-family:C}";
        let blocks = extract_font_face_blocks(css);
        // B opens a brace that C's opener nests into and nothing closes, so
        // extraction stops after A.
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("font-family:A"));
    }

    #[test]
    fn finds_imports_in_both_forms() {
        let css = "@import url(\"a.css\");\n@import 'b.css';\n@import url( c.css ) screen;";
        assert_eq!(find_imports(css), vec!["a.css", "b.css", "c.css"]);
    }

    #[test]
    fn rebases_relative_urls() {
        let css = "@font-face{src:url(../fonts/a.woff2)}";
        assert_eq!(
            rebase_urls(css, &base()),
            "@font-face{src:url(https://example.com/fonts/a.woff2)}"
        );
    }

    #[test]
    fn preserves_quote_style() {
        let css = "src: url('f.woff2'), url(\"g.woff2\")";
        assert_eq!(
            rebase_urls(css, &base()),
            "src: url('https://example.com/styles/f.woff2'), url(\"https://example.com/styles/g.woff2\")"
        );
    }

    #[test]
    fn leaves_absolute_and_special_urls_untouched() {
        for css in [
            "src:url(data:font/woff2;base64,AAAA)",
            "src:url(https://cdn.example.com/f.woff2)",
            "src:url(blob:abc-123)",
            "src:url(#frag)",
            "src:url(//cdn.example.com/f.woff2)",
        ] {
            assert_eq!(rebase_urls(css, &base()), css, "should keep {css} verbatim");
        }
    }

    #[test]
    fn resolves_hrefs_against_base() {
        let abs = resolve_href("../main.css", &base()).unwrap();
        assert_eq!(abs.as_str(), "https://example.com/main.css");
    }
}
