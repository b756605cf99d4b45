//! Minimal markup helpers for hand-authored report pages
//!
//! Reports are small and regular, so elements are located by their class
//! attribute and sliced with a depth counter instead of building a DOM.

use regex::Regex;
use std::sync::LazyLock;

static OPEN_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<([a-z][a-z0-9]*)\b([^>]*)>"#).unwrap()
});
static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\bclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap());

/// An element located in a document
#[derive(Debug, Clone)]
pub struct Element<'a> {
    /// Tag name, lowercase
    pub tag: String,
    /// Class tokens, in document order
    pub classes: Vec<String>,
    /// Markup between the opening and the matching closing tag
    pub inner: &'a str,
}

impl Element<'_> {
    /// Flattened, decoded, whitespace-collapsed text content
    pub fn text(&self) -> String {
        text_content(self.inner)
    }
}

/// Find every `tag` element carrying `class`, outermost first
///
/// Elements nested inside a match are not reported separately.
pub fn find_by_class<'a>(html: &'a str, tag: &str, class: &str) -> Vec<Element<'a>> {
    let lc = html.to_ascii_lowercase();
    let mut found = Vec::new();
    let mut from = 0;

    while let Some(caps) = OPEN_TAG_RE.captures_at(html, from) {
        let whole = caps.get(0).map_or(from..from, |m| m.range());
        let name = caps[1].to_ascii_lowercase();
        let classes = class_tokens(&caps[2]);

        if name == tag && classes.iter().any(|c| c == class) {
            if let Some(end) = closing_tag_start(&lc, &name, whole.end) {
                found.push(Element {
                    tag: name.clone(),
                    classes,
                    inner: &html[whole.end..end],
                });
                from = end;
                continue;
            }
        }
        from = whole.end;
    }

    found
}

fn class_tokens(attrs: &str) -> Vec<String> {
    CLASS_ATTR_RE
        .captures(attrs)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Byte offset of the `</tag>` balancing an opening tag that ends at `from`
///
/// `lc` is the ASCII-lowercased document; offsets match the original.
fn closing_tag_start(lc: &str, tag: &str, from: usize) -> Option<usize> {
    let open = format!("<{}", tag);
    let close = format!("</{}", tag);
    let mut depth = 1usize;
    let mut pos = from;

    loop {
        let next_close = find_tag(lc, &close, pos)?;
        let next_open = find_tag(lc, &open, pos).filter(|&i| i < next_close);

        match next_open {
            Some(i) => {
                depth += 1;
                pos = i + open.len();
            }
            None => {
                depth -= 1;
                if depth == 0 {
                    return Some(next_close);
                }
                pos = next_close + close.len();
            }
        }
    }
}

/// Next occurrence of `pat` at or after `from` that ends a tag name
///
/// "<div" must not match "<divider".
fn find_tag(lc: &str, pat: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    loop {
        let at = lc[pos..].find(pat)? + pos;
        let after = at + pat.len();
        let boundary = lc[after..]
            .chars()
            .next()
            .is_none_or(|c| c.is_whitespace() || c == '>' || c == '/');
        if boundary {
            return Some(at);
        }
        pos = after;
    }
}

/// Strip tags, decode entities and collapse whitespace
pub fn text_content(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut in_tag = false;

    for ch in markup.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }

    normalize_ws(&decode_entities(&out))
}

/// Decode the named entities reports use plus numeric references
pub fn decode_entities(s: &str) -> String {
    let named = s
        .replace("&nbsp;", " ")
        .replace("&plusmn;", "±")
        .replace("&ndash;", "–")
        .replace("&mdash;", "—")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");

    let numeric = NUMERIC_ENTITY_RE.replace_all(&named, |caps: &regex::Captures| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    // last, so "&amp;lt;" stays "&lt;"
    numeric.replace("&amp;", "&")
}

/// Collapse whitespace runs to single spaces and trim
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_class_ignores_tag_case() {
        let html = r#"<DIV class="dating-method esr"><Div>x</Div></div><div class="dating-method tl">y</DIV>"#;

        let blocks = find_by_class(html, "div", "dating-method");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].inner, "<Div>x</Div>");
        assert_eq!(blocks[1].text(), "y");
    }

    #[test]
    fn test_find_by_class_balances_nested_divs() {
        let html = r#"
            <div class="dating-method osl">
              <div class="data-row"><span>a</span></div>
              <div class="data-row"><span>b</span></div>
            </div>
            <div class="dating-method tl"><div class="data-row">c</div></div>
        "#;

        let blocks = find_by_class(html, "div", "dating-method");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].classes, vec!["dating-method", "osl"]);
        assert_eq!(find_by_class(blocks[0].inner, "div", "data-row").len(), 2);
        assert_eq!(blocks[1].text(), "c");
    }

    #[test]
    fn test_class_match_is_per_token() {
        let html = r#"<div class="dating-methods">x</div><div class='dating-method'>y</div>"#;
        let blocks = find_by_class(html, "div", "dating-method");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text(), "y");
    }

    #[test]
    fn test_similar_tag_names_do_not_nest() {
        let html = r#"<div class="x"><divider></divider>in</div>"#;
        let blocks = find_by_class(html, "div", "x");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text(), "in");
    }

    #[test]
    fn test_text_content() {
        assert_eq!(
            text_content("<strong>300</strong>&nbsp;&plusmn; 30\n   ka"),
            "300 ± 30 ka"
        );
        assert_eq!(text_content("190&ndash;320"), "190–320");
        assert_eq!(text_content("Gr&#252;n &amp; Stringer"), "Grün & Stringer");
        assert_eq!(text_content("&#xB1;"), "±");
    }

    #[test]
    fn test_unclosed_element_is_ignored() {
        let html = r#"<div class="dating-method osl"><div class="data-row">x</div>"#;
        assert!(find_by_class(html, "div", "dating-method").is_empty());
    }
}
