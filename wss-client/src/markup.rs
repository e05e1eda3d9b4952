//! Minimal element scanner for template markup.
//!
//! Only what binding needs: locate elements by class, read or replace their
//! content, drop them. Tags are matched by name with nesting, void elements
//! and `/>` have no content. Comments and closing tags are skipped.

/// Byte offsets of one element within its markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub start: usize,
    pub content_start: usize,
    pub content_end: usize,
    pub end: usize,
}

impl Element {
    fn has_content(&self) -> bool {
        self.content_start != self.end
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

struct OpenTag<'a> {
    name: &'a str,
    attrs: &'a str,
    end: usize,
    self_closing: bool,
}

/// First element at or after `from` carrying `class`.
pub fn find_by_class(html: &str, class: &str, from: usize) -> Option<Element> {
    let mut pos = from;
    while let Some(offset) = html.get(pos..)?.find('<') {
        let start = pos + offset;
        match parse_open_tag(html, start) {
            Some(tag) if has_class(tag.attrs, class) => return Some(close_element(html, start, &tag)),
            Some(tag) => pos = tag.end,
            None => pos = start + 1,
        }
    }
    None
}

pub fn outer_by_class<'a>(html: &'a str, class: &str) -> Option<&'a str> {
    find_by_class(html, class, 0).map(|el| &html[el.start..el.end])
}

pub fn inner_by_class<'a>(html: &'a str, class: &str) -> Option<&'a str> {
    find_by_class(html, class, 0).map(|el| &html[el.content_start..el.content_end])
}

/// Removes every element carrying `class`, children included.
pub fn remove_by_class(html: &str, class: &str) -> String {
    let mut out = html.to_string();
    while let Some(el) = find_by_class(&out, class, 0) {
        out.replace_range(el.start..el.end, "");
    }
    out
}

/// Replaces the content of every element carrying `class` with escaped text.
pub fn set_text_by_class(html: &str, class: &str, text: &str) -> String {
    let escaped = escape(text);
    let mut out = html.to_string();
    let mut from = 0;
    while let Some(el) = find_by_class(&out, class, from) {
        if !el.has_content() {
            from = el.end;
            continue;
        }
        out.replace_range(el.content_start..el.content_end, &escaped);
        from = el.content_start + escaped.len();
    }
    out
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn tag_name(rest: &str) -> &str {
    let len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(rest.len());
    &rest[..len]
}

fn parse_open_tag(html: &str, start: usize) -> Option<OpenTag<'_>> {
    let rest = &html[start + 1..];
    let name = tag_name(rest);
    if name.is_empty() {
        return None;
    }
    let close = tag_end(rest, name.len())?;
    let attrs = &rest[name.len()..close];
    Some(OpenTag {
        name,
        attrs,
        end: start + 1 + close + 1,
        self_closing: attrs.trim_end().ends_with('/'),
    })
}

/// Index of the `>` ending a tag, skipping quoted attribute values.
fn tag_end(rest: &str, from: usize) -> Option<usize> {
    let mut quote = None;
    for (i, c) in rest[from..].char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => return Some(from + i),
            None => {}
        }
    }
    None
}

fn has_class(attrs: &str, class: &str) -> bool {
    class_attr(attrs).is_some_and(|value| value.split_ascii_whitespace().any(|c| c == class))
}

fn class_attr(attrs: &str) -> Option<&str> {
    let mut search = 0;
    while let Some(i) = attrs[search..].find("class") {
        let at = search + i;
        search = at + "class".len();
        let standalone = attrs[..at].ends_with(|c: char| c.is_ascii_whitespace());
        let Some(value) = attrs[search..].trim_start().strip_prefix('=') else {
            continue;
        };
        if !standalone {
            continue;
        }
        let value = value.trim_start();
        return match value.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &value[1..];
                body.find(quote).map(|end| &body[..end])
            }
            _ => {
                let end = value
                    .find(|c: char| c.is_ascii_whitespace() || c == '/')
                    .unwrap_or(value.len());
                Some(&value[..end])
            }
        };
    }
    None
}

fn closing_name(html: &str, at: usize) -> Option<&str> {
    let rest = html[at..].strip_prefix("</")?;
    let name = tag_name(rest);
    (!name.is_empty()).then_some(name)
}

fn close_element(html: &str, start: usize, tag: &OpenTag<'_>) -> Element {
    let leaf = Element {
        start,
        content_start: tag.end,
        content_end: tag.end,
        end: tag.end,
    };
    if tag.self_closing
        || VOID_ELEMENTS
            .iter()
            .any(|void| void.eq_ignore_ascii_case(tag.name))
    {
        return leaf;
    }

    let mut depth = 1usize;
    let mut pos = tag.end;
    while let Some(offset) = html[pos..].find('<') {
        let at = pos + offset;
        if let Some(name) = closing_name(html, at) {
            let end = html[at..].find('>').map_or(html.len(), |i| at + i + 1);
            if name.eq_ignore_ascii_case(tag.name) {
                depth -= 1;
                if depth == 0 {
                    return Element {
                        start,
                        content_start: tag.end,
                        content_end: at,
                        end,
                    };
                }
            }
            pos = end;
            continue;
        }
        match parse_open_tag(html, at) {
            Some(inner) => {
                if inner.name.eq_ignore_ascii_case(tag.name) && !inner.self_closing {
                    depth += 1;
                }
                pos = inner.end;
            }
            None => pos = at + 1,
        }
    }

    // Unclosed element runs to the end of the markup.
    Element {
        start,
        content_start: tag.end,
        content_end: html.len(),
        end: html.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = r#"<ul class="wssMinecraftPlayerList">
  <li class="wssListItemTemplate"><div><span class="name">#wssPlayerName#</span></div></li>
  <li class="empty wssEmptyListTemplate">Nobody online</li>
</ul>"#;

    #[test]
    fn test_inner_and_outer() {
        assert_eq!(
            inner_by_class(LIST, "wssListItemTemplate"),
            Some(r#"<div><span class="name">#wssPlayerName#</span></div>"#)
        );
        assert_eq!(
            outer_by_class(LIST, "wssEmptyListTemplate"),
            Some(r#"<li class="empty wssEmptyListTemplate">Nobody online</li>"#)
        );
        assert_eq!(inner_by_class(LIST, "missing"), None);
    }

    #[test]
    fn test_class_must_match_a_whole_token() {
        assert_eq!(find_by_class(r#"<p class="wssPlayerIsNotOperator">x</p>"#, "wssPlayerIsOperator", 0), None);
        assert_eq!(find_by_class(r#"<p data-class="a">x</p>"#, "a", 0), None);
        assert!(find_by_class(r#"<p class=a>x</p>"#, "a", 0).is_some());
    }

    #[test]
    fn test_nested_same_tag() {
        let html = r#"<div class="outer"><div>inner</div></div><div>after</div>"#;
        assert_eq!(inner_by_class(html, "outer"), Some("<div>inner</div>"));
    }

    #[test]
    fn test_remove_by_class() {
        let html = r#"<b class="op">OP</b><i>name</i><img class="op" src="x.png"><b class="op">again</b>"#;
        assert_eq!(remove_by_class(html, "op"), "<i>name</i>");
    }

    #[test]
    fn test_set_text_escapes() {
        let html = r#"<span class="wssMinecraftMOTD">old</span><hr class="wssMinecraftMOTD"/>"#;
        assert_eq!(
            set_text_by_class(html, "wssMinecraftMOTD", "<b>&"),
            r#"<span class="wssMinecraftMOTD">&lt;b&gt;&amp;</span><hr class="wssMinecraftMOTD"/>"#
        );
    }

    #[test]
    fn test_attribute_with_angle_bracket() {
        let html = r#"<a title="a > b" class="link">go</a>"#;
        assert_eq!(inner_by_class(html, "link"), Some("go"));
    }
}
