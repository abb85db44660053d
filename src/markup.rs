//! Canonical serialization of a parsed subtree.
//!
//! Output is well-formed XHTML: void elements are self-closed, text and
//! attribute values are escaped, comments are dropped. Serializing the parse
//! of serialized output reproduces it byte for byte.

use scraper::{ElementRef, Node};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// What to do with one element while serializing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Keep,
    Drop,
    /// Keep the element and its children, but write these attributes.
    Attributes(Vec<(String, String)>),
}

pub fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Serializes `root` and its descendants; `before_children` is written right
/// after the opening tag of `root` itself.
pub fn serialize<F>(root: ElementRef<'_>, before_children: &str, mut edit: F) -> String
where
    F: FnMut(ElementRef<'_>) -> Edit,
{
    let mut out = String::new();
    write_element(root, Some(before_children), &mut edit, &mut out);
    out
}

fn write_element<F>(element: ElementRef<'_>, inject: Option<&str>, edit: &mut F, out: &mut String)
where
    F: FnMut(ElementRef<'_>) -> Edit,
{
    let attrs: Vec<(String, String)> = match edit(element) {
        Edit::Drop => return,
        Edit::Keep => element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        Edit::Attributes(attrs) => attrs,
    };

    let name = element.value().name();
    out.push('<');
    out.push_str(name);
    for (key, value) in &attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }

    if is_void(name) {
        out.push_str(" />");
        return;
    }
    out.push('>');
    if let Some(inject) = inject {
        out.push_str(inject);
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(child, None, edit, out);
                }
            }
            _ => {}
        }
    }
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Text nodes escape `"` as well, so serialized text never looks like
/// attribute markup.
pub fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attr(input: &str) -> String {
    escape_text(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        doc.select(&Selector::parse(css).unwrap()).next().unwrap()
    }

    #[test]
    fn void_tags_are_self_closed_and_text_escaped() {
        let doc = Html::parse_document(
            r#"<div id="c"><p>a &lt; b &amp; c</p><pre>src="x"</pre><img src="x.png" alt='say "hi"'><br></div>"#,
        );
        let out = serialize(first(&doc, "#c"), "", |_| Edit::Keep);
        assert_eq!(
            out,
            r#"<div id="c"><p>a &lt; b &amp; c</p><pre>src=&quot;x&quot;</pre><img src="x.png" alt="say &quot;hi&quot;" /><br /></div>"#
        );
    }

    #[test]
    fn dropped_elements_and_comments_vanish() {
        let doc = Html::parse_document(
            r#"<div id="c"><!-- note --><nav>menu</nav><p>kept</p></div>"#,
        );
        let out = serialize(first(&doc, "#c"), "<h1>T</h1>", |el| {
            if el.value().name() == "nav" {
                Edit::Drop
            } else {
                Edit::Keep
            }
        });
        assert_eq!(out, r#"<div id="c"><h1>T</h1><p>kept</p></div>"#);
    }

    #[test]
    fn serialization_is_a_fixed_point() {
        let doc = Html::parse_document(
            r#"<div id="c" class="x"><table><tr><td>1 &gt; 0</td></tr></table><p>caf&eacute;&nbsp;bar</p></div>"#,
        );
        let once = serialize(first(&doc, "#c"), "", |_| Edit::Keep);
        let reparsed = Html::parse_document(&once);
        let twice = serialize(first(&reparsed, "#c"), "", |_| Edit::Keep);
        assert_eq!(once, twice);
        assert!(once.contains("<tbody>"));
    }
}
