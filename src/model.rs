use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

use crate::markup::escape_attr;

/// Chapter URL to subchapter anchors, ordered by URL.
pub type LinkMap = BTreeMap<String, Vec<String>>;

/// An image embedded in a fragment, referenced from the markup by an `img`
/// tag opening with `src="embed:<placeholder>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub placeholder: String,
    pub bytes: Arc<[u8]>,
    pub original_filename: String,
}

/// Sanitized chapter markup plus the images it embeds.
///
/// Emitters never edit the markup; they choose how each placeholder is
/// resolved when rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    markup: String,
    images: Vec<EmbeddedImage>,
}

impl Fragment {
    pub fn new(markup: String, images: Vec<EmbeddedImage>) -> Self {
        Self { markup, images }
    }

    /// Markup with unresolved image placeholders.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn images(&self) -> &[EmbeddedImage] {
        &self.images
    }

    /// Renders the markup, asking `src_for` for the `src` of every image.
    pub fn render<F>(&self, mut src_for: F) -> String
    where
        F: FnMut(&EmbeddedImage) -> String,
    {
        let mut out = self.markup.clone();
        for image in &self.images {
            let target = format!("<img src=\"{}\"", escape_attr(&src_for(image)));
            out = out.replace(&placeholder_tag(&image.placeholder), &target);
        }
        out
    }

    /// Markup with every image inlined as a `data:` URI.
    pub fn inline_html(&self) -> String {
        self.render(|image| data_uri(&image.bytes))
    }
}

pub fn placeholder_src(placeholder: &str) -> String {
    format!("embed:{}", placeholder)
}

/// Start of the tag the sanitizer writes for an embedded image. `src` is
/// always its first attribute, and text nodes escape `"`, so this cannot
/// occur anywhere else in a fragment.
pub(crate) fn placeholder_tag(placeholder: &str) -> String {
    format!("<img src=\"{}\"", placeholder_src(placeholder))
}

pub fn data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

#[derive(Debug, Clone)]
pub struct ChapterRecord {
    /// 1-based position in URL order among the chapters that succeeded.
    pub number: usize,
    pub id: String,
    pub title: String,
    pub url: String,
    pub content: Fragment,
    pub subchapters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub number: usize,
    pub title: String,
    pub id: String,
    pub subchapters: Vec<String>,
}

impl From<&ChapterRecord> for TocEntry {
    fn from(record: &ChapterRecord) -> Self {
        Self {
            number: record.number,
            title: record.title.clone(),
            id: record.id.clone(),
            subchapters: record.subchapters.clone(),
        }
    }
}

/// Anchor-safe identifier from the last path segment of a chapter URL.
pub fn chapter_id(url: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .unwrap_or_else(|| url.rsplit('/').next().unwrap_or(url).to_string());

    let mut id = String::with_capacity(segment.len());
    let mut pending_sep = false;
    for c in segment.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !id.is_empty() {
                id.push('_');
            }
            pending_sep = false;
            id.push(c);
        } else {
            pending_sep = true;
        }
    }

    if id.is_empty() {
        "chapter".to_string()
    } else {
        id
    }
}

/// Display label for a subchapter anchor: underscores become spaces, the
/// first letter is capitalized.
pub fn humanize_anchor(anchor: &str) -> String {
    let spaced = anchor.replace('_', " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_ids_collapse_separator_runs() {
        assert_eq!(
            chapter_id("https://wiki.freecad.org/Manual:Install"),
            "Manual_Install"
        );
        assert_eq!(
            chapter_id("https://wiki.freecad.org/Manual:A_quick_tour_of_FreeCAD"),
            "Manual_A_quick_tour_of_FreeCAD"
        );
        assert_eq!(
            chapter_id("https://wiki.freecad.org/Manual::%20Odd--name::"),
            "Manual_20Odd_name"
        );
        assert_eq!(chapter_id("https://wiki.freecad.org/"), "chapter");
    }

    #[test]
    fn anchors_are_humanized_for_display() {
        assert_eq!(humanize_anchor("Setup"), "Setup");
        assert_eq!(humanize_anchor("installing_on_linux"), "Installing on linux");
        assert_eq!(humanize_anchor(""), "");
    }

    #[test]
    fn render_resolves_each_placeholder() {
        let bytes: Arc<[u8]> = Arc::from(vec![1u8, 2, 3]);
        let fragment = Fragment::new(
            format!(
                r#"<div>{} />{} /></div>"#,
                placeholder_tag("img0"),
                placeholder_tag("img1")
            ),
            vec![
                EmbeddedImage {
                    placeholder: "img0".to_string(),
                    bytes: bytes.clone(),
                    original_filename: "a.png".to_string(),
                },
                EmbeddedImage {
                    placeholder: "img1".to_string(),
                    bytes,
                    original_filename: "b.png".to_string(),
                },
            ],
        );

        let html = fragment.render(|image| format!("images/{}", image.original_filename));
        assert_eq!(
            html,
            r#"<div><img src="images/a.png" /><img src="images/b.png" /></div>"#
        );
        assert!(fragment
            .inline_html()
            .contains(r#"src="data:image/png;base64,AQID""#));
        assert!(fragment.markup().contains("embed:img0"));
    }

    #[test]
    fn render_leaves_placeholder_lookalikes_alone() {
        let fragment = Fragment::new(
            format!(
                r#"<div><img alt="x" src="embed:img0" /><p data-src="embed:img0">{} /></p></div>"#,
                placeholder_tag("img0")
            ),
            vec![EmbeddedImage {
                placeholder: "img0".to_string(),
                bytes: Arc::from(vec![1u8]),
                original_filename: "a.png".to_string(),
            }],
        );

        let html = fragment.render(|_| "images/a.png".to_string());
        assert_eq!(
            html,
            r#"<div><img alt="x" src="embed:img0" /><p data-src="embed:img0"><img src="images/a.png" /></p></div>"#
        );
    }
}
