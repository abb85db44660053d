//! Turns one rendered page into a self-contained chapter fragment.
//!
//! The page is parsed once and serialized once; images found on the way are
//! replaced by placeholders, embedded through the [`AssetPipeline`], and put
//! back to their original reference when embedding fails.

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

use crate::assets::AssetPipeline;
use crate::error::SanitizeError;
use crate::markup::{escape_attr, escape_text, serialize, Edit};
use crate::model::{placeholder_src, placeholder_tag, EmbeddedImage, Fragment};
use crate::profile::ManualProfile;
use crate::session::AssetSource;

pub(crate) fn compile_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector '{}': {:?}", css, e))
}

pub struct Sanitizer {
    chrome: Vec<Selector>,
    content: Vec<(String, Selector)>,
    heading: Selector,
}

/// An image reference that will be embedded if its download succeeds.
#[derive(Debug)]
struct ImageSlot {
    placeholder: String,
    url: Url,
    original_src: String,
    srcset: Option<String>,
}

#[derive(Debug)]
struct Draft {
    markup: String,
    images: Vec<ImageSlot>,
}

impl Sanitizer {
    pub fn new(profile: &ManualProfile) -> Result<Self> {
        let chrome = profile
            .chrome_selectors
            .iter()
            .map(|css| compile_selector(css))
            .collect::<Result<Vec<_>>>()?;
        let content = profile
            .content_selectors
            .iter()
            .map(|css| Ok((css.clone(), compile_selector(css)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            chrome,
            content,
            heading: compile_selector("h1")?,
        })
    }

    /// `sanitize(raw_html, chapter_title, chapter_id) -> fragment | failure`
    ///
    /// `page_url` is the address the page was fetched from; relative image and
    /// link targets are resolved against it.
    pub async fn sanitize<S>(
        &self,
        raw_html: &str,
        chapter_title: &str,
        chapter_id: &str,
        page_url: &Url,
        assets: &mut AssetPipeline<'_, S>,
    ) -> Result<Fragment, SanitizeError>
    where
        S: AssetSource + ?Sized + Sync,
    {
        let Draft { mut markup, images } =
            self.plan(raw_html, chapter_title, chapter_id, page_url)?;

        let mut embedded = Vec::new();
        for slot in images {
            match assets.embed(&slot.url).await {
                Ok(asset) => embedded.push(EmbeddedImage {
                    placeholder: slot.placeholder,
                    bytes: asset.bytes,
                    original_filename: asset.filename,
                }),
                Err(e) => {
                    debug!(url = %slot.url, error = %e, "Keeping original image reference");
                    let mut restored = format!("<img src=\"{}\"", escape_attr(&slot.original_src));
                    if let Some(srcset) = &slot.srcset {
                        restored.push_str(&format!(" srcset=\"{}\"", escape_attr(srcset)));
                    }
                    markup = markup.replace(&placeholder_tag(&slot.placeholder), &restored);
                }
            }
        }

        Ok(Fragment::new(markup, embedded))
    }

    fn plan(
        &self,
        raw_html: &str,
        chapter_title: &str,
        chapter_id: &str,
        page_url: &Url,
    ) -> Result<Draft, SanitizeError> {
        let document = Html::parse_document(raw_html);

        let mut chrome = HashSet::new();
        for selector in &self.chrome {
            for element in document.select(selector) {
                chrome.insert(element.id());
            }
        }
        let is_chrome = |element: &ElementRef<'_>| {
            chrome.contains(&element.id())
                || element.ancestors().any(|node| chrome.contains(&node.id()))
        };

        let container = self
            .content
            .iter()
            .find_map(|(css, selector)| {
                let found = document.select(selector).find(|el| !is_chrome(el));
                if found.is_some() {
                    debug!(selector = %css, "Content container found");
                }
                found
            })
            .ok_or(SanitizeError::NoContentContainer {
                tried: self.content.len(),
            })?;

        // The chapter anchor goes on an existing h1 when it has no id of its
        // own; otherwise a new heading carries it.
        let headings: Vec<ElementRef<'_>> = container
            .select(&self.heading)
            .filter(|h| !is_chrome(h))
            .collect();
        let anchored = headings.iter().any(|h| h.value().id() == Some(chapter_id));
        let retarget = headings
            .first()
            .filter(|h| !anchored && h.value().id().is_none())
            .map(|h| h.id());
        let heading = if anchored || retarget.is_some() {
            String::new()
        } else {
            format!(
                "<h1 id=\"{}\">{}</h1>",
                escape_attr(chapter_id),
                escape_text(chapter_title)
            )
        };

        let mut images = Vec::new();
        let markup = serialize(container, &heading, |element| {
            if chrome.contains(&element.id()) {
                return Edit::Drop;
            }
            if retarget == Some(element.id()) {
                let mut attrs = vec![("id".to_string(), chapter_id.to_string())];
                attrs.extend(
                    element
                        .value()
                        .attrs()
                        .map(|(name, value)| (name.to_string(), value.to_string())),
                );
                return Edit::Attributes(attrs);
            }
            match element.value().name() {
                "img" => self.plan_image(element, page_url, &mut images),
                "a" => rewrite_link(element, page_url),
                _ => Edit::Keep,
            }
        });

        Ok(Draft { markup, images })
    }

    fn plan_image(
        &self,
        element: ElementRef<'_>,
        page_url: &Url,
        images: &mut Vec<ImageSlot>,
    ) -> Edit {
        let Some(src) = element.value().attr("src") else {
            return Edit::Keep;
        };
        let Some(url) = resolve_image_src(src, page_url) else {
            if src.starts_with(&placeholder_src("")) {
                // Would be mistaken for one of ours.
                return Edit::Attributes(other_attrs(element, &["src", "srcset"]));
            }
            return Edit::Keep;
        };

        let placeholder = format!("img{}", images.len());
        let mut attrs = vec![("src".to_string(), placeholder_src(&placeholder))];
        attrs.extend(other_attrs(element, &["src", "srcset"]));

        images.push(ImageSlot {
            placeholder,
            url,
            original_src: src.to_string(),
            srcset: element.value().attr("srcset").map(str::to_string),
        });
        Edit::Attributes(attrs)
    }
}

fn other_attrs(element: ElementRef<'_>, skip: &[&str]) -> Vec<(String, String)> {
    element
        .value()
        .attrs()
        .filter(|(name, _)| !skip.contains(name))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Absolute URL for site-root-relative, protocol-relative and absolute
/// image sources; `None` for anything else (data URIs, page-relative paths).
pub fn resolve_image_src(src: &str, page_url: &Url) -> Option<Url> {
    let src = src.trim();
    if src.starts_with('/') {
        page_url.join(src).ok()
    } else if src.starts_with("http://") || src.starts_with("https://") {
        Url::parse(src).ok()
    } else {
        None
    }
}

fn rewrite_link(element: ElementRef<'_>, page_url: &Url) -> Edit {
    let Some(href) = element.value().attr("href") else {
        return Edit::Keep;
    };
    if !href.starts_with('/') || href.starts_with("//") {
        return Edit::Keep;
    }
    let Ok(absolute) = page_url.join(href) else {
        warn!(href = %href, "Cannot resolve link");
        return Edit::Keep;
    };
    Edit::Attributes(
        element
            .value()
            .attrs()
            .map(|(name, value)| {
                if name == "href" {
                    (name.to_string(), absolute.to_string())
                } else {
                    (name.to_string(), value.to_string())
                }
            })
            .collect(),
    )
}
