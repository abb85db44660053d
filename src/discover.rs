//! Reads the manual's table of contents into a [`LinkMap`].

use anyhow::Result;
use colored::*;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{DiscoveryError, FetchError};
use crate::model::LinkMap;
use crate::profile::{ManualProfile, TocStrategy};
use crate::sanitizer::compile_selector;
use crate::session::PageSource;

enum CompiledStrategy {
    Container(String, Selector),
    AnyManualLink,
}

pub struct LinkDiscoverer {
    path_prefix: String,
    strategies: Vec<CompiledStrategy>,
    anchors: Selector,
}

impl LinkDiscoverer {
    pub fn new(profile: &ManualProfile) -> Result<Self> {
        let strategies = profile
            .toc_strategies
            .iter()
            .map(|strategy| {
                Ok(match strategy {
                    TocStrategy::Container(css) => {
                        CompiledStrategy::Container(css.clone(), compile_selector(css)?)
                    }
                    TocStrategy::AnyManualLink => CompiledStrategy::AnyManualLink,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            path_prefix: profile.path_prefix.clone(),
            strategies,
            anchors: compile_selector("a[href]")?,
        })
    }

    /// `discover(root_url) -> LinkMap`; an empty map is reported as an error.
    pub async fn discover<P>(&self, source: &P, root_url: &str) -> Result<LinkMap, DiscoveryError>
    where
        P: PageSource + ?Sized + Sync,
    {
        info!("Fetching manual links from {}", root_url.green());
        let root =
            Url::parse(root_url).map_err(|_| FetchError::InvalidUrl(root_url.to_string()))?;
        let html = source.render_page(root.as_str()).await?;

        let links = self.extract_links(&html, &root);
        if links.is_empty() {
            warn!("Could not find a table of contents on {}", root_url);
            return Err(DiscoveryError::NoTableOfContents {
                url: root_url.to_string(),
            });
        }

        info!("Found {} unique manual pages", links.len());
        Ok(links)
    }

    /// Builds the link map from the root page markup. Empty when no strategy
    /// finds a manual link.
    pub fn extract_links(&self, html: &str, root: &Url) -> LinkMap {
        let document = Html::parse_document(html);

        for strategy in &self.strategies {
            let found = match strategy {
                CompiledStrategy::Container(css, selector) => match document.select(selector).next() {
                    Some(container) => self.collect(container, root),
                    None => {
                        debug!(selector = %css, "TOC container not present");
                        continue;
                    }
                },
                CompiledStrategy::AnyManualLink => self.collect(document.root_element(), root),
            };

            if found.is_empty() {
                continue;
            }

            let mut links = LinkMap::new();
            for (chapter, anchor) in found {
                let anchors = links.entry(chapter).or_default();
                if let Some(anchor) = anchor {
                    anchors.push(anchor);
                }
            }

            let mut base = root.clone();
            base.set_fragment(None);
            links.entry(base.to_string()).or_default();
            return links;
        }

        LinkMap::new()
    }

    /// Manual links under `scope`, in document order, split into
    /// `(chapter_url, anchor)`.
    fn collect(&self, scope: ElementRef<'_>, root: &Url) -> Vec<(String, Option<String>)> {
        scope
            .select(&self.anchors)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| self.split_manual_link(href, root))
            .collect()
    }

    fn split_manual_link(&self, href: &str, root: &Url) -> Option<(String, Option<String>)> {
        let href = href.trim();
        if href.starts_with('#') {
            return None;
        }
        let mut url = root.join(href).ok()?;
        if url.host_str() != root.host_str() || !url.path().starts_with(&self.path_prefix) {
            return None;
        }
        let anchor = url
            .fragment()
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        url.set_fragment(None);
        Some((url.to_string(), anchor))
    }
}
