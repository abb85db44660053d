//! Fetches and sanitizes every chapter of a [`LinkMap`] in URL order.

use anyhow::Result;
use colored::*;
use scraper::{Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::assets::{AssetPipeline, ImagePolicy};
use crate::error::RunError;
use crate::model::{chapter_id, ChapterRecord, Fragment, LinkMap, TocEntry};
use crate::profile::ManualProfile;
use crate::sanitizer::{compile_selector, Sanitizer};
use crate::session::{AssetSource, PageSource};

/// Run-scoped state: chapters and TOC entries accumulated so far.
#[derive(Debug, Default)]
pub struct AssemblyContext {
    chapters: Vec<ChapterRecord>,
    toc: Vec<TocEntry>,
    skipped: Vec<String>,
}

impl AssemblyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chapter under the next sequence number and returns it.
    pub fn record_chapter(
        &mut self,
        url: &str,
        id: String,
        title: String,
        content: Fragment,
        subchapters: Vec<String>,
    ) -> &ChapterRecord {
        let number = self.chapters.len() + 1;
        self.chapters.push(ChapterRecord {
            number,
            id,
            title,
            url: url.to_string(),
            content,
            subchapters,
        });
        &self.chapters[number - 1]
    }

    pub fn push_toc(&mut self, entry: TocEntry) {
        self.toc.push(entry);
    }

    pub fn skip(&mut self, url: &str) {
        self.skipped.push(url.to_string());
    }

    pub fn chapters(&self) -> &[ChapterRecord] {
        &self.chapters
    }

    /// TOC entries ordered by chapter number.
    pub fn toc(&self) -> Vec<TocEntry> {
        let mut toc = self.toc.clone();
        toc.sort_by_key(|entry| entry.number);
        toc
    }

    pub fn finish(self) -> Assembly {
        let toc = self.toc();
        Assembly {
            chapters: self.chapters,
            toc,
            skipped: self.skipped,
        }
    }
}

/// Result of a successful assembly.
#[derive(Debug)]
pub struct Assembly {
    pub chapters: Vec<ChapterRecord>,
    pub toc: Vec<TocEntry>,
    /// Chapter URLs that were dropped.
    pub skipped: Vec<String>,
}

pub struct ChapterAssembler<'a, P: ?Sized, A: ?Sized> {
    pages: &'a P,
    assets: AssetPipeline<'a, A>,
    sanitizer: Sanitizer,
    profile: &'a ManualProfile,
    title: Selector,
}

impl<'a, P, A> ChapterAssembler<'a, P, A>
where
    P: PageSource + ?Sized + Sync,
    A: AssetSource + ?Sized + Sync,
{
    pub fn new(
        pages: &'a P,
        assets: &'a A,
        profile: &'a ManualProfile,
        policy: ImagePolicy,
    ) -> Result<Self> {
        Ok(Self {
            pages,
            assets: AssetPipeline::new(assets, policy),
            sanitizer: Sanitizer::new(profile)?,
            profile,
            title: compile_selector("title")?,
        })
    }

    /// `assemble(link_map) -> (ChapterRecord list, TocEntry list)`
    pub async fn assemble(mut self, links: &LinkMap) -> Result<Assembly, RunError> {
        let mut context = AssemblyContext::new();

        for (chapter_url, subchapters) in links {
            match self.process(chapter_url).await {
                Some((id, title, content)) => {
                    let record =
                        context.record_chapter(chapter_url, id, title, content, subchapters.clone());
                    info!(
                        "Chapter {}: {} ({} images)",
                        record.number,
                        record.title.green(),
                        record.content.images().len()
                    );
                    let entry = TocEntry::from(record);
                    context.push_toc(entry);
                }
                None => context.skip(chapter_url),
            }
        }

        let assembly = context.finish();
        if assembly.chapters.is_empty() {
            return Err(RunError::NoChapters {
                attempted: links.len(),
            });
        }
        if !assembly.skipped.is_empty() {
            warn!(
                skipped = assembly.skipped.len(),
                "Some chapters were skipped: {:?}", assembly.skipped
            );
        }
        info!(
            chapters = assembly.chapters.len(),
            images = self.assets.unique_images(),
            "Assembly finished"
        );
        Ok(assembly)
    }

    async fn process(&mut self, chapter_url: &str) -> Option<(String, String, Fragment)> {
        let page_url = match Url::parse(chapter_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(url = %chapter_url, error = %e, "Skipping chapter with invalid URL");
                return None;
            }
        };
        let id = chapter_id(chapter_url);

        let html = match self.pages.render_page(chapter_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %chapter_url, error = %e, "Skipping chapter: fetch failed");
                return None;
            }
        };

        let title = self.chapter_title(&html, &page_url);
        match self
            .sanitizer
            .sanitize(&html, &title, &id, &page_url, &mut self.assets)
            .await
        {
            Ok(fragment) => Some((id, title, fragment)),
            Err(e) => {
                warn!(url = %chapter_url, error = %e, "Skipping chapter: sanitize failed");
                None
            }
        }
    }

    fn chapter_title(&self, html: &str, page_url: &Url) -> String {
        let document = Html::parse_document(html);
        let from_meta = document
            .select(&self.title)
            .next()
            .map(|t| self.profile.chapter_title(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty());

        from_meta.unwrap_or_else(|| {
            page_url
                .path_segments()
                .and_then(|mut s| s.next_back())
                .filter(|s| !s.is_empty())
                .unwrap_or("Chapter")
                .to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::FixedAssets;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct Pages(HashMap<String, String>);

    impl Pages {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self(
                pages
                    .iter()
                    .map(|(url, html)| (url.to_string(), html.to_string()))
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl PageSource for Pages {
        async fn render_page(&self, url: &str) -> Result<String, FetchError> {
            self.0.get(url).cloned().ok_or(FetchError::Timeout {
                url: url.to_string(),
                seconds: 20.0,
            })
        }
    }

    fn page(title: &str, body: &str) -> String {
        format!(
            r#"<html><head><title>{}</title></head><body><div class="mw-parser-output">{}</div></body></html>"#,
            title, body
        )
    }

    fn links(entries: &[(&str, &[&str])]) -> LinkMap {
        entries
            .iter()
            .map(|(url, subs)| (url.to_string(), subs.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    async fn assemble(pages: &Pages, links: &LinkMap) -> Result<Assembly, RunError> {
        let assets = FixedAssets::new(&[]);
        let profile = ManualProfile::default();
        ChapterAssembler::new(pages, &assets, &profile, ImagePolicy::default())
            .unwrap()
            .assemble(links)
            .await
    }

    #[tokio::test]
    async fn chapters_are_numbered_in_url_order() {
        let pages = Pages::new(&[
            ("https://w.example/Manual:Intro", &page("Manual:Intro - Wiki", "<p>i</p>")),
            ("https://w.example/Manual:Install", &page("Manual:Install - Wiki", "<p>s</p>")),
        ]);
        let links = links(&[
            ("https://w.example/Manual:Intro", &["Setup", "Usage"]),
            ("https://w.example/Manual:Install", &[]),
        ]);

        let assembly = assemble(&pages, &links).await.unwrap();
        let summary: Vec<_> = assembly
            .chapters
            .iter()
            .map(|c| (c.number, c.title.as_str(), c.id.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![(1, "Install", "Manual_Install"), (2, "Intro", "Manual_Intro")]
        );
        assert_eq!(assembly.toc[1].subchapters, vec!["Setup", "Usage"]);
        assert!(assembly.chapters[0]
            .content
            .markup()
            .contains(r#"<h1 id="Manual_Install">Install</h1>"#));
    }

    #[tokio::test]
    async fn failed_chapters_leave_no_gaps() {
        let pages = Pages::new(&[
            ("https://w.example/Manual:A", &page("Manual:A", "<p>a</p>")),
            ("https://w.example/Manual:C", &page("Manual:C", "<p>c</p>")),
            ("https://w.example/Manual:D", "<html><body><p>no container</p></body></html>"),
        ]);
        let links = links(&[
            ("https://w.example/Manual:A", &[]),
            ("https://w.example/Manual:B", &[]),
            ("https://w.example/Manual:C", &[]),
            ("https://w.example/Manual:D", &[]),
        ]);

        let assembly = assemble(&pages, &links).await.unwrap();
        let numbers: Vec<_> = assembly.chapters.iter().map(|c| c.number).collect();
        let toc_numbers: Vec<_> = assembly.toc.iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(toc_numbers, vec![1, 2]);
        assert_eq!(assembly.chapters[1].title, "C");
        assert_eq!(
            assembly.skipped,
            vec!["https://w.example/Manual:B", "https://w.example/Manual:D"]
        );
    }

    #[tokio::test]
    async fn all_chapters_failing_is_a_run_failure() {
        let pages = Pages::new(&[]);
        let links = links(&[("https://w.example/Manual:A", &[])]);
        let err = assemble(&pages, &links).await.unwrap_err();
        assert!(matches!(err, RunError::NoChapters { attempted: 1 }));
    }

    #[tokio::test]
    async fn title_falls_back_to_last_path_segment() {
        let pages = Pages::new(&[(
            "https://w.example/Manual:Untitled",
            r#"<html><body><div class="mw-parser-output"><p>x</p></div></body></html>"#,
        )]);
        let links = links(&[("https://w.example/Manual:Untitled", &[])]);
        let assembly = assemble(&pages, &links).await.unwrap();
        assert_eq!(assembly.chapters[0].title, "Manual:Untitled");
    }

    #[test]
    fn toc_is_sorted_by_number_regardless_of_append_order() {
        let mut context = AssemblyContext::new();
        for number in [3, 1, 2] {
            context.push_toc(TocEntry {
                number,
                title: format!("t{}", number),
                id: format!("id{}", number),
                subchapters: Vec::new(),
            });
        }
        let numbers: Vec<_> = context.toc().iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
