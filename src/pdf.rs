//! Paginated output: one PDF per chapter plus a table of contents, merged
//! into a single document.

use anyhow::{anyhow, Result};
use colored::*;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::markup::{escape_attr, escape_text};
use crate::model::{humanize_anchor, ChapterRecord, TocEntry};
use crate::pdf_merger::PdfMerger;
use crate::session::PdfRenderer;

const TOC_FILENAME: &str = "000_table_of_contents.pdf";

const CHAPTER_STYLE: &str = r#"
body { margin: 20px; font-family: sans-serif; }
h1 { text-align: center; font-size: 24px; margin-bottom: 10px; }
h2 { font-size: 18px; margin-top: 10px; }
img { max-width: 100%; height: auto; }
code, pre { font-family: monospace; font-size: 14px; background-color: #f4f4f4; padding: 10px; display: block; white-space: pre-wrap; word-wrap: break-word; border: 1px solid #ddd; border-radius: 5px; }
.mw-highlight { padding: 10px; margin: 10px 0; border: 1px solid #ddd; background-color: #f9f9f9; border-radius: 5px; }
.wikitable { width: 100%; border-collapse: collapse; margin: 20px 0; font-size: 14px; text-align: left; page-break-inside: avoid; }
.wikitable th, .wikitable td { border: 1px solid #ddd; padding: 10px; page-break-inside: avoid; }
.wikitable tr { page-break-inside: avoid; }
.wikitable tr:nth-child(even) { background-color: #f9f9f9; }
.wikitable th { background-color: #f2f2f2; text-align: center; font-weight: bold; }
"#;

const TOC_STYLE: &str = r#"
body { margin: 20px; font-family: sans-serif; }
h1 { text-align: center; }
ul { list-style: none; padding-left: 0; }
li.chapter { margin-top: 8px; font-weight: bold; }
li.subchapter { margin-left: 20px; }
a { color: inherit; text-decoration: none; }
"#;

/// Paths produced by one paginated run.
#[derive(Debug)]
pub struct PdfOutput {
    pub combined: PathBuf,
    /// Intermediate artifacts that made it into the merge, TOC first.
    pub artifacts: Vec<PathBuf>,
}

pub struct PdfEmitter<'a, R: ?Sized> {
    renderer: &'a R,
    pages_dir: PathBuf,
}

impl<'a, R: PdfRenderer + ?Sized + Sync> PdfEmitter<'a, R> {
    pub fn new(renderer: &'a R, pages_dir: impl Into<PathBuf>) -> Self {
        Self {
            renderer,
            pages_dir: pages_dir.into(),
        }
    }

    /// Renders the TOC and every chapter, then merges them into `output`.
    pub async fn emit(
        &self,
        chapters: &[ChapterRecord],
        toc: &[TocEntry],
        output: &Path,
    ) -> Result<PdfOutput> {
        fs::create_dir_all(&self.pages_dir)
            .await
            .map_err(|e| anyhow!("Failed to create pages directory: {}", e))?;

        let mut artifacts = Vec::new();

        info!("Generating Table of Contents...");
        let toc_path = self.pages_dir.join(TOC_FILENAME);
        if self.render_to(&toc_document(toc), &toc_path).await {
            artifacts.push(toc_path);
        }

        let mut ordered: Vec<&ChapterRecord> = chapters.iter().collect();
        ordered.sort_by_key(|chapter| chapter.number);
        for chapter in ordered {
            let path = self.pages_dir.join(chapter_filename(chapter));
            if self.render_to(&chapter_document(chapter), &path).await {
                artifacts.push(path);
            }
        }

        if artifacts.is_empty() {
            return Err(anyhow!("No paginated artifacts were rendered"));
        }

        info!("Merging PDFs into {}...", output.display().to_string().blue());
        let mut merger = PdfMerger::new();
        let mut merged = Vec::new();
        for path in artifacts {
            match merger.add_pdf(&path).await {
                Ok(()) => merged.push(path),
                Err(e) => warn!("Failed to add PDF {}: {}", path.display(), e),
            }
        }
        merger.save(output).await?;

        Ok(PdfOutput {
            combined: output.to_path_buf(),
            artifacts: merged,
        })
    }

    /// Renders `html` to `path`; a failure is logged and reported as `false`.
    async fn render_to(&self, html: &str, path: &Path) -> bool {
        let pdf = match self.renderer.render_pdf(html).await {
            Ok(pdf) => pdf,
            Err(e) => {
                warn!("Error creating PDF {}: {}", path.display(), e);
                return false;
            }
        };
        match fs::write(path, pdf).await {
            Ok(()) => {
                info!("Created {}", path.display().to_string().blue());
                true
            }
            Err(e) => {
                warn!("Failed to write PDF to {}: {}", path.display(), e);
                false
            }
        }
    }
}

pub fn chapter_filename(chapter: &ChapterRecord) -> String {
    format!("{:03}_{}.pdf", chapter.number, chapter.id)
}

/// Chapter fragment wrapped in the print style template, images inlined.
pub fn chapter_document(chapter: &ChapterRecord) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\" /><title>{}</title><style>{}</style></head><body>{}</body></html>",
        escape_text(&chapter.title),
        CHAPTER_STYLE,
        chapter.content.inline_html()
    )
}

/// Table of contents with `<chapter>.<n>` numbered subchapters.
pub fn toc_document(toc: &[TocEntry]) -> String {
    let mut entries: Vec<&TocEntry> = toc.iter().collect();
    entries.sort_by_key(|entry| entry.number);

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\" /><title>Table of Contents</title><style>");
    out.push_str(TOC_STYLE);
    out.push_str("</style></head><body><h1>Table of Contents</h1><ul>\n");
    for entry in entries {
        out.push_str(&format!(
            "<li class=\"chapter\">{}. <a href=\"#{}\">{}</a></li>\n",
            entry.number,
            escape_attr(&entry.id),
            escape_text(&entry.title)
        ));
        for (index, sub) in entry.subchapters.iter().enumerate() {
            out.push_str(&format!(
                "<li class=\"subchapter\">{}.{} <a href=\"#{}\">{}</a></li>\n",
                entry.number,
                index + 1,
                escape_attr(sub),
                escape_text(&humanize_anchor(sub))
            ));
        }
    }
    out.push_str("</ul></body></html>\n");
    out
}
