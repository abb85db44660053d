//! One full run: discover the chapters, assemble them, emit every requested
//! output.

use anyhow::{anyhow, Result};
use colored::*;
use slug::slugify;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, warn};
use url::Url;

use crate::assembler::ChapterAssembler;
use crate::assets::ImagePolicy;
use crate::discover::LinkDiscoverer;
use crate::epub::{EpubEmitter, PackageOptions};
use crate::error::{RenderError, RunError};
use crate::pdf::PdfEmitter;
use crate::profile::ManualProfile;
use crate::session::{AssetSource, BrowserSession, HttpSession, PageSource, PdfRenderer, SessionConfig};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub out_dir: PathBuf,
    pub profile: ManualProfile,
    pub images: ImagePolicy,
    pub session: SessionConfig,
    /// Book metadata; the identifier seed is replaced by the root URL.
    pub package: PackageOptions,
    pub pdf: bool,
    pub epub: bool,
    pub preserve_pages: bool,
    /// Retrieve pages over plain HTTP instead of a browser.
    pub no_browser: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("output_manual2book"),
            profile: ManualProfile::default(),
            images: ImagePolicy::default(),
            session: SessionConfig::default(),
            package: PackageOptions::default(),
            pdf: true,
            epub: true,
            preserve_pages: false,
            no_browser: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub chapters: usize,
    /// Chapter URLs dropped during assembly.
    pub skipped: Vec<String>,
    pub pdf: Option<PathBuf>,
    pub epub: Option<PathBuf>,
}

pub struct Converter {
    options: BuildOptions,
}

impl Converter {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    pub fn pdf_path(&self) -> PathBuf {
        self.options
            .out_dir
            .join(format!("{}.pdf", self.file_stem()))
    }

    pub fn epub_path(&self) -> PathBuf {
        self.options
            .out_dir
            .join(format!("{}.epub", self.file_stem()))
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.options.out_dir.join("pages")
    }

    fn file_stem(&self) -> String {
        let stem = slugify(&self.options.package.title);
        if stem.is_empty() {
            "manual".to_string()
        } else {
            stem
        }
    }

    /// Starts the retrieval collaborators and runs the whole pipeline.
    pub async fn run(&self, root_url: &str) -> Result<BuildReport> {
        info!("Visiting \"{}\"", root_url.green());

        if self.options.no_browser {
            let http = HttpSession::new(self.options.session.timeout)?;
            return self
                .run_with(&http, &http, None::<&BrowserSession>, root_url)
                .await;
        }

        let browser = BrowserSession::launch(self.options.session.clone()).await?;
        let result = self
            .run_with(&browser, &browser, Some(&browser), root_url)
            .await;
        browser.close().await;
        result
    }

    /// Runs the pipeline against the given collaborators.
    ///
    /// Paginated output needs `renderer`; without one it is skipped.
    pub async fn run_with<P, A, R>(
        &self,
        pages: &P,
        assets: &A,
        renderer: Option<&R>,
        root_url: &str,
    ) -> Result<BuildReport>
    where
        P: PageSource + ?Sized + Sync,
        A: AssetSource + ?Sized + Sync,
        R: PdfRenderer + ?Sized + Sync,
    {
        let root = Url::parse(root_url).map_err(|e| anyhow!("Invalid root URL {}: {}", root_url, e))?;
        let options = &self.options;
        if !options.epub && !(options.pdf && renderer.is_some()) {
            return Err(RunError::NothingToProduce.into());
        }

        let discoverer = LinkDiscoverer::new(&options.profile)?;
        let links = discoverer.discover(pages, root.as_str()).await?;
        info!("Found {} chapters", links.len());

        let assembly = ChapterAssembler::new(pages, assets, &options.profile, options.images)?
            .assemble(&links)
            .await?;

        fs::create_dir_all(&options.out_dir)
            .await
            .map_err(|e| anyhow!("Failed to create output directory: {}", e))?;

        let mut report = BuildReport {
            chapters: assembly.chapters.len(),
            skipped: assembly.skipped.clone(),
            ..BuildReport::default()
        };
        let mut failures = Vec::new();

        if options.pdf {
            match renderer {
                Some(renderer) => {
                    let emitter = PdfEmitter::new(renderer, self.pages_dir());
                    match emitter
                        .emit(&assembly.chapters, &assembly.toc, &self.pdf_path())
                        .await
                    {
                        Ok(output) => {
                            info!("Combined PDF saved to: {}", output.combined.display().to_string().blue());
                            if !options.preserve_pages {
                                self.clean_pages(&output.artifacts).await;
                            }
                            report.pdf = Some(output.combined);
                        }
                        Err(e) => {
                            error!("PDF output failed: {}", e);
                            failures.push("pdf");
                        }
                    }
                }
                None => warn!("Skipping PDF output: {}", RenderError::Unavailable),
            }
        }

        if options.epub {
            let package = PackageOptions {
                identifier_seed: root.to_string(),
                ..options.package.clone()
            };
            let path = self.epub_path();
            match EpubEmitter::new(package).emit(&assembly.chapters, &assembly.toc, &path) {
                Ok(_) => report.epub = Some(path),
                Err(e) => {
                    error!("EPUB output failed: {:#}", e);
                    failures.push("epub");
                }
            }
        }

        if report.pdf.is_none() && report.epub.is_none() {
            return Err(RunError::NoOutput {
                failed: failures.join(", "),
            }
            .into());
        }
        Ok(report)
    }

    async fn clean_pages(&self, artifacts: &[PathBuf]) {
        info!("Cleaning up individual page files...");
        for path in artifacts {
            if let Err(e) = fs::remove_file(path).await {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
        remove_if_empty(&self.pages_dir()).await;
    }
}

async fn remove_if_empty(dir: &Path) {
    if let Ok(mut entries) = fs::read_dir(dir).await {
        if let Ok(None) = entries.next_entry().await {
            let _ = fs::remove_dir(dir).await;
        }
    }
}
