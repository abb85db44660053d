//! # manual2book
//!
//! A CLI utility to turn a hierarchical wiki manual into a merged PDF and an
//! EPUB for offline reading.
//!
//! The root page's table of contents decides which pages become chapters.
//! Every chapter is stripped of site chrome, its images are embedded, and the
//! same ordered chapter list feeds both outputs.
//!
//! ## Usage
//!
//! ```bash
//! manual2book build https://wiki.freecad.org/Manual:Introduction
//! manual2book merge --dir output_manual2book/pages --output manual.pdf
//! ```

pub mod assembler;
pub mod assets;
pub mod converter;
pub mod cover;
pub mod discover;
pub mod epub;
pub mod error;
pub mod logging;
pub mod markup;
pub mod model;
pub mod pdf;
mod pdf_merger;
pub mod profile;
pub mod sanitizer;
pub mod session;

pub use assembler::{Assembly, AssemblyContext, ChapterAssembler};
pub use assets::{AssetPipeline, ImagePolicy};
pub use converter::{BuildOptions, BuildReport, Converter};
pub use discover::LinkDiscoverer;
pub use epub::{EpubEmitter, PackageOptions};
pub use model::{ChapterRecord, Fragment, LinkMap, TocEntry};
pub use pdf::PdfEmitter;
pub use pdf_merger::PdfMerger;
pub use profile::ManualProfile;
pub use sanitizer::Sanitizer;
pub use session::{AssetSource, BrowserSession, HttpSession, PageSource, PdfRenderer, SessionConfig};
