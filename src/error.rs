//! Error types for every scope a failure can be contained in.
//!
//! Image failures stay inside the sanitizer, chapter failures stay inside
//! the assembler, artifact failures stay inside the emitters. Only
//! [`RunError`] and [`DiscoveryError`] end a run.

use thiserror::Error;

/// Retrieval of a rendered page or of raw asset bytes failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out after {seconds:.1}s fetching {url}")]
    Timeout { url: String, seconds: f64 },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("browser failed on {url}: {message}")]
    Browser { url: String, message: String },

    #[error("invalid url '{0}'")]
    InvalidUrl(String),
}

/// One image could not be turned into embeddable bytes.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("cannot parse svg: {0}")]
    Svg(String),

    #[error("cannot rasterize svg at {width}x{height}")]
    Rasterize { width: u32, height: u32 },

    #[error("cannot decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("cannot encode png: {0}")]
    Encode(#[source] image::ImageError),

    #[error("no fonts available to draw text")]
    NoFonts,

    /// The same URL failed earlier in this run and is not retried.
    #[error("{url} failed earlier: {reason}")]
    Failed { url: String, reason: String },
}

/// A page could not be reduced to a content fragment.
#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("no main content container found (tried {tried} strategies)")]
    NoContentContainer { tried: usize },
}

/// The root table of contents could not be read.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot fetch root page: {0}")]
    RootUnreachable(#[from] FetchError),

    #[error("no table of contents found on {url}")]
    NoTableOfContents { url: String },
}

/// Rendering one paginated artifact failed.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("paginated rendering failed: {0}")]
    Browser(String),

    #[error("no paginated renderer is available")]
    Unavailable,
}

/// Failures that abort a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("none of the {attempted} chapters could be processed; nothing to emit")]
    NoChapters { attempted: usize },

    #[error("nothing to produce: EPUB is disabled and PDF is disabled or has no renderer")]
    NothingToProduce,

    #[error("no output could be written ({failed})")]
    NoOutput { failed: String },
}
