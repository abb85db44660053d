use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use manual2book::{
    logging, BuildOptions, Converter, ImagePolicy, ManualProfile, PackageOptions, PdfMerger,
    SessionConfig,
};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio::fs;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "manual2book")]
#[command(about = "CLI utility to turn a hierarchical wiki manual into a merged PDF and an EPUB")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert the manual rooted at a table-of-contents page
    Build {
        /// URL of the manual's table-of-contents page
        url: String,

        /// Output directory used to save files
        #[arg(short = 'o', long = "out-dir", default_value = "output_manual2book")]
        out_dir: PathBuf,

        /// Book title, also used to name the output files
        #[arg(long, default_value = "FreeCAD User Manual")]
        title: String,

        #[arg(long, default_value = "FreeCAD Community")]
        author: String,

        /// Language tag for the EPUB
        #[arg(long, default_value = "en")]
        lang: String,

        /// JSON site profile overriding the built-in wiki profile
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Timeout per network call in seconds
        #[arg(short = 't', long = "timeout", default_value = "20.0", value_parser = parse_timeout)]
        timeout: f64,

        /// Delay after each navigation so client-side rendering can finish
        #[arg(long = "settle-ms", default_value_t = 3000)]
        settle_ms: u64,

        /// Raster images wider than this are downscaled
        #[arg(long = "max-image-width", default_value_t = 800)]
        max_image_width: u32,

        /// Size vector images are rasterized to
        #[arg(long = "glyph-size", default_value_t = 16)]
        glyph_size: u32,

        /// Modification date recorded in the EPUB (RFC 3339, defaults to now)
        #[arg(long)]
        modified: Option<DateTime<Utc>>,

        #[arg(long = "no-pdf")]
        no_pdf: bool,

        /// Skip the EPUB; not allowed with --no-pdf or --no-browser
        #[arg(long = "no-epub", conflicts_with_all = ["no_pdf", "no_browser"])]
        no_epub: bool,

        /// Skip the generated EPUB cover
        #[arg(long = "no-cover")]
        no_cover: bool,

        /// Preserve individual page PDFs (by default they are deleted after combining)
        #[arg(short = 'p', long = "preserve-pages")]
        preserve_pages: bool,

        /// Show the browser window
        #[arg(long)]
        headful: bool,

        /// Fetch pages over plain HTTP; no PDF output is possible
        #[arg(long = "no-browser")]
        no_browser: bool,
    },
    /// Merge existing PDF files into a single document
    Merge {
        /// Directory containing PDF files to merge
        #[arg(short = 'd', long = "dir", default_value = "output_manual2book/pages")]
        input_dir: String,

        /// Output file path for the merged PDF
        #[arg(short = 'o', long = "output", default_value = "merged.pdf")]
        output_file: String,
    },
}

fn parse_timeout(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|_| "Not a number.")?;
    if !value.is_finite() || value <= 0.0 {
        return Err("Must be a positive number.".to_string());
    }
    Ok(value)
}

async fn merge_pdfs(input_dir: &str, output_file: &str) -> Result<()> {
    let input_path = PathBuf::from(input_dir);

    if !input_path.exists() {
        return Err(anyhow::anyhow!("Input directory '{}' does not exist", input_dir));
    }

    info!("Scanning directory: {}", input_dir.green());

    let mut entries = fs::read_dir(&input_path).await?;
    let mut pdf_files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|extension| extension == "pdf") {
            pdf_files.push(path);
        }
    }

    if pdf_files.is_empty() {
        return Err(anyhow::anyhow!("No PDF files found in '{}'", input_dir));
    }

    // Numbered page files merge in name order.
    pdf_files.sort();

    info!("Found {} PDF files to merge:", pdf_files.len());
    for (i, path) in pdf_files.iter().enumerate() {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        info!("  {}: {}", i + 1, name.blue());
    }

    let mut merger = PdfMerger::new();

    for pdf_path in &pdf_files {
        info!("Adding: {}", pdf_path.display());
        if let Err(e) = merger.add_pdf(pdf_path).await {
            error!("Failed to add PDF {}: {}", pdf_path.display(), e);
        }
    }

    let output_path = PathBuf::from(output_file);
    merger.save(&output_path).await?;

    info!(
        "Successfully merged {} PDFs into: {}",
        merger.len(),
        output_path.display().to_string().green()
    );

    Ok(())
}

async fn build(url: String, options: BuildOptions) -> Result<()> {
    let converter = Converter::new(options);
    let report = converter.run(&url).await?;

    info!("{} chapters converted", report.chapters.to_string().green());
    if !report.skipped.is_empty() {
        info!("{} chapters skipped", report.skipped.len().to_string().yellow());
    }
    for path in report.pdf.iter().chain(report.epub.iter()) {
        info!("Wrote {}", path.display().to_string().green());
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init() {
        eprintln!("{}", format!("Error: {}", e).red());
        process::exit(1);
    }

    let args = Args::parse();

    let result = match args.command {
        Commands::Build {
            url,
            out_dir,
            title,
            author,
            lang,
            profile,
            timeout,
            settle_ms,
            max_image_width,
            glyph_size,
            modified,
            no_pdf,
            no_epub,
            no_cover,
            preserve_pages,
            headful,
            no_browser,
        } => {
            let profile = match profile {
                Some(path) => ManualProfile::load(&path),
                None => Ok(ManualProfile::default()),
            };
            match profile {
                Ok(profile) => {
                    let options = BuildOptions {
                        out_dir,
                        profile,
                        images: ImagePolicy {
                            max_width: max_image_width,
                            glyph_size,
                        },
                        session: SessionConfig {
                            timeout: Duration::from_secs_f64(timeout),
                            settle: Duration::from_millis(settle_ms),
                            headful,
                        },
                        package: PackageOptions {
                            title,
                            author,
                            lang,
                            identifier_seed: url.clone(),
                            modified: modified.unwrap_or_else(Utc::now),
                            cover: !no_cover,
                        },
                        pdf: !no_pdf,
                        epub: !no_epub,
                        preserve_pages,
                        no_browser,
                    };
                    build(url, options).await
                }
                Err(e) => Err(e),
            }
        }
        Commands::Merge {
            input_dir,
            output_file,
        } => merge_pdfs(&input_dir, &output_file).await,
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {:#}", e).red());
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_combinations_without_any_output_are_rejected() {
        for flags in [["--no-pdf", "--no-epub"], ["--no-browser", "--no-epub"]] {
            let err = Args::try_parse_from(
                ["manual2book", "build", "https://wiki.freecad.org/Manual:Introduction"]
                    .into_iter()
                    .chain(flags),
            )
            .err()
            .unwrap();
            assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        }
    }

    #[test]
    fn single_output_flags_are_accepted() {
        for flag in ["--no-pdf", "--no-epub", "--no-browser"] {
            assert!(Args::try_parse_from([
                "manual2book",
                "build",
                "https://wiki.freecad.org/Manual:Introduction",
                flag,
            ])
            .is_ok());
        }
    }
}
