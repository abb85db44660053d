//! Reflowable output: an EPUB 3 package with a title page, one XHTML file per
//! chapter and every distinct image stored once.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use colored::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::assets::content_hash;
use crate::cover::generate_cover;
use crate::markup::{escape_attr, escape_text};
use crate::model::{humanize_anchor, ChapterRecord, EmbeddedImage, TocEntry};

const COVER_PATH: &str = "cover.png";

const STYLE: &str = r#"@charset "utf-8";

body { margin: 20px; font-family: sans-serif; }
h1 { text-align: center; font-size: 2em; }
h2 { font-size: 1.5em; }
img { max-width: 100%; height: auto; }
code, pre { font-family: monospace; background-color: #f4f4f4; padding: 0.5em; display: block; white-space: pre-wrap; border: 1px solid #ddd; }
table { width: 100%; border-collapse: collapse; }
th, td { border: 1px solid #ddd; padding: 0.5em; }
.title-page { text-align: center; margin-top: 30%; }
"#;

#[derive(Debug, Clone)]
pub struct PackageOptions {
    pub title: String,
    pub author: String,
    /// BCP-47 language tag for metadata and every XHTML document.
    pub lang: String,
    /// Hashed into the package identifier; the root URL of the manual.
    pub identifier_seed: String,
    pub modified: DateTime<Utc>,
    pub cover: bool,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            title: "FreeCAD User Manual".to_string(),
            author: "FreeCAD Community".to_string(),
            lang: "en".to_string(),
            identifier_seed: String::new(),
            modified: DateTime::<Utc>::UNIX_EPOCH,
            cover: true,
        }
    }
}

/// Content-hash keyed image store: identical bytes map to one file name.
#[derive(Debug, Default)]
pub struct ImageRegistry {
    by_hash: HashMap<String, usize>,
    files: Vec<(String, Arc<[u8]>)>,
}

impl ImageRegistry {
    /// Returns the package path for `image`, registering its bytes under
    /// `<hash>_<original filename>` the first time they are seen.
    pub fn register(&mut self, image: &EmbeddedImage) -> String {
        let hash = content_hash(&image.bytes);
        let index = match self.by_hash.get(&hash) {
            Some(index) => *index,
            None => {
                let filename = format!("{}_{}", hash, image.original_filename);
                debug!(file = %filename, "Registering package image");
                self.files.push((filename, image.bytes.clone()));
                self.by_hash.insert(hash, self.files.len() - 1);
                self.files.len() - 1
            }
        };
        format!("images/{}", self.files[index].0)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// What a package write produced.
#[derive(Debug)]
pub struct EpubOutput {
    pub chapters: usize,
    pub images: usize,
    pub cover: bool,
}

pub struct EpubEmitter {
    options: PackageOptions,
}

impl EpubEmitter {
    pub fn new(options: PackageOptions) -> Self {
        Self { options }
    }

    pub fn identifier(&self) -> Uuid {
        package_identifier(&self.options.identifier_seed)
    }

    /// Writes the package to `output`.
    pub fn emit(&self, chapters: &[ChapterRecord], toc: &[TocEntry], output: &Path) -> Result<EpubOutput> {
        info!("Creating EPUB: {}", output.display().to_string().blue());
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create epub parent dir: {}", parent.display()))?;
        }
        let file = File::create(output)
            .with_context(|| format!("open epub output: {}", output.display()))?;
        let (writer, summary) = self.write_package(BufWriter::new(file), chapters, toc)?;
        writer
            .into_inner()
            .map_err(|e| e.into_error())
            .and_then(|file| file.sync_all())
            .with_context(|| format!("flush epub output: {}", output.display()))?;

        info!(
            "Successfully created {} ({} chapters, {} images)",
            output.display().to_string().blue(),
            summary.chapters,
            summary.images
        );
        Ok(summary)
    }

    /// `write_package(title, ordered_units, images, nav)`
    pub fn write_package<W: Write + Seek>(
        &self,
        writer: W,
        chapters: &[ChapterRecord],
        toc: &[TocEntry],
    ) -> Result<(W, EpubOutput)> {
        let options = &self.options;
        let lang = if options.lang.trim().is_empty() {
            "und"
        } else {
            options.lang.trim()
        };

        let mut ordered: Vec<&ChapterRecord> = chapters.iter().collect();
        ordered.sort_by_key(|chapter| chapter.number);
        let mut entries: Vec<&TocEntry> = toc.iter().collect();
        entries.sort_by_key(|entry| entry.number);

        let mut registry = ImageRegistry::default();
        let mut units = Vec::with_capacity(ordered.len());
        for chapter in &ordered {
            let body = chapter.content.render(|image| registry.register(image));
            units.push((
                chapter_filename(chapter.number),
                wrap_xhtml_document(&chapter.title, lang, &body),
            ));
        }

        let cover = if options.cover {
            let date = options.modified.format("%Y-%m-%d").to_string();
            match generate_cover(&options.title, &date) {
                Ok(png) => Some(png),
                Err(e) => {
                    warn!(error = %e, "Could not generate cover");
                    None
                }
            }
        } else {
            None
        };

        let uuid = self.identifier();
        let modified = options
            .modified
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

        let mut zip = ZipWriter::new(writer);

        // mimetype must be the first entry and must not be compressed.
        let stored = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);
        zip.start_file("mimetype", stored)
            .context("epub start_file mimetype")?;
        zip.write_all(b"application/epub+zip")
            .context("epub write mimetype")?;

        // Images go in before the manifest so it lists only those that were
        // written. PNG data is already compressed.
        let mut packed = Vec::with_capacity(registry.len());
        for (name, bytes) in &registry.files {
            if put_optional(&mut zip, &format!("OEBPS/images/{}", name), bytes, stored)? {
                packed.push(name.as_str());
            }
        }
        let cover = match &cover {
            Some(png) => put_optional(&mut zip, &format!("OEBPS/{}", COVER_PATH), png, stored)?,
            None => false,
        };

        let deflated = stored.compression_method(CompressionMethod::Deflated);
        let mut put = |name: &str, bytes: &[u8]| -> Result<()> {
            zip.start_file(name, deflated)
                .with_context(|| format!("epub start_file {}", name))?;
            zip.write_all(bytes)
                .with_context(|| format!("epub write {}", name))?;
            Ok(())
        };

        put("META-INF/container.xml", render_container_xml().as_bytes())?;
        put(
            "OEBPS/content.opf",
            render_content_opf(options, lang, uuid, &modified, &ordered, &packed, cover).as_bytes(),
        )?;
        put("OEBPS/nav.xhtml", render_nav_xhtml(&options.title, lang, &entries).as_bytes())?;
        put("OEBPS/toc.ncx", render_toc_ncx(&options.title, uuid, &entries).as_bytes())?;
        put("OEBPS/style.css", STYLE.as_bytes())?;
        put("OEBPS/title.xhtml", render_title_page(options, lang).as_bytes())?;
        for (name, xhtml) in &units {
            put(&format!("OEBPS/{}", name), xhtml.as_bytes())?;
        }

        let writer = zip.finish().context("epub finish zip")?;
        Ok((
            writer,
            EpubOutput {
                chapters: units.len(),
                images: packed.len(),
                cover,
            },
        ))
    }
}

/// Writes an entry the package can do without. A failed write is logged and
/// the partial entry removed; `Ok(false)` means it is not in the archive.
fn put_optional<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    bytes: &[u8],
    options: SimpleFileOptions,
) -> Result<bool> {
    zip.start_file(name, options)
        .with_context(|| format!("epub start_file {}", name))?;
    match zip.write_all(bytes) {
        Ok(()) => Ok(true),
        Err(e) => {
            warn!(entry = %name, error = %e, "Leaving entry out of the package");
            zip.abort_file()
                .with_context(|| format!("epub drop partial {}", name))?;
            Ok(false)
        }
    }
}

/// Stable package identifier derived from `seed`.
pub fn package_identifier(seed: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes())
}

pub fn chapter_filename(number: usize) -> String {
    format!("chapter_{}.xhtml", number)
}

fn render_container_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
    .to_string()
}

fn xhtml_head(out: &mut String, title: &str, lang: &str, epub_ns: bool) {
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    let ns = if epub_ns {
        " xmlns:epub=\"http://www.idpf.org/2007/ops\""
    } else {
        ""
    };
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\"{} lang=\"{}\" xml:lang=\"{}\">\n",
        ns,
        escape_attr(lang),
        escape_attr(lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", escape_text(title)));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str("  <link rel=\"stylesheet\" type=\"text/css\" href=\"style.css\" />\n");
    out.push_str("</head>\n");
}

fn wrap_xhtml_document(title: &str, lang: &str, body_html: &str) -> String {
    let mut out = String::new();
    xhtml_head(&mut out, title, lang, false);
    out.push_str("<body>\n");
    out.push_str(body_html);
    out.push_str("\n</body>\n</html>\n");
    out
}

fn render_title_page(options: &PackageOptions, lang: &str) -> String {
    let body = format!(
        "<div class=\"title-page\">\n  <h1>{}</h1>\n  <p>{}</p>\n  <p>{}</p>\n</div>",
        escape_text(&options.title),
        escape_text(&options.author),
        options.modified.format("%Y-%m-%d")
    );
    wrap_xhtml_document(&options.title, lang, &body)
}

fn render_nav_xhtml(title: &str, lang: &str, toc: &[&TocEntry]) -> String {
    let mut out = String::new();
    xhtml_head(&mut out, title, lang, true);
    out.push_str("<body>\n");
    out.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n");
    out.push_str("    <h1>Table of Contents</h1>\n");
    out.push_str("    <ol>\n");
    out.push_str(&format!(
        "      <li><a href=\"title.xhtml\">{}</a></li>\n",
        escape_text(title)
    ));
    for entry in toc {
        let file = chapter_filename(entry.number);
        out.push_str(&format!(
            "      <li><a href=\"{}\">{}</a>",
            file,
            escape_text(&entry.title)
        ));
        if !entry.subchapters.is_empty() {
            out.push_str("\n        <ol>\n");
            for sub in &entry.subchapters {
                out.push_str(&format!(
                    "          <li><a href=\"{}#{}\">{}</a></li>\n",
                    file,
                    escape_attr(sub),
                    escape_text(&humanize_anchor(sub))
                ));
            }
            out.push_str("        </ol>\n      ");
        }
        out.push_str("</li>\n");
    }
    out.push_str("    </ol>\n");
    out.push_str("  </nav>\n");
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn render_toc_ncx(title: &str, uuid: Uuid, toc: &[&TocEntry]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(
        "<!DOCTYPE ncx PUBLIC \"-//NISO//DTD ncx 2005-1//EN\" \"http://www.daisy.org/z3986/2005/ncx-2005-1.dtd\">\n",
    );
    out.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n");
    out.push_str("  <head>\n");
    out.push_str(&format!("    <meta name=\"dtb:uid\" content=\"urn:uuid:{}\" />\n", uuid));
    out.push_str("    <meta name=\"dtb:depth\" content=\"1\" />\n");
    out.push_str("    <meta name=\"dtb:totalPageCount\" content=\"0\" />\n");
    out.push_str("    <meta name=\"dtb:maxPageNumber\" content=\"0\" />\n");
    out.push_str("  </head>\n");
    out.push_str(&format!("  <docTitle><text>{}</text></docTitle>\n", escape_text(title)));
    out.push_str("  <navMap>\n");

    let points = std::iter::once((title, "title.xhtml".to_string())).chain(
        toc.iter()
            .map(|entry| (entry.title.as_str(), chapter_filename(entry.number))),
    );
    for (index, (label, src)) in points.enumerate() {
        let play = index + 1;
        out.push_str(&format!(
            "    <navPoint id=\"navPoint-{}\" playOrder=\"{}\">\n",
            play, play
        ));
        out.push_str(&format!(
            "      <navLabel><text>{}</text></navLabel>\n",
            escape_text(label)
        ));
        out.push_str(&format!("      <content src=\"{}\" />\n", src));
        out.push_str("    </navPoint>\n");
    }
    out.push_str("  </navMap>\n");
    out.push_str("</ncx>\n");
    out
}

fn render_content_opf(
    options: &PackageOptions,
    lang: &str,
    uuid: Uuid,
    modified: &str,
    chapters: &[&ChapterRecord],
    images: &[&str],
    cover: bool,
) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(&format!(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"bookid\" version=\"3.0\" xml:lang=\"{}\">\n",
        escape_attr(lang)
    ));
    out.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
    out.push_str(&format!("    <dc:identifier id=\"bookid\">urn:uuid:{}</dc:identifier>\n", uuid));
    out.push_str(&format!("    <dc:title>{}</dc:title>\n", escape_text(&options.title)));
    if !options.author.trim().is_empty() {
        out.push_str(&format!("    <dc:creator>{}</dc:creator>\n", escape_text(&options.author)));
    }
    out.push_str(&format!("    <dc:language>{}</dc:language>\n", escape_text(lang)));
    out.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        escape_text(modified)
    ));
    if cover {
        out.push_str("    <meta name=\"cover\" content=\"cover-image\" />\n");
    }
    out.push_str("  </metadata>\n");

    out.push_str("  <manifest>\n");
    out.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\" />\n",
    );
    out.push_str("    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\" />\n");
    out.push_str("    <item id=\"css\" href=\"style.css\" media-type=\"text/css\" />\n");
    out.push_str(
        "    <item id=\"title\" href=\"title.xhtml\" media-type=\"application/xhtml+xml\" />\n",
    );
    for chapter in chapters {
        out.push_str(&format!(
            "    <item id=\"chapter-{}\" href=\"{}\" media-type=\"application/xhtml+xml\" />\n",
            chapter.number,
            chapter_filename(chapter.number)
        ));
    }
    for (index, name) in images.iter().enumerate() {
        out.push_str(&format!(
            "    <item id=\"image-{}\" href=\"images/{}\" media-type=\"image/png\" />\n",
            index + 1,
            escape_attr(name)
        ));
    }
    if cover {
        out.push_str(&format!(
            "    <item id=\"cover-image\" href=\"{}\" media-type=\"image/png\" properties=\"cover-image\" />\n",
            COVER_PATH
        ));
    }
    out.push_str("  </manifest>\n");

    out.push_str("  <spine toc=\"ncx\">\n");
    out.push_str("    <itemref idref=\"title\" />\n");
    out.push_str("    <itemref idref=\"nav\" />\n");
    for chapter in chapters {
        out.push_str(&format!("    <itemref idref=\"chapter-{}\" />\n", chapter.number));
    }
    out.push_str("  </spine>\n");
    out.push_str("</package>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{placeholder_src, Fragment};
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    fn image(placeholder: &str, bytes: &[u8], name: &str) -> EmbeddedImage {
        EmbeddedImage {
            placeholder: placeholder.to_string(),
            bytes: Arc::from(bytes),
            original_filename: name.to_string(),
        }
    }

    fn chapter(number: usize, id: &str, images: Vec<EmbeddedImage>) -> ChapterRecord {
        let imgs: String = images
            .iter()
            .map(|i| format!("<img src=\"{}\" />", placeholder_src(&i.placeholder)))
            .collect();
        ChapterRecord {
            number,
            id: id.to_string(),
            title: format!("Title {}", id),
            url: format!("https://w.example/Manual:{}", id),
            content: Fragment::new(
                format!("<div><h1 id=\"{}\">{}</h1>{}</div>", id, id, imgs),
                images,
            ),
            subchapters: Vec::new(),
        }
    }

    fn options() -> PackageOptions {
        PackageOptions {
            identifier_seed: "https://w.example/Manual:Intro".to_string(),
            cover: false,
            ..PackageOptions::default()
        }
    }

    fn build(chapters: &[ChapterRecord]) -> ZipArchive<Cursor<Vec<u8>>> {
        let toc: Vec<_> = chapters.iter().map(TocEntry::from).collect();
        let (cursor, _) = EpubEmitter::new(options())
            .write_package(Cursor::new(Vec::new()), chapters, &toc)
            .unwrap();
        ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap()
    }

    fn read(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut out = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn identical_images_are_stored_once() {
        let logo = b"same-bytes".to_vec();
        let hash = content_hash(&logo);
        let chapters = vec![
            chapter(1, "A", vec![image("img0", &logo, "logo-a.png")]),
            chapter(2, "B", vec![image("img0", &logo, "logo-b.png")]),
        ];

        let mut archive = build(&chapters);
        let images: Vec<String> = archive
            .file_names()
            .filter(|name| name.starts_with("OEBPS/images/"))
            .map(str::to_string)
            .collect();
        assert_eq!(images, vec![format!("OEBPS/images/{}_logo-a.png", hash)]);

        let second = read(&mut archive, "OEBPS/chapter_2.xhtml");
        assert!(second.contains(&format!("src=\"images/{}_logo-a.png\"", hash)));
        assert!(!second.contains("embed:"));
    }

    #[test]
    fn different_images_with_same_name_do_not_collide() {
        let mut registry = ImageRegistry::default();
        let first = registry.register(&image("a", b"one", "logo.png"));
        let second = registry.register(&image("b", b"two", "logo.png"));
        assert_ne!(first, second);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn mimetype_is_first_and_stored() {
        let mut archive = build(&[chapter(1, "A", vec![])]);
        let mimetype = archive.by_index(0).unwrap();
        assert_eq!(mimetype.name(), "mimetype");
        assert_eq!(mimetype.compression(), CompressionMethod::Stored);
    }

    #[test]
    fn navigation_lists_title_then_chapters_in_number_order() {
        let chapters = vec![chapter(2, "B", vec![]), chapter(1, "A", vec![])];
        let mut archive = build(&chapters);

        let nav = read(&mut archive, "OEBPS/nav.xhtml");
        let title = nav.find("href=\"title.xhtml\"").unwrap();
        let first = nav.find("href=\"chapter_1.xhtml\">Title A").unwrap();
        let second = nav.find("href=\"chapter_2.xhtml\">Title B").unwrap();
        assert!(title < first && first < second);

        let opf = read(&mut archive, "OEBPS/content.opf");
        let spine = &opf[opf.find("<spine").unwrap()..];
        let one = spine.find("chapter-1").unwrap();
        let two = spine.find("chapter-2").unwrap();
        assert!(spine.find("idref=\"title\"").unwrap() < one && one < two);
    }

    #[test]
    fn subchapters_link_into_their_chapter_file() {
        let mut record = chapter(1, "A", vec![]);
        record.subchapters = vec!["first_steps".to_string()];
        let mut archive = build(&[record]);
        let nav = read(&mut archive, "OEBPS/nav.xhtml");
        assert!(nav.contains("<a href=\"chapter_1.xhtml#first_steps\">First steps</a>"));
    }

    #[test]
    fn output_is_reproducible() {
        let chapters = vec![chapter(1, "A", vec![image("img0", b"px", "x.png")])];
        let toc: Vec<_> = chapters.iter().map(TocEntry::from).collect();
        let emitter = EpubEmitter::new(options());
        let (first, _) = emitter
            .write_package(Cursor::new(Vec::new()), &chapters, &toc)
            .unwrap();
        let (second, _) = emitter
            .write_package(Cursor::new(Vec::new()), &chapters, &toc)
            .unwrap();
        assert_eq!(first.into_inner(), second.into_inner());
    }

    #[test]
    fn identifier_depends_only_on_seed() {
        assert_eq!(
            package_identifier("https://w.example/Manual:Intro"),
            EpubEmitter::new(options()).identifier()
        );
        assert_ne!(package_identifier("a"), package_identifier("b"));
    }

    #[test]
    fn emitting_leaves_the_fragment_untouched() {
        let chapters = vec![chapter(1, "A", vec![image("img0", b"px", "x.png")])];
        let before = chapters[0].content.clone();
        build(&chapters);
        assert_eq!(chapters[0].content, before);
        assert!(chapters[0].content.markup().contains("embed:img0"));
    }

    /// Fails any write that carries `poison`.
    struct FailingWriter {
        inner: Cursor<Vec<u8>>,
        poison: &'static [u8],
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if buf.windows(self.poison.len()).any(|w| w == self.poison) {
                return Err(std::io::Error::other("device full"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.inner.flush()
        }
    }

    impl Seek for FailingWriter {
        fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn unwritable_image_is_left_out_of_the_package() {
        const BAD: &[u8] = b"bytes the disk refuses";
        let chapters = vec![chapter(
            1,
            "A",
            vec![image("img0", BAD, "bad.png"), image("img1", b"fine", "good.png")],
        )];
        let toc: Vec<_> = chapters.iter().map(TocEntry::from).collect();
        let writer = FailingWriter {
            inner: Cursor::new(Vec::new()),
            poison: BAD,
        };

        let (writer, output) = EpubEmitter::new(options())
            .write_package(writer, &chapters, &toc)
            .unwrap();
        assert_eq!(output.images, 1);

        let mut archive = ZipArchive::new(Cursor::new(writer.inner.into_inner())).unwrap();
        let good = format!("{}_good.png", content_hash(b"fine"));
        let bad = format!("{}_bad.png", content_hash(BAD));
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert!(names.contains(&format!("OEBPS/images/{}", good)));
        assert!(!names.contains(&format!("OEBPS/images/{}", bad)));

        let opf = read(&mut archive, "OEBPS/content.opf");
        assert!(opf.contains(&good));
        assert!(!opf.contains(&bad));
        assert!(read(&mut archive, "OEBPS/chapter_1.xhtml").contains("Title A"));
    }
}
