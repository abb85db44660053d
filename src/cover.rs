//! Generated cover image: the book title and a date on a white page.

use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg;

use crate::assets::pixmap_to_png;
use crate::error::AssetError;
use crate::markup::escape_text;

const WIDTH: u32 = 1600;
const HEIGHT: u32 = 2400;
const TITLE_SIZE: u32 = 120;
const DATE_SIZE: u32 = 80;
const LINE_CHARS: usize = 16;
const FONT_FAMILY: &str = "DejaVu Sans, Liberation Sans, Arial, Helvetica, sans-serif";

/// Renders a PNG cover showing `title` centered above `date`.
///
/// Text is drawn with whatever system fonts are installed; a machine
/// without any fonts yields [`AssetError::NoFonts`] instead of a blank page.
pub fn generate_cover(title: &str, date: &str) -> Result<Vec<u8>, AssetError> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    if options.fontdb.faces().next().is_none() {
        return Err(AssetError::NoFonts);
    }

    let svg = cover_svg(title, date);
    let tree = usvg::Tree::from_str(&svg, &options).map_err(|e| AssetError::Svg(e.to_string()))?;

    let mut pixmap = Pixmap::new(WIDTH, HEIGHT).ok_or(AssetError::Rasterize {
        width: WIDTH,
        height: HEIGHT,
    })?;
    resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
    pixmap_to_png(&pixmap)
}

fn cover_svg(title: &str, date: &str) -> String {
    let lines = wrap_title(title);
    let line_height = TITLE_SIZE + TITLE_SIZE / 4;
    let block = line_height * lines.len().saturating_sub(1) as u32;
    let first_y = 1000u32.saturating_sub(block / 2);

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect width="{w}" height="{h}" fill="white"/>"#,
        w = WIDTH,
        h = HEIGHT
    );
    for (index, line) in lines.iter().enumerate() {
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" font-family="{}" font-size="{}" fill="black" text-anchor="middle">{}</text>"#,
            WIDTH / 2,
            first_y + line_height * index as u32,
            FONT_FAMILY,
            TITLE_SIZE,
            escape_text(line)
        ));
    }
    svg.push_str(&format!(
        r#"<text x="{}" y="{}" font-family="{}" font-size="{}" fill="gray" text-anchor="middle">{}</text>"#,
        WIDTH / 2,
        first_y + block + 300,
        FONT_FAMILY,
        DATE_SIZE,
        escape_text(date)
    ));
    svg.push_str("</svg>");
    svg
}

/// Greedy word wrap; a single overlong word keeps its own line.
fn wrap_title(title: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for word in title.split_whitespace() {
        match lines.last_mut() {
            Some(line) if line.chars().count() + 1 + word.chars().count() <= LINE_CHARS => {
                line.push(' ');
                line.push_str(word);
            }
            _ => lines.push(word.to_string()),
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_wraps_on_word_boundaries() {
        assert_eq!(wrap_title("FreeCAD User Manual"), vec!["FreeCAD User", "Manual"]);
        assert_eq!(wrap_title("Short"), vec!["Short"]);
        assert_eq!(
            wrap_title("Supercalifragilisticexpialidocious guide"),
            vec!["Supercalifragilisticexpialidocious", "guide"]
        );
    }

    #[test]
    fn svg_escapes_title_text() {
        let svg = cover_svg("Tips & <Tricks>", "2024-01-01");
        assert!(svg.contains("Tips &amp; &lt;Tricks&gt;"));
        assert!(svg.contains(">2024-01-01</text>"));
        assert!(usvg::Tree::from_str(&svg, &usvg::Options::default()).is_ok());
    }

    #[test]
    fn cover_is_a_png_or_reports_missing_fonts() {
        match generate_cover("FreeCAD User Manual", "2024-01-01") {
            Ok(png) => {
                let image = image::load_from_memory(&png).unwrap();
                assert_eq!((image.width(), image.height()), (WIDTH, HEIGHT));
            }
            Err(e) => assert!(matches!(e, AssetError::NoFonts), "unexpected {e}"),
        }
    }
}
