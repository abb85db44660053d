//! Site profile: everything that ties the converter to one particular wiki.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the table of contents is located on the root page.
///
/// Strategies are tried in order; the first one that yields at least one
/// manual link wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "selector", rename_all = "snake_case")]
pub enum TocStrategy {
    /// Links inside the first element matching this CSS selector.
    Container(String),
    /// Every link on the page whose path carries the manual prefix.
    AnyManualLink,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualProfile {
    /// Path prefix shared by every chapter, e.g. `/Manual:`.
    pub path_prefix: String,
    /// Prefix stripped from page titles.
    pub title_prefix: String,
    /// Separator between the page title and the site name in `<title>`.
    pub title_separator: String,
    /// Site chrome removed before the content container is read.
    pub chrome_selectors: Vec<String>,
    /// Candidate main content containers, in order of preference.
    pub content_selectors: Vec<String>,
    pub toc_strategies: Vec<TocStrategy>,
}

impl Default for ManualProfile {
    fn default() -> Self {
        Self {
            path_prefix: "/Manual:".to_string(),
            title_prefix: "Manual:".to_string(),
            title_separator: " - ".to_string(),
            chrome_selectors: vec![
                ".mw-pt-languages".to_string(),
                ".docnav".to_string(),
                ".NavFrame".to_string(),
                ".manualtoc".to_string(),
                "script".to_string(),
                "noscript".to_string(),
                "style".to_string(),
            ],
            content_selectors: vec![
                "div.mw-parser-output".to_string(),
                "#mw-content-text".to_string(),
                "main".to_string(),
            ],
            toc_strategies: vec![
                TocStrategy::Container("div#toc".to_string()),
                TocStrategy::Container(".toc".to_string()),
                TocStrategy::Container(".mw-parser-output".to_string()),
                TocStrategy::AnyManualLink,
            ],
        }
    }
}

impl ManualProfile {
    /// Loads a profile from a JSON file; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("read profile: {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parse profile: {}", path.display()))
    }

    /// Turns a raw `<title>` text into a chapter title.
    pub fn chapter_title(&self, raw: &str) -> String {
        let head = match raw.split_once(self.title_separator.as_str()) {
            Some((head, _)) if !self.title_separator.is_empty() => head,
            _ => raw,
        };
        let head = head.trim();
        head.strip_prefix(self.title_prefix.as_str())
            .unwrap_or(head)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_title_strips_site_and_prefix() {
        let profile = ManualProfile::default();
        assert_eq!(
            profile.chapter_title("Manual:Installing - FreeCAD Documentation"),
            "Installing"
        );
        assert_eq!(profile.chapter_title("  Plain title "), "Plain title");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let profile: ManualProfile =
            serde_json::from_str(r#"{"path_prefix": "/Guide/"}"#).unwrap();
        assert_eq!(profile.path_prefix, "/Guide/");
        assert_eq!(profile.title_separator, " - ");
        assert_eq!(profile.toc_strategies.len(), 4);
    }

    #[test]
    fn toc_strategies_deserialize_from_tagged_json() {
        let profile: ManualProfile = serde_json::from_str(
            r#"{"toc_strategies": [{"kind": "container", "selector": "nav"}, {"kind": "any_manual_link"}]}"#,
        )
        .unwrap();
        assert_eq!(
            profile.toc_strategies,
            vec![
                TocStrategy::Container("nav".to_string()),
                TocStrategy::AnyManualLink
            ]
        );
    }
}
