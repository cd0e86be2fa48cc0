//! Chapter documents and their paragraph spans.
//!
//! A finalized document wraps every paragraph in
//! `<span class="gn-paragraph" data-para-id="N" data-gn-orig="...">`, where the
//! second attribute carries the percent-encoded original markdown. Paragraph
//! ids are 1-based and follow reading order; re-finalizing renumbers them.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::models::Paragraph;

const PARA_ID_ATTR: &str = "data-para-id";
const ORIG_ATTR: &str = "data-gn-orig";

fn span_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<span\b[^>]*>").expect("span pattern is valid"))
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([\w-]+)\s*=\s*"([^"]*)""#).expect("attribute pattern is valid"))
}

/// Wrap each blank-line separated block of `markdown` in a paragraph span.
pub fn finalize(markdown: &str) -> String {
    split_blocks(markdown)
        .iter()
        .enumerate()
        .map(|(i, block)| {
            format!(
                "<span class=\"gn-paragraph\" {}=\"{}\" {}=\"{}\">\n\n{}\n\n</span>",
                PARA_ID_ATTR,
                i + 1,
                ORIG_ATTR,
                urlencoding::encode(block),
                block
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn is_finalized(document: &str) -> bool {
    document.contains(PARA_ID_ATTR)
}

/// Paragraphs of a finalized document, in the order they appear.
///
/// Spans without both attributes are skipped. A payload that fails to decode
/// yields an empty paragraph rather than dropping the id.
pub fn extract_paragraphs(document: &str) -> Vec<Paragraph> {
    span_regex()
        .find_iter(document)
        .filter_map(|tag| {
            let mut id = None;
            let mut orig = None;
            for cap in attr_regex().captures_iter(tag.as_str()) {
                match &cap[1] {
                    PARA_ID_ATTR => id = cap[2].trim().parse::<u32>().ok(),
                    ORIG_ATTR => orig = Some(cap[2].to_string()),
                    _ => {}
                }
            }
            let id = id?;
            let encoded = orig?;
            let markdown = match urlencoding::decode(&encoded) {
                Ok(decoded) => decoded.into_owned(),
                Err(e) => {
                    tracing::warn!("Paragraph {} has an undecodable payload: {}", id, e);
                    String::new()
                }
            };
            Some(Paragraph { id, markdown })
        })
        .collect()
}

/// Read a chapter document and return its paragraphs.
///
/// Documents that were never finalized are split in memory the same way
/// `finalize` would split them.
pub fn load_paragraphs(path: &Path) -> std::io::Result<Vec<Paragraph>> {
    let content = std::fs::read_to_string(path)?;
    if is_finalized(&content) {
        Ok(extract_paragraphs(&content))
    } else {
        Ok(split_blocks(&content)
            .into_iter()
            .enumerate()
            .map(|(i, block)| Paragraph {
                id: i as u32 + 1,
                markdown: block,
            })
            .collect())
    }
}

fn split_blocks(markdown: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in markdown.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

/// Top-level folder of a chapter. A top-level document is its own subject.
pub fn subject_of(chapter: &str) -> &str {
    chapter.split('/').next().unwrap_or(chapter)
}

/// Folder holding a chapter, relative to the vault root.
pub fn folder_of(chapter: &str) -> &str {
    chapter.rsplit_once('/').map(|(folder, _)| folder).unwrap_or("")
}

/// Chapter identifier for a document path under `root`.
pub fn chapter_id(root: &Path, document: &Path) -> Option<String> {
    let relative = document.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

pub fn document_path(root: &Path, chapter: &str) -> PathBuf {
    chapter.split('/').fold(root.to_path_buf(), |p, part| p.join(part))
}
