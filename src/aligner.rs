//! Maps a card's quoted tag back onto the paragraph it came from.
//!
//! Scoring is a weighted blend of two word-level measures over normalized
//! text: how many of the tag's distinct words occur in the paragraph, and the
//! longest run of consecutive tag words found verbatim. Image tags skip the
//! scorer and resolve by hash.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Serialize;

use crate::models::Paragraph;

const BAG_WEIGHT: f64 = 0.3;
const RUN_WEIGHT: f64 = 0.7;
pub const MATCH_THRESHOLD: f64 = 0.5;

const IMAGE_TAG_PREFIX: &str = "[[IMAGE HASH=";
const IMAGE_TAG_SUFFIX: &str = "]]";

/// Resolves image hashes to the paragraph that embeds the image.
pub trait ImageLookup {
    fn paragraph_for(&self, hash: &str) -> Option<u32>;
}

impl ImageLookup for HashMap<String, u32> {
    fn paragraph_for(&self, hash: &str) -> Option<u32> {
        self.get(hash).copied()
    }
}

/// Image index for a folder, stored next to its deck. Missing or unreadable
/// files give an empty index.
pub fn load_image_index(path: &Path) -> HashMap<String, u32> {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed image index {}: {}", path.display(), e);
            HashMap::new()
        }),
        Err(_) => HashMap::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Match {
    pub para_id: u32,
    pub score: f64,
}

/// Hash carried by an image tag, if `tag` is one.
pub fn image_hash(tag: &str) -> Option<&str> {
    tag.trim()
        .strip_prefix(IMAGE_TAG_PREFIX)?
        .strip_suffix(IMAGE_TAG_SUFFIX)
        .map(str::trim)
        .filter(|h| !h.is_empty())
}

pub fn image_tag(hash: &str) -> String {
    format!("{}{}{}", IMAGE_TAG_PREFIX, hash, IMAGE_TAG_SUFFIX)
}

/// Paragraph a tag most likely came from, or `None` below the threshold.
pub fn align(tag: &str, paragraphs: &[Paragraph], images: &impl ImageLookup) -> Option<u32> {
    if let Some(hash) = image_hash(tag) {
        return images.paragraph_for(hash);
    }
    best_match(tag, paragraphs)
        .filter(|m| m.score >= MATCH_THRESHOLD)
        .map(|m| m.para_id)
}

/// Highest-scoring paragraph regardless of threshold. Earlier paragraphs win ties.
pub fn best_match(tag: &str, paragraphs: &[Paragraph]) -> Option<Match> {
    let tag_words = words(tag);
    if tag_words.is_empty() {
        return None;
    }

    let mut best: Option<Match> = None;
    for paragraph in paragraphs {
        let score = score(&tag_words, &normalize(&paragraph.markdown));
        if best.map_or(true, |b| score > b.score) {
            best = Some(Match {
                para_id: paragraph.id,
                score,
            });
        }
    }
    best
}

/// Lowercase, drop punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn words(text: &str) -> Vec<String> {
    normalize(text).split(' ').filter(|w| !w.is_empty()).map(String::from).collect()
}

fn score(tag_words: &[String], paragraph: &str) -> f64 {
    if paragraph.is_empty() {
        return 0.0;
    }
    BAG_WEIGHT * bag_of_words(tag_words, paragraph) + RUN_WEIGHT * longest_run(tag_words, paragraph)
}

fn bag_of_words(tag_words: &[String], paragraph: &str) -> f64 {
    let unique: HashSet<&str> = tag_words.iter().map(String::as_str).collect();
    let found = unique.iter().filter(|w| paragraph.contains(*w)).count();
    found as f64 / unique.len() as f64
}

// Longest first, so the first hit is the answer.
fn longest_run(tag_words: &[String], paragraph: &str) -> f64 {
    let n = tag_words.len();
    for len in (1..=n).rev() {
        let hit = (0..=n - len).any(|start| paragraph.contains(&tag_words[start..start + len].join(" ")));
        if hit {
            return len as f64 / n as f64;
        }
    }
    0.0
}
