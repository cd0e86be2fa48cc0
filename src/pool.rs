//! Cross-deck review queue.
//!
//! Three scopes decide which chapters are considered and whether never-seen
//! cards may enter the queue at all. Only the chapter scope lets new cards in,
//! and only those at or before the chapter's unlock boundary.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::subject_of;
use crate::gate::{first_blocked_index, Boundary};
use crate::models::{Card, Deck};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("Scope '{0}' needs an active chapter")]
    MissingChapter(String),

    #[error("Invalid scope '{0}'. Use: chapter, subject, or review")]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Cards of one chapter document.
    Chapter(String),
    /// Cards of every chapter under one top-level folder.
    Subject(String),
    /// Everything in the vault.
    Review,
}

impl Scope {
    /// Build a scope from its name and the active chapter.
    pub fn from_parts(kind: &str, chapter: Option<&str>) -> Result<Self, ScopeError> {
        match (kind.to_lowercase().as_str(), chapter) {
            ("chapter" | "c", Some(ch)) => Ok(Scope::Chapter(ch.to_string())),
            ("subject" | "s", Some(ch)) => Ok(Scope::Subject(subject_of(ch).to_string())),
            ("chapter" | "c" | "subject" | "s", None) => {
                Err(ScopeError::MissingChapter(kind.to_string()))
            }
            ("review" | "all" | "r", _) => Ok(Scope::Review),
            _ => Err(ScopeError::Unknown(kind.to_string())),
        }
    }

    pub fn includes(&self, chapter: &str) -> bool {
        match self {
            Scope::Chapter(active) => chapter == active,
            Scope::Subject(subject) => subject_of(chapter) == subject,
            Scope::Review => true,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Scope::Chapter(ch) => format!("chapter {}", ch),
            Scope::Subject(s) => format!("subject {}", s),
            Scope::Review => "all decks".to_string(),
        }
    }
}

/// Where never-seen cards go relative to due reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NewCardOrder {
    #[default]
    ReviewsFirst,
    NewFirst,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolEntry {
    pub card: Card,
    pub deck: PathBuf,
}

pub fn build_pool(
    scope: &Scope,
    decks: &[(PathBuf, Deck)],
    now: DateTime<Utc>,
    order: NewCardOrder,
) -> Vec<PoolEntry> {
    // New cards are only ever admitted in chapter scope.
    let boundary: Option<Boundary> = match scope {
        Scope::Chapter(chapter) => Some(first_blocked_index(
            decks.iter().flat_map(|(_, deck)| deck.in_chapter(chapter)),
        )),
        Scope::Subject(_) | Scope::Review => None,
    };

    let mut due = Vec::new();
    let mut unseen = Vec::new();

    for (path, deck) in decks {
        for card in deck.iter() {
            if card.suspended || !card.is_due(now) || !scope.includes(&card.chapter) {
                continue;
            }
            let entry = PoolEntry {
                card: card.clone(),
                deck: path.clone(),
            };
            if !card.is_unseen() {
                due.push(entry);
            } else if boundary.is_some_and(|b| b.admits(card.para_idx)) {
                unseen.push(entry);
            }
        }
    }

    sort_entries(&mut due);
    sort_entries(&mut unseen);

    let (mut first, second) = match order {
        NewCardOrder::ReviewsFirst => (due, unseen),
        NewCardOrder::NewFirst => (unseen, due),
    };
    first.extend(second);
    first
}

// Chapters are ranked by their earliest due card, then cards inside a
// chapter follow reading order.
fn sort_entries(entries: &mut [PoolEntry]) {
    let mut earliest: HashMap<String, DateTime<Utc>> = HashMap::new();
    for entry in entries.iter() {
        earliest
            .entry(entry.card.chapter.clone())
            .and_modify(|d| *d = (*d).min(entry.card.due))
            .or_insert(entry.card.due);
    }

    entries.sort_by(|a, b| {
        let (a, b) = (&a.card, &b.card);
        earliest[&a.chapter]
            .cmp(&earliest[&b.chapter])
            .then_with(|| a.chapter.cmp(&b.chapter))
            .then_with(|| compare_para_idx(a.para_idx, b.para_idx))
            .then_with(|| a.due.cmp(&b.due))
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn compare_para_idx(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
