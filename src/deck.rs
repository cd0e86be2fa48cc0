//! JSON deck files, one per folder.
//!
//! Vault layout:
//! ```text
//! <vault>/
//! ├── Biology/
//! │   ├── _flashcards.json   # deck for every chapter in this folder
//! │   ├── _images.json       # optional image hash -> paragraph index
//! │   ├── cells.md
//! │   └── genetics.md
//! └── Chemistry/
//!     └── ...
//! ```
//!
//! Decks are always read fresh from disk and written back whole. The last
//! writer wins.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::document::folder_of;
use crate::models::{Card, CardStatus, Deck};

pub const DECK_FILE_NAME: &str = "_flashcards.json";
pub const IMAGE_INDEX_FILE_NAME: &str = "_images.json";

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),
}

pub type Result<T> = std::result::Result<T, DeckError>;

pub struct DeckStore {
    root: PathBuf,
}

impl DeckStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder_path(&self, chapter: &str) -> PathBuf {
        folder_of(chapter)
            .split('/')
            .filter(|p| !p.is_empty())
            .fold(self.root.clone(), |p, part| p.join(part))
    }

    /// Deck file holding the cards of `chapter`.
    pub fn deck_path(&self, chapter: &str) -> PathBuf {
        self.folder_path(chapter).join(DECK_FILE_NAME)
    }

    pub fn image_index_path(&self, chapter: &str) -> PathBuf {
        self.folder_path(chapter).join(IMAGE_INDEX_FILE_NAME)
    }

    /// Load a deck. A missing file is an empty deck.
    pub fn load(&self, path: &Path) -> Result<Deck> {
        if !path.exists() {
            return Ok(Deck::new());
        }
        let content = fs::read_to_string(path)?;
        let deck: Deck = serde_json::from_str(&content)?;
        tracing::debug!("Loaded {} cards from {}", deck.len(), path.display());
        Ok(deck)
    }

    /// Load a deck, treating unreadable or malformed files as empty.
    pub fn load_or_empty(&self, path: &Path) -> Deck {
        self.load(path).unwrap_or_else(|e| {
            tracing::warn!("Could not read deck {}: {}. Treating it as empty.", path.display(), e);
            Deck::new()
        })
    }

    /// Replace the deck file with `deck`, creating folders as needed.
    pub fn save(&self, path: &Path, deck: &Deck) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(deck)?;
        fs::write(path, content)?;
        tracing::debug!("Saved {} cards to {}", deck.len(), path.display());
        Ok(())
    }

    /// Every deck file under the vault root, sorted by path.
    pub fn deck_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && entry.file_name() == DECK_FILE_NAME)
            .map(|entry| entry.into_path())
            .collect();
        paths.sort();
        paths
    }

    /// Every deck in the vault. Unreadable decks come back empty.
    pub fn load_all(&self) -> Vec<(PathBuf, Deck)> {
        self.deck_paths()
            .into_iter()
            .map(|path| {
                let deck = self.load_or_empty(&path);
                (path, deck)
            })
            .collect()
    }

    /// Locate a card by id across every deck.
    pub fn find_card(&self, id: &str) -> Option<(PathBuf, Card)> {
        self.load_all()
            .into_iter()
            .find_map(|(path, deck)| deck.get(id).cloned().map(|card| (path, card)))
    }

    /// Markdown documents under the vault root, as chapter ids.
    pub fn chapters(&self) -> Vec<String> {
        let mut chapters: Vec<String> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == "md")
            })
            .filter_map(|entry| crate::document::chapter_id(&self.root, entry.path()))
            .collect();
        chapters.sort();
        chapters
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total_cards: usize,
    pub new: usize,
    pub learning: usize,
    pub review: usize,
    pub relearn: usize,
    pub due_now: usize,
    pub blocked: usize,
    pub suspended: usize,
    pub flagged: usize,
    pub unaligned: usize,
}

impl Stats {
    pub fn collect<'a>(cards: impl IntoIterator<Item = &'a Card>, now: DateTime<Utc>) -> Self {
        let mut stats = Stats::default();
        for card in cards {
            stats.total_cards += 1;
            match card.status {
                CardStatus::New => stats.new += 1,
                CardStatus::Learning => stats.learning += 1,
                CardStatus::Review => stats.review += 1,
                CardStatus::Relearn => stats.relearn += 1,
            }
            if card.suspended {
                stats.suspended += 1;
            } else if card.is_due(now) {
                stats.due_now += 1;
            }
            if card.blocked && !card.suspended {
                stats.blocked += 1;
            }
            if card.flagged {
                stats.flagged += 1;
            }
            if card.para_idx.is_none() {
                stats.unaligned += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn setup_store() -> (tempfile::TempDir, DeckStore) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = DeckStore::new(dir.path());
        (dir, store)
    }

    mod path_tests {
        use super::*;

        #[test]
        fn deck_lives_next_to_chapter() {
            let store = DeckStore::new("/vault");
            assert_eq!(
                store.deck_path("Bio/Cells/ch1.md"),
                Path::new("/vault").join("Bio").join("Cells").join(DECK_FILE_NAME)
            );
            assert_eq!(
                store.deck_path("top.md"),
                Path::new("/vault").join(DECK_FILE_NAME)
            );
            assert_eq!(
                store.image_index_path("Bio/ch1.md"),
                Path::new("/vault").join("Bio").join(IMAGE_INDEX_FILE_NAME)
            );
        }
    }

    mod load_save_tests {
        use super::*;

        #[test]
        fn missing_deck_is_empty() {
            let (_dir, store) = setup_store();
            let deck = store.load(&store.deck_path("Bio/ch1.md")).unwrap();
            assert!(deck.is_empty());
        }

        #[test]
        fn save_creates_folders_and_load_reads_back() {
            let (_dir, store) = setup_store();
            let path = store.deck_path("Bio/ch1.md");
            let mut deck = Deck::new();
            deck.insert(Card::new("Bio/ch1.md", "Q", "A", "t", Some(2), now()));

            store.save(&path, &deck).unwrap();
            assert_eq!(store.load(&path).unwrap(), deck);
        }

        #[test]
        fn malformed_deck_is_an_error_for_load() {
            let (_dir, store) = setup_store();
            let path = store.deck_path("Bio/ch1.md");
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "{ not json").unwrap();

            assert!(matches!(store.load(&path), Err(DeckError::Json(_))));
        }

        #[test]
        fn malformed_deck_is_empty_for_load_or_empty() {
            let (_dir, store) = setup_store();
            let path = store.deck_path("Bio/ch1.md");
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "[1, 2, 3]").unwrap();

            assert!(store.load_or_empty(&path).is_empty());
        }

        #[test]
        fn sequential_read_modify_write_keeps_both_updates() {
            let (_dir, store) = setup_store();
            let path = store.deck_path("Bio/ch1.md");

            let mut deck = store.load(&path).unwrap();
            deck.insert(Card::new("Bio/ch1.md", "first", "A", "t", Some(1), now()));
            store.save(&path, &deck).unwrap();

            let mut deck = store.load(&path).unwrap();
            deck.insert(Card::new("Bio/ch1.md", "second", "A", "t", Some(2), now()));
            store.save(&path, &deck).unwrap();

            let deck = store.load(&path).unwrap();
            let mut fronts: Vec<&str> = deck.iter().map(|c| c.front.as_str()).collect();
            fronts.sort();
            assert_eq!(fronts, vec!["first", "second"]);
        }
    }

    mod discovery_tests {
        use super::*;

        #[test]
        fn finds_every_deck_and_card() {
            let (_dir, store) = setup_store();
            let bio = Card::new("Bio/ch1.md", "bio", "A", "t", None, now());
            let chem = Card::new("Chem/ch1.md", "chem", "A", "t", None, now());
            let chem_id = chem.id.clone();

            let mut deck = Deck::new();
            deck.insert(bio);
            store.save(&store.deck_path("Bio/ch1.md"), &deck).unwrap();
            let mut deck = Deck::new();
            deck.insert(chem);
            store.save(&store.deck_path("Chem/ch1.md"), &deck).unwrap();

            assert_eq!(store.deck_paths().len(), 2);
            assert_eq!(store.load_all().len(), 2);

            let (path, card) = store.find_card(&chem_id).unwrap();
            assert_eq!(path, store.deck_path("Chem/ch1.md"));
            assert_eq!(card.front, "chem");
            assert!(store.find_card("missing").is_none());
        }

        #[test]
        fn chapters_lists_markdown_documents() {
            let (dir, store) = setup_store();
            fs::create_dir_all(dir.path().join("Bio")).unwrap();
            fs::write(dir.path().join("Bio").join("ch1.md"), "x").unwrap();
            fs::write(dir.path().join("Bio").join("notes.txt"), "x").unwrap();
            fs::write(dir.path().join("intro.md"), "x").unwrap();

            assert_eq!(store.chapters(), vec!["Bio/ch1.md", "intro.md"]);
        }
    }

    mod stats_tests {
        use super::*;

        #[test]
        fn counts_by_status_and_flags() {
            let mut review = Card::new("c", "Q", "A", "t", Some(1), now());
            review.status = CardStatus::Review;
            review.blocked = false;
            review.due = now() + Duration::days(2);
            let mut suspended = Card::new("c", "Q", "A", "t", Some(2), now());
            suspended.suspended = true;
            let mut flagged = Card::new("c", "Q", "A", "t", None, now());
            flagged.flagged = true;

            let cards = vec![review, suspended, flagged];
            let stats = Stats::collect(&cards, now());
            assert_eq!(stats.total_cards, 3);
            assert_eq!(stats.new, 2);
            assert_eq!(stats.review, 1);
            assert_eq!(stats.due_now, 1);
            assert_eq!(stats.blocked, 1);
            assert_eq!(stats.suspended, 1);
            assert_eq!(stats.flagged, 1);
            assert_eq!(stats.unaligned, 1);
        }
    }
}
