//! Read-modify-write actions over a deck.
//!
//! Every action re-reads the deck from disk, checks the card still exists,
//! mutates it and writes the whole deck back. Rating additionally reports the
//! chapter's unlock boundary before and after, so callers only re-render the
//! reader when it moved.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aligner::{self, ImageLookup};
use crate::config::SchedulerConfig;
use crate::deck::{DeckError, DeckStore, Result};
use crate::gate::{chapter_boundary, Boundary};
use crate::models::{Card, Paragraph, Rating};
use crate::scheduler::{after_minutes, apply_rating};

#[derive(Debug, Clone, Serialize)]
pub struct RatingOutcome {
    pub card: Card,
    pub before: Boundary,
    pub after: Boundary,
}

impl RatingOutcome {
    pub fn needs_rerender(&self) -> bool {
        self.before != self.after
    }
}

pub fn rate_card(
    store: &DeckStore,
    deck_path: &Path,
    card_id: &str,
    rating: Rating,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> Result<RatingOutcome> {
    let mut deck = store.load(deck_path)?;
    let chapter = deck
        .get(card_id)
        .map(|c| c.chapter.clone())
        .ok_or_else(|| DeckError::CardNotFound(card_id.to_string()))?;

    let before = chapter_boundary(&deck, &chapter);
    let card = deck
        .get_mut(card_id)
        .ok_or_else(|| DeckError::CardNotFound(card_id.to_string()))?;
    apply_rating(card, rating, config, now);
    let card = card.clone();
    let after = chapter_boundary(&deck, &chapter);

    store.save(deck_path, &deck)?;
    tracing::info!(
        card = %card.id,
        rating = rating.as_str(),
        status = card.status.as_str(),
        "Rated card; boundary {} -> {}",
        before,
        after
    );

    Ok(RatingOutcome {
        card,
        before,
        after,
    })
}

/// Run `f` on one card of a freshly loaded deck and save the deck.
fn update_card<F>(store: &DeckStore, deck_path: &Path, card_id: &str, f: F) -> Result<Card>
where
    F: FnOnce(&mut Card),
{
    let mut deck = store.load(deck_path)?;
    let card = deck
        .get_mut(card_id)
        .ok_or_else(|| DeckError::CardNotFound(card_id.to_string()))?;
    f(card);
    let card = card.clone();
    store.save(deck_path, &deck)?;
    Ok(card)
}

/// Push a card back by the configured bury delay without rating it.
pub fn bury_card(
    store: &DeckStore,
    deck_path: &Path,
    card_id: &str,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> Result<Card> {
    let due = after_minutes(now, config.bury_delay_hours * 60.0);
    update_card(store, deck_path, card_id, |card| card.due = due)
}

pub fn toggle_suspended(store: &DeckStore, deck_path: &Path, card_id: &str) -> Result<Card> {
    update_card(store, deck_path, card_id, |card| card.suspended = !card.suspended)
}

pub fn toggle_flagged(store: &DeckStore, deck_path: &Path, card_id: &str) -> Result<Card> {
    update_card(store, deck_path, card_id, |card| card.flagged = !card.flagged)
}

/// Manually anchor a card, for tags the aligner could not place.
pub fn assign_paragraph(
    store: &DeckStore,
    deck_path: &Path,
    card_id: &str,
    para_idx: Option<u32>,
) -> Result<Card> {
    update_card(store, deck_path, card_id, |card| card.para_idx = para_idx)
}

/// Replace a card's tag and re-align it against the chapter's paragraphs.
pub fn retag_card(
    store: &DeckStore,
    deck_path: &Path,
    card_id: &str,
    tag: &str,
    paragraphs: &[Paragraph],
    images: &impl ImageLookup,
) -> Result<Card> {
    let para_idx = aligner::align(tag, paragraphs, images);
    update_card(store, deck_path, card_id, |card| {
        card.tag = tag.to_string();
        card.para_idx = para_idx;
    })
}

/// Create a card for `chapter`, aligned to the paragraph its tag quotes.
/// An unmatched tag leaves the card unaligned for manual assignment.
#[allow(clippy::too_many_arguments)]
pub fn create_card(
    store: &DeckStore,
    chapter: &str,
    front: &str,
    back: &str,
    tag: &str,
    paragraphs: &[Paragraph],
    images: &impl ImageLookup,
    now: DateTime<Utc>,
) -> Result<Card> {
    let para_idx = aligner::align(tag, paragraphs, images);
    if para_idx.is_none() {
        tracing::warn!("Tag for new card in {} matched no paragraph", chapter);
    }

    let card = Card::new(chapter, front, back, tag, para_idx, now);
    let path = store.deck_path(chapter);
    let mut deck = store.load(&path)?;
    deck.insert(card.clone());
    store.save(&path, &deck)?;
    Ok(card)
}

pub fn delete_card(store: &DeckStore, deck_path: &Path, card_id: &str) -> Result<Card> {
    let mut deck = store.load(deck_path)?;
    let card = deck
        .remove(card_id)
        .ok_or_else(|| DeckError::CardNotFound(card_id.to_string()))?;
    store.save(deck_path, &deck)?;
    Ok(card)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CardStatus, Deck};
    use std::collections::HashMap;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    const CHAPTER: &str = "Bio/ch1.md";

    fn setup() -> (tempfile::TempDir, DeckStore) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = DeckStore::new(dir.path());
        (dir, store)
    }

    fn seed(store: &DeckStore, cards: Vec<Card>) -> std::path::PathBuf {
        let path = store.deck_path(CHAPTER);
        let mut deck = Deck::new();
        for card in cards {
            deck.insert(card);
        }
        store.save(&path, &deck).unwrap();
        path
    }

    fn paragraphs() -> Vec<Paragraph> {
        vec![
            Paragraph {
                id: 1,
                markdown: "Cells are the basic unit of life.".to_string(),
            },
            Paragraph {
                id: 2,
                markdown: "Mitochondria produce most of the cell's ATP.".to_string(),
            },
        ]
    }

    mod rate_tests {
        use super::*;

        #[test]
        fn rating_the_blocker_moves_the_boundary() {
            let (_dir, store) = setup();
            let gate = Card::new(CHAPTER, "Q3", "A", "t", Some(3), now());
            let later = Card::new(CHAPTER, "Q7", "A", "t", Some(7), now());
            let gate_id = gate.id.clone();
            let path = seed(&store, vec![gate, later]);

            let outcome =
                rate_card(&store, &path, &gate_id, Rating::Good, &SchedulerConfig::default(), now())
                    .unwrap();
            assert_eq!(outcome.before, Boundary::At(3));
            assert_eq!(outcome.after, Boundary::At(7));
            assert!(outcome.needs_rerender());
            assert!(!outcome.card.blocked);

            let saved = store.load(&path).unwrap();
            assert_eq!(saved.get(&gate_id).unwrap().status, CardStatus::Learning);
        }

        #[test]
        fn rating_a_later_card_leaves_boundary_alone() {
            let (_dir, store) = setup();
            let gate = Card::new(CHAPTER, "Q3", "A", "t", Some(3), now());
            let later = Card::new(CHAPTER, "Q7", "A", "t", Some(7), now());
            let later_id = later.id.clone();
            let path = seed(&store, vec![gate, later]);

            let outcome =
                rate_card(&store, &path, &later_id, Rating::Easy, &SchedulerConfig::default(), now())
                    .unwrap();
            assert_eq!(outcome.before, Boundary::At(3));
            assert_eq!(outcome.after, Boundary::At(3));
            assert!(!outcome.needs_rerender());
        }

        #[test]
        fn rating_a_missing_card_aborts_without_writing() {
            let (_dir, store) = setup();
            let path = seed(&store, vec![Card::new(CHAPTER, "Q", "A", "t", Some(1), now())]);
            let before = std::fs::read_to_string(&path).unwrap();

            let result = rate_card(&store, &path, "gone", Rating::Good, &SchedulerConfig::default(), now());
            assert!(matches!(result, Err(DeckError::CardNotFound(id)) if id == "gone"));
            assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        }

        #[test]
        fn sequential_ratings_both_persist() {
            let (_dir, store) = setup();
            let a = Card::new(CHAPTER, "A", "A", "t", Some(1), now());
            let b = Card::new(CHAPTER, "B", "A", "t", Some(2), now());
            let (a_id, b_id) = (a.id.clone(), b.id.clone());
            let path = seed(&store, vec![a, b]);
            let config = SchedulerConfig::default();

            rate_card(&store, &path, &a_id, Rating::Good, &config, now()).unwrap();
            rate_card(&store, &path, &b_id, Rating::Again, &config, now()).unwrap();

            let deck = store.load(&path).unwrap();
            assert_eq!(deck.get(&a_id).unwrap().review_history.len(), 1);
            assert_eq!(deck.get(&b_id).unwrap().review_history.len(), 1);
            assert!(!deck.get(&a_id).unwrap().blocked);
            assert!(deck.get(&b_id).unwrap().blocked);
        }
    }

    mod card_action_tests {
        use super::*;

        #[test]
        fn bury_pushes_due_by_configured_hours() {
            let (_dir, store) = setup();
            let card = Card::new(CHAPTER, "Q", "A", "t", Some(1), now());
            let id = card.id.clone();
            let path = seed(&store, vec![card]);
            let mut config = SchedulerConfig::default();
            config.bury_delay_hours = 6.0;

            let buried = bury_card(&store, &path, &id, &config, now()).unwrap();
            assert_eq!(buried.due, now() + Duration::hours(6));
            assert!(buried.review_history.is_empty());
            assert!(buried.blocked);
        }

        #[test]
        fn bury_with_unvalidated_delay_never_panics() {
            let (_dir, store) = setup();
            let card = Card::new(CHAPTER, "Q", "A", "t", Some(1), now());
            let id = card.id.clone();
            let path = seed(&store, vec![card]);
            let mut config = SchedulerConfig::default();

            config.bury_delay_hours = 1e300;
            let buried = bury_card(&store, &path, &id, &config, now()).unwrap();
            assert_eq!(buried.due, now() + Duration::days(36_500));

            config.bury_delay_hours = -6.0;
            let buried = bury_card(&store, &path, &id, &config, now()).unwrap();
            assert_eq!(buried.due, now());
        }

        #[test]
        fn suspend_and_flag_toggle() {
            let (_dir, store) = setup();
            let card = Card::new(CHAPTER, "Q", "A", "t", Some(1), now());
            let id = card.id.clone();
            let path = seed(&store, vec![card]);

            assert!(toggle_suspended(&store, &path, &id).unwrap().suspended);
            assert!(!toggle_suspended(&store, &path, &id).unwrap().suspended);
            assert!(toggle_flagged(&store, &path, &id).unwrap().flagged);
            assert!(store.load(&path).unwrap().get(&id).unwrap().flagged);
        }

        #[test]
        fn create_aligns_and_persists() {
            let (_dir, store) = setup();
            let card = create_card(
                &store,
                CHAPTER,
                "What makes ATP?",
                "Mitochondria",
                "Mitochondria produce most",
                &paragraphs(),
                &HashMap::new(),
                now(),
            )
            .unwrap();

            assert_eq!(card.para_idx, Some(2));
            assert!(card.blocked);
            let deck = store.load(&store.deck_path(CHAPTER)).unwrap();
            assert_eq!(deck.get(&card.id).unwrap().front, "What makes ATP?");
        }

        #[test]
        fn create_with_unmatched_tag_is_unaligned() {
            let (_dir, store) = setup();
            let card = create_card(
                &store,
                CHAPTER,
                "Q",
                "A",
                "photosynthesis in chloroplasts",
                &paragraphs(),
                &HashMap::new(),
                now(),
            )
            .unwrap();
            assert_eq!(card.para_idx, None);
        }

        #[test]
        fn retag_realigns_and_manual_assignment_overrides() {
            let (_dir, store) = setup();
            let card = Card::new(CHAPTER, "Q", "A", "unmatched", None, now());
            let id = card.id.clone();
            let path = seed(&store, vec![card]);

            let retagged = retag_card(
                &store,
                &path,
                &id,
                "basic unit of life",
                &paragraphs(),
                &HashMap::new(),
            )
            .unwrap();
            assert_eq!(retagged.tag, "basic unit of life");
            assert_eq!(retagged.para_idx, Some(1));

            let moved = assign_paragraph(&store, &path, &id, Some(2)).unwrap();
            assert_eq!(moved.para_idx, Some(2));
        }

        #[test]
        fn delete_removes_card_and_reports_missing() {
            let (_dir, store) = setup();
            let card = Card::new(CHAPTER, "Q", "A", "t", Some(1), now());
            let id = card.id.clone();
            let path = seed(&store, vec![card]);

            assert_eq!(delete_card(&store, &path, &id).unwrap().id, id);
            assert!(store.load(&path).unwrap().is_empty());
            assert!(matches!(
                delete_card(&store, &path, &id),
                Err(DeckError::CardNotFound(_))
            ));
        }
    }
}
