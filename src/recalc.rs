//! Bulk paragraph re-alignment after documents change.
//!
//! Runs chapter by chapter. A failing chapter is logged and counted and the
//! sweep moves on. Only one sweep may run at a time per process.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;

use crate::aligner::{self, load_image_index};
use crate::deck::{DeckError, DeckStore};
use crate::document::{document_path, load_paragraphs};

static RUNNING: AtomicBool = AtomicBool::new(false);

#[derive(Error, Debug)]
pub enum RecalcError {
    #[error("A paragraph recalculation is already running")]
    AlreadyRunning,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecalcReport {
    pub chapters: usize,
    pub cards: usize,
    pub updated: usize,
    pub unmatched: Vec<String>,
    pub failed: Vec<String>,
}

// Clears the running flag however the sweep ends.
struct RunGuard;

impl RunGuard {
    fn acquire() -> Result<Self, RecalcError> {
        RUNNING
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RunGuard)
            .map_err(|_| RecalcError::AlreadyRunning)
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        RUNNING.store(false, Ordering::Release);
    }
}

/// Re-align every card of `chapters` against the current documents.
pub fn recalculate(store: &DeckStore, chapters: &[String]) -> Result<RecalcReport, RecalcError> {
    let _guard = RunGuard::acquire()?;
    let mut report = RecalcReport::default();

    for chapter in chapters {
        report.chapters += 1;
        match recalculate_chapter(store, chapter, &mut report) {
            Ok(()) => {}
            Err(e) => {
                tracing::warn!("Skipping {} during recalculation: {}", chapter, e);
                report.failed.push(chapter.clone());
            }
        }
    }

    tracing::info!(
        "Recalculated {} cards across {} chapters: {} updated, {} unmatched, {} failed",
        report.cards,
        report.chapters,
        report.updated,
        report.unmatched.len(),
        report.failed.len()
    );
    Ok(report)
}

fn recalculate_chapter(
    store: &DeckStore,
    chapter: &str,
    report: &mut RecalcReport,
) -> Result<(), DeckError> {
    let doc = document_path(store.root(), chapter);
    if !doc.exists() {
        return Err(DeckError::DocumentNotFound(chapter.to_string()));
    }
    let paragraphs = load_paragraphs(&doc)?;
    let images = load_image_index(&store.image_index_path(chapter));

    let deck_path = store.deck_path(chapter);
    let mut deck = store.load(&deck_path)?;

    let mut changed: BTreeMap<String, Option<u32>> = BTreeMap::new();
    for card in deck.in_chapter(chapter) {
        report.cards += 1;
        let para_idx = aligner::align(&card.tag, &paragraphs, &images);
        if para_idx.is_none() {
            report.unmatched.push(card.id.clone());
        }
        if para_idx != card.para_idx {
            changed.insert(card.id.clone(), para_idx);
        }
    }

    if changed.is_empty() {
        return Ok(());
    }
    report.updated += changed.len();
    for (id, para_idx) in changed {
        if let Some(card) = deck.get_mut(&id) {
            card.para_idx = para_idx;
        }
    }
    store.save(&deck_path, &deck)
}
