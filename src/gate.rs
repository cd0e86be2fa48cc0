//! Unlock boundary over a chapter's paragraphs.
//!
//! The boundary is the lowest paragraph index held by a blocked, active card.
//! Paragraphs past it are obscured. It is always recomputed from the cards at
//! hand; a single rating can move it.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::models::{Card, Deck};

/// Lowest blocked paragraph index, or `Unbounded` when nothing gates.
///
/// Ordered so that any `At(n)` sorts before `Unbounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Boundary {
    At(u32),
    Unbounded,
}

impl Boundary {
    fn of(para_idx: Option<u32>) -> Self {
        para_idx.map_or(Boundary::Unbounded, Boundary::At)
    }

    /// Whether paragraph `para_id` must be rendered obscured.
    pub fn obscures(&self, para_id: u32) -> bool {
        Boundary::At(para_id) > *self
    }

    /// Whether a card anchored at `para_idx` sits at or before the boundary.
    /// Unaligned cards compare as infinitely far.
    pub fn admits(&self, para_idx: Option<u32>) -> bool {
        Boundary::of(para_idx) <= *self
    }

    pub fn index(&self) -> Option<u32> {
        match self {
            Boundary::At(n) => Some(*n),
            Boundary::Unbounded => None,
        }
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::At(n) => write!(f, "{}", n),
            Boundary::Unbounded => write!(f, "none"),
        }
    }
}

// `null` for unbounded, matching an absent index in card JSON.
impl Serialize for Boundary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.index().serialize(serializer)
    }
}

pub fn first_blocked_index<'a, I>(cards: I) -> Boundary
where
    I: IntoIterator<Item = &'a Card>,
{
    cards
        .into_iter()
        .filter(|c| c.blocked && !c.suspended)
        .map(|c| Boundary::of(c.para_idx))
        .min()
        .unwrap_or(Boundary::Unbounded)
}

/// Boundary of one chapter, considering only that chapter's cards.
pub fn chapter_boundary(deck: &Deck, chapter: &str) -> Boundary {
    first_blocked_index(deck.in_chapter(chapter))
}
