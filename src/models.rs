use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const INITIAL_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;

// Scheduling state of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    New,
    Learning,
    Review,
    Relearn,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::New => "new",
            CardStatus::Learning => "learning",
            CardStatus::Review => "review",
            CardStatus::Relearn => "relearn",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "new" => Some(CardStatus::New),
            "learning" => Some(CardStatus::Learning),
            "review" => Some(CardStatus::Review),
            "relearn" | "relearning" => Some(CardStatus::Relearn),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CardStatus::New => "New",
            CardStatus::Learning => "Learning",
            CardStatus::Review => "Review",
            CardStatus::Relearn => "Relearn",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "again" | "a" | "fail" | "1" => Some(Rating::Again),
            "hard" | "h" | "2" => Some(Rating::Hard),
            "good" | "g" | "3" => Some(Rating::Good),
            "easy" | "e" | "4" => Some(Rating::Easy),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rating::Again => "Again",
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        }
    }
}

/// Snapshot of a card's schedule taken before a rating was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLogEntry {
    pub timestamp: DateTime<Utc>,
    pub rating: Rating,
    pub state: CardStatus,
    pub interval: f64,
    pub ease_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub front: String,
    pub back: String,
    pub tag: String,
    pub chapter: String,
    #[serde(rename = "paraIdx", default)]
    pub para_idx: Option<u32>,
    pub status: CardStatus,
    #[serde(default)]
    pub last_reviewed: Option<DateTime<Utc>>,
    pub interval: f64,
    pub ease_factor: f64,
    pub due: DateTime<Utc>,
    #[serde(default)]
    pub learning_step_index: Option<u32>,
    pub blocked: bool,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub review_history: Vec<ReviewLogEntry>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// A never-rated card. It blocks its paragraph until first answered.
    pub fn new(
        chapter: &str,
        front: &str,
        back: &str,
        tag: &str,
        para_idx: Option<u32>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            front: front.to_string(),
            back: back.to_string(),
            tag: tag.to_string(),
            chapter: chapter.to_string(),
            para_idx,
            status: CardStatus::New,
            last_reviewed: None,
            interval: 0.0,
            ease_factor: INITIAL_EASE_FACTOR,
            due: now,
            learning_step_index: None,
            blocked: true,
            suspended: false,
            flagged: false,
            review_history: Vec::new(),
            created_at: now,
        }
    }

    /// True until the card has entered its first learning step.
    pub fn is_unseen(&self) -> bool {
        self.status == CardStatus::New && self.learning_step_index.unwrap_or(0) == 0
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }
}

/// All cards of one folder, keyed by card id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deck {
    pub cards: BTreeMap<String, Card>,
}

impl Deck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Card> {
        self.cards.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Card> {
        self.cards.get_mut(id)
    }

    pub fn insert(&mut self, card: Card) {
        self.cards.insert(card.id.clone(), card);
    }

    pub fn remove(&mut self, id: &str) -> Option<Card> {
        self.cards.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.values()
    }

    pub fn in_chapter<'a>(&'a self, chapter: &'a str) -> impl Iterator<Item = &'a Card> + 'a {
        self.cards.values().filter(move |c| c.chapter == chapter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub id: u32,
    pub markdown: String,
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    mod card_tests {
        use super::*;

        #[test]
        fn new_card_blocks_and_is_due_immediately() {
            let card = Card::new("Bio/ch1.md", "Q", "A", "some quote", Some(3), now());
            assert_eq!(card.status, CardStatus::New);
            assert!(card.blocked);
            assert!(!card.suspended);
            assert_eq!(card.due, now());
            assert_eq!(card.interval, 0.0);
            assert_eq!(card.ease_factor, INITIAL_EASE_FACTOR);
            assert!(card.is_due(now()));
        }

        #[test]
        fn new_cards_get_distinct_ids() {
            let a = Card::new("c", "Q", "A", "t", None, now());
            let b = Card::new("c", "Q", "A", "t", None, now());
            assert_ne!(a.id, b.id);
        }

        #[test]
        fn unseen_requires_new_status_and_no_step() {
            let mut card = Card::new("c", "Q", "A", "t", None, now());
            assert!(card.is_unseen());

            card.learning_step_index = Some(0);
            assert!(card.is_unseen());

            card.learning_step_index = Some(1);
            assert!(!card.is_unseen());

            card.learning_step_index = None;
            card.status = CardStatus::Learning;
            assert!(!card.is_unseen());
        }

        #[test]
        fn serializes_para_idx_with_original_field_name() {
            let card = Card::new("c", "Q", "A", "t", Some(7), now());
            let json = serde_json::to_string(&card).unwrap();
            assert!(json.contains("\"paraIdx\":7"));
            assert!(json.contains("\"status\":\"new\""));
            assert!(json.contains("\"learning_step_index\":null"));
        }

        #[test]
        fn deserializes_with_missing_optional_fields() {
            let json = r#"{
                "id": "abc",
                "front": "Q",
                "back": "A",
                "tag": "quote",
                "chapter": "Bio/ch1.md",
                "status": "review",
                "interval": 3.0,
                "ease_factor": 2.5,
                "due": "2024-03-01T12:00:00Z",
                "blocked": false
            }"#;
            let card: Card = serde_json::from_str(json).unwrap();
            assert_eq!(card.para_idx, None);
            assert_eq!(card.status, CardStatus::Review);
            assert!(!card.suspended);
            assert!(!card.flagged);
            assert!(card.review_history.is_empty());
            assert!(card.last_reviewed.is_none());
        }
    }

    mod deck_tests {
        use super::*;

        #[test]
        fn deck_serializes_as_plain_id_map() {
            let mut deck = Deck::new();
            let card = Card::new("c", "Q", "A", "t", None, now());
            let id = card.id.clone();
            deck.insert(card);

            let value = serde_json::to_value(&deck).unwrap();
            assert!(value.is_object());
            assert_eq!(value[&id]["front"], "Q");
        }

        #[test]
        fn in_chapter_filters_by_chapter() {
            let mut deck = Deck::new();
            deck.insert(Card::new("Bio/ch1.md", "Q1", "A", "t", None, now()));
            deck.insert(Card::new("Bio/ch2.md", "Q2", "A", "t", None, now()));
            deck.insert(Card::new("Bio/ch1.md", "Q3", "A", "t", None, now()));

            assert_eq!(deck.in_chapter("Bio/ch1.md").count(), 2);
            assert_eq!(deck.in_chapter("Bio/ch3.md").count(), 0);
            assert_eq!(deck.len(), 3);
        }
    }

    mod status_tests {
        use super::*;

        #[test]
        fn as_str_returns_correct_values() {
            assert_eq!(CardStatus::New.as_str(), "new");
            assert_eq!(CardStatus::Learning.as_str(), "learning");
            assert_eq!(CardStatus::Review.as_str(), "review");
            assert_eq!(CardStatus::Relearn.as_str(), "relearn");
        }

        #[test]
        fn from_str_round_trips_and_rejects_unknown() {
            for status in [
                CardStatus::New,
                CardStatus::Learning,
                CardStatus::Review,
                CardStatus::Relearn,
            ] {
                assert_eq!(CardStatus::from_str(status.as_str()), Some(status));
            }
            assert_eq!(CardStatus::from_str("RELEARNING"), Some(CardStatus::Relearn));
            assert_eq!(CardStatus::from_str("mature"), None);
        }
    }

    mod rating_tests {
        use super::*;

        #[test]
        fn from_str_accepts_words_letters_and_digits() {
            assert_eq!(Rating::from_str("again"), Some(Rating::Again));
            assert_eq!(Rating::from_str("A"), Some(Rating::Again));
            assert_eq!(Rating::from_str("1"), Some(Rating::Again));
            assert_eq!(Rating::from_str("Hard"), Some(Rating::Hard));
            assert_eq!(Rating::from_str("2"), Some(Rating::Hard));
            assert_eq!(Rating::from_str("good"), Some(Rating::Good));
            assert_eq!(Rating::from_str("3"), Some(Rating::Good));
            assert_eq!(Rating::from_str("EASY"), Some(Rating::Easy));
            assert_eq!(Rating::from_str("4"), Some(Rating::Easy));
        }

        #[test]
        fn from_str_invalid() {
            assert!(Rating::from_str("").is_none());
            assert!(Rating::from_str("5").is_none());
            assert!(Rating::from_str("perfect").is_none());
        }

        #[test]
        fn serializes_lowercase() {
            assert_eq!(serde_json::to_string(&Rating::Easy).unwrap(), "\"easy\"");
        }
    }

    mod json_output_tests {
        use super::*;

        #[test]
        fn ok_with_string() {
            let output = JsonOutput::ok("test data");
            assert!(output.success);
            assert_eq!(output.data, Some("test data"));
            assert!(output.error.is_none());
        }

        #[test]
        fn err_with_string() {
            let output = JsonOutput::<()>::err("something went wrong");
            assert!(!output.success);
            assert!(output.data.is_none());
            assert_eq!(output.error, Some("something went wrong".to_string()));
        }

        #[test]
        fn serializes_err_correctly() {
            let output = JsonOutput::<()>::err("error");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":false"));
            assert!(json.contains("\"data\":null"));
            assert!(json.contains("\"error\":\"error\""));
        }
    }
}
