//! Per-card spaced repetition state machine.
//!
//! `new -> learning -> review`, and `review -> relearn -> review` after a
//! lapse. Learning and relearning walk a step table of minutes; graduated
//! cards grow their interval in days by the ease factor.
//!
//! A card's `blocked` flag is set by `Again` and cleared by any other rating.
//! Nothing else touches it.

use chrono::{DateTime, Duration, Utc};

use crate::config::SchedulerConfig;
use crate::models::{Card, CardStatus, Rating, ReviewLogEntry, MIN_EASE_FACTOR};

const AGAIN_EASE_PENALTY: f64 = 0.2;
const HARD_EASE_PENALTY: f64 = 0.15;
const EASY_EASE_BONUS: f64 = 0.15;
const HARD_INTERVAL_MULTIPLIER: f64 = 1.2;
const GRADUATING_INTERVAL_DAYS: f64 = 1.0;
const EASY_GRADUATING_INTERVAL_DAYS: f64 = 4.0;

/// Longest interval a card can reach, about a century.
pub const MAX_INTERVAL_DAYS: f64 = 36_500.0;

const MILLIS_PER_MINUTE: f64 = 60_000.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Apply `rating` to `card` at time `now`.
///
/// A snapshot of the card's schedule before the rating is appended to
/// `review_history`. The call cannot fail.
pub fn apply_rating(card: &mut Card, rating: Rating, config: &SchedulerConfig, now: DateTime<Utc>) {
    card.review_history.push(ReviewLogEntry {
        timestamp: now,
        rating,
        state: card.status,
        interval: card.interval,
        ease_factor: card.ease_factor,
    });
    card.last_reviewed = Some(now);

    match rating {
        Rating::Again => lapse(card, now),
        Rating::Hard | Rating::Good | Rating::Easy => {
            card.blocked = false;
            match card.status {
                CardStatus::New | CardStatus::Learning => {
                    advance_steps(card, rating, &config.learning_steps, CardStatus::Learning, now)
                }
                CardStatus::Relearn => {
                    advance_steps(card, rating, &config.relearn_steps, CardStatus::Relearn, now)
                }
                CardStatus::Review => grow_interval(card, rating, now),
            }
        }
    }

    card.ease_factor = card.ease_factor.max(MIN_EASE_FACTOR);
    card.interval = card.interval.clamp(0.0, MAX_INTERVAL_DAYS);
}

/// Due time each rating would produce, without touching `card`.
pub fn preview_due(
    card: &Card,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> [(Rating, DateTime<Utc>); 4] {
    Rating::ALL.map(|rating| {
        let mut scratch = card.clone();
        apply_rating(&mut scratch, rating, config, now);
        (rating, scratch.due)
    })
}

fn lapse(card: &mut Card, now: DateTime<Utc>) {
    card.status = match card.status {
        CardStatus::Review => CardStatus::Relearn,
        CardStatus::New | CardStatus::Learning => CardStatus::Learning,
        CardStatus::Relearn => CardStatus::Relearn,
    };
    card.learning_step_index = Some(0);
    card.interval = 0.0;
    card.ease_factor = (card.ease_factor - AGAIN_EASE_PENALTY).max(MIN_EASE_FACTOR);
    card.due = now;
    card.blocked = true;
}

fn advance_steps(
    card: &mut Card,
    rating: Rating,
    steps: &[f64],
    phase: CardStatus,
    now: DateTime<Utc>,
) {
    // A new card sits just before the first step.
    let current: i64 = match card.status {
        CardStatus::New => -1,
        _ => i64::from(card.learning_step_index.unwrap_or(0)),
    };
    let advance = if rating == Rating::Easy { 2 } else { 1 };
    let next = current + advance;

    match usize::try_from(next).ok().and_then(|i| steps.get(i).map(|m| (i, *m))) {
        Some((index, minutes)) => {
            card.status = phase;
            card.learning_step_index = Some(index as u32);
            card.due = after_minutes(now, minutes);
        }
        None => {
            card.status = CardStatus::Review;
            card.interval = if rating == Rating::Easy {
                EASY_GRADUATING_INTERVAL_DAYS
            } else {
                GRADUATING_INTERVAL_DAYS
            };
            card.due = after_days(now, card.interval);
            card.learning_step_index = None;
        }
    }
}

fn grow_interval(card: &mut Card, rating: Rating, now: DateTime<Utc>) {
    if rating == Rating::Hard {
        card.interval = (card.interval * HARD_INTERVAL_MULTIPLIER).clamp(1.0, MAX_INTERVAL_DAYS);
        card.ease_factor = (card.ease_factor - HARD_EASE_PENALTY).max(MIN_EASE_FACTOR);
    } else {
        if rating == Rating::Easy {
            card.ease_factor += EASY_EASE_BONUS;
        }
        card.interval = (card.interval * card.ease_factor)
            .round()
            .min(MAX_INTERVAL_DAYS);
    }
    card.due = after_days(now, card.interval);
}

/// `now` pushed forward by `minutes`, saturating at the latest representable time.
pub fn after_minutes(now: DateTime<Utc>, minutes: f64) -> DateTime<Utc> {
    after_millis(now, minutes * MILLIS_PER_MINUTE)
}

pub fn after_days(now: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    after_millis(now, days * MILLIS_PER_DAY)
}

// Offsets are clamped to [0, MAX_INTERVAL_DAYS]; NaN counts as zero.
fn after_millis(now: DateTime<Utc>, millis: f64) -> DateTime<Utc> {
    let millis = if millis.is_nan() {
        0.0
    } else {
        millis.clamp(0.0, MAX_INTERVAL_DAYS * MILLIS_PER_DAY)
    };
    now.checked_add_signed(Duration::milliseconds(millis.round() as i64))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
