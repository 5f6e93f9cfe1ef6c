//! SM-2 style spaced-repetition scheduling.
//!
//! A review is a deterministic transition of an [`SrsItem`] driven by a
//! recall quality in 0..=5. Scheduling state lives in the profile's `srs` map;
//! callers always transition from the state they just loaded, never from a
//! cached copy.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::SrsItem;

/// Lower bound for the e-factor.
pub const MIN_EFACTOR: f64 = 1.3;

/// Highest recall quality.
pub const MAX_QUALITY: u8 = 5;

/// Qualities below this reset the item.
pub const PASSING_QUALITY: u8 = 3;

/// Clamp an externally supplied quality into 0..=5.
pub fn clamp_quality(quality: i64) -> u8 {
    quality.clamp(0, i64::from(MAX_QUALITY)) as u8
}

/// Map an aggregate quiz score in [0, 1] to a recall quality.
///
/// Halves round to even, so a score of exactly 0.5 maps to quality 2.
pub fn quality_from_score(score: f64) -> u8 {
    let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
    clamp_quality((score * f64::from(MAX_QUALITY)).round_ties_even() as i64)
}

/// Apply one review with the given quality and return the new state.
pub fn review(item: &SrsItem, quality: i64, today: NaiveDate) -> SrsItem {
    let q = clamp_quality(quality);
    let mut next = item.clone();

    if q < PASSING_QUALITY {
        next.repetitions = 0;
        next.interval_days = 1;
    } else {
        next.interval_days = match next.repetitions {
            0 => 1,
            1 => 6,
            _ => (f64::from(next.interval_days) * next.efactor).round_ties_even() as u32,
        };
        next.repetitions = next.repetitions.saturating_add(1);
    }

    let miss = f64::from(MAX_QUALITY - q);
    next.efactor = (next.efactor + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EFACTOR);
    next.last_review = Some(today);
    next
}

/// Review `item_id` in an SRS map, creating the entry on first use.
///
/// Returns the updated entry.
pub fn schedule<'a>(
    srs: &'a mut BTreeMap<String, SrsItem>,
    item_id: &str,
    quality: i64,
    today: NaiveDate,
) -> &'a SrsItem {
    let current = srs
        .get(item_id)
        .cloned()
        .unwrap_or_else(|| SrsItem::new(item_id));
    let updated = review(&current, quality, today);
    srs.insert(item_id.to_string(), updated);
    &srs[item_id]
}

/// An item together with its derived due date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledReview {
    #[serde(flatten)]
    pub item: SrsItem,
    pub next_review: Option<NaiveDate>,
}

impl From<SrsItem> for ScheduledReview {
    fn from(item: SrsItem) -> Self {
        let next_review = item.next_review();
        Self { item, next_review }
    }
}

/// Items due on or before `today`, earliest first.
pub fn due_items(srs: &BTreeMap<String, SrsItem>, today: NaiveDate) -> Vec<ScheduledReview> {
    let mut due: Vec<ScheduledReview> = srs
        .values()
        .filter(|item| item.next_review().is_some_and(|d| d <= today))
        .cloned()
        .map(ScheduledReview::from)
        .collect();
    due.sort_by(|a, b| {
        a.next_review
            .cmp(&b.next_review)
            .then_with(|| a.item.item_id.cmp(&b.item.item_id))
    });
    due
}
