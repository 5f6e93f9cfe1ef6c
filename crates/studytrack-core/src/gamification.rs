//! XP, daily streaks, and badges.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::StudentProfile;

/// Study minutes per XP point.
pub const MINUTES_PER_XP: u32 = 5;

/// XP, streak, and badges as surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamificationSnapshot {
    pub xp: u64,
    pub streak: u32,
    pub badges: Vec<String>,
}

impl From<&StudentProfile> for GamificationSnapshot {
    fn from(profile: &StudentProfile) -> Self {
        Self {
            xp: profile.xp,
            streak: profile.streak,
            badges: profile.badges.iter().cloned().collect(),
        }
    }
}

/// Award one XP per five study minutes, at least one. Returns the new total.
pub fn award_xp(profile: &mut StudentProfile, study_minutes: u32) -> u64 {
    let award = u64::from((study_minutes / MINUTES_PER_XP).max(1));
    profile.xp = profile.xp.saturating_add(award);
    profile.xp
}

/// Advance the daily streak for a study session on `study_date`.
///
/// The next calendar day extends the streak, the same day leaves it alone,
/// and any other date (including one in the past) restarts it at 1.
/// `last_study_date` always becomes `study_date`.
pub fn update_streak(profile: &mut StudentProfile, study_date: NaiveDate) -> u32 {
    profile.streak = match profile.last_study_date {
        None => 1,
        Some(last) if last == study_date => profile.streak,
        Some(last) if last.succ_opt() == Some(study_date) => profile.streak.saturating_add(1),
        Some(_) => 1,
    };
    profile.last_study_date = Some(study_date);
    profile.streak
}

/// Add a badge once; awarding it again changes nothing.
pub fn award_badge<'a>(profile: &'a mut StudentProfile, badge_id: &str) -> &'a BTreeSet<String> {
    if !profile.badges.contains(badge_id) {
        tracing::debug!("awarding badge '{badge_id}' to {}", profile.student_id);
        profile.badges.insert(badge_id.to_string());
    }
    &profile.badges
}

/// Badge id for reaching mastery on a topic.
pub fn mastery_badge(topic: &str) -> String {
    format!("mastery_{topic}")
}
