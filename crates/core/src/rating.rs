//! Review and rating aggregates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of reviewer/voter submitting feedback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerKind {
    /// A human-controlled account.
    Human,
    /// A self-registered automated agent.
    Bot,
    /// An automated agent whose registration was claimed by a human account.
    VerifiedBot,
}

impl ReviewerKind {
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "human" => Ok(Self::Human),
            "bot" => Ok(Self::Bot),
            "verified_bot" => Ok(Self::VerifiedBot),
            _ => Err(crate::Error::InvalidReviewerKind(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Bot => "bot",
            Self::VerifiedBot => "verified_bot",
        }
    }
}

impl fmt::Display for ReviewerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate rating for one reviewer kind.
///
/// The mean is `None` when there are no reviews. Callers must distinguish
/// "no reviews" from "rated zero"; a summary never reports `0.0` for an
/// unrated subject.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    /// Number of reviews counted.
    pub count: u64,
    /// Mean rating, absent when count is zero.
    pub mean: Option<f64>,
}

impl RatingSummary {
    /// Compute a summary from raw ratings.
    pub fn from_ratings(ratings: &[u8]) -> Self {
        if ratings.is_empty() {
            return Self {
                count: 0,
                mean: None,
            };
        }
        let sum: u64 = ratings.iter().map(|r| *r as u64).sum();
        Self {
            count: ratings.len() as u64,
            mean: Some(sum as f64 / ratings.len() as f64),
        }
    }
}

/// Rating aggregates for a skill, partitioned by reviewer kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillRatings {
    pub human: RatingSummary,
    pub bot: RatingSummary,
    pub verified_bot: RatingSummary,
}

impl SkillRatings {
    /// Summary for a given reviewer kind.
    pub fn for_kind(&self, kind: ReviewerKind) -> RatingSummary {
        match kind {
            ReviewerKind::Human => self.human,
            ReviewerKind::Bot => self.bot,
            ReviewerKind::VerifiedBot => self.verified_bot,
        }
    }

    pub fn set_for_kind(&mut self, kind: ReviewerKind, summary: RatingSummary) {
        match kind {
            ReviewerKind::Human => self.human = summary,
            ReviewerKind::Bot => self.bot = summary,
            ReviewerKind::VerifiedBot => self.verified_bot = summary,
        }
    }

    /// Combined summary across all reviewer kinds.
    pub fn combined(&self) -> RatingSummary {
        let count = self.human.count + self.bot.count + self.verified_bot.count;
        if count == 0 {
            return RatingSummary {
                count: 0,
                mean: None,
            };
        }
        let weighted: f64 = [self.human, self.bot, self.verified_bot]
            .iter()
            .filter_map(|s| s.mean.map(|m| m * s.count as f64))
            .sum();
        RatingSummary {
            count,
            mean: Some(weighted / count as f64),
        }
    }
}

/// Validate a rating value against the accepted range.
pub fn validate_rating(rating: u8) -> crate::Result<()> {
    if (crate::MIN_RATING..=crate::MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(crate::Error::InvalidRating(rating))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ratings_have_no_mean() {
        let summary = RatingSummary::from_ratings(&[]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.mean, None);
    }

    #[test]
    fn test_mean_computation() {
        let summary = RatingSummary::from_ratings(&[1, 2, 3, 4, 5]);
        assert_eq!(summary.count, 5);
        assert_eq!(summary.mean, Some(3.0));
    }

    #[test]
    fn test_combined_skips_empty_partitions() {
        let ratings = SkillRatings {
            human: RatingSummary::from_ratings(&[4, 5]),
            bot: RatingSummary::default(),
            verified_bot: RatingSummary::from_ratings(&[3]),
        };
        let combined = ratings.combined();
        assert_eq!(combined.count, 3);
        assert_eq!(combined.mean, Some(4.0));
    }

    #[test]
    fn test_combined_empty_is_none() {
        let combined = SkillRatings::default().combined();
        assert_eq!(combined.count, 0);
        assert_eq!(combined.mean, None);
    }

    #[test]
    fn test_validate_rating_bounds() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }
}
