//! Estimated-versus-actual efficiency scoring.
//!
//! Scores are a single ratio over summed hours. Per-task scores are never
//! averaged; [`EffortTotals`] accumulates the sums that feed [`efficiency_score`].

use serde::{Deserialize, Serialize};

/// `round(estimated / actual * 100)`, or 0 when there are no actual hours.
///
/// No clamping: 500 means the work took a fifth of the estimate.
pub fn efficiency_score(estimated_hours: f64, actual_hours: f64) -> i64 {
    if actual_hours == 0.0 {
        return 0;
    }
    let ratio = estimated_hours / actual_hours * 100.0;
    if !ratio.is_finite() {
        return 0;
    }
    ratio.round() as i64
}

/// Dashboard bucket for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyTier {
    /// Above 100: finished in fewer working hours than estimated.
    AheadOfEstimate,
    /// 71 through 100.
    OnTrack,
    /// 70 and below.
    BehindEstimate,
}

impl EfficiencyTier {
    pub fn from_score(score: i64) -> Self {
        if score > 100 {
            EfficiencyTier::AheadOfEstimate
        } else if score > 70 {
            EfficiencyTier::OnTrack
        } else {
            EfficiencyTier::BehindEstimate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EfficiencyTier::AheadOfEstimate => "ahead_of_estimate",
            EfficiencyTier::OnTrack => "on_track",
            EfficiencyTier::BehindEstimate => "behind_estimate",
        }
    }
}

/// Running sums of estimated and working hours over a member's completed tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EffortTotals {
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub task_count: usize,
}

impl EffortTotals {
    pub fn add(&mut self, estimated_hours: f64, actual_hours: f64) {
        self.estimated_hours += estimated_hours;
        self.actual_hours += actual_hours;
        self.task_count += 1;
    }

    pub fn score(&self) -> i64 {
        efficiency_score(self.estimated_hours, self.actual_hours)
    }
}

impl FromIterator<(f64, f64)> for EffortTotals {
    fn from_iter<T: IntoIterator<Item = (f64, f64)>>(iter: T) -> Self {
        let mut totals = EffortTotals::default();
        for (estimated, actual) in iter {
            totals.add(estimated, actual);
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_rounded_ratio_of_sums() {
        assert_eq!(efficiency_score(100.0, 100.0), 100);
        assert_eq!(efficiency_score(150.0, 100.0), 150);
        assert_eq!(efficiency_score(50.0, 100.0), 50);
        assert_eq!(efficiency_score(40.0, 32.0), 125);
        assert_eq!(efficiency_score(2.0, 3.0), 67);
    }

    #[test]
    fn zero_actual_hours_scores_zero() {
        assert_eq!(efficiency_score(8.0, 0.0), 0);
        assert_eq!(efficiency_score(0.0, 0.0), 0);
        assert_eq!(EffortTotals::default().score(), 0);
    }

    #[test]
    fn totals_sum_before_dividing() {
        // 10/2 and 10/18 average to 278%, the summed ratio is 100%
        let totals: EffortTotals = [(10.0, 2.0), (10.0, 18.0)].into_iter().collect();
        assert_eq!(totals.task_count, 2);
        assert_eq!(totals.score(), 100);
    }

    #[test]
    fn totals_score_matches_free_function() {
        for (estimated, actual) in [(8.0, 0.0), (8.0, -4.0), (3.0, 7.5)] {
            let mut totals = EffortTotals::default();
            totals.add(estimated, actual);
            assert_eq!(totals.score(), efficiency_score(estimated, actual));
        }
    }

    #[test]
    fn tiers_split_at_seventy_and_one_hundred() {
        assert_eq!(EfficiencyTier::from_score(125), EfficiencyTier::AheadOfEstimate);
        assert_eq!(EfficiencyTier::from_score(101), EfficiencyTier::AheadOfEstimate);
        assert_eq!(EfficiencyTier::from_score(100), EfficiencyTier::OnTrack);
        assert_eq!(EfficiencyTier::from_score(71), EfficiencyTier::OnTrack);
        assert_eq!(EfficiencyTier::from_score(70), EfficiencyTier::BehindEstimate);
        assert_eq!(EfficiencyTier::from_score(0), EfficiencyTier::BehindEstimate);
        assert_eq!(EfficiencyTier::OnTrack.as_str(), "on_track");
    }
}
