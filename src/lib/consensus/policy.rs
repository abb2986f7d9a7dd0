//! Quality assignment for consensus bases.

/// Default quality added per agreeing vote beyond the first.
pub const DEFAULT_VOTE_BONUS: u32 = 2;
/// Default headroom above the highest observed quality at a position.
pub const DEFAULT_CEILING_BONUS: u8 = 10;
/// Default upper bound on any emitted quality.
pub const DEFAULT_MAX_QUALITY: u8 = 93;
/// Quality emitted for a position whose consensus base is `N`.
pub const NO_CALL_QUALITY: u8 = 2;

/// Blends vote counts and accumulated qualities into a Phred score.
///
/// The emitted quality is
///
/// ```text
/// min(mean_agreeing_quality + vote_bonus * (agreeing_votes - 1),
///     max_observed_quality + ceiling_bonus,
///     max_quality)
/// ```
///
/// which never decreases as agreeing votes or their mean quality increase, and never exceeds
/// the best single observation at the position by more than `ceiling_bonus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPolicy {
    pub vote_bonus: u32,
    pub ceiling_bonus: u8,
    pub max_quality: u8,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            vote_bonus: DEFAULT_VOTE_BONUS,
            ceiling_bonus: DEFAULT_CEILING_BONUS,
            max_quality: DEFAULT_MAX_QUALITY,
        }
    }
}

impl QualityPolicy {
    /// Quality for a consensus base supported by `votes` observations whose qualities sum to
    /// `quality_sum`, at a position whose best observation had quality `max_observed`.
    #[must_use]
    pub fn quality(&self, votes: u32, quality_sum: u32, max_observed: u8) -> u8 {
        if votes == 0 {
            return NO_CALL_QUALITY.min(self.max_quality);
        }
        let blended = u64::from(quality_sum / votes)
            + u64::from(self.vote_bonus) * u64::from(votes - 1);
        let ceiling = max_observed.saturating_add(self.ceiling_bonus).min(self.max_quality);
        blended.min(u64::from(ceiling)) as u8
    }
}
