//! Deterministic and random matching policies for testing clients
//! without a working embedding model.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{MatchMode, TargetMode};
use crate::documents::{AlertDocument, SightingDocument};

/// Policy-driven matcher.
///
/// The match mode decides whether a sighting matches at all; the target
/// mode decides which alerts receive it.
#[derive(Debug, Clone)]
pub struct SpoofMatcher {
    match_mode: MatchMode,
    target_mode: TargetMode,
    /// Outcome of the next `Alternating` call
    alternation_state: bool,
    rng: StdRng,
}

impl SpoofMatcher {
    pub fn new(match_mode: MatchMode, target_mode: TargetMode) -> Self {
        Self::with_rng(match_mode, target_mode, StdRng::from_entropy())
    }

    /// Reproducible random choices for `Half`, `One` and `Random`
    pub fn seeded(match_mode: MatchMode, target_mode: TargetMode, seed: u64) -> Self {
        Self::with_rng(match_mode, target_mode, StdRng::seed_from_u64(seed))
    }

    fn with_rng(match_mode: MatchMode, target_mode: TargetMode, rng: StdRng) -> Self {
        Self {
            match_mode,
            target_mode,
            alternation_state: true,
            rng,
        }
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    pub fn target_mode(&self) -> TargetMode {
        self.target_mode
    }

    pub fn match_alerts<'a>(
        &mut self,
        _sighting: &SightingDocument,
        alerts: &'a [AlertDocument],
    ) -> Vec<&'a AlertDocument> {
        if self.match_mode == MatchMode::Never || alerts.is_empty() {
            return Vec::new();
        }

        let did_match = match self.match_mode {
            MatchMode::Never => false,
            MatchMode::Always => true,
            MatchMode::Alternating => {
                let current = self.alternation_state;
                self.alternation_state = !current;
                current
            }
            MatchMode::Half => self.rng.gen_bool(0.5),
        };
        if !did_match {
            return Vec::new();
        }

        match self.target_mode {
            TargetMode::First => vec![&alerts[0]],
            TargetMode::One => alerts.choose(&mut self.rng).into_iter().collect(),
            TargetMode::Random => {
                let draws = self.rng.gen_range(0..=alerts.len());
                let picked: BTreeSet<usize> = (0..draws)
                    .map(|_| self.rng.gen_range(0..alerts.len()))
                    .collect();
                picked.into_iter().map(|i| &alerts[i]).collect()
            }
            TargetMode::All => alerts.iter().collect(),
        }
    }
}
