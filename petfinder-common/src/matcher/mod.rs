//! Sighting-to-alert matching
//!
//! A [`Matcher`] picks which open alerts a new sighting belongs to. It never
//! modifies the sighting or the alerts: attaching and storing is left to the
//! caller. Matchers carry state between calls (the alternation flag and the
//! random source), so one instance is owned per process and callers
//! serialise access to it.

pub mod ranked;
pub mod spoof;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{MatcherConfig, MatcherKind};
use crate::documents::{AlertDocument, SightingDocument};

pub use ranked::RankedMatcher;
pub use spoof::SpoofMatcher;

/// Whether a sighting matches at all this call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Never,
    Half,
    Alternating,
    Always,
}

/// Which alerts receive a decided match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    First,
    One,
    Random,
    All,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchMode::Never => "never",
            MatchMode::Half => "half",
            MatchMode::Alternating => "alternating",
            MatchMode::Always => "always",
        };
        f.write_str(s)
    }
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(MatchMode::Never),
            "half" => Ok(MatchMode::Half),
            "alternating" => Ok(MatchMode::Alternating),
            "always" => Ok(MatchMode::Always),
            other => Err(format!("unknown match mode '{}'", other)),
        }
    }
}

impl fmt::Display for TargetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetMode::First => "first",
            TargetMode::One => "one",
            TargetMode::Random => "random",
            TargetMode::All => "all",
        };
        f.write_str(s)
    }
}

impl FromStr for TargetMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(TargetMode::First),
            "one" => Ok(TargetMode::One),
            "random" => Ok(TargetMode::Random),
            "all" => Ok(TargetMode::All),
            other => Err(format!("unknown target mode '{}'", other)),
        }
    }
}

/// The matcher variants the service can run with
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Policy-driven, for exercising clients
    Spoof(SpoofMatcher),
    /// Embedding similarity weighted by proximity
    Ranked(RankedMatcher),
}

impl Matcher {
    pub fn from_config(config: &MatcherConfig) -> Self {
        match config.kind {
            MatcherKind::Spoof => {
                let spoof = match config.seed {
                    Some(seed) => SpoofMatcher::seeded(config.match_mode, config.target_mode, seed),
                    None => SpoofMatcher::new(config.match_mode, config.target_mode),
                };
                Matcher::Spoof(spoof)
            }
            MatcherKind::Ranked => Matcher::Ranked(RankedMatcher::new(config.k, config.decay)),
        }
    }

    /// Alerts the sighting should be attached to, in selection order
    pub fn match_alerts<'a>(
        &mut self,
        sighting: &SightingDocument,
        alerts: &'a [AlertDocument],
    ) -> Vec<&'a AlertDocument> {
        match self {
            Matcher::Spoof(matcher) => matcher.match_alerts(sighting, alerts),
            Matcher::Ranked(matcher) => matcher.match_alerts(sighting, alerts),
        }
    }

    /// Short description for startup logs
    pub fn describe(&self) -> String {
        match self {
            Matcher::Spoof(m) => format!("spoof (match={}, target={})", m.match_mode(), m.target_mode()),
            Matcher::Ranked(m) => format!("ranked (k={}, decay={})", m.k(), m.decay()),
        }
    }
}
