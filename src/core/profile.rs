//! Training difficulty profiles
//!
//! Static lookup from a training level to the distance and climbing limits
//! that level is expected to handle. The table matches the three classic
//! trainer tiers; level names are matched case-insensitively and the Italian
//! names are accepted as aliases.

use strsim::jaro_winkler;

/// Rider training level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// Distance and climbing limits for one training level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyProfile {
    /// Upper bound on route distance the level is expected to handle
    pub max_distance_m: f64,
    /// Upper bound on cumulative climbing. Looked up and reported, but not
    /// enforced against a found route (elevation data is not part of the
    /// routable graph).
    pub max_elevation_gain_m: f64,
}

/// Level names recognized by [`TrainingLevel::from_name`], including the
/// Italian aliases
const KNOWN_LEVELS: &[(&str, TrainingLevel)] = &[
    ("beginner", TrainingLevel::Beginner),
    ("principiante", TrainingLevel::Beginner),
    ("intermediate", TrainingLevel::Intermediate),
    ("intermedio", TrainingLevel::Intermediate),
    ("advanced", TrainingLevel::Advanced),
    ("avanzato", TrainingLevel::Advanced),
];

impl TrainingLevel {
    /// Strict name lookup, case-insensitive. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<TrainingLevel> {
        let lower = name.trim().to_lowercase();
        KNOWN_LEVELS
            .iter()
            .find(|(known, _)| *known == lower)
            .map(|(_, level)| *level)
    }

    /// Lenient name lookup. Unknown names fall back to
    /// [`TrainingLevel::Intermediate`]; the fallback is part of the contract,
    /// a misspelled level still plans a sensible route instead of failing.
    /// Callers that want to warn about the fallback should check
    /// [`TrainingLevel::from_name`] first.
    pub fn parse(name: &str) -> TrainingLevel {
        Self::from_name(name).unwrap_or(TrainingLevel::Intermediate)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingLevel::Beginner => "beginner",
            TrainingLevel::Intermediate => "intermediate",
            TrainingLevel::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for TrainingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look up the difficulty profile for a training level.
///
/// Total over the enum; the unknown-name fallback happens earlier, in
/// [`TrainingLevel::parse`].
pub fn profile_for(level: TrainingLevel) -> DifficultyProfile {
    match level {
        TrainingLevel::Beginner => DifficultyProfile {
            max_distance_m: 10_000.0,
            max_elevation_gain_m: 200.0,
        },
        TrainingLevel::Intermediate => DifficultyProfile {
            max_distance_m: 30_000.0,
            max_elevation_gain_m: 500.0,
        },
        TrainingLevel::Advanced => DifficultyProfile {
            max_distance_m: 70_000.0,
            max_elevation_gain_m: 1_000.0,
        },
    }
}

/// Suggest a correction for a potentially misspelled level name using fuzzy
/// matching. Returns `None` when the name is already valid or too different
/// from anything known.
pub fn suggest_level(input: &str) -> Option<&'static str> {
    let lower = input.trim().to_lowercase();
    if TrainingLevel::from_name(&lower).is_some() {
        return None;
    }

    let mut best: Option<(&'static str, f64)> = None;
    for (known, _) in KNOWN_LEVELS {
        let score = jaro_winkler(&lower, known);
        if score > best.map_or(0.0, |(_, s)| s) {
            best = Some((known, score));
        }
    }

    // Below this similarity the input is more likely a different word than a typo
    best.filter(|(_, score)| *score >= 0.84).map(|(name, _)| name)
}
