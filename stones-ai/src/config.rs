//! Difficulty profiles and evaluation weights.
//!
//! Everything here is plain serde data so it can be overridden from TOML:
//!
//! ```toml
//! [ai.hard]
//! max_depth = 5
//! node_budget = 400000
//! noise = 0
//!
//! [ai.weights]
//! flats = 30
//!
//! [[allotment]]
//! size = 6
//! stones = 28
//! capstones = 2
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use stones_core::AllotmentTable;
use thiserror::Error;
use tracing::{debug, instrument};

/// Requested playing strength.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Difficulty::Beginner,
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Difficulty, String> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown difficulty `{s}`"))
    }
}

/// Search limits for one difficulty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchProfile {
    /// Deepest iteration of the iterative deepening loop.
    pub max_depth: u8,
    /// Nodes visited before the search stops and keeps its last full iteration.
    pub node_budget: u64,
    /// Root moves within this many points of the best are picked at random,
    /// weighted toward the better ones. Zero always plays the best move.
    pub noise: i32,
    /// Seed for the noise; random per call when unset.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Optional wall-clock cap in milliseconds, on top of the node budget.
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
}

impl SearchProfile {
    pub fn new(max_depth: u8, node_budget: u64, noise: i32) -> SearchProfile {
        SearchProfile {
            max_depth,
            node_budget,
            noise,
            seed: None,
            time_limit_ms: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> SearchProfile {
        self.seed = Some(seed);
        self
    }
}

/// Heuristic weights. Scores are from the side to move's point of view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalWeights {
    /// Per step of road progress (board size minus road distance).
    pub road: i32,
    /// One placement away from a road.
    pub threat: i32,
    /// Per top-of-stack flat.
    pub flats: i32,
    /// Per legal move.
    pub mobility: i32,
    /// Per step of centrality of controlled stacks.
    pub center: i32,
}

impl Default for EvalWeights {
    fn default() -> Self {
        EvalWeights {
            road: 40,
            threat: 150,
            flats: 25,
            mobility: 1,
            center: 3,
        }
    }
}

/// All AI tuning knobs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub beginner: SearchProfile,
    pub easy: SearchProfile,
    pub medium: SearchProfile,
    pub hard: SearchProfile,
    pub expert: SearchProfile,
    pub weights: EvalWeights,
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig {
            beginner: SearchProfile::new(1, 5_000, 120),
            easy: SearchProfile::new(2, 20_000, 60),
            medium: SearchProfile::new(3, 80_000, 15),
            hard: SearchProfile::new(4, 250_000, 0),
            expert: SearchProfile::new(5, 800_000, 0),
            weights: EvalWeights::default(),
        }
    }
}

/// Errors loading an AI configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AiConfig {
    pub fn profile(&self, difficulty: Difficulty) -> &SearchProfile {
        match difficulty {
            Difficulty::Beginner => &self.beginner,
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
            Difficulty::Expert => &self.expert,
        }
    }

    pub fn profile_mut(&mut self, difficulty: Difficulty) -> &mut SearchProfile {
        match difficulty {
            Difficulty::Beginner => &mut self.beginner,
            Difficulty::Easy => &mut self.easy,
            Difficulty::Medium => &mut self.medium,
            Difficulty::Hard => &mut self.hard,
            Difficulty::Expert => &mut self.expert,
        }
    }

    /// Parse a bare `AiConfig` document (tables at the top level).
    pub fn from_toml_str(text: &str) -> Result<AiConfig, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

/// Contents of a `--config` file shared by the binaries: AI overrides under
/// `[ai]` and reserve overrides as `[[allotment]]` entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ai: AiConfig,
    pub allotment: AllotmentTable,
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Settings, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let settings = Settings::from_toml_str(&text)?;
        debug!(?settings, "settings loaded");
        Ok(settings)
    }

    /// Settings from `path` when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        match path {
            Some(path) => Settings::from_file(path),
            None => Ok(Settings::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_names() {
        for d in Difficulty::ALL {
            assert_eq!(d.to_string().parse::<Difficulty>(), Ok(d));
        }
        assert_eq!("Expert".parse::<Difficulty>(), Ok(Difficulty::Expert));
        assert!("grandmaster".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_profiles_get_stronger() {
        let config = AiConfig::default();
        let depths: Vec<u8> = Difficulty::ALL.iter().map(|&d| config.profile(d).max_depth).collect();
        assert!(depths.windows(2).all(|w| w[0] <= w[1]));
        assert!(config.profile(Difficulty::Beginner).noise > config.profile(Difficulty::Hard).noise);
    }

    #[test]
    fn test_partial_toml_override() {
        let text = r#"
            [hard]
            max_depth = 6
            node_budget = 1000
            noise = 0
            seed = 9

            [weights]
            flats = 40
        "#;
        let config = AiConfig::from_toml_str(text).unwrap();
        assert_eq!(config.hard.max_depth, 6);
        assert_eq!(config.hard.seed, Some(9));
        assert_eq!(config.weights.flats, 40);
        assert_eq!(config.weights.road, EvalWeights::default().road);
        assert_eq!(config.easy, AiConfig::default().easy);
    }

    #[test]
    fn test_settings_file_layout() {
        let text = r#"
            [ai.expert]
            max_depth = 7
            node_budget = 2000000
            noise = 0

            [[allotment]]
            size = 6
            stones = 28
            capstones = 2
        "#;
        let settings = Settings::from_toml_str(text).unwrap();
        assert_eq!(settings.ai.expert.max_depth, 7);
        assert_eq!(settings.ai.beginner, AiConfig::default().beginner);
        let six = settings.allotment.for_size(6).unwrap();
        assert_eq!((six.stones, six.capstones), (28, 2));
        assert_eq!(settings.allotment.for_size(5).unwrap().stones, 21);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Settings::from_file("/nonexistent/stones.toml"),
            Err(ConfigError::Io(_))
        ));
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            AiConfig::from_toml_str("[hard]\nmax_depth = \"deep\""),
            Err(ConfigError::Toml(_))
        ));
    }
}
