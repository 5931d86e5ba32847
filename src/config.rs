//! Configuration for the games and the search agents.
//!
//! Every component takes its own config struct at construction time. The structs deserialize
//! from the tables of a TOML settings file:
//!
//! ```toml
//! [gomoku]
//! board_size = 9
//! win_length = 5
//!
//! [monte_carlo]
//! simulation_count = 400
//! time_limit_ms = 2000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::board_game::ALPHABET;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn invalid<T>(msg: impl Into<String>) -> Result<T, ConfigError> {
    Err(ConfigError::Invalid(msg.into()))
}

/// Five-in-a-row board parameters.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GomokuConfig {
    pub board_size: usize,
    /// Contiguous run of marks needed to win.
    pub win_length: usize,
}

impl Default for GomokuConfig {
    fn default() -> Self {
        Self {
            board_size: 15,
            win_length: 5,
        }
    }
}

impl GomokuConfig {
    pub fn new(board_size: usize, win_length: usize) -> Self {
        Self {
            board_size,
            win_length,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board_size == 0 || self.board_size > ALPHABET.len() {
            return invalid(format!(
                "gomoku board_size must be between 1 and {}, got {}",
                ALPHABET.len(),
                self.board_size
            ));
        }
        if self.win_length == 0 || self.win_length > self.board_size {
            return invalid(format!(
                "gomoku win_length must be between 1 and board_size ({}), got {}",
                self.board_size, self.win_length
            ));
        }
        Ok(())
    }
}

/// Competitive snake arena parameters.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SnakeConfig {
    pub board_size: usize,
    pub initial_length: usize,
    /// Number of food cells kept on the board.
    pub food_count: usize,
    /// The game is over once this many moves have been applied.
    pub max_moves: usize,
    /// Seed for food placement. Random when absent.
    pub seed: Option<u64>,
}

impl Default for SnakeConfig {
    fn default() -> Self {
        Self {
            board_size: 20,
            initial_length: 3,
            food_count: 5,
            max_moves: 1000,
            seed: None,
        }
    }
}

impl SnakeConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_length == 0 {
            return invalid("snake initial_length must be at least 1");
        }
        // P1 starts at column center - 2 growing left, P2 at center + 2 growing right.
        let center = self.board_size / 2;
        if center < self.initial_length + 1
            || center + 2 + (self.initial_length - 1) >= self.board_size
        {
            return invalid(format!(
                "snake board_size {} is too small for two bodies of length {}",
                self.board_size, self.initial_length
            ));
        }
        let free_cells = self.board_size * self.board_size - 2 * self.initial_length;
        if self.food_count > free_cells {
            return invalid(format!(
                "snake food_count {} exceeds the {} free cells",
                self.food_count, free_cells
            ));
        }
        if self.max_moves == 0 {
            return invalid("snake max_moves must be at least 1");
        }
        Ok(())
    }
}

/// Depth-limited minimax agent parameters.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MinimaxConfig {
    /// Plies searched below the current position, counting the agent's own move.
    pub max_depth: usize,
    /// Worker threads for top-level moves, 0 means one per CPU.
    pub threads: usize,
    /// Wall-clock budget per decision, checked between top-level moves.
    pub time_limit_ms: Option<u64>,
}

impl Default for MinimaxConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            threads: 1,
            time_limit_ms: None,
        }
    }
}

impl MinimaxConfig {
    pub fn with_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth > 8 {
            return invalid(format!(
                "minimax max_depth {} is too deep for unpruned search",
                self.max_depth
            ));
        }
        Ok(())
    }
}

/// Flat Monte Carlo agent parameters.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    /// Total rollouts per decision, split evenly across the valid moves.
    pub simulation_count: usize,
    /// Worker threads for top-level moves, 0 means one per CPU.
    pub threads: usize,
    pub time_limit_ms: Option<u64>,
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            simulation_count: 1000,
            threads: 1,
            time_limit_ms: None,
            seed: None,
        }
    }
}

impl MonteCarloConfig {
    pub fn with_simulations(mut self, simulation_count: usize) -> Self {
        self.simulation_count = simulation_count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit_ms = Some(u64::try_from(limit.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation_count == 0 {
            return invalid("monte_carlo simulation_count must be at least 1");
        }
        Ok(())
    }
}

/// Worker thread count after resolving 0 to the number of CPUs.
pub(crate) fn resolve_threads(threads: usize) -> usize {
    if threads == 0 {
        num_cpus::get()
    } else {
        threads
    }
}

/// Root of a settings file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gomoku: GomokuConfig,
    pub snake: SnakeConfig,
    pub minimax: MinimaxConfig,
    pub monte_carlo: MonteCarloConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gomoku.validate()?;
        self.snake.validate()?;
        self.minimax.validate()?;
        self.monte_carlo.validate()
    }

    pub fn from_toml_str(content: &str) -> Result<Settings, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Load settings from `path`, or the built-in defaults when no path is given.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    match path {
        Some(path) => {
            info!("Loading settings from {}", path.display());
            let content = std::fs::read_to_string(path)?;
            Settings::from_toml_str(&content)
        }
        None => {
            debug!("No settings file given, using built-in defaults");
            Ok(Settings::default())
        }
    }
}

#[cfg(test)]
use std::io::Write;

#[test]
fn test_defaults_are_valid() {
    let settings = Settings::default();
    assert!(settings.validate().is_ok());
    assert_eq!(settings.gomoku.board_size, 15);
    assert_eq!(settings.minimax.max_depth, 2);
    assert_eq!(settings.monte_carlo.simulation_count, 1000);
    assert_eq!(settings.snake.max_moves, 1000);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let settings = Settings::from_toml_str(
        r#"
        [gomoku]
        board_size = 9

        [monte_carlo]
        simulation_count = 50
        time_limit_ms = 250
        "#,
    )
    .unwrap();
    assert_eq!(settings.gomoku.board_size, 9);
    assert_eq!(settings.gomoku.win_length, 5);
    assert_eq!(settings.monte_carlo.simulation_count, 50);
    assert_eq!(
        settings.monte_carlo.time_limit(),
        Some(Duration::from_millis(250))
    );
    assert_eq!(settings.snake, SnakeConfig::default());
}

#[test]
fn test_time_limit_saturates_instead_of_wrapping() {
    let config = MonteCarloConfig::default().with_time_limit(Duration::MAX);
    assert_eq!(config.time_limit_ms, Some(u64::MAX));
    let config = MonteCarloConfig::default().with_time_limit(Duration::from_millis(1500));
    assert_eq!(config.time_limit_ms, Some(1500));
}

#[test]
fn test_rejects_win_length_longer_than_board() {
    let err = Settings::from_toml_str("[gomoku]\nboard_size = 3\nwin_length = 4\n");
    assert!(matches!(err, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_rejects_cramped_snake_board() {
    let config = SnakeConfig {
        board_size: 6,
        initial_length: 3,
        ..SnakeConfig::default()
    };
    assert!(config.validate().is_err());

    let config = SnakeConfig {
        board_size: 6,
        initial_length: 1,
        ..SnakeConfig::default()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_rejects_malformed_toml() {
    let err = Settings::from_toml_str("[gomoku\nboard_size = ");
    assert!(matches!(err, Err(ConfigError::Parse(_))));
}

#[test]
fn test_load_settings_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[minimax]\nmax_depth = 3\nthreads = 0").unwrap();
    let settings = load_settings(Some(file.path())).unwrap();
    assert_eq!(settings.minimax.max_depth, 3);
    assert!(resolve_threads(settings.minimax.threads) >= 1);

    assert_eq!(load_settings(None).unwrap(), Settings::default());
}
