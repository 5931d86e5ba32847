use std::ops::Add;
use std::time::Instant;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info, warn};

use super::parallel::map_moves;
use super::{make_rng, GameAgent};
use crate::board_game::{outcome_for, Game, Player};
use crate::config::{resolve_threads, ConfigError, MonteCarloConfig};

/// For a top-level move, the summed win/loss/draw scores of its rollouts, as well as the number
/// of rollouts that were played.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Outcomes {
    pub score: i64,
    pub total: usize,
}

impl Outcomes {
    pub fn new(score: i64, total: usize) -> Outcomes {
        Outcomes { score, total }
    }

    pub fn mean(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.score as f64 / self.total as f64
        }
    }
}

impl Add for Outcomes {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            score: self.score + other.score,
            total: self.total + other.total,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MonteCarloResult<M> {
    pub best_move: M,
    pub best_mean: f64,
    /// Rollout totals of every move evaluated before the time limit ran out.
    pub outcomes: Vec<(M, Outcomes)>,
    pub total_playouts: usize,
}

/// Flat Monte Carlo search: each valid move gets an even share of the rollout budget, every
/// rollout plays uniformly random moves to the end, and the move with the best mean score wins.
/// Nothing is remembered between decisions.
#[derive(Clone, Debug)]
pub struct MonteCarloAgent {
    player: Player,
    config: MonteCarloConfig,
    rng: ChaCha20Rng,
}

impl<G: Game> GameAgent<G> for MonteCarloAgent {
    fn choose_move(&mut self, _observation: &G::Observation, game: &G) -> Option<G::Move> {
        self.search(game).map(|result| result.best_move)
    }

    fn name(&self) -> &str {
        "Monte Carlo"
    }
}

impl MonteCarloAgent {
    pub fn new(player: Player, config: MonteCarloConfig) -> Result<MonteCarloAgent, ConfigError> {
        config.validate()?;
        Ok(MonteCarloAgent {
            player,
            rng: make_rng(config.seed),
            config,
        })
    }

    pub fn player(&self) -> Player {
        self.player
    }

    /// Agent chooses the best available move. `None` when there is nothing to play.
    pub fn search<G: Game>(&mut self, game: &G) -> Option<MonteCarloResult<G::Move>> {
        debug!(player = %self.player, "Monte Carlo agent is thinking...");
        let now = Instant::now();
        let valid_moves = game.valid_moves();
        if valid_moves.is_empty() {
            return None;
        }
        // the budget is split evenly between the moves, at least one rollout each
        let move_budget = (self.config.simulation_count / valid_moves.len()).max(1);
        let deadline = self.config.time_limit().map(|limit| now + limit);
        let past_deadline = || deadline.map_or(false, |d| Instant::now() >= d);
        // one stream per move, drawn up front so the thread count does not change the result
        let seeds: Vec<u64> = valid_moves.iter().map(|_| self.rng.gen()).collect();
        let player = self.player;

        let evaluated = map_moves(
            &valid_moves,
            resolve_threads(self.config.threads),
            |i, &move_| {
                if i > 0 && past_deadline() {
                    return None;
                }
                let mut rng = ChaCha20Rng::seed_from_u64(seeds[i]);
                let mut outcomes = Outcomes::default();
                for playout in 0..move_budget {
                    if playout > 0 && past_deadline() {
                        break;
                    }
                    let score = random_playout(game, move_, player, &mut rng);
                    outcomes = outcomes + Outcomes::new(score.into(), 1);
                }
                debug!(?move_, ?outcomes, "evaluated move");
                Some(outcomes)
            },
        );

        let mut best_move = valid_moves[0];
        let mut best_mean = f64::NEG_INFINITY;
        let mut evaluations = Vec::with_capacity(valid_moves.len());
        for (&move_, outcome) in valid_moves.iter().zip(evaluated) {
            if let Some(outcomes) = outcome {
                if outcomes.mean() > best_mean {
                    best_move = move_;
                    best_mean = outcomes.mean();
                }
                evaluations.push((move_, outcomes));
            }
        }
        let total_playouts: usize = evaluations.iter().map(|(_, o)| o.total).sum();
        if total_playouts < move_budget * valid_moves.len() {
            warn!(
                total_playouts,
                budget = move_budget * valid_moves.len(),
                "Monte Carlo search hit its time limit"
            );
        }

        let elapsed = now.elapsed();
        info!(
            player = %self.player,
            ?best_move,
            best_mean,
            total_playouts,
            elapsed = ?elapsed,
            playout_rate = total_playouts as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
            "Monte Carlo chose a move"
        );
        Some(MonteCarloResult {
            best_move,
            best_mean,
            outcomes: evaluations,
            total_playouts,
        })
    }
}

/// Play `first` on a copy of `game`, then uniformly random moves until the game ends, and score
/// the result for `player`. A copy that runs out of moves before ending scores as a draw.
fn random_playout<G: Game>(
    game: &G,
    first: G::Move,
    player: Player,
    rng: &mut ChaCha20Rng,
) -> i32 {
    let mut board = game.clone();
    board.apply(first);
    while !board.is_terminal() {
        match board.valid_moves().choose(rng) {
            Some(&move_) => {
                board.apply(move_);
            }
            None => break,
        }
    }
    outcome_for(board.winner(), player)
}

#[cfg(test)]
use crate::board_game::Player::{P1, P2};
#[cfg(test)]
use crate::config::{GomokuConfig, SnakeConfig};
#[cfg(test)]
use crate::gomoku::GomokuBoard;
#[cfg(test)]
use crate::snake::SnakeGame;
#[cfg(test)]
use std::time::Duration;

#[cfg(test)]
fn board_after(moves: &[(usize, usize)]) -> GomokuBoard {
    let mut board = GomokuBoard::new(GomokuConfig::new(3, 3)).unwrap();
    for &move_ in moves {
        board.apply(move_);
    }
    board
}

#[test]
fn test_outcomes_add_and_mean() {
    let sum = Outcomes::new(3, 4) + Outcomes::new(-1, 4);
    assert_eq!(sum, Outcomes::new(2, 8));
    assert_eq!(sum.mean(), 0.25);
    assert_eq!(Outcomes::default().mean(), 0.0);
}

#[test]
fn test_takes_immediate_win() {
    // x x .
    // o o .
    // . . .
    let board = board_after(&[(0, 0), (1, 0), (0, 1), (1, 1)]);
    let config = MonteCarloConfig::default()
        .with_simulations(100)
        .with_seed(42);
    let result = MonteCarloAgent::new(P1, config).unwrap().search(&board).unwrap();
    assert_eq!(result.best_move, (0, 2));
    assert_eq!(result.best_mean, 1.0);
    assert_eq!(result.total_playouts, 100);
}

#[test]
fn test_budget_smaller_than_move_count() {
    let board = board_after(&[]);
    let config = MonteCarloConfig::default().with_simulations(4).with_seed(1);
    let result = MonteCarloAgent::new(P1, config).unwrap().search(&board).unwrap();
    assert_eq!(result.outcomes.len(), 9);
    assert!(result.outcomes.iter().all(|(_, o)| o.total == 1));
}

#[test]
fn test_same_seed_same_result_across_threads() {
    let board = board_after(&[(1, 1)]);
    let config = MonteCarloConfig::default()
        .with_simulations(400)
        .with_seed(9);
    let single = MonteCarloAgent::new(P2, config.clone()).unwrap().search(&board);
    let pooled = MonteCarloAgent::new(P2, config.with_threads(3)).unwrap().search(&board);
    assert_eq!(single, pooled);
}

#[test]
fn test_zero_time_limit_still_moves() {
    let board = board_after(&[]);
    let config = MonteCarloConfig::default()
        .with_seed(5)
        .with_time_limit(Duration::from_millis(0));
    let result = MonteCarloAgent::new(P1, config).unwrap().search(&board).unwrap();
    assert_eq!(result.best_move, (0, 0));
    assert_eq!(result.total_playouts, 1);
}

#[test]
fn test_new_rejects_empty_budget() {
    let config = MonteCarloConfig::default().with_simulations(0);
    assert!(matches!(
        MonteCarloAgent::new(P1, config),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_no_moves_returns_none() {
    let board = board_after(&[(0, 0), (1, 0), (0, 1), (1, 1), (0, 2)]);
    let mut agent = MonteCarloAgent::new(P2, MonteCarloConfig::default().with_seed(0)).unwrap();
    assert!(agent.search(&board).is_none());
}

#[test]
fn test_plays_snake_without_touching_it() {
    let game = SnakeGame::new(SnakeConfig {
        board_size: 8,
        initial_length: 2,
        food_count: 2,
        max_moves: 40,
        seed: Some(3),
    })
    .unwrap();
    let before = game.observation();
    let mut agent = MonteCarloAgent::new(
        P1,
        MonteCarloConfig::default().with_simulations(60).with_seed(3),
    )
    .unwrap();
    let choice = agent.choose_move(&before, &game).unwrap();
    assert!(game.valid_moves().contains(&choice));
    assert_eq!(game.observation(), before);
}
