use std::time::Instant;

use tracing::{debug, info, warn};

use super::parallel::map_moves;
use super::GameAgent;
use crate::board_game::{outcome_for, Game, Player};
use crate::config::{resolve_threads, ConfigError, MinimaxConfig};

/// Scores of every top-level move that was evaluated before the time limit ran out.
#[derive(Clone, Debug, PartialEq)]
pub struct MinimaxResult<M> {
    pub best_move: M,
    pub best_score: i32,
    pub scores: Vec<(M, i32)>,
    /// Game states visited below the root.
    pub nodes: usize,
}

/// Exhaustive depth-limited minimax without pruning. Leaves score 1 for a win of the agent's
/// player, -1 for a loss and 0 otherwise.
#[derive(Clone, Debug)]
pub struct MinimaxAgent {
    player: Player,
    config: MinimaxConfig,
    name: String,
}

impl<G: Game> GameAgent<G> for MinimaxAgent {
    fn choose_move(&mut self, _observation: &G::Observation, game: &G) -> Option<G::Move> {
        self.search(game).map(|result| result.best_move)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl MinimaxAgent {
    pub fn new(player: Player, config: MinimaxConfig) -> Result<MinimaxAgent, ConfigError> {
        config.validate()?;
        Ok(MinimaxAgent {
            player,
            name: format!("Minimax (depth {})", config.max_depth),
            config,
        })
    }

    pub fn player(&self) -> Player {
        self.player
    }

    /// Score every valid move of `game` and pick the best; ties go to the move listed first.
    /// `None` when there is nothing to play.
    pub fn search<G: Game>(&self, game: &G) -> Option<MinimaxResult<G::Move>> {
        let now = Instant::now();
        let valid_moves = game.valid_moves();
        if valid_moves.is_empty() {
            debug!(player = %self.player, "minimax found no valid moves");
            return None;
        }
        let deadline = self.config.time_limit().map(|limit| now + limit);
        // the top-level move itself is the first ply
        let child_depth = self.config.max_depth.saturating_sub(1);
        let player = self.player;

        let evaluated = map_moves(
            &valid_moves,
            resolve_threads(self.config.threads),
            |i, &move_| {
                if i > 0 && deadline.map_or(false, |d| Instant::now() >= d) {
                    return None;
                }
                let mut child = game.clone();
                child.apply(move_);
                let mut nodes = 1;
                let score = minimax(&child, child_depth, player, &mut nodes);
                debug!(?move_, score, nodes, "evaluated move");
                Some((score, nodes))
            },
        );

        let mut best_move = valid_moves[0];
        let mut best_score = i32::MIN;
        let mut scores = Vec::with_capacity(valid_moves.len());
        let mut nodes = 0;
        for (&move_, outcome) in valid_moves.iter().zip(evaluated) {
            if let Some((score, visited)) = outcome {
                if score > best_score {
                    best_move = move_;
                    best_score = score;
                }
                scores.push((move_, score));
                nodes += visited;
            }
        }
        if scores.len() < valid_moves.len() {
            warn!(
                evaluated = scores.len(),
                total = valid_moves.len(),
                "minimax hit its time limit"
            );
        }

        info!(
            player = %self.player,
            ?best_move,
            best_score,
            nodes,
            elapsed = ?now.elapsed(),
            "minimax chose a move"
        );
        Some(MinimaxResult {
            best_move,
            best_score,
            scores,
            nodes,
        })
    }
}

/// Value of `game` for `root`: maximise where `root` is to move, minimise elsewhere.
fn minimax<G: Game>(game: &G, depth: usize, root: Player, nodes: &mut usize) -> i32 {
    if depth == 0 || game.is_terminal() {
        return outcome_for(game.winner(), root);
    }
    let valid_moves = game.valid_moves();
    if valid_moves.is_empty() {
        return 0;
    }
    let maximising = game.current_player() == root;
    let mut best = if maximising { i32::MIN } else { i32::MAX };
    for move_ in valid_moves {
        let mut child = game.clone();
        child.apply(move_);
        *nodes += 1;
        let score = minimax(&child, depth - 1, root, nodes);
        best = if maximising {
            best.max(score)
        } else {
            best.min(score)
        };
    }
    best
}

#[cfg(test)]
use crate::board_game::Player::{P1, P2};
#[cfg(test)]
use crate::config::GomokuConfig;
#[cfg(test)]
use crate::gomoku::GomokuBoard;

#[cfg(test)]
fn board_after(moves: &[(usize, usize)]) -> GomokuBoard {
    let mut board = GomokuBoard::new(GomokuConfig::new(3, 3)).unwrap();
    for &move_ in moves {
        board.apply(move_);
    }
    board
}

#[test]
fn test_takes_immediate_win() {
    // x x .
    // o o .
    // . . .
    let board = board_after(&[(0, 0), (1, 0), (0, 1), (1, 1)]);
    for depth in 1..=3 {
        let agent = MinimaxAgent::new(P1, MinimaxConfig::default().with_depth(depth)).unwrap();
        let result = agent.search(&board).unwrap();
        assert_eq!(result.best_move, (0, 2));
        assert_eq!(result.best_score, 1);
    }
}

#[test]
fn test_blocks_with_two_plies() {
    // o . .
    // . . .
    // x x .
    let board = board_after(&[(2, 0), (0, 0), (2, 1)]);
    let shallow = MinimaxAgent::new(P2, MinimaxConfig::default().with_depth(1)).unwrap();
    assert_eq!(shallow.search(&board).unwrap().best_move, (0, 1));

    let agent = MinimaxAgent::new(P2, MinimaxConfig::default().with_depth(2)).unwrap();
    let result = agent.search(&board).unwrap();
    assert_eq!(result.best_move, (2, 2));
    assert_eq!(result.best_score, 0);
    assert!(result
        .scores
        .iter()
        .all(|&(move_, score)| move_ == (2, 2) || score == -1));
}

#[test]
fn test_ties_go_to_first_move() {
    let board = board_after(&[]);
    let agent = MinimaxAgent::new(P1, MinimaxConfig::default().with_depth(1)).unwrap();
    let result = agent.search(&board).unwrap();
    assert_eq!(result.best_move, (0, 0));
    assert_eq!(result.scores.len(), 9);
    assert_eq!(result.nodes, 9);
}

#[test]
fn test_depth_zero_still_moves() {
    let board = board_after(&[(0, 0), (1, 0), (0, 1), (1, 1)]);
    let agent = MinimaxAgent::new(P1, MinimaxConfig::default().with_depth(0)).unwrap();
    assert_eq!(agent.search(&board).unwrap().best_move, (0, 2));
}

#[test]
fn test_new_rejects_too_deep_search() {
    assert!(MinimaxAgent::new(P1, MinimaxConfig::default().with_depth(8)).is_ok());
    let too_deep = MinimaxConfig::default().with_depth(9);
    assert!(too_deep.validate().is_err());
    assert!(matches!(
        MinimaxAgent::new(P1, too_deep),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_no_moves_returns_none() {
    let board = board_after(&[(0, 0), (1, 0), (0, 1), (1, 1), (0, 2)]);
    assert!(board.is_terminal());
    let mut agent = MinimaxAgent::new(P2, MinimaxConfig::default()).unwrap();
    assert!(agent.search(&board).is_none());
    assert_eq!(agent.choose_move(&board.observation(), &board), None);
}

#[test]
fn test_deterministic_across_threads() {
    let board = board_after(&[(1, 1)]);
    let config = MinimaxConfig::default().with_depth(3);
    let single = MinimaxAgent::new(P2, config.clone()).unwrap().search(&board);
    let pooled = MinimaxAgent::new(P2, config.with_threads(4)).unwrap().search(&board);
    assert_eq!(single, pooled);
    let again = MinimaxAgent::new(P2, MinimaxConfig::default().with_depth(3)).unwrap().search(&board);
    assert_eq!(single, again);
}

#[test]
fn test_search_leaves_game_untouched() {
    let board = board_after(&[(1, 1), (0, 0)]);
    let before = board.clone();
    MinimaxAgent::new(P1, MinimaxConfig::default().with_depth(3)).unwrap().search(&board);
    assert_eq!(board, before);
}
