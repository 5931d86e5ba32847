//! Generic two player game interface that the search agents are written against.

use std::fmt;
use std::hash::Hash;

use serde::Serialize;
use thiserror::Error;

use Player::{P1, P2};

pub const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

/// Reward handed to a mover whose action was rejected by the game rules.
pub const INVALID_MOVE_PENALTY: f64 = -1000.0;

/// Did the game end in a draw or was there a winner?
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndState {
    Winner(Player),
    Draw,
}

/// Has the game ended or is it ongoing?
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameState {
    Ended(EndState),
    Ongoing,
}

/// Used for deciding whose turn it is. P1 goes first.
#[derive(Eq, Hash, Clone, Copy, Debug, PartialEq, PartialOrd, Ord, Serialize)]
pub enum Player {
    P1,
    P2,
}

impl Player {
    pub fn get_opponent(self) -> Player {
        match self {
            P1 => P2,
            P2 => P1,
        }
    }

    /// Numeric id used in observations: 1 or 2 (0 means empty).
    pub fn id(self) -> u8 {
        match self {
            P1 => 1,
            P2 => 2,
        }
    }

    pub fn from_id(id: u8) -> Option<Player> {
        match id {
            1 => Some(P1),
            2 => Some(P2),
            _ => None,
        }
    }

    /// Index into per-player arrays.
    pub fn index(self) -> usize {
        match self {
            P1 => 0,
            P2 => 1,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.id())
    }
}

/// Rule violations reported by [`Game::apply`] and [`Game::apply_as`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("cell ({row}, {col}) is already taken")]
    CellTaken { row: usize, col: usize },

    #[error("cell ({row}, {col}) is out of range")]
    OutOfRange { row: usize, col: usize },

    #[error("the game is already over")]
    GameOver,

    #[error("it is {expected}'s turn, not {got}'s")]
    OutOfTurn { expected: Player, got: Player },
}

/// A move in a game, an action that an agent can take when it is their turn. Moves are opaque to
/// the search agents beyond equality and enumeration.
pub trait GameMove: fmt::Debug + Send + Sync + Clone + Copy + Eq + Hash + 'static {}

impl<T> GameMove for T where T: fmt::Debug + Send + Sync + Clone + Copy + Eq + Hash + 'static {}

/// Result of applying one move: the new observation, the reward attributed to the player who just
/// moved, whether the game is over, and the rule violation if the move was rejected.
#[derive(Clone, Debug, PartialEq)]
pub struct Step<O> {
    pub observation: O,
    pub reward: f64,
    pub done: bool,
    pub error: Option<GameError>,
}

impl<O> Step<O> {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Functionality associated with any two player turn-based game.
///
/// `Clone` must produce a deep, independent copy: search agents explore hypothetical futures on
/// clones and never touch the live game.
pub trait Game: Clone + fmt::Debug + fmt::Display + Send + Sync + Sized + 'static {
    type Move: GameMove;
    type Observation: Clone + fmt::Debug + Send;

    /// Reinitialise to the starting configuration and return the fresh observation.
    fn reset(&mut self) -> Self::Observation;

    /// Snapshot of the current state as seen by an agent.
    fn observation(&self) -> Self::Observation;

    /// Whoever is to move. Meaningful only while the game is ongoing.
    fn current_player(&self) -> Player;

    /// Number of moves applied since the last reset.
    fn move_count(&self) -> usize;

    /// Every legal move for `player`. Empty rather than an error when nothing is legal.
    fn valid_moves_for(&self, player: Player) -> Vec<Self::Move>;

    /// Apply a move for the player to move, mutating the game in place.
    fn apply(&mut self, move_: Self::Move) -> Step<Self::Observation>;

    fn is_terminal(&self) -> bool;

    /// The winner once the game is over. `None` while ongoing or on a draw.
    fn winner(&self) -> Option<Player>;

    /// The moves applied so far, in order (last move is most recent).
    fn move_history(&self) -> &[(Player, Self::Move)];

    /// Legal moves for the player to move.
    fn valid_moves(&self) -> Vec<Self::Move> {
        self.valid_moves_for(self.current_player())
    }

    /// Apply a move on behalf of `player`, refusing to act out of turn.
    fn apply_as(
        &mut self,
        player: Player,
        move_: Self::Move,
    ) -> Result<Step<Self::Observation>, GameError> {
        let expected = self.current_player();
        if player != expected {
            return Err(GameError::OutOfTurn {
                expected,
                got: player,
            });
        }
        Ok(self.apply(move_))
    }

    fn game_state(&self) -> GameState {
        if !self.is_terminal() {
            return GameState::Ongoing;
        }
        match self.winner() {
            Some(player) => GameState::Ended(EndState::Winner(player)),
            None => GameState::Ended(EndState::Draw),
        }
    }
}

/// Score a finished (or abandoned) game from `player`'s point of view: 1 for a win, -1 for a
/// loss, 0 otherwise.
pub fn outcome_for(winner: Option<Player>, player: Player) -> i32 {
    match winner {
        Some(w) if w == player => 1,
        Some(_) => -1,
        None => 0,
    }
}

#[test]
fn test_player_ids() {
    assert_eq!(P1.id(), 1);
    assert_eq!(P2.id(), 2);
    assert_eq!(Player::from_id(2), Some(P2));
    assert_eq!(Player::from_id(0), None);
    assert_eq!(P1.get_opponent(), P2);
    assert_eq!(P2.get_opponent().get_opponent(), P2);
}

#[test]
fn test_outcome_for() {
    assert_eq!(outcome_for(Some(P1), P1), 1);
    assert_eq!(outcome_for(Some(P2), P1), -1);
    assert_eq!(outcome_for(None, P2), 0);
}
