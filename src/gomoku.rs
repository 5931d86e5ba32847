//! Five-in-a-row (gomoku) game interface.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::board_game::{Game, GameError, Player, Step, ALPHABET, INVALID_MOVE_PENALTY};
use crate::config::{ConfigError, GomokuConfig};

use crate::board_game::Player::P1;
use Cell::{Empty, Full};

/// The four line directions as (row, col) deltas: horizontal, vertical and both diagonals.
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Represents a single cell of the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Full(Player),
}

impl Cell {
    fn id(self) -> u8 {
        match self {
            Empty => 0,
            Full(player) => player.id(),
        }
    }
}

/// Place a mark at (row, col).
pub type GomokuMove = (usize, usize);

/// What an agent sees of the board: a row-major grid of 0 (empty), 1 or 2.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GomokuObservation {
    pub size: usize,
    pub cells: Vec<u8>,
    pub current_player: Player,
    pub move_count: usize,
}

impl GomokuObservation {
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.cells[row * self.size + col]
    }
}

/// Store the size and state of the board.
#[derive(Clone, PartialEq)]
pub struct GomokuBoard {
    // dimension of the board (total number of cells = size * size)
    size: usize,
    // contiguous marks needed to win
    win_length: usize,
    // row-major, a 15x15 grid is a vec of length 225
    cells: Vec<Cell>,
    // who places the next mark
    current: Player,
    // (player, (row, col)) in the order the marks were placed
    move_history: Vec<(Player, GomokuMove)>,
    // set when a player tried an illegal placement, which ends the game in the opponent's favour
    forfeited_by: Option<Player>,
}

impl fmt::Debug for GomokuBoard {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        let board_repr: String = self.cells.iter().map(|&c| cell_char(c)).collect();
        write!(
            formatter,
            "GomokuBoard {{ size: {}, win_length: {}, cells: [{}], current: {:?}, history: {:?} }}",
            self.size, self.win_length, board_repr, self.current, self.move_history,
        )
    }
}

fn cell_char(cell: Cell) -> char {
    match cell {
        Empty => '.',
        Full(P1) => 'x',
        Full(_) => 'o',
    }
}

/// Print the board with the column and row labels:
///
///    abc
///  0 ...
///  1 .x.
///  2 ..o
impl fmt::Display for GomokuBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "   {}", &ALPHABET[..self.size])?;
        for row in 0..self.size {
            write!(f, "{:>2} ", row)?;
            for col in 0..self.size {
                write!(f, "{}", cell_char(self.cells[row * self.size + col]))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl GomokuBoard {
    /// Return a new empty board, P1 to move.
    pub fn new(config: GomokuConfig) -> Result<GomokuBoard, ConfigError> {
        config.validate()?;
        Ok(GomokuBoard {
            size: config.board_size,
            win_length: config.win_length,
            cells: vec![Empty; config.board_size * config.board_size],
            current: P1,
            move_history: Vec::new(),
            forfeited_by: None,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn win_length(&self) -> usize {
        self.win_length
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        if row < self.size && col < self.size {
            Some(self.cells[row * self.size + col])
        } else {
            None
        }
    }

    pub fn forfeited_by(&self) -> Option<Player> {
        self.forfeited_by
    }

    fn is_full(&self) -> bool {
        self.move_history.len() == self.size * self.size
    }

    /// Length of the run of `player` marks through (row, col) along (dr, dc), in both directions.
    fn run_length(&self, row: usize, col: usize, (dr, dc): (isize, isize), player: Player) -> usize {
        let mut count = 1;
        for sign in [1, -1] {
            let (mut r, mut c) = (row as isize, col as isize);
            loop {
                r += dr * sign;
                c += dc * sign;
                if r < 0 || c < 0 || r >= self.size as isize || c >= self.size as isize {
                    break;
                }
                if self.cells[r as usize * self.size + c as usize] != Full(player) {
                    break;
                }
                count += 1;
            }
        }
        count
    }

    /// Did the mark at (row, col) complete a winning run in any of the four directions?
    fn completes_run(&self, row: usize, col: usize, player: Player) -> bool {
        DIRECTIONS
            .iter()
            .any(|&dir| self.run_length(row, col, dir, player) >= self.win_length)
    }

    /// Reject an illegal placement: the mover forfeits, nothing on the board changes and the turn
    /// does not pass.
    fn forfeit(&mut self, error: GameError) -> Step<GomokuObservation> {
        warn!(player = %self.current, %error, "illegal placement ends the game");
        self.forfeited_by = Some(self.current);
        Step {
            observation: self.observation(),
            reward: INVALID_MOVE_PENALTY,
            done: true,
            error: Some(error),
        }
    }
}

impl Game for GomokuBoard {
    type Move = GomokuMove;
    type Observation = GomokuObservation;

    fn reset(&mut self) -> GomokuObservation {
        self.cells = vec![Empty; self.size * self.size];
        self.current = P1;
        self.move_history.clear();
        self.forfeited_by = None;
        self.observation()
    }

    fn observation(&self) -> GomokuObservation {
        GomokuObservation {
            size: self.size,
            cells: self.cells.iter().map(|c| c.id()).collect(),
            current_player: self.current,
            move_count: self.move_history.len(),
        }
    }

    fn current_player(&self) -> Player {
        self.current
    }

    fn move_count(&self) -> usize {
        self.move_history.len()
    }

    /// Return the (row, col) of every empty cell in row-major order, or nothing once the game is
    /// over. Placement rules are the same for both players.
    fn valid_moves_for(&self, _player: Player) -> Vec<GomokuMove> {
        if self.is_terminal() {
            return Vec::new();
        }
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &cell)| cell == Empty)
            .map(|(i, _)| (i / self.size, i % self.size))
            .collect()
    }

    fn apply(&mut self, (row, col): GomokuMove) -> Step<GomokuObservation> {
        if self.is_terminal() {
            return Step {
                observation: self.observation(),
                reward: 0.0,
                done: true,
                error: Some(GameError::GameOver),
            };
        }
        let idx = match self.cell(row, col) {
            None => return self.forfeit(GameError::OutOfRange { row, col }),
            Some(Full(_)) => return self.forfeit(GameError::CellTaken { row, col }),
            Some(Empty) => row * self.size + col,
        };

        let mover = self.current;
        self.cells[idx] = Full(mover);
        self.move_history.push((mover, (row, col)));

        let done = self.is_terminal();
        let reward = if self.winner() == Some(mover) {
            1.0
        } else if done {
            0.5
        } else {
            0.0
        };
        self.current = mover.get_opponent();

        Step {
            observation: self.observation(),
            reward,
            done,
            error: None,
        }
    }

    fn is_terminal(&self) -> bool {
        self.forfeited_by.is_some() || self.winner().is_some() || self.is_full()
    }

    /// Any winning run must pass through the most recent mark, since the game stops as soon as a
    /// run appears, so only that cell's four lines are inspected.
    fn winner(&self) -> Option<Player> {
        if let Some(culprit) = self.forfeited_by {
            return Some(culprit.get_opponent());
        }
        let &(player, (row, col)) = self.move_history.last()?;
        if self.completes_run(row, col, player) {
            Some(player)
        } else {
            None
        }
    }

    fn move_history(&self) -> &[(Player, GomokuMove)] {
        &self.move_history
    }
}

#[cfg(test)]
fn board(size: usize, win_length: usize) -> GomokuBoard {
    GomokuBoard::new(GomokuConfig::new(size, win_length)).unwrap()
}

#[test]
fn test_run_length_all_directions() {
    use crate::board_game::Player::P2;

    // horizontal
    let mut b = board(5, 3);
    for (r, c) in [(0, 0), (0, 1), (0, 2)] {
        b.cells[r * 5 + c] = Full(P1);
    }
    assert_eq!(b.run_length(0, 1, (0, 1), P1), 3);
    assert!(b.completes_run(0, 2, P1));
    assert!(!b.completes_run(0, 2, P2));

    // vertical
    let mut b = board(5, 3);
    for r in 1..4 {
        b.cells[r * 5 + 4] = Full(P2);
    }
    assert!(b.completes_run(3, 4, P2));

    // diagonal \
    let mut b = board(5, 3);
    for i in 2..5 {
        b.cells[i * 5 + i] = Full(P1);
    }
    assert!(b.completes_run(2, 2, P1));

    // diagonal /
    let mut b = board(5, 3);
    for i in 0..3 {
        b.cells[i * 5 + (3 - i)] = Full(P1);
    }
    assert!(b.completes_run(1, 2, P1));
    assert_eq!(b.run_length(1, 2, (0, 1), P1), 1);
}

/// Plays `moves` alternately from P1 and checks that only the last one ends the game.
#[cfg(test)]
fn assert_last_move_wins(moves: &[GomokuMove], expected: Player) {
    let mut b = board(5, 3);
    let (last, before) = moves.split_last().unwrap();
    for &move_ in before {
        let step = b.apply(move_);
        assert!(step.error.is_none());
        assert!(!step.done);
    }
    assert!(!b.is_terminal());
    assert_eq!(b.winner(), None);
    let step = b.apply(*last);
    assert!(step.done);
    assert_eq!(step.reward, 1.0);
    assert!(b.is_terminal());
    assert_eq!(b.winner(), Some(expected));
}

#[test]
fn test_vertical_win_through_apply() {
    assert_last_move_wins(&[(0, 0), (0, 4), (1, 0), (1, 4), (2, 0)], P1);
    // completed from the middle
    assert_last_move_wins(&[(2, 2), (0, 0), (4, 2), (0, 1), (3, 2)], P1);
}

#[test]
fn test_diagonal_win_through_apply() {
    use crate::board_game::Player::P2;

    assert_last_move_wins(&[(0, 0), (0, 4), (1, 1), (1, 4), (2, 2)], P1);
    assert_last_move_wins(&[(4, 0), (0, 4), (4, 1), (1, 3), (2, 0), (2, 2)], P2);
}

#[test]
fn test_apply_placements() {
    use crate::board_game::Player::P2;

    let mut b = board(3, 3);
    assert_eq!(b.current_player(), P1);
    assert_eq!(b.valid_moves().len(), 9);

    let step = b.apply((1, 1));
    assert_eq!(step.reward, 0.0);
    assert!(!step.done);
    assert_eq!(step.observation.get(1, 1), 1);
    assert_eq!(b.current_player(), P2);
    assert_eq!(b.valid_moves().len(), 8);
    assert!(!b.valid_moves().contains(&(1, 1)));
    assert_eq!(b.move_count(), 1);
    assert_eq!(b.move_history(), &[(P1, (1, 1))]);
}

#[test]
fn test_occupied_cell_forfeits_without_switching() {
    use crate::board_game::Player::P2;

    let mut b = board(3, 3);
    b.apply((0, 0));
    let step = b.apply((0, 0));
    assert_eq!(step.error, Some(GameError::CellTaken { row: 0, col: 0 }));
    assert_eq!(step.reward, INVALID_MOVE_PENALTY);
    assert!(step.done);
    assert_eq!(b.current_player(), P2);
    assert!(b.is_terminal());
    assert_eq!(b.winner(), Some(P1));
    assert_eq!(b.forfeited_by(), Some(P2));
    // marks still equal move count
    assert_eq!(b.move_count(), 1);
    assert_eq!(b.cells.iter().filter(|&&c| c != Empty).count(), 1);
    assert!(b.valid_moves().is_empty());
}

#[test]
fn test_out_of_range_forfeits() {
    let mut b = board(3, 3);
    let step = b.apply((3, 0));
    assert_eq!(step.error, Some(GameError::OutOfRange { row: 3, col: 0 }));
    assert!(b.is_terminal());
}

#[test]
fn test_draw_on_full_board() {
    let mut b = board(3, 3);
    // x o x
    // x o o
    // o x x
    let moves = [(0, 0), (0, 1), (0, 2), (1, 1), (1, 0), (1, 2), (2, 1), (2, 0), (2, 2)];
    for (i, &m) in moves.iter().enumerate() {
        let step = b.apply(m);
        assert!(step.error.is_none());
        if i < moves.len() - 1 {
            assert!(!step.done, "ended early at move {}", i);
        } else {
            assert!(step.done);
            assert_eq!(step.reward, 0.5);
        }
    }
    assert!(b.is_terminal());
    assert_eq!(b.winner(), None);
    assert!(b.valid_moves().is_empty());
}

#[test]
fn test_apply_after_game_over() {
    let mut b = board(3, 3);
    for m in [(0, 0), (1, 0), (0, 1), (1, 1), (0, 2)] {
        b.apply(m);
    }
    assert_eq!(b.winner(), Some(P1));
    let step = b.apply((2, 2));
    assert_eq!(step.error, Some(GameError::GameOver));
    assert_eq!(b.move_count(), 5);
}

#[test]
fn test_reset_restores_start() {
    let mut b = board(4, 3);
    b.apply((0, 0));
    b.apply((0, 0));
    let obs = b.reset();
    assert_eq!(obs.cells, vec![0; 16]);
    assert_eq!(obs.current_player, P1);
    assert!(!b.is_terminal());
    assert_eq!(b, board(4, 3));
}

#[test]
fn test_clone_is_independent() {
    let mut b = board(4, 3);
    b.apply((1, 1));
    let before = b.observation();
    let mut copy = b.clone();
    copy.apply((2, 2));
    copy.apply((2, 2));
    assert_eq!(b.observation(), before);
    assert_eq!(b.move_history().len(), 1);
    assert!(!b.is_terminal());
}

#[test]
fn test_observation_serializes() {
    let mut b = board(3, 3);
    b.apply((1, 1));
    let text = toml::to_string(&b.observation()).unwrap();
    assert!(text.contains("current_player = \"P2\""));
    assert!(text.contains("move_count = 1"));
}

#[test]
fn test_display_labels() {
    let mut b = board(3, 3);
    b.apply((1, 1));
    let rendered = b.to_string();
    assert!(rendered.starts_with("   abc\n"));
    assert!(rendered.contains(" 1 .x.\n"));
}
