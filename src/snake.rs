//! Two player competitive snake.
//!
//! Both snakes share one square grid. Players take turns moving their own snake one cell; a snake
//! dies when its head leaves the grid or runs into a body, and grows by one when it eats food.
//! The game is over once both snakes are dead or the move budget is spent.

use std::collections::VecDeque;
use std::fmt;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::board_game::{Game, GameError, Player, Step};
use crate::config::{ConfigError, SnakeConfig};

use crate::board_game::Player::{P1, P2};
use Heading::{Down, Left, Right, Up};

/// A grid cell as (row, col). Signed so that a head stepping off the grid is representable.
pub type Coord = (i32, i32);

/// Direction a snake is travelling in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Heading {
    Up,
    Down,
    Left,
    Right,
}

impl Heading {
    /// Enumeration order of snake moves.
    pub const ALL: [Heading; 4] = [Up, Down, Left, Right];

    /// (row, col) delta of one step.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Up => (-1, 0),
            Down => (1, 0),
            Left => (0, -1),
            Right => (0, 1),
        }
    }

    pub fn opposite(self) -> Heading {
        match self {
            Up => Down,
            Down => Up,
            Left => Right,
            Right => Left,
        }
    }

    pub fn step(self, (row, col): Coord) -> Coord {
        let (dr, dc) = self.delta();
        (row + dr, col + dc)
    }
}

/// What an agent sees of the arena.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SnakeObservation {
    pub board_size: usize,
    /// Bodies of P1 and P2, head first.
    pub snakes: [Vec<Coord>; 2],
    pub headings: [Heading; 2],
    pub foods: Vec<Coord>,
    pub alive: [bool; 2],
    pub current_player: Player,
    pub move_count: usize,
}

#[derive(Clone, Debug)]
pub struct SnakeGame {
    config: SnakeConfig,
    // head is the front of each deque
    snakes: [VecDeque<Coord>; 2],
    headings: [Heading; 2],
    foods: Vec<Coord>,
    alive: [bool; 2],
    current: Player,
    move_history: Vec<(Player, Heading)>,
    // food placement, cloned along with the game
    rng: ChaCha20Rng,
}

impl SnakeGame {
    pub fn new(config: SnakeConfig) -> Result<SnakeGame, ConfigError> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut game = SnakeGame {
            config,
            snakes: [VecDeque::new(), VecDeque::new()],
            headings: [Right, Left],
            foods: Vec::new(),
            alive: [true, true],
            current: P1,
            move_history: Vec::new(),
            rng: ChaCha20Rng::seed_from_u64(seed),
        };
        game.reset();
        Ok(game)
    }

    pub fn config(&self) -> &SnakeConfig {
        &self.config
    }

    pub fn board_size(&self) -> usize {
        self.config.board_size
    }

    pub fn body(&self, player: Player) -> &VecDeque<Coord> {
        &self.snakes[player.index()]
    }

    pub fn head(&self, player: Player) -> Coord {
        self.snakes[player.index()][0]
    }

    pub fn heading(&self, player: Player) -> Heading {
        self.headings[player.index()]
    }

    pub fn is_alive(&self, player: Player) -> bool {
        self.alive[player.index()]
    }

    pub fn foods(&self) -> &[Coord] {
        &self.foods
    }

    pub fn in_bounds(&self, (row, col): Coord) -> bool {
        let size = self.config.board_size as i32;
        row >= 0 && col >= 0 && row < size && col < size
    }

    /// True if `cell` is covered by a body segment that will still be there after `mover` steps.
    /// Only the mover's own tail moves out of the way; the other snake stands still, dead or alive.
    pub fn blocked_for(&self, mover: Player, cell: Coord) -> bool {
        self.snakes.iter().enumerate().any(|(i, snake)| {
            let keep = if i == mover.index() {
                snake.len().saturating_sub(1)
            } else {
                snake.len()
            };
            snake.iter().take(keep).any(|&seg| seg == cell)
        })
    }

    /// Replace a snake's body (head first) and heading, for scripted positions. Food now under the
    /// body is dropped. An empty body is ignored.
    pub fn set_snake(&mut self, player: Player, body: Vec<Coord>, heading: Heading) {
        if body.is_empty() {
            return;
        }
        self.snakes[player.index()] = body.into();
        self.headings[player.index()] = heading;
        let snakes = &self.snakes;
        self.foods
            .retain(|food| !snakes.iter().any(|snake| snake.contains(food)));
    }

    /// Replace the food set, for scripted positions. Cells off the grid, on a body or repeated are
    /// dropped, and the set is not topped up until food is next eaten.
    pub fn set_foods(&mut self, foods: Vec<Coord>) {
        self.foods.clear();
        for cell in foods {
            if self.in_bounds(cell) && !self.occupied(cell) && !self.foods.contains(&cell) {
                self.foods.push(cell);
            }
        }
    }

    fn occupied(&self, cell: Coord) -> bool {
        self.snakes.iter().any(|snake| snake.contains(&cell))
    }

    /// Top the food set back up to the configured count on random free cells.
    fn replenish_food(&mut self) {
        let needed = self.config.food_count.saturating_sub(self.foods.len());
        if needed == 0 {
            return;
        }
        let size = self.config.board_size as i32;
        let free: Vec<Coord> = (0..size)
            .flat_map(|row| (0..size).map(move |col| (row, col)))
            .filter(|cell| !self.occupied(*cell) && !self.foods.contains(cell))
            .collect();
        if free.len() < needed {
            warn!(
                needed,
                free = free.len(),
                "not enough free cells to restore the food count"
            );
        }
        let placed: Vec<Coord> = free
            .choose_multiple(&mut self.rng, needed)
            .copied()
            .collect();
        self.foods.extend(placed);
    }
}

/// Prints the arena; uppercase letters are heads, `*` is food:
///
/// ```text
/// ..........
/// ..aaA.Bbb.
/// ....*.....
/// ```
impl fmt::Display for SnakeGame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.config.board_size;
        let mut grid = vec!['.'; size * size];
        for &(row, col) in &self.foods {
            grid[row as usize * size + col as usize] = '*';
        }
        for (snake, (head, body)) in self.snakes.iter().zip([('A', 'a'), ('B', 'b')]) {
            for (i, &cell) in snake.iter().enumerate() {
                if self.in_bounds(cell) {
                    grid[cell.0 as usize * size + cell.1 as usize] =
                        if i == 0 { head } else { body };
                }
            }
        }
        for row in grid.chunks(size) {
            writeln!(f, "{}", row.iter().collect::<String>())?;
        }
        Ok(())
    }
}

impl Game for SnakeGame {
    type Move = Heading;
    type Observation = SnakeObservation;

    /// Both snakes start on the middle row four cells apart, facing each other, with their bodies
    /// trailing behind.
    fn reset(&mut self) -> SnakeObservation {
        let center = (self.config.board_size / 2) as i32;
        let length = self.config.initial_length as i32;
        self.snakes = [
            (0..length).map(|i| (center, center - 2 - i)).collect(),
            (0..length).map(|i| (center, center + 2 + i)).collect(),
        ];
        self.headings = [Right, Left];
        self.alive = [true, true];
        self.current = P1;
        self.move_history.clear();
        self.foods.clear();
        self.replenish_food();
        self.observation()
    }

    fn observation(&self) -> SnakeObservation {
        SnakeObservation {
            board_size: self.config.board_size,
            snakes: [
                self.snakes[0].iter().copied().collect(),
                self.snakes[1].iter().copied().collect(),
            ],
            headings: self.headings,
            foods: self.foods.clone(),
            alive: self.alive,
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

    /// The four headings minus the reversal of the player's current heading.
    fn valid_moves_for(&self, player: Player) -> Vec<Heading> {
        let reverse = self.headings[player.index()].opposite();
        Heading::ALL
            .iter()
            .copied()
            .filter(|&h| h != reverse)
            .collect()
    }

    /// Turn the mover's snake to `heading` and advance it one cell. Any heading is accepted; a
    /// reversal runs a snake of three or more cells into itself.
    fn apply(&mut self, heading: Heading) -> Step<SnakeObservation> {
        if self.is_terminal() {
            return Step {
                observation: self.observation(),
                reward: 0.0,
                done: true,
                error: Some(GameError::GameOver),
            };
        }
        let mover = self.current;
        let (me, them) = (mover.index(), mover.get_opponent().index());

        self.headings[me] = heading;
        let new_head = heading.step(self.snakes[me][0]);

        if !self.in_bounds(new_head) || self.blocked_for(mover, new_head) {
            debug!(player = %mover, ?new_head, "snake crashed");
            self.alive[me] = false;
        } else {
            self.snakes[me].push_front(new_head);
            if let Some(eaten) = self.foods.iter().position(|&food| food == new_head) {
                self.foods.swap_remove(eaten);
                self.replenish_food();
            } else {
                self.snakes[me].pop_back();
            }
        }
        self.move_history.push((mover, heading));

        let reward = if !self.alive[me] {
            -1.0
        } else if !self.alive[them] {
            1.0
        } else {
            0.0
        };
        // the turn passes only to a living opponent
        if self.alive[them] {
            self.current = mover.get_opponent();
        }

        Step {
            observation: self.observation(),
            reward,
            done: self.is_terminal(),
            error: None,
        }
    }

    fn is_terminal(&self) -> bool {
        !(self.alive[0] || self.alive[1]) || self.move_history.len() >= self.config.max_moves
    }

    fn winner(&self) -> Option<Player> {
        if !self.is_terminal() {
            return None;
        }
        match self.alive {
            [true, false] => Some(P1),
            [false, true] => Some(P2),
            _ => None,
        }
    }

    fn move_history(&self) -> &[(Player, Heading)] {
        &self.move_history
    }
}

#[cfg(test)]
fn arena(board_size: usize, initial_length: usize, food_count: usize) -> SnakeGame {
    SnakeGame::new(SnakeConfig {
        board_size,
        initial_length,
        food_count,
        max_moves: 1000,
        seed: Some(7),
    })
    .unwrap()
}

#[test]
fn test_reset_layout() {
    let game = arena(20, 3, 5);
    assert_eq!(
        game.body(P1).iter().copied().collect::<Vec<_>>(),
        vec![(10, 8), (10, 7), (10, 6)]
    );
    assert_eq!(
        game.body(P2).iter().copied().collect::<Vec<_>>(),
        vec![(10, 12), (10, 13), (10, 14)]
    );
    assert_eq!(game.heading(P1), Right);
    assert_eq!(game.heading(P2), Left);
    assert_eq!(game.foods().len(), 5);
    for food in game.foods() {
        assert!(!game.occupied(*food));
    }
    assert_eq!(game.current_player(), P1);
    assert!(!game.is_terminal());
}

#[test]
fn test_valid_moves_exclude_reversal() {
    let mut game = arena(20, 3, 5);
    assert_eq!(game.valid_moves(), vec![Up, Down, Right]);
    assert_eq!(game.valid_moves_for(P2), vec![Up, Down, Left]);
    game.apply(Up);
    assert_eq!(game.valid_moves_for(P1), vec![Up, Left, Right]);
}

#[test]
fn test_leaving_grid_kills_and_leaves_body() {
    let mut game = arena(10, 1, 1);
    game.snakes[0] = VecDeque::from(vec![(0, 3)]);
    game.set_foods(vec![(9, 9)]);
    let step = game.apply(Up);
    assert!(!game.is_alive(P1));
    assert_eq!(step.reward, -1.0);
    assert_eq!(game.body(P1), &VecDeque::from(vec![(0, 3)]));
    // P2 is still alive so it takes over
    assert_eq!(game.current_player(), P2);
    assert!(!step.done);
}

#[test]
fn test_eating_grows_and_replenishes() {
    let mut game = arena(20, 3, 5);
    let ahead = Right.step(game.head(P1));
    let mut foods = vec![ahead];
    foods.extend(game.foods().iter().copied().filter(|&f| f != ahead).take(4));
    game.set_foods(foods);
    assert_eq!(game.foods().len(), 5);

    let step = game.apply(Right);
    assert_eq!(step.reward, 0.0);
    assert_eq!(game.body(P1).len(), 4);
    assert_eq!(game.head(P1), ahead);
    assert_eq!(game.foods().len(), 5);
    assert!(!game.foods().contains(&ahead));
    for food in game.foods() {
        assert!(!game.occupied(*food));
    }
}

#[test]
fn test_plain_move_keeps_length() {
    let mut game = arena(20, 3, 5);
    game.set_foods(vec![(0, 0)]);
    let tail = *game.body(P1).back().unwrap();
    game.apply(Down);
    assert_eq!(game.body(P1).len(), 3);
    assert_eq!(game.head(P1), (11, 8));
    assert!(!game.body(P1).contains(&tail));
}

#[test]
fn test_moving_into_vacating_tail_is_safe() {
    let mut game = arena(10, 1, 1);
    game.set_foods(vec![(9, 9)]);
    // coiled so that the tail sits just right of the head
    game.snakes[0] = VecDeque::from(vec![(2, 2), (1, 2), (1, 3), (2, 3)]);
    game.headings[0] = Down;
    game.apply(Right);
    assert!(game.is_alive(P1));
    assert_eq!(game.head(P1), (2, 3));
    assert_eq!(game.body(P1).len(), 4);
}

#[test]
fn test_running_into_own_body_kills() {
    let mut game = arena(10, 1, 1);
    game.set_foods(vec![(9, 9)]);
    game.snakes[0] = VecDeque::from(vec![(2, 2), (1, 2), (1, 3), (2, 3), (3, 3)]);
    game.headings[0] = Down;
    game.apply(Right);
    assert!(!game.is_alive(P1));
}

#[test]
fn test_running_into_opponent_kills() {
    let mut game = arena(10, 1, 1);
    game.set_foods(vec![(9, 9)]);
    game.snakes[0] = VecDeque::from(vec![(4, 4)]);
    game.snakes[1] = VecDeque::from(vec![(3, 5), (4, 5), (5, 5)]);
    let step = game.apply(Right);
    assert!(!game.is_alive(P1));
    assert_eq!(step.reward, -1.0);
}

#[test]
fn test_opponent_tail_is_an_obstacle() {
    let mut game = arena(10, 1, 1);
    game.set_foods(vec![(9, 9)]);
    game.set_snake(P1, vec![(5, 4)], Up);
    game.set_snake(P2, vec![(3, 5), (4, 5), (5, 5)], Up);
    assert!(game.blocked_for(P1, (5, 5)));
    assert!(!game.blocked_for(P2, (5, 5)));
    let step = game.apply(Right);
    assert!(!game.is_alive(P1));
    assert_eq!(step.reward, -1.0);
    assert_eq!(game.head(P1), (5, 4));
    assert_eq!(game.body(P1).len(), 1);
    assert_eq!(game.body(P2).len(), 3);
}

#[test]
fn test_single_cell_opponent_cannot_be_entered() {
    let mut game = arena(10, 1, 1);
    game.set_foods(vec![(9, 9)]);
    game.set_snake(P1, vec![(4, 4)], Right);
    game.set_snake(P2, vec![(4, 5)], Left);
    game.apply(Right);
    assert!(!game.is_alive(P1));
    assert!(game.is_alive(P2));
    assert_eq!(game.head(P1), (4, 4));
    assert_eq!(game.head(P2), (4, 5));
}

#[test]
fn test_dead_snake_tail_stays_solid() {
    let mut game = arena(10, 1, 1);
    game.set_foods(vec![(9, 9)]);
    game.set_snake(P1, vec![(6, 4), (7, 4)], Up);
    game.set_snake(P2, vec![(0, 5), (1, 5), (2, 5)], Up);
    game.apply(Up); // P1
    game.apply(Up); // P2 leaves the grid
    assert!(!game.is_alive(P2));
    assert_eq!(game.body(P2).back(), Some(&(2, 5)));

    game.apply(Up);
    game.apply(Up);
    game.apply(Up); // P1 at (2, 4), next to the dead tail
    assert_eq!(game.head(P1), (2, 4));
    game.apply(Right);
    assert!(!game.is_alive(P1));
    assert!(game.is_terminal());
    assert_eq!(game.winner(), None);
}

#[test]
fn test_survivor_keeps_moving_and_wins_at_budget() {
    let mut game = SnakeGame::new(SnakeConfig {
        board_size: 10,
        initial_length: 1,
        food_count: 1,
        max_moves: 4,
        seed: Some(3),
    })
    .unwrap();
    game.set_foods(vec![(9, 9)]);
    game.snakes[1] = VecDeque::from(vec![(0, 0)]);
    game.headings[1] = Up;

    game.apply(Up); // P1
    let step = game.apply(Up); // P2 crashes
    assert_eq!(step.reward, -1.0);
    assert_eq!(game.current_player(), P1);

    let step = game.apply(Up);
    assert_eq!(step.reward, 1.0);
    assert_eq!(game.current_player(), P1);
    assert!(!game.is_terminal());
    assert_eq!(game.winner(), None);

    let step = game.apply(Up);
    assert!(step.done);
    assert_eq!(game.winner(), Some(P1));
    assert_eq!(game.apply(Up).error, Some(GameError::GameOver));
}

#[test]
fn test_both_dead_is_a_draw() {
    let mut game = arena(10, 1, 1);
    game.set_foods(vec![(9, 9)]);
    game.snakes[0] = VecDeque::from(vec![(0, 1)]);
    game.snakes[1] = VecDeque::from(vec![(0, 8)]);
    game.headings[1] = Up;
    game.apply(Up);
    let step = game.apply(Up);
    assert!(step.done);
    assert!(game.is_terminal());
    assert_eq!(game.winner(), None);
}

#[test]
fn test_apply_as_rejects_wrong_player() {
    let mut game = arena(20, 3, 5);
    let before = game.observation();
    assert_eq!(
        game.apply_as(P2, Up),
        Err(GameError::OutOfTurn {
            expected: P1,
            got: P2
        })
    );
    assert_eq!(game.observation(), before);
    assert!(game.apply_as(P1, Up).is_ok());
}

#[test]
fn test_clone_is_independent() {
    let mut game = arena(20, 3, 5);
    game.apply(Down);
    let before = game.observation();
    let mut copy = game.clone();
    for _ in 0..30 {
        if copy.is_terminal() {
            break;
        }
        let mv = copy.valid_moves()[0];
        copy.apply(mv);
    }
    assert_eq!(game.observation(), before);
}

#[test]
fn test_seeded_games_place_food_identically() {
    let a = arena(20, 3, 5);
    let b = arena(20, 3, 5);
    assert_eq!(a.foods(), b.foods());
}

#[test]
fn test_observation_serializes() {
    let game = arena(10, 2, 1);
    let text = toml::to_string(&game.observation()).unwrap();
    assert!(text.contains("current_player = \"P1\""));
    assert!(text.contains("alive = [true, true]"));
}
