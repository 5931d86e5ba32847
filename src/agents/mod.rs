//! Agents that choose moves for either game.

mod greedy_snake_agent;
mod minimax_agent;
mod monte_carlo_agent;
mod parallel;

pub use greedy_snake_agent::GreedySnakeAgent;
pub use minimax_agent::{MinimaxAgent, MinimaxResult};
pub use monte_carlo_agent::{MonteCarloAgent, MonteCarloResult, Outcomes};

use std::io::BufRead;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use crate::board_game::{Game, Player, ALPHABET};
use crate::gomoku::GomokuMove;
use crate::snake::Heading;

/// An agent that will choose a valid move given the state of the game.
///
/// Agents must leave the live game untouched: the orchestrator applies the returned move. `None`
/// means no move is possible.
pub trait GameAgent<G: Game> {
    fn choose_move(&mut self, observation: &G::Observation, game: &G) -> Option<G::Move>;

    fn name(&self) -> &str;
}

/// Seeded generator, or one seeded from the thread RNG.
pub(crate) fn make_rng(seed: Option<u64>) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(seed.unwrap_or_else(rand::random))
}

/*
 * -----------
 * Human Agent
 * -----------
 */

const BAD_INPUT: &str = "bad input";

/// Trait that translates user input into a move.
pub trait ParseMove: Sized {
    /// Example input shown in the prompt.
    const EXAMPLE: &'static str;

    fn parse_move(input: &str) -> Result<Self, &'static str>;
}

impl ParseMove for GomokuMove {
    const EXAMPLE: &'static str = "h7";

    /// Columns are letter indexes, rows are integers.
    /// Example: "c12" means column 2, row 12
    fn parse_move(input: &str) -> Result<GomokuMove, &'static str> {
        let mut chars = input.trim().chars();
        let col = chars
            .next()
            .and_then(|c| ALPHABET.find(c.to_ascii_lowercase()))
            .ok_or(BAD_INPUT)?;
        let row = chars.as_str().parse::<usize>().map_err(|_| BAD_INPUT)?;
        Ok((row, col))
    }
}

impl ParseMove for Heading {
    const EXAMPLE: &'static str = "w";

    fn parse_move(input: &str) -> Result<Heading, &'static str> {
        match input.trim().to_ascii_lowercase().as_str() {
            "w" | "up" => Ok(Heading::Up),
            "s" | "down" => Ok(Heading::Down),
            "a" | "left" => Ok(Heading::Left),
            "d" | "right" => Ok(Heading::Right),
            _ => Err(BAD_INPUT),
        }
    }
}

/// An agent controlled by the user running the program.
pub struct HumanAgent<R> {
    player: Player,
    input: R,
    name: String,
}

impl<R: BufRead> HumanAgent<R> {
    pub fn new(player: Player, input: R) -> HumanAgent<R> {
        HumanAgent {
            player,
            input,
            name: format!("Human {}", player),
        }
    }
}

impl<G, R> GameAgent<G> for HumanAgent<R>
where
    G: Game,
    G::Move: ParseMove,
    R: BufRead,
{
    /// Keep asking until the input is a legal move. Returns `None` at end of input.
    fn choose_move(&mut self, _observation: &G::Observation, game: &G) -> Option<G::Move> {
        let valid_moves = game.valid_moves();
        if valid_moves.is_empty() {
            return None;
        }
        println!("{}", game);
        loop {
            println!(
                "{} enter a move (like \"{}\"):",
                self.player,
                <G::Move as ParseMove>::EXAMPLE
            );
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => (),
            }
            match <G::Move as ParseMove>::parse_move(&line) {
                Ok(move_) if valid_moves.contains(&move_) => return Some(move_),
                Ok(_) => println!("Oops, that move is not allowed"),
                Err(_) => println!("Oops, enter valid input"),
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/*
 * ------------
 * Random Agent
 * ------------
 */

#[derive(Clone, Debug)]
/// Agent that makes random moves.
pub struct RandomAgent {
    rng: ChaCha20Rng,
}

impl RandomAgent {
    pub fn new(seed: Option<u64>) -> RandomAgent {
        RandomAgent {
            rng: make_rng(seed),
        }
    }
}

impl<G: Game> GameAgent<G> for RandomAgent {
    fn choose_move(&mut self, _observation: &G::Observation, game: &G) -> Option<G::Move> {
        game.valid_moves().choose(&mut self.rng).copied()
    }

    fn name(&self) -> &str {
        "Random"
    }
}

/*
 * ----------------------------
 * Reinforcement learning stub
 * ----------------------------
 */

/// Extension point for a learned policy. Nothing is learned yet: every decision is exploratory
/// and the agent only counts how many it has made.
#[derive(Clone, Debug)]
pub struct RlAgent {
    rng: ChaCha20Rng,
    decisions: usize,
}

impl RlAgent {
    pub fn new(seed: Option<u64>) -> RlAgent {
        RlAgent {
            rng: make_rng(seed),
            decisions: 0,
        }
    }

    pub fn decisions(&self) -> usize {
        self.decisions
    }
}

impl<G: Game> GameAgent<G> for RlAgent {
    fn choose_move(&mut self, _observation: &G::Observation, game: &G) -> Option<G::Move> {
        self.decisions += 1;
        game.valid_moves().choose(&mut self.rng).copied()
    }

    fn name(&self) -> &str {
        "RL (stub)"
    }
}

/*
 * -------------------
 * Behavior tree stub
 * -------------------
 */

/// Node of a behavior tree. Selectors succeed on the first succeeding child, sequences need every
/// child to succeed.
#[derive(Clone, Debug, PartialEq)]
pub enum BehaviorNode {
    Selector(Vec<BehaviorNode>),
    Sequence(Vec<BehaviorNode>),
    /// Condition: the player to move has at least one valid move.
    HasValidMoves,
    /// Action: pick a uniformly random valid move.
    RandomMove,
}

/// Outcome of ticking a node: failure, or success with the move chosen on the way (if any).
enum Tick<M> {
    Failure,
    Success(Option<M>),
}

impl BehaviorNode {
    fn tick<G: Game>(&self, game: &G, rng: &mut ChaCha20Rng) -> Tick<G::Move> {
        match self {
            BehaviorNode::Selector(children) => {
                for child in children {
                    if let Tick::Success(choice) = child.tick(game, rng) {
                        return Tick::Success(choice);
                    }
                }
                Tick::Failure
            }
            BehaviorNode::Sequence(children) => {
                let mut chosen = None;
                for child in children {
                    match child.tick(game, rng) {
                        Tick::Failure => return Tick::Failure,
                        Tick::Success(choice) => chosen = choice.or(chosen),
                    }
                }
                Tick::Success(chosen)
            }
            BehaviorNode::HasValidMoves => {
                if game.valid_moves().is_empty() {
                    Tick::Failure
                } else {
                    Tick::Success(None)
                }
            }
            BehaviorNode::RandomMove => match game.valid_moves().choose(rng) {
                Some(&move_) => Tick::Success(Some(move_)),
                None => Tick::Failure,
            },
        }
    }
}

/// Extension point for hand-written behavior trees. The default tree only guards a random move.
#[derive(Clone, Debug)]
pub struct BehaviorTreeAgent {
    root: BehaviorNode,
    rng: ChaCha20Rng,
}

impl BehaviorTreeAgent {
    pub fn new(seed: Option<u64>) -> BehaviorTreeAgent {
        Self::with_tree(
            BehaviorNode::Selector(vec![BehaviorNode::Sequence(vec![
                BehaviorNode::HasValidMoves,
                BehaviorNode::RandomMove,
            ])]),
            seed,
        )
    }

    pub fn with_tree(root: BehaviorNode, seed: Option<u64>) -> BehaviorTreeAgent {
        BehaviorTreeAgent {
            root,
            rng: make_rng(seed),
        }
    }
}

impl<G: Game> GameAgent<G> for BehaviorTreeAgent {
    fn choose_move(&mut self, _observation: &G::Observation, game: &G) -> Option<G::Move> {
        match self.root.tick(game, &mut self.rng) {
            Tick::Success(choice) => choice,
            Tick::Failure => {
                debug!("behavior tree failed to produce a move");
                None
            }
        }
    }

    fn name(&self) -> &str {
        "Behavior tree (stub)"
    }
}

#[cfg(test)]
use crate::board_game::Player::P2;
#[cfg(test)]
use crate::config::GomokuConfig;
#[cfg(test)]
use crate::gomoku::GomokuBoard;

/// x o x
/// x o o
/// o x .
#[cfg(test)]
fn nearly_full_board() -> GomokuBoard {
    let mut board = GomokuBoard::new(GomokuConfig::new(3, 3)).unwrap();
    for &move_ in &[
        (0, 0),
        (0, 1),
        (0, 2),
        (1, 1),
        (1, 0),
        (1, 2),
        (2, 1),
        (2, 0),
    ] {
        board.apply(move_);
    }
    assert!(!board.is_terminal());
    board
}

#[test]
fn test_parse_gomoku_move() {
    assert_eq!(GomokuMove::parse_move("a0\n"), Ok((0, 0)));
    assert_eq!(GomokuMove::parse_move("C12"), Ok((12, 2)));
    assert_eq!(GomokuMove::parse_move("0a"), Err(BAD_INPUT));
    assert_eq!(GomokuMove::parse_move("b"), Err(BAD_INPUT));
}

#[test]
fn test_parse_heading() {
    assert_eq!(Heading::parse_move("w\n"), Ok(Heading::Up));
    assert_eq!(Heading::parse_move("Left"), Ok(Heading::Left));
    assert!(Heading::parse_move("x").is_err());
}

#[test]
fn test_human_agent_retries_until_valid() {
    let mut board = GomokuBoard::new(GomokuConfig::new(3, 3)).unwrap();
    board.apply((0, 0));
    let input = "zz\na0\nb1\n".as_bytes();
    let mut agent = HumanAgent::new(P2, input);
    let obs = board.observation();
    assert_eq!(agent.choose_move(&obs, &board), Some((1, 1)));
    // input exhausted
    assert_eq!(agent.choose_move(&obs, &board), None);
}

#[test]
fn test_random_agent_picks_valid_moves() {
    let mut board = GomokuBoard::new(GomokuConfig::new(3, 3)).unwrap();
    let mut agent = RandomAgent::new(Some(11));
    while !board.is_terminal() {
        let obs = board.observation();
        let move_ = agent.choose_move(&obs, &board).unwrap();
        assert!(board.valid_moves().contains(&move_));
        assert!(board.apply(move_).error.is_none());
    }
    assert_eq!(agent.choose_move(&board.observation(), &board), None);
}

#[test]
fn test_stub_agents_handle_no_moves() {
    let mut board = nearly_full_board();
    board.apply((2, 2));
    assert!(board.is_terminal());
    let obs = board.observation();

    let mut rl = RlAgent::new(Some(1));
    assert_eq!(rl.choose_move(&obs, &board), None);
    assert_eq!(rl.decisions(), 1);

    let mut bt = BehaviorTreeAgent::new(Some(1));
    assert_eq!(bt.choose_move(&obs, &board), None);
}

#[test]
fn test_behavior_tree_picks_the_only_move() {
    let board = nearly_full_board();
    let obs = board.observation();
    let mut bt = BehaviorTreeAgent::new(Some(5));
    assert_eq!(bt.choose_move(&obs, &board), Some((2, 2)));

    let mut failing = BehaviorTreeAgent::with_tree(BehaviorNode::Selector(vec![]), None);
    assert_eq!(failing.choose_move(&obs, &board), None);
}
