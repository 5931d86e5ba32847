use rand::seq::SliceRandom;
use rand_chacha::ChaCha20Rng;

use super::{make_rng, GameAgent};
use crate::board_game::{Game, Player};
use crate::snake::{Coord, Heading, SnakeGame, SnakeObservation};

/// Snake heuristic: head for the nearest food when that step is safe, otherwise take any safe
/// heading at random.
#[derive(Clone, Debug)]
pub struct GreedySnakeAgent {
    player: Player,
    rng: ChaCha20Rng,
}

impl GreedySnakeAgent {
    pub fn new(player: Player, seed: Option<u64>) -> GreedySnakeAgent {
        GreedySnakeAgent {
            player,
            rng: make_rng(seed),
        }
    }
}

fn manhattan((r1, c1): Coord, (r2, c2): Coord) -> i32 {
    (r1 - r2).abs() + (c1 - c2).abs()
}

/// Close the larger gap first; keep going straight when already on the target.
fn heading_towards(head: Coord, target: Coord, current: Heading) -> Heading {
    let (dr, dc) = (target.0 - head.0, target.1 - head.1);
    if dr.abs() > dc.abs() {
        if dr > 0 {
            Heading::Down
        } else {
            Heading::Up
        }
    } else if dc > 0 {
        Heading::Right
    } else if dc < 0 {
        Heading::Left
    } else {
        current
    }
}

fn is_safe(game: &SnakeGame, player: Player, heading: Heading) -> bool {
    let next = heading.step(game.head(player));
    game.in_bounds(next) && !game.blocked_for(player, next)
}

impl GameAgent<SnakeGame> for GreedySnakeAgent {
    fn choose_move(
        &mut self,
        _observation: &SnakeObservation,
        game: &SnakeGame,
    ) -> Option<Heading> {
        let valid_moves = game.valid_moves_for(self.player);
        if valid_moves.is_empty() || !game.is_alive(self.player) {
            return None;
        }
        let head = game.head(self.player);

        if let Some(&food) = game.foods().iter().min_by_key(|&&food| manhattan(head, food)) {
            let toward = heading_towards(head, food, game.heading(self.player));
            if valid_moves.contains(&toward) && is_safe(game, self.player, toward) {
                return Some(toward);
            }
        }

        let safe: Vec<Heading> = valid_moves
            .iter()
            .copied()
            .filter(|&h| is_safe(game, self.player, h))
            .collect();
        safe.choose(&mut self.rng)
            .or_else(|| valid_moves.choose(&mut self.rng))
            .copied()
    }

    fn name(&self) -> &str {
        "Greedy snake"
    }
}

#[cfg(test)]
use crate::board_game::Player::{P1, P2};
#[cfg(test)]
use crate::config::SnakeConfig;

#[cfg(test)]
fn arena() -> SnakeGame {
    let config = SnakeConfig {
        board_size: 10,
        initial_length: 1,
        food_count: 1,
        ..SnakeConfig::default()
    };
    SnakeGame::new(config.with_seed(1)).unwrap()
}

#[test]
fn test_heading_towards_prefers_larger_gap() {
    assert_eq!(heading_towards((5, 5), (1, 4), Heading::Left), Heading::Up);
    assert_eq!(heading_towards((5, 5), (6, 9), Heading::Up), Heading::Right);
    assert_eq!(heading_towards((5, 5), (5, 5), Heading::Down), Heading::Down);
}

#[test]
fn test_goes_for_nearest_food() {
    let mut game = arena();
    game.set_snake(P1, vec![(5, 3)], Heading::Right);
    game.set_foods(vec![(8, 3), (0, 0)]);
    let mut agent = GreedySnakeAgent::new(P1, Some(2));
    let obs = game.observation();
    assert_eq!(agent.choose_move(&obs, &game), Some(Heading::Down));
}

#[test]
fn test_avoids_body_in_the_way() {
    let mut game = arena();
    game.set_snake(P1, vec![(5, 3)], Heading::Right);
    game.set_snake(P2, vec![(4, 4), (5, 4), (6, 4)], Heading::Up);
    game.set_foods(vec![(5, 8)]);
    let mut agent = GreedySnakeAgent::new(P1, Some(2));
    let obs = game.observation();
    let choice = agent.choose_move(&obs, &game).unwrap();
    assert!(choice == Heading::Up || choice == Heading::Down);
}

#[test]
fn test_does_not_step_on_opponent_tail() {
    let mut game = arena();
    game.set_snake(P1, vec![(5, 3)], Heading::Right);
    game.set_snake(P2, vec![(3, 4), (4, 4), (5, 4)], Heading::Down);
    game.set_foods(vec![(5, 8)]);
    let mut agent = GreedySnakeAgent::new(P1, Some(3));
    let obs = game.observation();
    let choice = agent.choose_move(&obs, &game).unwrap();
    assert_ne!(choice, Heading::Right);
    assert!(is_safe(&game, P1, choice));
}

#[test]
fn test_cornered_snake_still_moves() {
    let mut game = arena();
    game.set_snake(P1, vec![(0, 0)], Heading::Up);
    game.set_snake(P2, vec![(0, 1), (1, 1), (1, 0)], Heading::Up);
    game.set_foods(vec![(9, 9)]);
    let mut agent = GreedySnakeAgent::new(P1, Some(4));
    let obs = game.observation();
    let choice = agent.choose_move(&obs, &game).unwrap();
    assert!(game.valid_moves_for(P1).contains(&choice));
}
