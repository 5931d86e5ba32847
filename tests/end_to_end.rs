use std::collections::HashSet;
use std::fmt;

use duel_search::agents::{GameAgent, MinimaxAgent, MonteCarloAgent, RandomAgent};
use duel_search::board_game::{EndState, Game, GameError, GameState, Player, Step};
use duel_search::config::{GomokuConfig, MinimaxConfig, MonteCarloConfig, SnakeConfig};
use duel_search::gomoku::GomokuBoard;
use duel_search::runner::{evaluate_agents, play_game};
use duel_search::snake::{Heading, SnakeGame};

use Player::{P1, P2};

/// P1 picks one of `options` numbers and the game is over: picking `winning` wins, anything else
/// loses.
#[derive(Clone, Debug)]
struct OneShot {
    options: usize,
    winning: usize,
    history: Vec<(Player, usize)>,
}

impl OneShot {
    fn new(options: usize, winning: usize) -> OneShot {
        OneShot {
            options,
            winning,
            history: Vec::new(),
        }
    }
}

impl fmt::Display for OneShot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pick one of {}", self.options)
    }
}

impl Game for OneShot {
    type Move = usize;
    type Observation = usize;

    fn reset(&mut self) -> usize {
        self.history.clear();
        0
    }

    fn observation(&self) -> usize {
        self.history.len()
    }

    fn current_player(&self) -> Player {
        if self.history.is_empty() {
            P1
        } else {
            P2
        }
    }

    fn move_count(&self) -> usize {
        self.history.len()
    }

    fn valid_moves_for(&self, player: Player) -> Vec<usize> {
        if self.is_terminal() || player != P1 {
            return Vec::new();
        }
        (0..self.options).collect()
    }

    fn apply(&mut self, move_: usize) -> Step<usize> {
        if self.is_terminal() {
            return Step {
                observation: self.observation(),
                reward: 0.0,
                done: true,
                error: Some(GameError::GameOver),
            };
        }
        self.history.push((P1, move_));
        Step {
            observation: self.observation(),
            reward: if move_ == self.winning { 1.0 } else { -1.0 },
            done: true,
            error: None,
        }
    }

    fn is_terminal(&self) -> bool {
        !self.history.is_empty()
    }

    fn winner(&self) -> Option<Player> {
        self.history
            .first()
            .map(|&(_, move_)| if move_ == self.winning { P1 } else { P2 })
    }

    fn move_history(&self) -> &[(Player, usize)] {
        &self.history
    }
}

#[test]
fn gomoku_row_win_on_small_board() {
    let mut board = GomokuBoard::new(GomokuConfig::new(3, 3)).unwrap();
    for &move_ in &[(0, 0), (1, 0), (0, 1), (1, 1)] {
        let step = board.apply(move_);
        assert!(!step.done);
    }
    let step = board.apply((0, 2));
    assert!(step.done);
    assert_eq!(step.reward, 1.0);
    assert!(board.is_terminal());
    assert_eq!(board.winner(), Some(P1));
    assert_eq!(board.game_state(), GameState::Ended(EndState::Winner(P1)));
    assert!(board.valid_moves().is_empty());
    assert_eq!(board.move_count(), 5);
}

#[test]
fn snake_eats_food_next_to_its_head() {
    let config = SnakeConfig {
        food_count: 3,
        ..SnakeConfig::default()
    };
    let mut game = SnakeGame::new(config.with_seed(21)).unwrap();
    let head = game.head(P1);
    let ahead = Heading::Right.step(head);
    game.set_foods(vec![ahead, (0, 0), (0, 1)]);
    let length = game.body(P1).len();

    let step = game.apply(Heading::Right);
    assert!(step.error.is_none());
    assert_eq!(game.head(P1), ahead);
    assert_eq!(game.body(P1).len(), length + 1);

    let foods: HashSet<_> = game.foods().iter().copied().collect();
    assert_eq!(foods.len(), 3);
    assert!(!foods.contains(&ahead));
    assert!(foods.contains(&(0, 0)) && foods.contains(&(0, 1)));
    for player in [P1, P2] {
        assert!(game.body(player).iter().all(|cell| !foods.contains(cell)));
    }
    assert_eq!(game.current_player(), P2);
}

#[test]
fn monte_carlo_finds_the_only_winning_move() {
    let game = OneShot::new(6, 3);
    let config = MonteCarloConfig::default()
        .with_simulations(60)
        .with_seed(1);
    let result = MonteCarloAgent::new(P1, config)
        .unwrap()
        .search(&game)
        .unwrap();
    assert_eq!(result.best_move, 3);
    assert_eq!(result.best_mean, 1.0);
    for (move_, outcomes) in &result.outcomes {
        assert_eq!(outcomes.total, 10);
        if *move_ != 3 {
            assert_eq!(outcomes.mean(), -1.0);
        }
    }
}

#[test]
fn minimax_finds_the_only_winning_move() {
    let game = OneShot::new(6, 4);
    let mut agent = MinimaxAgent::new(P1, MinimaxConfig::default()).unwrap();
    assert_eq!(agent.choose_move(&game.observation(), &game), Some(4));

    let mut finished = game.clone();
    finished.apply(4);
    assert_eq!(agent.choose_move(&finished.observation(), &finished), None);
}

#[test]
fn search_agents_play_a_full_gomoku_game() {
    let mut board = GomokuBoard::new(GomokuConfig::new(4, 3)).unwrap();
    let mut agents: [Box<dyn GameAgent<GomokuBoard>>; 2] = [
        Box::new(
            MonteCarloAgent::new(
                P1,
                MonteCarloConfig::default()
                    .with_simulations(200)
                    .with_seed(4),
            )
            .unwrap(),
        ),
        Box::new(RandomAgent::new(Some(4))),
    ];
    let record = play_game(&mut board, &mut agents, 100);
    assert!(record.finished);
    assert!(record.error.is_none());
    assert_eq!(record.moves.len(), board.move_count());
    for (i, (player, _, _)) in record.moves.iter().enumerate() {
        let expected = if i % 2 == 0 { P1 } else { P2 };
        assert_eq!(*player, expected);
    }
}

#[test]
fn snake_match_between_search_agents() {
    let config = SnakeConfig {
        board_size: 10,
        initial_length: 2,
        food_count: 2,
        max_moves: 60,
        seed: Some(5),
    };
    let mut game = SnakeGame::new(config).unwrap();
    let mut agents: [Box<dyn GameAgent<SnakeGame>>; 2] = [
        Box::new(MinimaxAgent::new(P1, MinimaxConfig::default().with_depth(2)).unwrap()),
        Box::new(
            MonteCarloAgent::new(
                P2,
                MonteCarloConfig::default()
                    .with_simulations(30)
                    .with_seed(5),
            )
            .unwrap(),
        ),
    ];
    let summary = evaluate_agents(&mut game, &mut agents, 2, 1000);
    assert_eq!(summary.games, 2);
    assert_eq!(summary.unfinished, 0);
    assert!(summary.total_turns <= 2 * 60);
}
