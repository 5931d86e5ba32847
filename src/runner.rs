//! Plays agents against each other.
//!
//! The runner owns the live game: it asks the agent of whoever is to move for a move, applies it
//! exactly once, and keeps the record. Agents only ever see the game through a shared reference.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::agents::GameAgent;
use crate::board_game::{Game, GameError, Player};

/// Number of decisions made by one seat and the time spent on them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AgentStats {
    pub decisions: usize,
    pub total_time: Duration,
}

impl AgentStats {
    fn record(&mut self, elapsed: Duration) {
        self.decisions += 1;
        self.total_time += elapsed;
    }

    pub fn average_time(&self) -> Duration {
        if self.decisions == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.decisions as u32
        }
    }
}

/// One played game.
#[derive(Clone, Debug, PartialEq)]
pub struct GameRecord<M> {
    /// (mover, move, reward) in the order the moves were applied.
    pub moves: Vec<(Player, M, f64)>,
    pub winner: Option<Player>,
    /// False when the game was cut off by the turn limit or an agent had no move.
    pub finished: bool,
    /// The first rule violation, if any move was rejected.
    pub error: Option<GameError>,
    pub stats: [AgentStats; 2],
}

/// Play one game from the current state of `game`. `agents[0]` plays P1 and `agents[1]` plays P2.
pub fn play_game<G: Game>(
    game: &mut G,
    agents: &mut [Box<dyn GameAgent<G>>; 2],
    max_turns: usize,
) -> GameRecord<G::Move> {
    let mut record = GameRecord {
        moves: Vec::new(),
        winner: None,
        finished: false,
        error: None,
        stats: [AgentStats::default(); 2],
    };
    let mut observation = game.observation();

    for _ in 0..max_turns {
        if game.is_terminal() {
            break;
        }
        let player = game.current_player();
        let seat = player.index();
        let started = Instant::now();
        let choice = agents[seat].choose_move(&observation, game);
        record.stats[seat].record(started.elapsed());

        let move_ = match choice {
            Some(move_) => move_,
            None => {
                warn!(%player, agent = agents[seat].name(), "agent had no move");
                break;
            }
        };
        let step = game.apply(move_);
        debug!(%player, ?move_, reward = step.reward, "applied move");
        record.moves.push((player, move_, step.reward));
        if let Some(err) = step.error {
            warn!(%player, ?move_, %err, "move was rejected");
            record.error.get_or_insert(err);
        }
        observation = step.observation;
        if step.done {
            break;
        }
    }

    record.finished = game.is_terminal();
    record.winner = game.winner();
    record
}

/// Aggregate results of a series of games.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchSummary {
    pub games: usize,
    pub p1_wins: usize,
    pub p2_wins: usize,
    /// Finished games without a winner.
    pub draws: usize,
    /// Games cut off before they ended.
    pub unfinished: usize,
    pub total_turns: usize,
    pub stats: [AgentStats; 2],
}

impl MatchSummary {
    pub fn wins(&self, player: Player) -> usize {
        match player {
            Player::P1 => self.p1_wins,
            Player::P2 => self.p2_wins,
        }
    }

    pub fn win_rate(&self, player: Player) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.wins(player) as f64 / self.games as f64
        }
    }

    pub fn average_turns(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.total_turns as f64 / self.games as f64
        }
    }

    fn add_game<M>(&mut self, record: &GameRecord<M>) {
        self.games += 1;
        self.total_turns += record.moves.len();
        match (record.finished, record.winner) {
            (_, Some(Player::P1)) => self.p1_wins += 1,
            (_, Some(Player::P2)) => self.p2_wins += 1,
            (true, None) => self.draws += 1,
            (false, None) => self.unfinished += 1,
        }
        for (total, game) in self.stats.iter_mut().zip(record.stats.iter()) {
            total.decisions += game.decisions;
            total.total_time += game.total_time;
        }
    }
}

/// Reset `game` and play it `num_games` times with the same agents.
pub fn evaluate_agents<G: Game>(
    game: &mut G,
    agents: &mut [Box<dyn GameAgent<G>>; 2],
    num_games: usize,
    max_turns: usize,
) -> MatchSummary {
    let mut summary = MatchSummary::default();
    for n in 0..num_games {
        game.reset();
        let record = play_game(game, agents, max_turns);
        debug!(game = n + 1, winner = ?record.winner, turns = record.moves.len(), "game over");
        summary.add_game(&record);
    }
    info!(
        games = summary.games,
        p1_wins = summary.p1_wins,
        p2_wins = summary.p2_wins,
        draws = summary.draws,
        unfinished = summary.unfinished,
        "match finished"
    );
    summary
}

#[cfg(test)]
use crate::agents::{MinimaxAgent, RandomAgent};
#[cfg(test)]
use crate::board_game::Player::{P1, P2};
#[cfg(test)]
use crate::config::{GomokuConfig, MinimaxConfig, SnakeConfig};
#[cfg(test)]
use crate::gomoku::GomokuBoard;
#[cfg(test)]
use crate::snake::SnakeGame;

/// Plays a fixed list of moves, then runs out.
#[cfg(test)]
struct Scripted<M> {
    moves: Vec<M>,
}

#[cfg(test)]
impl<G: Game> GameAgent<G> for Scripted<G::Move> {
    fn choose_move(&mut self, _observation: &G::Observation, _game: &G) -> Option<G::Move> {
        if self.moves.is_empty() {
            None
        } else {
            Some(self.moves.remove(0))
        }
    }

    fn name(&self) -> &str {
        "Scripted"
    }
}

#[cfg(test)]
fn scripted(
    p1: Vec<(usize, usize)>,
    p2: Vec<(usize, usize)>,
) -> [Box<dyn GameAgent<GomokuBoard>>; 2] {
    [
        Box::new(Scripted { moves: p1 }),
        Box::new(Scripted { moves: p2 }),
    ]
}

#[test]
fn test_play_game_records_moves_and_winner() {
    let mut board = GomokuBoard::new(GomokuConfig::new(3, 3)).unwrap();
    let mut agents = scripted(vec![(0, 0), (0, 1), (0, 2)], vec![(1, 0), (1, 1)]);
    let record = play_game(&mut board, &mut agents, 100);
    assert!(record.finished);
    assert_eq!(record.winner, Some(P1));
    assert_eq!(record.moves.len(), 5);
    assert_eq!(record.moves[4], (P1, (0, 2), 1.0));
    assert_eq!(record.moves[1].0, P2);
    assert_eq!(record.stats[0].decisions, 3);
    assert_eq!(record.stats[1].decisions, 2);
    assert_eq!(record.error, None);
}

#[test]
fn test_play_game_stops_when_agent_has_no_move() {
    let mut board = GomokuBoard::new(GomokuConfig::new(3, 3)).unwrap();
    let mut agents = scripted(vec![(0, 0)], vec![]);
    let record = play_game(&mut board, &mut agents, 100);
    assert!(!record.finished);
    assert_eq!(record.moves.len(), 1);
    assert_eq!(record.winner, None);
}

#[test]
fn test_rejected_move_ends_the_game() {
    let mut board = GomokuBoard::new(GomokuConfig::new(3, 3)).unwrap();
    let mut agents = scripted(vec![(0, 0)], vec![(0, 0)]);
    let record = play_game(&mut board, &mut agents, 100);
    assert_eq!(record.winner, Some(P1));
    assert_eq!(record.error, Some(GameError::CellTaken { row: 0, col: 0 }));
}

#[test]
fn test_turn_limit_cuts_game() {
    let mut game = SnakeGame::new(SnakeConfig::default().with_seed(2)).unwrap();
    let mut agents: [Box<dyn GameAgent<SnakeGame>>; 2] = [
        Box::new(RandomAgent::new(Some(1))),
        Box::new(RandomAgent::new(Some(2))),
    ];
    let record = play_game(&mut game, &mut agents, 1);
    assert_eq!(record.moves.len(), 1);
    assert!(!record.finished);
}

#[test]
fn test_evaluate_agents_tallies_every_game() {
    let mut board = GomokuBoard::new(GomokuConfig::new(3, 3)).unwrap();
    let mut agents: [Box<dyn GameAgent<GomokuBoard>>; 2] = [
        Box::new(MinimaxAgent::new(P1, MinimaxConfig::default().with_depth(2)).unwrap()),
        Box::new(RandomAgent::new(Some(8))),
    ];
    let summary = evaluate_agents(&mut board, &mut agents, 4, 100);
    assert_eq!(summary.games, 4);
    assert_eq!(
        summary.p1_wins + summary.p2_wins + summary.draws + summary.unfinished,
        4
    );
    assert_eq!(summary.unfinished, 0);
    assert!(summary.total_turns >= 4 * 5);
    assert_eq!(
        summary.stats[0].decisions + summary.stats[1].decisions,
        summary.total_turns
    );
}
