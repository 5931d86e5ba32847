//! Search core for two player games.
//!
//! [`board_game::Game`] is the interface every game implements and every agent searches through.
//! Two games come with the crate: five-in-a-row ([`gomoku`]) and competitive snake ([`snake`]).
//! The [`agents`] module has a depth-limited minimax agent, a flat Monte Carlo agent, a greedy
//! snake heuristic and a few simple players, and [`runner`] plays them against each other.
pub mod agents;
pub mod board_game;
pub mod config;
pub mod gomoku;
pub mod runner;
pub mod snake;
