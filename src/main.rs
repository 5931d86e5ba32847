//! Play five-in-a-row or two player snake between humans, heuristics and search agents.

use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use duel_search::agents::{
    BehaviorTreeAgent, GameAgent, GreedySnakeAgent, HumanAgent, MinimaxAgent, MonteCarloAgent,
    ParseMove, RandomAgent, RlAgent,
};
use duel_search::board_game::{Game, Player};
use duel_search::config::{load_settings, Settings};
use duel_search::gomoku::GomokuBoard;
use duel_search::runner::{evaluate_agents, play_game, MatchSummary};
use duel_search::snake::SnakeGame;

#[derive(Parser)]
#[command(name = "duel-search")]
#[command(version, about = "Two player games against search agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML settings file; built-in defaults when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Five-in-a-row on a square board
    Gomoku(MatchArgs),

    /// Two snakes competing for food on a shared grid
    Snake(MatchArgs),
}

#[derive(Args)]
struct MatchArgs {
    /// Agent playing first
    #[arg(long, value_enum, default_value_t = AgentKind::Human)]
    p1: AgentKind,

    #[arg(long, value_enum, default_value_t = AgentKind::MonteCarlo)]
    p2: AgentKind,

    /// Number of games; more than one prints a summary instead of the final position
    #[arg(long, default_value_t = 1)]
    games: usize,

    #[arg(long, default_value_t = 1000)]
    max_turns: usize,

    /// Seed for the randomised agents
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AgentKind {
    Human,
    Random,
    Minimax,
    MonteCarlo,
    Rl,
    BehaviorTree,
    /// Snake only
    Greedy,
}

fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn agent_seed(seed: Option<u64>, player: Player) -> Option<u64> {
    seed.map(|s| s.wrapping_add(u64::from(player.id())))
}

fn build_agent<G>(
    kind: AgentKind,
    player: Player,
    settings: &Settings,
    seed: Option<u64>,
) -> Result<Box<dyn GameAgent<G>>>
where
    G: Game,
    G::Move: ParseMove,
{
    let seed = agent_seed(seed, player);
    Ok(match kind {
        // a one byte buffer never reads past the line end, so both seats can share stdin
        AgentKind::Human => Box::new(HumanAgent::new(
            player,
            BufReader::with_capacity(1, io::stdin()),
        )),
        AgentKind::Random => Box::new(RandomAgent::new(seed)),
        AgentKind::Minimax => Box::new(MinimaxAgent::new(player, settings.minimax.clone())?),
        AgentKind::MonteCarlo => {
            let mut config = settings.monte_carlo.clone();
            config.seed = agent_seed(config.seed, player).or(seed);
            Box::new(MonteCarloAgent::new(player, config)?)
        }
        AgentKind::Rl => Box::new(RlAgent::new(seed)),
        AgentKind::BehaviorTree => Box::new(BehaviorTreeAgent::new(seed)),
        AgentKind::Greedy => bail!("the greedy agent only plays snake"),
    })
}

fn build_snake_agent(
    kind: AgentKind,
    player: Player,
    settings: &Settings,
    seed: Option<u64>,
) -> Result<Box<dyn GameAgent<SnakeGame>>> {
    match kind {
        AgentKind::Greedy => Ok(Box::new(GreedySnakeAgent::new(
            player,
            agent_seed(seed, player),
        ))),
        _ => build_agent(kind, player, settings, seed),
    }
}

fn print_summary<G: Game>(summary: &MatchSummary, agents: &[Box<dyn GameAgent<G>>; 2]) {
    println!("Games played:     {}", summary.games);
    for (player, agent) in [Player::P1, Player::P2].into_iter().zip(agents.iter()) {
        println!(
            "{} {:<14} {} wins ({:.1}%), {:?} per move",
            player,
            agent.name(),
            summary.wins(player),
            summary.win_rate(player) * 100.0,
            summary.stats[player.index()].average_time()
        );
    }
    println!("Draws:            {}", summary.draws);
    println!("Unfinished:       {}", summary.unfinished);
    println!("Average length:   {:.1} turns", summary.average_turns());
}

fn run<G: Game>(mut game: G, mut agents: [Box<dyn GameAgent<G>>; 2], args: &MatchArgs) {
    if args.games <= 1 {
        let record = play_game(&mut game, &mut agents, args.max_turns);
        println!("{}", game);
        match record.winner {
            Some(player) => println!("{} ({}) wins!", player, agents[player.index()].name()),
            None if record.finished => println!("It's a draw!"),
            None => println!("Stopped after {} turns", record.moves.len()),
        }
    } else {
        let summary = evaluate_agents(&mut game, &mut agents, args.games, args.max_turns);
        print_summary(&summary, &agents);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Gomoku(args) => {
            let game = GomokuBoard::new(settings.gomoku.clone())?;
            let agents = [
                build_agent(args.p1, Player::P1, &settings, args.seed)?,
                build_agent(args.p2, Player::P2, &settings, args.seed)?,
            ];
            info!(
                size = settings.gomoku.board_size,
                win_length = settings.gomoku.win_length,
                "Starting five-in-a-row"
            );
            run(game, agents, &args);
        }
        Commands::Snake(args) => {
            let game = SnakeGame::new(settings.snake.clone())?;
            let agents = [
                build_snake_agent(args.p1, Player::P1, &settings, args.seed)?,
                build_snake_agent(args.p2, Player::P2, &settings, args.seed)?,
            ];
            info!(size = settings.snake.board_size, "Starting snake");
            run(game, agents, &args);
        }
    }
    Ok(())
}
