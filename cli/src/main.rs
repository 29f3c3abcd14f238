use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use memento_core::*;
use std::fs;
use std::path::{Path, PathBuf};

mod autoplay;

use autoplay::Autoplayer;

const TICK: Seconds = 1.0 / 60.0;
/// An hour of game time.
const MAX_TICKS: u32 = 60 * 60 * 60;

#[derive(Parser, Debug)]
#[command(name = "memento", version, about, long_about = None)]
struct Cli {
    /// What log level to use
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,

    /// Directory holding saved progress and high scores
    #[arg(short, long, global = true, default_value = ".memento")]
    data: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play with a scripted player, resuming saved progress
    Play(PlayArgs),
    /// Show saved progress for every level
    Status {
        /// Level list in TOML
        #[arg(short, long, default_value = "levels.toml")]
        levels: PathBuf,
    },
    /// Show the high score table
    Scores {
        /// easy, normal or hard; defaults to the last difficulty played
        #[arg(short = 'D', long, value_parser = parse_difficulty)]
        difficulty: Option<Difficulty>,
    },
    /// Forget progress on every level. High scores are kept
    Reset,
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// Level list in TOML
    #[arg(short, long, default_value = "levels.toml")]
    levels: PathBuf,

    /// Force a seed instead of random
    #[arg(short, long)]
    seed: Option<u64>,

    /// Start this level fresh instead of resuming
    #[arg(long)]
    level: Option<usize>,

    /// Stop once this many pairs have been removed, leaving a checkpoint behind
    #[arg(long)]
    stop_after: Option<u32>,

    /// Keep going with the next level after a win
    #[arg(long)]
    all: bool,

    /// Name recorded with high scores; defaults to the last one used
    #[arg(short, long)]
    name: Option<String>,
}

fn parse_difficulty(code: &str) -> Result<Difficulty, String> {
    Difficulty::from_code(code).ok_or_else(|| format!("unknown difficulty '{code}'"))
}

fn load_config(path: &Path) -> Result<GameConfig> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: GameConfig = toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    log::debug!("Loaded {} levels from {}", config.levels.len(), path.display());
    Ok(config)
}

fn open_store(dir: &Path) -> Result<FileStore> {
    FileStore::open(dir).with_context(|| format!("opening data directory {}", dir.display()))
}

enum Finish {
    Completed,
    Stopped,
}

fn play_level(game: &mut Game<FileStore>, bot: &mut Autoplayer, budget: &mut Option<u32>) -> Result<Finish> {
    for _ in 0..MAX_TICKS {
        if game.session().is_complete() && game.session().is_idle() {
            return Ok(Finish::Completed);
        }
        if let Some(id) = bot.choose(game.session()) {
            game.select_card(id);
        }
        for event in game.tick(TICK) {
            bot.observe(game.session(), &event);
            match event {
                SessionEvent::PairMatched { first, second } => {
                    println!("  match    {:>3} {:>3}", first, second);
                }
                SessionEvent::PairMismatched { first, second } => {
                    println!("  miss     {:>3} {:>3}", first, second);
                }
                SessionEvent::PairRemoved { .. } => {
                    if let Some(left) = budget {
                        *left = left.saturating_sub(1);
                        if *left == 0 && !game.session().is_complete() {
                            return Ok(Finish::Stopped);
                        }
                    }
                }
                _ => {}
            }
        }
    }
    bail!("level {} did not finish", game.session().level_index())
}

fn play(data: &Path, args: PlayArgs) -> Result<()> {
    let mut config = load_config(&args.levels)?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    let mut game = Game::initialize(config, open_store(data)?)?;
    let name = args.name.unwrap_or_else(|| game.player_name());

    match args.level {
        Some(index) => game.load_level(index)?,
        None => game.resume()?,
    }

    let mut bot = Autoplayer::new();
    let mut budget = args.stop_after;
    loop {
        let session = game.session();
        let level = game.current_level().map(|level| level.name.as_str()).unwrap_or("?");
        println!(
            "Level {} '{}' ({}x{}, {}) {}/{} pairs",
            session.level_index(),
            level,
            session.rows(),
            session.cols(),
            session.difficulty().code(),
            session.matched_pairs(),
            session.total_pairs()
        );

        match play_level(&mut game, &mut bot, &mut budget)? {
            Finish::Stopped => {
                let session = game.session();
                println!(
                    "Stopped with {}/{} pairs after {} moves, progress saved",
                    session.matched_pairs(),
                    session.total_pairs(),
                    session.move_count()
                );
                return Ok(());
            }
            Finish::Completed => {
                let session = game.session();
                println!(
                    "Cleared in {} with {} moves",
                    format_clock(session.elapsed_time()),
                    session.move_count()
                );
                match game.submit_high_score(&name) {
                    Some(rank) => println!("New high score for {}: #{}", name, rank),
                    None => println!("No high score this time"),
                }
            }
        }

        if !args.all || !game.next_level()? {
            return Ok(());
        }
    }
}

fn status(data: &Path, levels: &Path) -> Result<()> {
    let config = load_config(levels)?;
    let progress = ProgressStore::new(open_store(data)?);

    match progress.load_global_pointer() {
        Some(pointer) => println!(
            "Current level: {}{}",
            pointer.current_level_index,
            if pointer.is_complete { " (complete)" } else { "" }
        ),
        None => println!("No game in progress"),
    }

    for (index, level) in config.levels.iter().enumerate() {
        let saved = match progress.load(index) {
            Some(record) => format!(
                "{}/{} pairs, {} moves, {}",
                record.matched_pairs,
                level.total_pairs(),
                record.move_count,
                format_clock(record.elapsed_time)
            ),
            None => "-".to_string(),
        };
        println!(
            "{:>3} {:<20} {}x{} {:<6} {}",
            index,
            level.name,
            level.rows,
            level.cols,
            level.difficulty.code(),
            saved
        );
    }
    Ok(())
}

fn scores(data: &Path, difficulty: Option<Difficulty>) -> Result<()> {
    let progress = ProgressStore::new(open_store(data)?);
    let difficulty = difficulty.unwrap_or_else(|| progress.difficulty_preference());
    let ledger = progress.load_ledger(difficulty);

    println!("High scores ({})", difficulty.code());
    if ledger.is_empty() {
        println!("  none yet");
    }
    for (rank, entry) in ledger.sorted().into_iter().enumerate() {
        println!("{:>3}. {:<20} {:>6}", rank + 1, entry.user_name, entry.score);
    }
    Ok(())
}

fn reset(data: &Path) -> Result<()> {
    let mut progress = ProgressStore::new(open_store(data)?);
    progress.clear_all().context("clearing progress")?;
    println!("Progress cleared");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();
    log::debug!("data directory: {}", cli.data.display());

    match cli.command {
        Command::Play(args) => play(&cli.data, args),
        Command::Status { levels } => status(&cli.data, &levels),
        Command::Scores { difficulty } => scores(&cli.data, difficulty),
        Command::Reset => reset(&cli.data),
    }
}
