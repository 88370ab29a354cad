use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tur_rig::{
    load_config, LoadRequest, Operation, ProgramManager, Request, Rig, ScriptedService, SimBoard,
    Tick,
};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// First operand, clamped to 0..=5
    #[clap(short, default_value_t = 3)]
    a: i64,

    /// Second operand, clamped to 0..=5
    #[clap(short, default_value_t = 2)]
    b: i64,

    /// The operation: add, +, sub, subtract or -
    #[clap(short, long, default_value = "add")]
    op: String,

    /// Rig configuration file (TOML)
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Print the status after every cycle
    #[clap(short = 'd', long)]
    debug: bool,

    /// Pace the simulated board in real time
    #[clap(long)]
    realtime: bool,

    /// Give up after this many main loop iterations
    #[clap(long, default_value_t = 1000)]
    max_ticks: usize,

    /// List the embedded programs and exit. With --debug, print their source too
    #[clap(short, long)]
    list: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    if cli.list {
        for (index, name) in ProgramManager::list_program_names().iter().enumerate() {
            let info = ProgramManager::get_program_info(index)?;
            println!(
                "{}: {} ({}, start q{}, {} states, {} transitions)",
                index,
                name,
                info.operation,
                info.start_state,
                info.state_count,
                info.transition_count
            );
            if cli.debug {
                println!("{}", ProgramManager::get_program_text_by_index(index)?);
            }
        }
        return Ok(());
    }

    let op: Operation = cli.op.parse()?;
    let config = load_config(cli.config.as_deref()).context("Failed to load rig configuration")?;

    let board = SimBoard::from_config(&config);
    board.set_realtime(cli.realtime);

    let mut rig = Rig::boot(board.board(), Box::new(ScriptedService::new()), &config);
    rig.submit(Request::Load(LoadRequest {
        a: cli.a,
        b: cli.b,
        op,
    }));
    rig.submit(Request::Run(true));

    if cli.debug {
        for _ in 0..cli.max_ticks {
            let tick = rig.tick()?;
            println!("{:?}: {}", tick, rig.status().to_json()?);
            if tick == Tick::Idle {
                break;
            }
        }
    } else {
        rig.run_until_idle(cli.max_ticks)?;
    }

    let machine = rig.machine();
    if machine.is_running() {
        tracing::warn!(ticks = cli.max_ticks, "machine still running, giving up");
    }

    println!("{} => {} ({})", rig.operation(), machine.tape(), machine.state());
    println!("{}", serde_json::to_string_pretty(&rig.status())?);

    Ok(())
}
