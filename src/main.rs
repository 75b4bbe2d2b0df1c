//! greenbin command line.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use greenbin_dispatch::config::SessionConfig;
use greenbin_dispatch::graph::{BoundingBox, GridConfig};
use greenbin_dispatch::history::HistoryCategory;
use greenbin_dispatch::scheduler::UndoOutcome;
use greenbin_dispatch::session::Session;
use greenbin_dispatch::store::BinUndo;

#[derive(Parser)]
#[command(
    name = "greenbin",
    version,
    about = "Dispatch waste collection vehicles over a routing lattice"
)]
struct Cli {
    /// Directory holding bins, facilities, vehicles and history.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    #[arg(long, default_value_t = 25.0)]
    min_lat: f64,
    #[arg(long, default_value_t = 25.4)]
    max_lat: f64,
    #[arg(long, default_value_t = 55.0)]
    min_lon: f64,
    #[arg(long, default_value_t = 55.5)]
    max_lon: f64,
    /// Lattice spacing in kilometers.
    #[arg(long, default_value_t = 0.5)]
    step_km: f64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one dispatch pass over the whole fleet.
    Dispatch,
    /// Undo the most recent dispatch pass.
    Undo,
    /// Undo the most recent bin edit.
    UndoBin,
    /// Put every vehicle back to its seed state.
    Reset,
    /// List one history category, oldest first.
    History {
        #[arg(long, default_value = "dispatch")]
        category: HistoryCategory,
    },
    /// Route between two points.
    Route {
        from_lat: f64,
        from_lon: f64,
        to_lat: f64,
        to_lon: f64,
    },
    /// Print lattice size.
    GraphStats,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("greenbin_dispatch=info")),
        )
        .init();

    let cli = Cli::parse();
    let grid = GridConfig::new(
        BoundingBox::new(cli.min_lat, cli.max_lat, cli.min_lon, cli.max_lon),
        cli.step_km,
    );
    let config = SessionConfig::new(cli.data_dir).with_grid(grid);
    let mut session = Session::open(&config)?;

    match cli.command {
        Command::Dispatch => {
            let summary = session.dispatch()?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Undo => match session.undo_dispatch()? {
            UndoOutcome::Restored { vehicles, bins } => {
                println!("Undid dispatch: restored {} vehicles and {} bins", vehicles, bins)
            }
            UndoOutcome::NothingToUndo => println!("Nothing to undo"),
        },
        Command::UndoBin => match session.undo_bin()? {
            BinUndo::Removed(id) => println!("Undid adding bin {}", id),
            BinUndo::Restored { id, fill_level } => println!("Restored bin {} to {}%", id, fill_level),
            BinUndo::Reinstated(id) => println!("Restored deleted bin {}", id),
            BinUndo::Missing(id) => println!("Bin {} no longer exists", id),
            BinUndo::NothingToUndo => println!("Nothing to undo"),
        },
        Command::Reset => {
            session.reset_fleet()?;
            println!("Fleet reset");
        }
        Command::History { category } => {
            for entry in session.history().entries(category) {
                println!("{}  {}", entry.timestamp.to_rfc3339(), entry.action_type());
            }
        }
        Command::Route {
            from_lat,
            from_lon,
            to_lat,
            to_lon,
        } => {
            let leg = session.route((from_lat, from_lon), (to_lat, to_lon));
            println!("{:.1} m over {} points", leg.distance_m, leg.path.len());
        }
        Command::GraphStats => {
            let graph = session.router().graph();
            println!("{} nodes, {} edges", graph.node_count(), graph.edge_count());
        }
    }

    Ok(())
}
