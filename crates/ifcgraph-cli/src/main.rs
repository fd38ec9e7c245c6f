use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ifcgraph_graph::InverseDirection;

mod commands;
mod config;
mod paths;
mod ui;

use commands::load::LoadArgs;
use config::Config;

#[derive(Parser)]
#[command(name = "ifcgraph")]
#[command(about = "Load IFC models into a property graph.")]
#[command(version)]
struct Cli {
    /// Show info-level logs
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project a model into the graph store
    Load {
        /// STEP file, or a JSON model document (.json)
        #[arg(value_name = "MODEL")]
        model: PathBuf,

        /// Schema file (TOML or JSON) used to read STEP files
        #[arg(long, value_name = "FILE")]
        schema: Option<PathBuf>,

        /// SQLite database to write to
        #[arg(long, value_name = "FILE")]
        db: Option<PathBuf>,

        /// Write a Cypher script instead of a database
        #[arg(long, value_name = "FILE", conflicts_with = "db")]
        cypher: Option<PathBuf>,

        /// Label nodes with every ancestor type
        #[arg(long)]
        hierarchy: bool,

        /// Direction of inverse-attribute relationships (outgoing, incoming)
        #[arg(long, value_name = "DIRECTION")]
        inverse_direction: Option<InverseDirection>,

        /// Do not clear the database or emit a reset statement before loading
        #[arg(long)]
        keep_existing: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show node and relationship counts
    Stats {
        /// SQLite database to inspect
        #[arg(long, value_name = "FILE")]
        db: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the entity types of a schema
    Schema {
        /// Schema file; the built-in IFC4 subset if omitted
        #[arg(value_name = "FILE")]
        schema: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.unwrap_or_else(paths::get_config_path);
    let config = Config::load(&config_path)?;

    match cli.command {
        Commands::Load {
            model,
            schema,
            db,
            cypher,
            hierarchy,
            inverse_direction,
            keep_existing,
            json,
        } => {
            let args = LoadArgs {
                model,
                schema,
                db,
                cypher,
                hierarchy,
                inverse_direction,
                keep_existing,
                json,
            };
            commands::load::run(args, &config).await
        }
        Commands::Stats { db, json } => commands::stats::run(db, json, &config).await,
        Commands::Schema { schema, json } => commands::schema::run(schema, json, &config),
    }
}
