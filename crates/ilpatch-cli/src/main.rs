mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ilpatch")]
#[command(about = "Find and rewrite instruction sequences in method bodies")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a patch script to a method body file
    Apply {
        /// Method bodies (JSON)
        #[arg(short, long)]
        bodies: PathBuf,

        /// Patch script (JSON)
        #[arg(short, long)]
        script: PathBuf,

        /// Host configuration with toggles (JSON)
        #[arg(short, long, env = "ILPATCH_CONFIG")]
        config: Option<PathBuf>,

        /// Where to write patched bodies (defaults to overwriting --bodies)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the install report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search a method body for a pattern
    Find {
        /// Method bodies (JSON)
        #[arg(short, long)]
        bodies: PathBuf,

        /// Method to search, `Type::method`
        #[arg(short, long)]
        method: String,

        /// Pattern, e.g. "ldarg.0; ldfld Crop::harvestMethod; ?"
        #[arg(short, long)]
        pattern: String,

        /// Report the last match instead of the first
        #[arg(long, conflicts_with = "all")]
        last: bool,

        /// Report every match
        #[arg(long)]
        all: bool,
    },

    /// List methods, or print one method body
    Show {
        /// Method bodies (JSON)
        #[arg(short, long)]
        bodies: PathBuf,

        /// Method to print
        #[arg(short, long)]
        method: Option<String>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ilpatch=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Apply {
            bodies,
            script,
            config,
            output,
            json,
        } => commands::apply::run(&bodies, &script, config.as_deref(), output.as_deref(), json),
        Command::Find {
            bodies,
            method,
            pattern,
            last,
            all,
        } => commands::find::run(&bodies, &method, &pattern, last, all),
        Command::Show { bodies, method } => commands::show::run(&bodies, method.as_deref()),
    }
}
