use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rewind_config::RewindConfig;

mod demo;

#[derive(Parser)]
#[command(name = "rewind", version, about = "Rewind tracing debugger")]
struct Cli {
    /// TOML configuration file (built-in defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Trace a quicksort on two lanes and print what was recorded
    Demo(demo::DemoArgs),
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => RewindConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RewindConfig::default(),
    };
    rewind_config::init_tracing(&config.logging);

    match cli.command {
        Command::Demo(args) => {
            let report = demo::run(&config, &args)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print_human();
            }
            Ok(0)
        }
    }
}
