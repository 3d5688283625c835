use std::path::PathBuf;
use std::process::Command;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ssm2_core::definitions::DefinitionLibrary;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Tasks for the project", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project
    Build,
    /// Run the CLI
    Run {
        /// Arguments passed to the CLI
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// Run all tests
    Test,
    /// Parse and validate definition libraries
    CheckDefinitions { paths: Vec<PathBuf> },
}

fn cargo(args: &[&str], what: &str) -> Result<()> {
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{} failed", what);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Build => {
            println!("Building project...");
            cargo(&["build", "--workspace"], "Build")?;
        }
        Commands::Run { args } => {
            println!("Running CLI...");
            let mut cmd = vec!["run", "-p", "ssm2-cli", "--"];
            cmd.extend(args.iter().map(String::as_str));
            cargo(&cmd, "Run")?;
        }
        Commands::Test => {
            println!("Running tests...");
            cargo(&["test", "--workspace"], "Tests")?;
        }
        Commands::CheckDefinitions { paths } => {
            let mut failed = 0;
            for path in paths {
                match DefinitionLibrary::load_from_file(path) {
                    Ok(library) => {
                        println!("{}: {} entries", path.display(), library.entries.len())
                    }
                    Err(e) => {
                        println!("{}: {:#}", path.display(), e);
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} definition file(s) invalid", failed);
            }
        }
    }

    Ok(())
}
