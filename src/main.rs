use anyhow::Result;
use clap::Parser;
use pyxbuild::cli::{BuildArgs, Cli, Commands};
use pyxbuild::commands;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Build(args)) => commands::run_build(args),
        Some(Commands::Check(args)) => commands::run_check(args),
        Some(Commands::Init { force }) => {
            let cwd = std::env::current_dir()?;
            commands::init_config(&cwd, force)
        }
        None => commands::run_build(BuildArgs {
            source: ".".into(),
            ..BuildArgs::default()
        }),
    }
}
