use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pyxbuild")]
#[command(
    about = "Compile a Python project to Cython extension modules, keeping Python for files that fail",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Defaults to `build` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stage the project, convert every eligible file and build the extensions
    Build(BuildArgs),

    /// Report Cython compatibility issues without building anything
    Check(CheckArgs),

    /// Write a default pyxbuild.yaml to the current directory
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Project root to convert
    #[arg(short, long, default_value = ".")]
    pub source: PathBuf,

    /// Configuration file (defaults to ./pyxbuild.yaml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Build output directory (overrides build.path)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of conversion workers (0 = use all cores)
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Skip the compatibility analysis
    #[arg(long)]
    pub no_analyze: bool,

    /// Keep the generated .pyx and .c files next to compiled modules
    #[arg(long)]
    pub keep_intermediates: bool,

    /// Report file (overrides report.path)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Hide the progress indicator
    #[arg(short, long)]
    pub quiet: bool,

    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Project root to check
    #[arg(short, long, default_value = ".")]
    pub source: PathBuf,

    /// Configuration file (defaults to ./pyxbuild.yaml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: CheckFormat,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CheckFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_is_accepted() {
        let cli = Cli::try_parse_from(["pyxbuild"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_build_flags() {
        let cli = Cli::try_parse_from([
            "pyxbuild",
            "build",
            "--output",
            "dist",
            "-j",
            "4",
            "--no-analyze",
            "-vv",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Build(args)) => {
                assert_eq!(args.output, Some(PathBuf::from("dist")));
                assert_eq!(args.jobs, Some(4));
                assert!(args.no_analyze);
                assert_eq!(args.verbose, 2);
                assert_eq!(args.source, PathBuf::from("."));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_check_format() {
        let cli = Cli::try_parse_from(["pyxbuild", "check", "--format", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Check(CheckArgs {
                format: CheckFormat::Json,
                ..
            }))
        ));
    }
}
