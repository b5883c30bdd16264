use clap::{Parser, Subcommand};
use mkblog::config;
use mkblog::pipeline::{BuildOptions, Builder};
use mkblog::{output, watch};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mkblog")]
#[command(about = "Static site generator for markdown blogs and docs")]
#[command(long_about = "\
Static site generator for markdown blogs and docs

Directories become sections, markdown documents become pages, and every
other file is copied as-is.

Project structure:

  project/
  ├── mkblog.toml                  # Site config (optional)
  ├── docs/                        # Source directory
  │   ├── index.md                 # Home page → index.html
  │   ├── about.md                 # Page → about/index.html
  │   ├── _posts/
  │   │   ├── index.md             # Section page → _posts/index.html
  │   │   └── hello-world.md       # Page → _posts/hello-world/index.html
  │   ├── img/logo.png             # Copied verbatim
  │   └── .drafts/                 # Hidden: never built
  └── site/                        # Output directory

Page titles (first available wins):
  front-matter `title` → first `# Heading` → filename (hello-world.md → \"Hello World\")

Run 'mkblog gen-config' to generate a documented mkblog.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, short = 'f', default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags for commands that write output.
#[derive(clap::Args, Clone, Copy)]
struct DirtyArgs {
    /// Only re-write changed files; stale output is left in place
    #[arg(long)]
    dirty: bool,
}

impl DirtyArgs {
    fn options(self) -> BuildOptions {
        if self.dirty {
            BuildOptions::dirty()
        } else {
            BuildOptions::default()
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Build the site
    Build {
        #[command(flatten)]
        dirty: DirtyArgs,
        /// Fail if any warning is recorded
        #[arg(long, short)]
        strict: bool,
        /// Output directory (overrides output_dir)
        #[arg(long, short = 'd')]
        site_dir: Option<PathBuf>,
    },
    /// Validate the source directory and navigation without writing output
    Check,
    /// Build, then rebuild on every source change
    Watch {
        #[command(flatten)]
        dirty: DirtyArgs,
    },
    /// Print a stock mkblog.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Build {
            dirty,
            strict,
            site_dir,
        } => {
            let mut settings = config::load_settings(&cli.config)?;
            settings.strict |= strict;
            if let Some(dir) = site_dir {
                settings.output_dir = dir;
            }
            settings.validate()?;
            let output_dir = settings.output_dir.clone();
            let report = Builder::new(settings).build(dirty.options())?;
            output::print_build_summary(&report, &output_dir);
        }
        Command::Check => {
            let settings = config::load_settings(&cli.config)?;
            println!("==> Checking {}", settings.source_dir.display());
            let check = Builder::new(settings).check()?;
            output::print_check_output(&check);
            if check.warnings.is_empty() {
                println!("==> Site is valid");
            } else {
                println!("==> {} warning(s)", check.warnings.len());
            }
        }
        Command::Watch { dirty } => {
            let settings = config::load_settings(&cli.config)?;
            let config_path = cli.config.is_file().then_some(cli.config.as_path());
            watch::watch(Builder::new(settings), config_path, dirty.options())?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `--verbose` forces debug output; otherwise `RUST_LOG`, defaulting to info.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("mkblog=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
