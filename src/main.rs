use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tweakwatch::extract::{Extractor, MarkerScanner, read_source};
use tweakwatch::value::parse_literal;
use tweakwatch::{Settings, TweakId, TweakType, Tweaks, logging};

#[derive(Parser)]
#[command(name = "tweakwatch")]
#[command(about = "Hot-reload tweak values straight from source literals")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to .tweakwatch/settings.toml, searched upward)
    #[arg(short, long, global = true, env = "TWEAKWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the literal assigned to a tweak in a file
    Extract {
        /// Source file containing the declaration
        file: PathBuf,

        /// Declared tweak name
        name: String,

        /// Parse the literal as this type (int, float, string)
        #[arg(short = 't', long = "type")]
        ty: Option<TweakType>,
    },

    /// Watch tweaks in a file and print every value change
    Watch {
        /// Source file containing the declarations
        file: PathBuf,

        /// Tweak to watch, as NAME:TYPE (repeatable)
        #[arg(short, long = "var", required = true)]
        vars: Vec<VarSpec>,

        /// How often to check for new values, in milliseconds
        #[arg(long, default_value_t = 100)]
        poll_ms: u64,
    },

    /// Show effective configuration
    Config,
}

/// `name:type` pair given on the command line.
#[derive(Debug, Clone)]
struct VarSpec {
    name: String,
    ty: TweakType,
}

impl FromStr for VarSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, ty) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected NAME:TYPE, got '{s}'"))?;
        if name.trim().is_empty() {
            return Err(format!("missing tweak name in '{s}'"));
        }
        Ok(VarSpec {
            name: name.trim().to_string(),
            ty: ty.parse()?,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .map_err(|e| anyhow!("failed to load settings: {e}"))?;

    logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Extract { file, name, ty } => run_extract(&settings, &file, &name, ty),
        Commands::Watch {
            file,
            vars,
            poll_ms,
        } => run_watch(settings, &file, &vars, Duration::from_millis(poll_ms)),
        Commands::Config => {
            print!("{}", settings.to_toml().context("failed to render settings")?);
            Ok(())
        }
    }
}

fn run_extract(
    settings: &Settings,
    file: &Path,
    name: &str,
    ty: Option<TweakType>,
) -> Result<()> {
    let text = read_source(file)?;

    let scanner = MarkerScanner::new(settings.marker.clone());
    let literal = scanner.extract(&text, name).ok_or_else(|| {
        anyhow!(
            "no {}(<type>, {name}) declaration in {}",
            settings.marker,
            file.display()
        )
    })?;

    match ty {
        None => println!("{literal}"),
        Some(ty) => {
            let value = parse_literal(ty, literal)
                .ok_or_else(|| anyhow!("literal {literal:?} is not a valid {ty}"))?;
            println!("{value}");
        }
    }
    Ok(())
}

fn run_watch(settings: Settings, file: &Path, vars: &[VarSpec], poll: Duration) -> Result<()> {
    let tweaks = Tweaks::new(settings);

    let mut watched: Vec<(TweakId, &VarSpec, u64)> = Vec::with_capacity(vars.len());
    for var in vars {
        let id = tweaks
            .register(&var.name, file, var.ty)
            .with_context(|| format!("cannot register '{}'", var.name))?;
        let info = tweaks
            .entry(id)
            .ok_or_else(|| anyhow!("tweak {id} vanished after registration"))?;
        println!("{} = {}", var.name, info.value);
        watched.push((id, var, info.generation));
    }

    eprintln!("Watching {} (Ctrl-C to stop)", file.display());

    loop {
        std::thread::sleep(poll);
        for (id, var, seen) in watched.iter_mut() {
            let Some(info) = tweaks.entry(*id) else {
                continue;
            };
            if info.generation != *seen {
                *seen = info.generation;
                println!("{} = {}", var.name, info.value);
            }
        }
    }
}
