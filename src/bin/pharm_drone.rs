use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use pharm_drone::batch::{generate_palette, locate_batch};
use pharm_drone::{Config, Palette};

/// Learn flower color palettes and outline flowers in aerial images.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON file overriding the default tunables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads (defaults to one per core)
    #[arg(short = 'j', long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a color palette from a collection of images
    Palette(PaletteArgs),
    /// Outline palette-colored regions and write annotated copies
    Locate(LocateArgs),
}

#[derive(Args, Debug)]
struct PaletteArgs {
    /// Training image paths
    #[arg(required = true)]
    src: Vec<PathBuf>,

    /// Output file (`.json` for JSON, CSV otherwise); prints CSV when omitted
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct LocateArgs {
    /// Palette file produced by `palette`
    #[arg(short, long)]
    palette: PathBuf,

    /// Directory receiving the annotated images
    #[arg(short = 'd', long)]
    out_dir: PathBuf,

    /// Images to analyse
    #[arg(required = true)]
    src: Vec<PathBuf>,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Palette(args) => {
            let palette = generate_palette(&args.src, &config.palette, cli.threads)
                .context("palette generation failed")?;
            match &args.out {
                Some(out) => {
                    palette
                        .save(out)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                    println!("Saved → {}", out.display());
                }
                None => print!("{}", palette.to_csv_string()),
            }
        }
        Command::Locate(args) => {
            let palette = Palette::load(&args.palette)
                .with_context(|| format!("failed to read palette {}", args.palette.display()))?;
            let outcomes = locate_batch(&args.src, &palette, &config.detection, &args.out_dir, cli.threads)?;

            let mut failed = 0;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(located) => println!(
                        "Saved → {} ({} contours)",
                        located.output.display(),
                        located.contours
                    ),
                    Err(_) => failed += 1,
                }
            }
            if failed > 0 {
                bail!("{failed} of {} images failed", outcomes.len());
            }
        }
    }

    Ok(())
}
