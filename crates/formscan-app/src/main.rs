// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// formscan — command-line operator tool over the sheet reader.
//
// Entry point. Initialises logging, loads the pipeline configuration and
// dispatches the subcommand.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use formscan_core::error::Result;
use formscan_core::{PipelineConfig, SheetFormat};
use formscan_document::{Raster, SheetReader};

#[derive(Parser)]
#[command(name = "formscan")]
#[command(about = "Rectify photographed answer sheets and read their digit fields")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rectify a photographed sheet onto its marker span.
    Rectify {
        #[command(flatten)]
        common: CommonArgs,
        /// Path to write the rectified page (PNG).
        #[arg(long)]
        out: PathBuf,
    },

    /// Segment a sheet and dump the rectified page, every cell patch and
    /// the field list.
    Segment {
        #[command(flatten)]
        common: CommonArgs,
        /// Directory to write `page.png`, cell PNGs and `fields.json` into.
        #[arg(long)]
        out_dir: PathBuf,
    },

    /// Read every field of a sheet image or of each page of a PDF scan.
    #[cfg(feature = "classifier")]
    Extract {
        #[command(flatten)]
        common: CommonArgs,
        /// Path to the digit classifier model (`.rten`).
        #[arg(long)]
        model: PathBuf,
    },

    /// Print the default pipeline configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct CommonArgs {
    /// Path to the input image (or PDF, for `extract`).
    #[arg(long)]
    image: PathBuf,

    /// Pipeline configuration (JSON). Missing keys take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sheet layout.
    #[arg(long, value_enum, default_value_t = FormatArg::Standard)]
    format: FormatArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Standard,
    AnswersOnly,
}

impl From<FormatArg> for SheetFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Standard => Self::Standard,
            FormatArg::AnswersOnly => Self::AnswersOnly,
        }
    }
}

impl CommonArgs {
    fn reader(&self) -> Result<SheetReader> {
        let config = match &self.config {
            Some(path) => {
                tracing::info!("Loading configuration: {}", path.display());
                PipelineConfig::load(path)?
            }
            None => PipelineConfig::default(),
        };
        Ok(SheetReader::new(config)?.with_format(self.format.into()))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Rectify { common, out } => run_rectify(&common, &out),
        Commands::Segment { common, out_dir } => run_segment(&common, &out_dir),
        #[cfg(feature = "classifier")]
        Commands::Extract { common, model } => run_extract(&common, &model),
        Commands::DefaultConfig => {
            println!(
                "{}",
                serde_json::to_string_pretty(&PipelineConfig::default())?
            );
            Ok(())
        }
    }
}

fn run_rectify(common: &CommonArgs, out: &Path) -> Result<()> {
    let reader = common.reader()?;
    let page = reader.rectify(&Raster::open(&common.image)?)?;
    page.save(out)?;
    tracing::info!("Rectified page written to {}", out.display());
    Ok(())
}

fn run_segment(common: &CommonArgs, out_dir: &Path) -> Result<()> {
    let reader = common.reader()?;
    let segmentation = reader.segment(&Raster::open(&common.image)?)?;

    std::fs::create_dir_all(out_dir)?;
    segmentation.page.save(out_dir.join("page.png"))?;
    for (field, cells) in segmentation.patches.iter().enumerate() {
        for (cell, patch) in cells.iter().enumerate() {
            patch
                .to_image()
                .save(out_dir.join(format!("field-{field:02}-cell-{cell:02}.png")))?;
        }
    }
    std::fs::write(
        out_dir.join("fields.json"),
        serde_json::to_string_pretty(&segmentation.fields)?,
    )?;

    tracing::info!(
        "{} fields written to {}",
        segmentation.fields.len(),
        out_dir.display()
    );
    Ok(())
}

#[cfg(feature = "classifier")]
fn run_extract(common: &CommonArgs, model: &Path) -> Result<()> {
    use formscan_document::ModelClassifier;

    let reader = common.reader()?;
    let classifier = ModelClassifier::load(model)?;

    let is_pdf = common
        .image
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        for line in reader.extract_path(&common.image, &classifier)? {
            println!("{line}");
        }
        return Ok(());
    }

    for (index, outcome) in reader
        .extract_pdf(&common.image, &classifier)?
        .into_iter()
        .enumerate()
    {
        println!("# page {}", index + 1);
        match outcome {
            Ok(lines) => lines.iter().for_each(|line| println!("{line}")),
            Err(err) => println!("! {err}"),
        }
    }
    Ok(())
}
