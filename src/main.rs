use std::io::{Cursor, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use image::{ImageFormat, RgbImage};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use board_rectify::{
    correct_perspective, read_still, Cli, CorrectionConfig, Error, FrameFilter, PassThrough,
};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // stdout may carry the encoded image, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn write_frame(frame: RgbImage, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            frame
                .save(path)
                .map_err(Error::from)
                .with_context(|| format!("Failed to save output: {:?}", path))?;
            info!(path = %path.display(), "Saved output frame");
        }
        None => {
            let mut bytes = Vec::new();
            frame
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
                .map_err(Error::from)
                .context("Failed to encode JPEG")?;
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&bytes)
                .and_then(|_| stdout.flush())
                .map_err(Error::from)
                .context("Failed to write JPEG to stdout")?;
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => CorrectionConfig::load(path)?,
        None => CorrectionConfig::default(),
    };
    if let Some(bounds) = cli.bounds {
        config.bounds = bounds;
    }

    let frame = read_still(&cli.input)?;

    let rectified =
        correct_perspective(&frame, &config).context("Unable to fix perspective")?;

    // The tracer historically received the raw frame; keep that unless asked.
    let source = if cli.filter_rectified {
        &rectified
    } else {
        warn!("Marker filter runs on the raw frame; pass --filter-rectified to change this");
        &frame
    };
    let filtered = PassThrough.apply(source);

    write_frame(filtered, cli.output_path())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(&cli) {
        eprintln!("{:#}", err);
        let code = err.downcast_ref::<Error>().map_or(-4, Error::exit_code);
        std::process::exit(code);
    }
}
