use clap::Parser;
use std::path::{Path, PathBuf};

use crate::config::IntersectionBounds;

#[derive(Parser, Debug)]
#[command(name = "board-rectify")]
#[command(version, about = "Detect a photographed board and correct its perspective")]
pub struct Cli {
    /// Still image used as the captured frame
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output path; omit or pass "-" to write JPEG bytes to stdout
    pub output: Option<PathBuf>,

    /// JSON file overriding the detection constants
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Intersection filter ("non-negative" or "within-image")
    #[arg(long, value_parser = parse_bounds)]
    pub bounds: Option<IntersectionBounds>,

    /// Feed the rectified frame to the marker filter instead of the raw one
    #[arg(long)]
    pub filter_rectified: bool,

    /// Show detection details
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    /// Destination file, or `None` for stdout.
    pub fn output_path(&self) -> Option<&Path> {
        match &self.output {
            Some(path) if path.as_os_str() != "-" => Some(path),
            _ => None,
        }
    }
}

fn parse_bounds(s: &str) -> Result<IntersectionBounds, String> {
    match s {
        "non-negative" => Ok(IntersectionBounds::NonNegative),
        "within-image" => Ok(IntersectionBounds::WithinImage),
        other => Err(format!(
            "Invalid bounds '{}', expected non-negative or within-image",
            other
        )),
    }
}
