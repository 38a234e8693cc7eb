// Argument types for the imgseg command line

use clap::{Args, Parser, Subcommand};
use imgseg_core::{Point, PointLabel};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "imgseg")]
#[command(about = "Interactive image segmentation client", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Backend base URL (overrides the config file)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// TOML configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Segment from foreground/background clicks
    Point {
        #[arg(long, short)]
        image: PathBuf,

        /// Click as `x,y` or `x,y:label` (label 1 = foreground, 0 = background)
        #[arg(long = "point", short, required = true, value_parser = parse_point)]
        points: Vec<Point>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Segment the region inside a box
    Box {
        #[arg(long, short)]
        image: PathBuf,

        /// First corner as `x,y`
        #[arg(long, value_parser = parse_point)]
        from: Point,

        /// Opposite corner as `x,y`
        #[arg(long, value_parser = parse_point)]
        to: Point,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Segment every object in the image
    Everything {
        #[arg(long, short)]
        image: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Segment from a text prompt
    Clip {
        #[arg(long, short)]
        image: PathBuf,

        #[arg(long, short)]
        prompt: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Fetch the image embedding and decode clicks locally
    Embedding {
        #[arg(long, short)]
        image: PathBuf,

        #[arg(long = "point", short, required = true, value_parser = parse_point)]
        points: Vec<Point>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct OutputArgs {
    /// Directory receiving the masks file
    #[arg(long, short, default_value = ".")]
    pub out: PathBuf,

    /// Also copy the export to the clipboard
    #[arg(long)]
    pub copy: bool,

    /// Write the mask overlay as a PNG
    #[arg(long)]
    pub overlay: Option<PathBuf>,
}

/// Parse `x,y` or `x,y:label`
pub fn parse_point(s: &str) -> Result<Point, String> {
    let (coords, label) = match s.split_once(':') {
        Some((coords, label)) => (coords, Some(label)),
        None => (s, None),
    };
    let (x, y) = coords
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got '{}'", s))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x '{}': {}", x, e))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y '{}': {}", y, e))?;

    let label = match label.map(str::trim) {
        None => PointLabel::Foreground,
        Some(raw) => {
            let value: i64 = raw.parse().map_err(|e| format!("bad label '{}': {}", raw, e))?;
            PointLabel::try_from(value)?
        }
    };
    let point = Point::new(x, y, label);
    point.validate().map_err(|e| e.to_string())?;
    Ok(point)
}
