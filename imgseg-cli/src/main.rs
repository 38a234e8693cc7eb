// imgseg command line interface
// Drives one segmentation session against a backend and exports the result

mod args;

use anyhow::{bail, Context};
use args::{Cli, Commands, OutputArgs};
use clap::Parser;
use imgseg_client::HttpBackend;
use imgseg_core::{ImageSource, Mode, Point, SegmentConfig};
use imgseg_onnx::RemoteOnnxLoader;
use imgseg_session::{ClipboardSink, DispatchPath, ExportSinks, FileSink, PathState, Workspace};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    let config = Arc::new(load_config(&cli)?);

    match cli.command {
        Commands::Config => {
            print!("{}", toml::to_string_pretty(config.as_ref())?);
        }
        Commands::Point { image, points, output } => {
            let mut ws = open_workspace(config, &image, &output)?;
            add_points(&mut ws, points)?;
            finish(ws, DispatchPath::Click, &output).await?;
        }
        Commands::Box { image, from, to, output } => {
            let mut ws = open_workspace(config, &image, &output)?;
            ws.select_mode(Mode::Box);
            ws.draw_box(from, to)?;
            finish(ws, DispatchPath::Box, &output).await?;
        }
        Commands::Everything { image, output } => {
            let mut ws = open_workspace(config, &image, &output)?;
            ws.run_everything();
            finish(ws, DispatchPath::Everything, &output).await?;
        }
        Commands::Clip { image, prompt, output } => {
            let mut ws = open_workspace(config, &image, &output)?;
            ws.set_prompt(prompt);
            if !ws.send_text_prompt() {
                bail!("Prompt is empty");
            }
            finish(ws, DispatchPath::TextPrompt, &output).await?;
        }
        Commands::Embedding { image, points, output } => {
            let mut ws = open_workspace(config, &image, &output)?;
            ws.select_mode(Mode::Embedding);
            add_points(&mut ws, points)?;
            finish(ws, DispatchPath::LocalInference, &output).await?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<SegmentConfig> {
    let mut config = match &cli.config {
        Some(path) => SegmentConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SegmentConfig::default(),
    };
    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    }
    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

fn open_workspace(
    config: Arc<SegmentConfig>,
    image: &Path,
    output: &OutputArgs,
) -> anyhow::Result<Workspace> {
    let backend = Arc::new(HttpBackend::new(config.clone())?);
    let loader = Arc::new(RemoteOnnxLoader::new(backend.clone(), config.overlay_color));
    let sinks = ExportSinks {
        file: Arc::new(FileSink::in_dir(&output.out, &config.export_file_name)),
        clipboard: Arc::new(ClipboardSink::new()),
    };

    let source = ImageSource::from_path(image)
        .with_context(|| format!("Failed to read image {}", image.display()))?;
    let mut ws = Workspace::new(config, backend, loader, sinks);
    ws.load_image(source);
    Ok(ws)
}

fn add_points(ws: &mut Workspace, points: Vec<Point>) -> anyhow::Result<()> {
    for point in points {
        ws.add_point(point)?;
    }
    Ok(())
}

/// Wait for the session to go idle, then export
async fn finish(mut ws: Workspace, path: DispatchPath, output: &OutputArgs) -> anyhow::Result<()> {
    ws.settle().await;

    if let Some(failed) = DispatchPath::ALL
        .into_iter()
        .find(|p| ws.path_state(*p) == PathState::Failed)
    {
        let kind = if failed.is_remote() { "backend request" } else { "local step" };
        bail!("{} {} failed", failed, kind);
    }
    let state = ws.path_state(path);
    if state != PathState::Succeeded {
        bail!("{} finished in state {:?}", path, state);
    }

    ws.export_to_file()?;
    let target = output.out.join(&ws.config().export_file_name);
    info!("Export written to {}", target.display());
    println!(
        "{} masks, {} points -> {}",
        ws.masks().len(),
        ws.points().len(),
        target.display()
    );

    if output.copy {
        ws.export_to_clipboard()?;
        println!("Copied");
    }

    if let Some(overlay_path) = &output.overlay {
        match ws.overlay() {
            Some(raster) => {
                raster.save_png(overlay_path)?;
                println!("Overlay -> {}", overlay_path.display());
            }
            None => println!("No overlay to write"),
        }
    }

    Ok(())
}
