//! Binary entrypoint: composite one project file and export the PNG.
//!
//! Delegates all logic to the library crate.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use text_behind_image::compositor::Compositor;
use text_behind_image::config::Configuration;
use text_behind_image::editor::EditorState;
use text_behind_image::export::save_artifact;
use text_behind_image::loader::ImageSource;
use text_behind_image::text::FontBook;

#[derive(Debug, Parser)]
#[command(
    name = "text-behind-image",
    about = "Composite text and images behind the subject of a photo"
)]
struct Cli {
    /// Path to YAML project file
    #[arg(short, long, value_name = "FILE", default_value = "project.yaml")]
    config: PathBuf,

    /// Override the directory the PNG is written to
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("text_behind_image={}", level).parse()?)
        .add_directive("fontdb=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

fn build_font_book(cfg: &Configuration) -> FontBook {
    let mut fonts = if cfg.system_fonts {
        FontBook::system()
    } else {
        FontBook::empty()
    };
    for dir in &cfg.font_dirs {
        fonts.load_dir(dir);
    }
    info!(faces = fonts.face_count(), "fonts ready");
    fonts
}

async fn build_state(cfg: &Configuration) -> Result<EditorState> {
    let background = tokio::fs::read(&cfg.background)
        .await
        .with_context(|| format!("reading background {}", cfg.background.display()))?;
    let mut state = EditorState::new().with_background(ImageSource::from_bytes(background));

    let removal = cfg
        .background_removal
        .as_ref()
        .map(|r| (r.remover(), r.options()));

    if let Some(foreground) = &cfg.foreground {
        state = state.with_foreground(ImageSource::from_path(foreground));
    } else if let Some((remover, options)) = &removal {
        match state.setup_image(remover, options).await {
            Ok(next) => state = next,
            Err(err) => warn!(error = %err, "continuing without a foreground cut-out"),
        }
    } else {
        info!("no foreground cut-out configured; text will not be occluded");
    }

    for text in &cfg.texts {
        state = state.add_text_from(text.clone()).1;
    }

    for overlay in &cfg.overlays {
        if !overlay.remove_background {
            state = state
                .add_overlay_cutout(ImageSource::from_path(&overlay.path), overlay.transform)
                .1;
            continue;
        }
        let Some((remover, options)) = &removal else {
            warn!(path = %overlay.path.display(), "no removal command; overlay skipped");
            continue;
        };
        let bytes = match tokio::fs::read(&overlay.path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %overlay.path.display(), error = %err, "overlay unreadable; skipped");
                continue;
            }
        };
        match state
            .add_overlay(&bytes, remover, options, overlay.transform)
            .await
        {
            Ok((id, next)) => {
                info!(%id, path = %overlay.path.display(), "overlay added");
                state = next;
            }
            Err(err) => {
                warn!(path = %overlay.path.display(), error = %err, "overlay not added")
            }
        }
    }

    Ok(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("loading project from {}", cli.config.display()))?
        .validated()
        .context("validating project")?;

    let fonts = build_font_book(&cfg);
    let state = build_state(&cfg).await?;
    let input = state
        .composition_input()
        .context("project has no background image")?;

    let compositor = Compositor::new(Arc::new(fonts), cfg.compositor_options());
    let composite = compositor.composite(input).await.context("compositing")?;

    let out_dir = cli.output_dir.unwrap_or_else(|| cfg.output_dir.clone());
    let path = save_artifact(&composite.artifact, &out_dir).await?;
    info!(
        path = %path.display(),
        width = composite.artifact.width,
        height = composite.artifact.height,
        skipped_layers = composite.warnings.len(),
        "export complete"
    );
    Ok(())
}
