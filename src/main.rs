use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use photo_annotate::render::image::render_state;
use photo_annotate::{AnnotationState, BaseImage, EngineConfig};

#[derive(Parser, Debug)]
#[command(
    name = "annotate-replay",
    version,
    about = "Re-render a saved annotation state onto its base image"
)]
struct Args {
    /// Base image the annotations were drawn on (PNG or JPEG)
    image: PathBuf,
    /// Annotation state JSON exported with the session
    state: PathBuf,
    /// Where to write the composite PNG
    out: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let bytes = fs::read(&args.image)
        .with_context(|| format!("Failed to read {}", args.image.display()))?;
    let base = BaseImage::decode(bytes)?;
    let json = fs::read_to_string(&args.state)
        .with_context(|| format!("Failed to read {}", args.state.display()))?;
    let state = AnnotationState::from_json(&json)?;

    let options = EngineConfig::load().render_options();
    let png = render_state(&base, &state, &options)?;
    fs::write(&args.out, png)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;
    log::info!(
        "Wrote {} annotations to {}",
        state.records.len(),
        args.out.display()
    );
    Ok(())
}
