use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use svg_painter::{EngineEvent, Painter, PainterSettings, Session, ShapeKind, StartRun, WireMessage};

/// Approximate an image with translucent primitives and export it as SVG.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// input image (anything the `image` crate decodes)
    image: PathBuf,

    /// directory the final SVG is written to
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// JSON settings file; missing fields take their defaults
    #[arg(short, long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    max_iterations: Option<u64>,

    /// comma-separated shape kinds, e.g. `triangle,ellipse`
    #[arg(long, value_delimiter = ',')]
    shapes: Vec<ShapeKind>,

    /// emit a snapshot every N accepted iterations
    #[arg(long)]
    snapshot_interval: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // name rayon workers so they are recognizable in profilers
    let _ = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("rayon-{i}"))
        .build_global();

    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => PainterSettings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => PainterSettings::default(),
    };
    if let Some(seed) = args.seed {
        settings.seed = seed;
    }
    if let Some(n) = args.max_iterations {
        settings.max_iterations = n;
    }
    if let Some(n) = args.snapshot_interval {
        settings.snapshot_interval = n;
    }
    if !args.shapes.is_empty() {
        settings.shape_kinds = args.shapes.clone();
    }

    let img = image::open(&args.image)
        .with_context(|| format!("failed to open {}", args.image.display()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    log::info!("loaded {} ({width}x{height})", args.image.display());

    let request = StartRun { pixels: img.into_raw(), width, height };
    let mut painter = Painter::new(settings).context("invalid settings")?;
    painter.start(request).context("failed to start run")?;
    let Some(handle) = painter.take() else {
        bail!("run did not start");
    };

    let mut session = Session::new();
    for event in handle.events().iter() {
        if let EngineEvent::Snapshot(snapshot) = &event {
            log::info!(
                "iteration {}: {} primitives, rmse {:.4}",
                snapshot.iteration,
                snapshot.primitives,
                snapshot.metrics.rmse
            );
        }
        // round-trip through the wire format the same way a remote caller would
        let json = WireMessage::from(&event).to_json();
        if session.receive(&json).is_err() {
            continue;
        }
        if session.is_done() {
            break;
        }
    }
    handle.join();

    match session
        .export_to(&args.out)
        .with_context(|| format!("failed to write into {}", args.out.display()))?
    {
        Some(path) => println!("{}", path.display()),
        None => bail!("the run produced no snapshot"),
    }
    Ok(())
}
