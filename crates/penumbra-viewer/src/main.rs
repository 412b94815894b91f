use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use penumbra_engine::core::{App, AppControl, FrameCtx, FrameOutcome};
use penumbra_engine::device::{GpuInit, HeadlessGpu, HeadlessSurface};
use penumbra_engine::frame::{FrameDriver, FrameState, PipelineConfig};
use penumbra_engine::logging::{init_logging, LoggingConfig};
use penumbra_engine::render::RenderCtx;
use penumbra_engine::window::{Runtime, RuntimeConfig};

#[derive(Parser, Debug)]
#[command(name = "penumbra")]
#[command(about = "Draws a sprite with a soft, sheared drop shadow")]
#[command(version)]
struct Args {
    /// Sprite image; overrides `sprite.path` from the config
    sprite: Option<PathBuf>,

    /// Pipeline config (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render one frame without a window and write it as PNG
    #[arg(long, value_name = "OUT")]
    screenshot: Option<PathBuf>,

    /// Log filter in env_logger syntax (falls back to RUST_LOG)
    #[arg(long)]
    log: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(match &args.log {
        Some(filter) => LoggingConfig::with_filter(filter.clone()),
        None => LoggingConfig::default(),
    });

    let config = resolve_config(&args)?;
    match &args.screenshot {
        Some(out) => screenshot(&config, out),
        None => run_window(config),
    }
}

fn resolve_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(sprite) = &args.sprite {
        config.sprite.path = sprite.clone();
    }
    Ok(config)
}

fn run_window(config: PipelineConfig) -> Result<()> {
    let runtime = RuntimeConfig {
        title: config.surface.title.clone(),
        size: (config.surface.width, config.surface.height).into(),
        ..RuntimeConfig::default()
    };
    Runtime::run(runtime, GpuInit::default(), ShadowApp::new(config))
}

fn screenshot(config: &PipelineConfig, out: &Path) -> Result<()> {
    let (w, h) = (config.surface.width, config.surface.height);
    let gpu = HeadlessGpu::new(GpuInit::downlevel())?;
    let surface = HeadlessSurface::new(&gpu, w, h)?;

    let state = FrameState::create(&gpu.render_ctx(&surface), config)
        .context("failed to build frame state")?;
    let mut driver = FrameDriver::new(state);
    let pixels = driver.render_offscreen(&gpu, &surface)?;
    driver.release();

    image::save_buffer(out, &pixels, w, h, image::ColorType::Rgba8)
        .with_context(|| format!("failed to write {}", out.display()))?;
    log::info!("wrote {w}x{h} frame to {}", out.display());
    Ok(())
}

/// Drives the shadow pipeline from the window runtime.
struct ShadowApp {
    config: PipelineConfig,
    driver: Option<FrameDriver>,
}

impl ShadowApp {
    fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            driver: None,
        }
    }
}

impl App for ShadowApp {
    fn on_start(&mut self, ctx: &RenderCtx<'_>) -> Result<()> {
        let state = FrameState::create(ctx, &self.config).context("failed to build frame state")?;
        self.driver = Some(FrameDriver::new(state));
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let Some(driver) = self.driver.as_mut() else {
            return AppControl::Exit;
        };

        let outcome = ctx.render(|rctx, target| driver.encode(rctx, target));
        if outcome == FrameOutcome::Presented {
            driver.mark_presented();
        }
        outcome.control()
    }

    fn on_exit(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.release();
        }
    }
}
