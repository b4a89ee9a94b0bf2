#![forbid(unsafe_code)]

mod throttled;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use swirl_rend::{
    spawn_render_thread, BackendDescriptor, BackendRegistry, ContextPool, DispatchStatsSnapshot,
    PvrRegs, RendConfig, RendContext, RenderDispatcher, TaTiming, Vram, FB_R_CTRL_ENABLE_BIT,
    FB_W_SOF1_RTT_BIT,
};

use throttled::{Costs, FailingInit, ThrottledRenderer};

const VRAM_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(
    name = "swirl-rend-bench",
    version,
    about = "Drive synthetic frames through the render dispatcher on a real render thread"
)]
struct Args {
    /// Number of emulated frame intervals.
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Renderer backend: `auto`, `throttled` or `none`.
    ///
    /// Environment variable: `SWIRL_PVR_BACKEND`.
    #[arg(long, env = "SWIRL_PVR_BACKEND", default_value = "auto")]
    backend: String,

    /// Tile accelerator timing model (`lle` or `hle`).
    ///
    /// Environment variable: `SWIRL_TA_TIMING`.
    #[arg(long, env = "SWIRL_TA_TIMING", default_value = "lle", value_parser = parse_timing)]
    timing: TaTiming,

    /// Upper bound for `end_render` while idle, in milliseconds.
    ///
    /// Environment variable: `SWIRL_IDLE_WAIT_MS`.
    #[arg(long, env = "SWIRL_IDLE_WAIT_MS", default_value_t = 17)]
    idle_wait_ms: u64,

    /// Make every Nth frame render-to-texture (0 disables).
    #[arg(long, default_value_t = 0)]
    rtt_every: u64,

    /// Mark every Nth context as overrun (0 disables).
    #[arg(long, default_value_t = 0)]
    overrun_every: u64,

    /// Start a render without a context every Nth interval (0 disables).
    #[arg(long, default_value_t = 0)]
    empty_every: u64,

    /// Simulated `process` cost of the throttled backend, in microseconds.
    #[arg(long, default_value_t = 500)]
    process_us: u64,

    /// Simulated `present` cost of the throttled backend, in microseconds.
    #[arg(long, default_value_t = 1000)]
    present_us: u64,

    /// Make the named backend fail `init()`. May be repeated.
    #[arg(long = "fail-init", value_name = "NAME")]
    fail_init: Vec<String>,

    /// Switch to this backend at `--switch-at`.
    #[arg(long, value_name = "NAME", requires = "switch_at")]
    switch_to: Option<String>,

    /// Frame interval at which `--switch-to` takes effect.
    #[arg(long, value_name = "FRAME", requires = "switch_to")]
    switch_at: Option<u64>,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,
}

fn parse_timing(value: &str) -> std::result::Result<TaTiming, String> {
    TaTiming::parse(value).map_err(|err| err.to_string())
}

#[derive(Debug, Serialize)]
struct Summary {
    backend: Option<String>,
    timing: TaTiming,
    frames: u64,
    elapsed_ms: f64,
    intervals_per_sec: f64,
    contexts_outstanding: u64,
    stats: DispatchStatsSnapshot,
    fatal: Option<String>,
}

fn every(n: u64, frame: u64) -> bool {
    n != 0 && frame % n == n - 1
}

fn build_registry(args: &Args) -> Result<BackendRegistry> {
    let registry = BackendRegistry::with_builtin();
    registry.register(ThrottledRenderer::descriptor(Costs {
        process: Duration::from_micros(args.process_us),
        present: Duration::from_micros(args.present_us),
    }));

    for name in &args.fail_init {
        let desc = registry
            .get(name)
            .with_context(|| format!("--fail-init: unknown backend `{name}`"))?;
        registry.register(BackendDescriptor::new(
            name.clone(),
            desc.priority(),
            move |vram| Box::new(FailingInit(desc.instantiate(vram))),
        ));
    }
    Ok(registry)
}

/// Fill a context with a plausible command list and pool usage.
fn synthesize(ctx: &mut RendContext, frame: u64) {
    let polys = 64 + (frame % 17) as usize * 32;
    ctx.commands.resize(polys * 32, 0);
    ctx.commands[..8].copy_from_slice(&frame.to_le_bytes());
    ctx.usage.verts = polys * 3;
    ctx.usage.idx = polys * 3;
    ctx.usage.global_param_op = polys / 2;
    ctx.usage.global_param_tr = polys / 4;
    ctx.usage.global_param_pt = polys / 8;
    ctx.usage.modtrig = polys / 16;
}

fn run(args: &Args) -> Result<Summary> {
    let config = RendConfig {
        backend: args.backend.clone(),
        timing: args.timing,
        idle_wait_ms: args.idle_wait_ms,
    };
    let registry = Arc::new(build_registry(args)?);
    tracing::info!(backends = ?registry.names(), ?config, "starting");

    let pool = Arc::new(ContextPool::new());
    let (mut dispatcher, endpoint) =
        RenderDispatcher::new(config, registry, Vram::new(VRAM_SIZE), pool.clone());
    let render_thread = spawn_render_thread(endpoint).context("failed to spawn render thread")?;

    dispatcher.resize(640, 480);
    dispatcher.set_fb_scale(1.0, 1.0);

    let started = Instant::now();
    let mut fatal = None;
    for frame in 0..args.frames {
        if args.switch_at == Some(frame) {
            if let Some(name) = &args.switch_to {
                tracing::info!(frame, backend = %name, "switching backend");
                dispatcher.request_backend_switch(name);
            }
        }

        let ctx = if every(args.empty_every, frame) {
            None
        } else {
            let mut ctx = pool.acquire(frame);
            synthesize(&mut ctx, frame);
            ctx.rend.overrun = every(args.overrun_every, frame);
            Some(ctx)
        };
        let regs = PvrRegs {
            fb_w_sof1: if every(args.rtt_every, frame) {
                FB_W_SOF1_RTT_BIT
            } else {
                0
            },
            fb_x_clip: 639 << 16,
            fb_y_clip: 479 << 16,
            fb_r_ctrl: FB_R_CTRL_ENABLE_BIT,
            ..PvrRegs::default()
        };

        if let Err(err) = dispatcher.start_render(ctx, &regs) {
            fatal = Some(err);
            break;
        }
        dispatcher.end_render();
        dispatcher.mark_framebuffer_dirty();
        if let Err(err) = dispatcher.on_vblank(&regs) {
            fatal = Some(err);
            break;
        }
    }
    dispatcher.end_render();
    let elapsed = started.elapsed();
    let backend = dispatcher.active_backend().map(|info| info.name);

    dispatcher.shutdown();
    render_thread
        .join()
        .map_err(|_| anyhow!("render thread panicked"))?;

    // A failure on the last interval is only visible once the render thread is done.
    let fatal = fatal.or_else(|| dispatcher.fatal_error());
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    Ok(Summary {
        backend,
        timing: args.timing,
        frames: args.frames,
        elapsed_ms,
        intervals_per_sec: if elapsed_ms > 0.0 {
            args.frames as f64 * 1000.0 / elapsed_ms
        } else {
            0.0
        },
        contexts_outstanding: pool.outstanding(),
        stats: dispatcher.stats(),
        fatal: fatal.map(|err| err.to_string()),
    })
}

fn print_summary(summary: &Summary) {
    let s = &summary.stats;
    println!(
        "backend: {}",
        summary.backend.as_deref().unwrap_or("<none active>")
    );
    println!(
        "intervals: {} in {:.1} ms ({:.1}/s, {:?})",
        summary.frames, summary.elapsed_ms, summary.intervals_per_sec, summary.timing
    );
    println!(
        "frames: {} dispatched ({} rtt), {} empty, {} overrun",
        s.frames_dispatched, s.rtt_frames, s.empty_frames, s.overruns
    );
    println!(
        "presents: {} frames, {} framebuffer; {} process failures",
        s.frames_presented, s.framebuffer_presents, s.process_failures
    );
    println!(
        "backend inits: {} ({} via fallback)",
        s.backend_inits, s.backend_fallbacks
    );
    println!(
        "max usage: idx={} verts={} op={} pt={} tr={} mvo={} modtrig={}",
        s.max_usage.idx,
        s.max_usage.verts,
        s.max_usage.global_param_op,
        s.max_usage.global_param_pt,
        s.max_usage.global_param_tr,
        s.max_usage.global_param_mvo,
        s.max_usage.modtrig
    );
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let summary = run(&args)?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("failed to encode summary")?
        );
    } else {
        print_summary(&summary);
    }

    if let Some(fatal) = &summary.fatal {
        bail!("renderer failed: {fatal}");
    }
    if summary.contexts_outstanding != 0 {
        bail!(
            "{} render contexts were never returned",
            summary.contexts_outstanding
        );
    }
    Ok(())
}
