//! End-to-end pacing on a real render thread: the producer never gets more than one frame ahead,
//! and render-to-texture output is visible to the producer as soon as `end_render` returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use swirl_rend::{
    spawn_render_thread, BackendDescriptor, BackendRegistry, ContextPool, PvrRegs, RendConfig,
    RendContext, RenderDispatcher, Renderer, TaTiming, Vram, VramHandle, FB_R_CTRL_ENABLE_BIT,
    FB_W_SOF1_RTT_BIT,
};

const NO_FRAME: u64 = u64::MAX;

struct Pacer {
    vram: VramHandle,
    submitted: Arc<AtomicU64>,
    max_lead: Arc<AtomicU64>,
    cost: Duration,
    last: Option<(u64, bool)>,
}

impl Renderer for Pacer {
    fn init(&mut self) -> bool {
        true
    }

    fn process(&mut self, ctx: &RendContext) -> bool {
        let submitted = self.submitted.load(Ordering::SeqCst);
        self.max_lead
            .fetch_max(submitted.saturating_sub(ctx.frame), Ordering::SeqCst);
        thread::sleep(self.cost);
        self.last = Some((ctx.frame, ctx.rend.is_rtt));
        true
    }

    fn render(&mut self) -> bool {
        let Some((frame, rtt)) = self.last else {
            return false;
        };
        if rtt {
            // Give the producer every chance to race ahead of the write-back.
            thread::sleep(self.cost);
            self.vram
                .write(|bytes| bytes[..8].copy_from_slice(&frame.to_le_bytes()));
        }
        true
    }

    fn render_framebuffer(&mut self) -> bool {
        true
    }

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn set_fb_scale(&mut self, _x: f32, _y: f32) {}

    fn present(&mut self) {}
}

struct Run {
    elapsed: Duration,
    max_lead: u64,
    pool: Arc<ContextPool>,
}

fn run(timing: TaTiming, frames: u64, rtt_every: u64, cost: Duration) -> Run {
    let submitted = Arc::new(AtomicU64::new(0));
    let max_lead = Arc::new(AtomicU64::new(0));
    let vram = Vram::new(64);
    vram.write(|bytes| bytes[..8].copy_from_slice(&NO_FRAME.to_le_bytes()));

    let registry = BackendRegistry::new();
    {
        let submitted = submitted.clone();
        let max_lead = max_lead.clone();
        registry.register(BackendDescriptor::new("pacer", 1, move |vram| {
            Box::new(Pacer {
                vram: vram.clone(),
                submitted: submitted.clone(),
                max_lead: max_lead.clone(),
                cost,
                last: None,
            })
        }));
    }

    let pool = Arc::new(ContextPool::new());
    let config = RendConfig {
        timing,
        ..RendConfig::default()
    };
    let (mut dispatcher, endpoint) =
        RenderDispatcher::new(config, Arc::new(registry), vram.clone(), pool.clone());
    let render = spawn_render_thread(endpoint).unwrap();

    let fb = PvrRegs {
        fb_r_ctrl: FB_R_CTRL_ENABLE_BIT,
        ..PvrRegs::default()
    };
    let started = Instant::now();
    for frame in 0..frames {
        let rtt = rtt_every != 0 && frame % rtt_every == 0;
        let regs = PvrRegs {
            fb_w_sof1: if rtt { FB_W_SOF1_RTT_BIT } else { 0 },
            ..fb
        };

        submitted.store(frame, Ordering::SeqCst);
        dispatcher
            .start_render(Some(pool.acquire(frame)), &regs)
            .unwrap();
        dispatcher.end_render();

        if rtt {
            let stamp = vram.read(|bytes| u64::from_le_bytes(bytes[..8].try_into().unwrap()));
            assert_eq!(stamp, frame, "render-to-texture result not visible after end_render");
        }

        dispatcher.mark_framebuffer_dirty();
        dispatcher.on_vblank(&fb).unwrap();
    }
    dispatcher.end_render();
    let elapsed = started.elapsed();

    dispatcher.shutdown();
    render.join().unwrap();
    Run {
        elapsed,
        max_lead: max_lead.load(Ordering::SeqCst),
        pool,
    }
}

#[test]
fn lle_producer_is_paced_by_the_renderer() {
    let cost = Duration::from_millis(2);
    let run = run(TaTiming::Lle, 30, 0, cost);

    assert_eq!(run.max_lead, 0);
    // Every `end_render` waited for `process`.
    assert!(run.elapsed >= cost * 30, "{:?}", run.elapsed);
    assert_eq!(run.pool.outstanding(), 0);
}

#[test]
fn hle_producer_is_paced_by_the_renderer() {
    let run = run(TaTiming::Hle, 30, 0, Duration::from_millis(1));
    assert_eq!(run.max_lead, 0);
    assert_eq!(run.pool.outstanding(), 0);
}

#[test]
fn rtt_results_are_visible_after_end_render() {
    for timing in [TaTiming::Lle, TaTiming::Hle] {
        let run = run(timing, 24, 3, Duration::from_millis(1));
        assert_eq!(run.pool.outstanding(), 0);
    }
}
