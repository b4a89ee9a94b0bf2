use std::thread;
use std::time::Duration;

use swirl_rend::{BackendDescriptor, RendContext, Renderer, VramHandle};

/// Simulated GPU cost per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Costs {
    pub process: Duration,
    pub present: Duration,
}

/// Backend that spends wall-clock time instead of drawing.
///
/// Render-to-texture frames stamp their frame number into the first VRAM bytes so the write-back
/// path touches shared memory the way a real backend would.
pub struct ThrottledRenderer {
    costs: Costs,
    vram: VramHandle,
    last: Option<(u64, bool)>,
    size: (u32, u32),
}

impl ThrottledRenderer {
    pub const NAME: &'static str = "throttled";
    pub const PRIORITY: i32 = 10;

    pub fn new(costs: Costs, vram: VramHandle) -> Self {
        Self {
            costs,
            vram,
            last: None,
            size: (640, 480),
        }
    }

    pub fn descriptor(costs: Costs) -> BackendDescriptor {
        BackendDescriptor::new(Self::NAME, Self::PRIORITY, move |vram| {
            Box::new(ThrottledRenderer::new(costs, vram.clone()))
        })
    }
}

impl Renderer for ThrottledRenderer {
    fn init(&mut self) -> bool {
        tracing::debug!(vram = self.vram.len(), "throttled renderer ready");
        true
    }

    fn process(&mut self, ctx: &RendContext) -> bool {
        if !self.costs.process.is_zero() {
            thread::sleep(self.costs.process);
        }
        self.last = Some((ctx.frame, ctx.rend.is_rtt));
        true
    }

    fn render(&mut self) -> bool {
        match self.last {
            Some((frame, true)) => {
                self.vram.write(|bytes| {
                    let stamp = frame.to_le_bytes();
                    let n = stamp.len().min(bytes.len());
                    bytes[..n].copy_from_slice(&stamp[..n]);
                });
                true
            }
            Some((_, false)) => true,
            None => false,
        }
    }

    fn render_framebuffer(&mut self) -> bool {
        true
    }

    fn resize(&mut self, width: u32, height: u32) {
        tracing::debug!(width, height, "throttled renderer resized");
        self.size = (width, height);
    }

    fn set_fb_scale(&mut self, _x: f32, _y: f32) {}

    fn present(&mut self) {
        if !self.costs.present.is_zero() {
            thread::sleep(self.costs.present);
        }
    }

    fn terminate(&mut self) {
        tracing::debug!(size = ?self.size, "throttled renderer terminated");
        self.last = None;
    }
}

/// Wraps another renderer and refuses to initialize; used to exercise the fallback path.
pub struct FailingInit(pub Box<dyn Renderer>);

impl Renderer for FailingInit {
    fn init(&mut self) -> bool {
        false
    }

    fn process(&mut self, ctx: &RendContext) -> bool {
        self.0.process(ctx)
    }

    fn render(&mut self) -> bool {
        self.0.render()
    }

    fn render_framebuffer(&mut self) -> bool {
        self.0.render_framebuffer()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.0.resize(width, height);
    }

    fn set_fb_scale(&mut self, x: f32, y: f32) {
        self.0.set_fb_scale(x, y);
    }

    fn present(&mut self) {
        self.0.present();
    }

    fn terminate(&mut self) {
        self.0.terminate();
    }
}
