//! Producer-side entry points.
//!
//! [`RenderDispatcher`] is driven by the producer's thread once per emulated frame interval:
//!
//! ```text
//! start_render(ctx) --> [job queued, pending] --> end_render() waits for the acknowledgment
//! on_vblank()       --> framebuffer present (timing dependent)
//! ```
//!
//! At most one render is pending at a time. `start_render` and the LLE `on_vblank` first wait for
//! the previous acknowledgment, so the capacity-1 job queue never blocks them.

use std::sync::Arc;

use crossbeam::channel::{self, SendError, Sender};

use crate::config::{BackendChoice, RendConfig, TaTiming};
use crate::context::{ContextRecycler, RendContext};
use crate::control::RendererControl;
use crate::error::{RendError, Result};
use crate::registry::{BackendInfo, BackendRegistry};
use crate::regs::PvrRegs;
use crate::stats::{DispatchStats, DispatchStatsSnapshot};
use crate::sync::{Acknowledgement, RenderSync};
use crate::vram::VramHandle;
use crate::worker::{RenderEndpoint, RenderJob};

/// One-shot debug switches, cleared on every vblank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpSwitches {
    pub frame: bool,
    pub vertices: bool,
}

/// Sees every non-null context before the overrun check, e.g. for frame dumps or checksum logs.
pub trait FrameObserver: Send {
    fn observe(&mut self, ctx: &RendContext, regs: &PvrRegs, dumps: DumpSwitches);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A frame job was queued and is pending.
    Dispatched { rtt: bool },
    /// No context: an empty job was queued and is pending.
    Empty,
    /// The context overran its buffers and was recycled without rendering.
    Dropped,
}

pub struct RenderDispatcher {
    config: RendConfig,
    jobs: Option<Sender<RenderJob>>,
    sync: Arc<RenderSync>,
    control: Arc<RendererControl>,
    stats: Arc<DispatchStats>,
    recycler: Arc<dyn ContextRecycler>,
    observers: Vec<Box<dyn FrameObserver>>,
    render_called: bool,
    fb_dirty: bool,
    idle: bool,
    dumps: DumpSwitches,
}

impl RenderDispatcher {
    /// Create the dispatcher and the render-side endpoint it feeds.
    ///
    /// The backend is chosen from `config` when the first job reaches render execution, not here.
    pub fn new(
        config: RendConfig,
        registry: Arc<BackendRegistry>,
        vram: VramHandle,
        recycler: Arc<dyn ContextRecycler>,
    ) -> (Self, RenderEndpoint) {
        let (tx, rx) = channel::bounded(1);
        let sync = RenderSync::new();
        let control = Arc::new(RendererControl::new());
        let stats = Arc::new(DispatchStats::new());

        let endpoint = RenderEndpoint {
            jobs: rx,
            sync: Arc::clone(&sync),
            control: Arc::clone(&control),
            stats: Arc::clone(&stats),
            recycler: Arc::clone(&recycler),
            registry,
            choice: config.backend_choice(),
            vram,
        };

        let dispatcher = Self {
            config,
            jobs: Some(tx),
            sync,
            control,
            stats,
            recycler,
            observers: Vec::new(),
            render_called: false,
            fb_dirty: false,
            idle: false,
            dumps: DumpSwitches::default(),
        };
        (dispatcher, endpoint)
    }

    pub fn config(&self) -> &RendConfig {
        &self.config
    }

    pub fn add_observer(&mut self, observer: Box<dyn FrameObserver>) {
        self.observers.push(observer);
    }

    /// Hand one finished context (or none) to render execution.
    ///
    /// Blocks until the previous render, if any, has been acknowledged. After a fatal renderer
    /// error the context is recycled and the error returned; nothing is dispatched anymore.
    pub fn start_render(
        &mut self,
        ctx: Option<Box<RendContext>>,
        regs: &PvrRegs,
    ) -> Result<DispatchOutcome> {
        self.render_called = true;
        self.sync.wait_idle();

        if let Some(err) = self.control.fatal() {
            if let Some(ctx) = ctx {
                self.recycler.recycle(ctx);
            }
            return Err(err);
        }

        self.stats.record_start();

        let Some(mut ctx) = ctx else {
            self.stats.record_empty();
            let ack = self.sync.begin();
            self.enqueue(RenderJob::Empty { ack })?;
            return Ok(DispatchOutcome::Empty);
        };

        for observer in &mut self.observers {
            observer.observe(&ctx, regs, self.dumps);
        }

        if ctx.rend.overrun {
            let overruns = self.stats.record_overrun();
            tracing::warn!(
                frame = ctx.frame,
                overruns,
                "rendering context is overrun; frame dropped"
            );
            self.recycler.recycle(ctx);
            return Ok(DispatchOutcome::Dropped);
        }

        let rtt = regs.is_rtt();
        ctx.rend.is_rtt = rtt;
        ctx.rend.fb_x_clip = regs.fb_x_clip;
        ctx.rend.fb_y_clip = regs.fb_y_clip;
        ctx.rend.fog_clamp_min = regs.fog_clamp_min;
        ctx.rend.fog_clamp_max = regs.fog_clamp_max;

        self.stats.record_usage(&ctx.usage);
        self.stats.record_dispatch(rtt);

        let ack = Acknowledgement::for_frame(self.sync.begin(), rtt);
        self.enqueue(RenderJob::Frame { ctx, ack })?;
        Ok(DispatchOutcome::Dispatched { rtt })
    }

    /// Wait for the pending render's acknowledgment. Returns immediately if nothing is pending.
    ///
    /// While the host is idle the wait is bounded by `idle_wait_ms`; returns `false` if it expired
    /// with the render still pending.
    pub fn end_render(&self) -> bool {
        if self.idle {
            self.sync.wait_idle_timeout(self.config.idle_wait())
        } else {
            self.sync.wait_idle();
            true
        }
    }

    /// Vertical blank: present the framebuffer when the timing model calls for it.
    pub fn on_vblank(&mut self, regs: &PvrRegs) -> Result<()> {
        let result = match self.config.timing {
            TaTiming::Lle => {
                self.fb_dirty = true;
                if regs.fb_enabled() {
                    self.fb_dirty = false;
                    self.sync.wait_idle();
                    match self.control.fatal() {
                        Some(err) => Err(err),
                        None => {
                            let ack = self.sync.begin();
                            self.enqueue(RenderJob::Framebuffer { ack: Some(ack) })
                        }
                    }
                } else {
                    Ok(())
                }
            }
            TaTiming::Hle => {
                if !self.render_called && self.fb_dirty && regs.fb_enabled() {
                    self.fb_dirty = false;
                    match self.control.fatal() {
                        Some(err) => Err(err),
                        None => self.enqueue(RenderJob::Framebuffer { ack: None }),
                    }
                } else {
                    Ok(())
                }
            }
        };

        self.render_called = false;
        self.dumps = DumpSwitches::default();
        result
    }

    /// The producer wrote to the framebuffer since the last present.
    pub fn mark_framebuffer_dirty(&mut self) {
        self.fb_dirty = true;
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.control.request_resize(width, height);
    }

    pub fn set_fb_scale(&self, x: f32, y: f32) {
        self.control.request_fb_scale(x, y);
    }

    /// Host is idle (menu open, emulation paused): bound the `end_render` wait.
    pub fn set_idle(&mut self, idle: bool) {
        self.idle = idle;
    }

    /// Retire the current renderer before the next job; `name` may be `auto`.
    pub fn request_backend_switch(&self, name: &str) {
        self.control.request_switch(BackendChoice::parse(name));
    }

    pub fn arm_frame_dump(&mut self) {
        self.dumps.frame = true;
    }

    pub fn arm_vertex_dump(&mut self) {
        self.dumps.vertices = true;
    }

    pub fn dump_switches(&self) -> DumpSwitches {
        self.dumps
    }

    pub fn is_pending(&self) -> bool {
        self.sync.is_pending()
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn fatal_error(&self) -> Option<RendError> {
        self.control.fatal()
    }

    pub fn active_backend(&self) -> Option<BackendInfo> {
        self.control.active()
    }

    /// Stop accepting jobs. Already queued jobs still run; the render loop exits afterwards.
    pub fn shutdown(&mut self) {
        if self.jobs.take().is_some() {
            tracing::debug!("render dispatcher shut down");
        }
    }

    fn enqueue(&mut self, job: RenderJob) -> Result<()> {
        let Some(jobs) = &self.jobs else {
            job.abandon(self.recycler.as_ref());
            return Err(RendError::RenderLoopClosed);
        };
        match jobs.send(job) {
            Ok(()) => {
                self.sync.signal_start();
                Ok(())
            }
            Err(SendError(job)) => {
                tracing::error!("render loop is gone; dropping job");
                job.abandon(self.recycler.as_ref());
                Err(RendError::RenderLoopClosed)
            }
        }
    }
}
