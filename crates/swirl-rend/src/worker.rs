//! Render execution: the side that owns the renderer and runs queued jobs strictly in order.
//!
//! A [`RenderEndpoint`] is the `Send` half handed out by the dispatcher. It becomes a
//! [`RenderLoop`] on whichever thread is going to render, either a dedicated thread
//! ([`spawn_render_thread`]) or a host UI loop calling [`RenderLoop::pump`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{Receiver, TryRecvError};

use crate::config::BackendChoice;
use crate::context::{ContextRecycler, RendContext};
use crate::control::{RendererControl, RendererRequests};
use crate::registry::BackendRegistry;
use crate::selector::BackendSelector;
use crate::stats::DispatchStats;
use crate::sync::{AckToken, Acknowledgement, RenderSync};
use crate::vram::VramHandle;

/// Unit of work queued from the producer.
#[derive(Debug)]
pub enum RenderJob {
    /// Process, render and present one tile accelerator frame.
    Frame {
        ctx: Box<RendContext>,
        ack: Acknowledgement,
    },
    /// `start_render` without a context: redraw the last processed frame, then release the
    /// producer.
    Empty { ack: AckToken },
    /// Present the emulated framebuffer. HLE vblanks carry no acknowledgment.
    Framebuffer { ack: Option<AckToken> },
}

impl RenderJob {
    /// Give back everything the job owns without rendering.
    pub(crate) fn abandon(self, recycler: &dyn ContextRecycler) {
        match self {
            RenderJob::Frame { ctx, ack } => {
                recycler.recycle(ctx);
                drop(ack);
            }
            RenderJob::Empty { ack } => ack.acknowledge(),
            RenderJob::Framebuffer { ack } => drop(ack),
        }
    }
}

/// Output size and scale last requested by the producer, replayed onto new renderers.
#[derive(Debug, Clone, Copy, Default)]
struct Viewport {
    size: Option<(u32, u32)>,
    scale: Option<(f32, f32)>,
}

pub(crate) struct RenderWorker {
    selector: BackendSelector,
    control: Arc<RendererControl>,
    stats: Arc<DispatchStats>,
    recycler: Arc<dyn ContextRecycler>,
    viewport: Viewport,
}

impl RenderWorker {
    pub fn new(
        selector: BackendSelector,
        control: Arc<RendererControl>,
        stats: Arc<DispatchStats>,
        recycler: Arc<dyn ContextRecycler>,
    ) -> Self {
        Self {
            selector,
            control,
            stats,
            recycler,
            viewport: Viewport::default(),
        }
    }

    pub fn run_job(&mut self, job: RenderJob) {
        match job {
            RenderJob::Frame { ctx, ack } => self.render_frame(ctx, ack),
            RenderJob::Empty { ack } => self.render_empty(ack),
            RenderJob::Framebuffer { ack } => self.render_framebuffer(ack),
        }
    }

    /// Apply pending requests and make sure a renderer is initialized. Returns `false` once a
    /// fatal error has been recorded.
    fn prepare(&mut self) -> bool {
        if self.control.fatal().is_some() {
            return false;
        }

        let requests = self.control.take_requests();
        if !requests.is_empty() {
            tracing::debug!(?requests, "applying renderer requests");
        }
        let RendererRequests {
            switch,
            resize,
            fb_scale,
        } = requests;

        if let Some(choice) = switch {
            self.selector.switch_backend(choice);
            self.control.set_active(None);
        }

        let fresh = match self.selector.ensure_initialized() {
            Ok(Some(outcome)) => {
                self.stats.record_backend_init(outcome.fell_back);
                self.control.set_active(Some(outcome.backend));
                true
            }
            Ok(None) => false,
            Err(err) => {
                tracing::error!(%err, "no usable renderer; rendering stops");
                self.control.record_fatal(err);
                return false;
            }
        };

        if resize.is_some() {
            self.viewport.size = resize;
        }
        if fb_scale.is_some() {
            self.viewport.scale = fb_scale;
        }

        let Some(active) = self.selector.active_mut() else {
            return false;
        };
        let renderer = active.renderer();
        if let Some((width, height)) = if fresh { self.viewport.size } else { resize } {
            renderer.resize(width, height);
        }
        if let Some((x, y)) = if fresh { self.viewport.scale } else { fb_scale } {
            renderer.set_fb_scale(x, y);
        }
        true
    }

    fn render_frame(&mut self, ctx: Box<RendContext>, ack: Acknowledgement) {
        if !self.prepare() {
            self.recycler.recycle(ctx);
            drop(ack);
            return;
        }
        let Some(active) = self.selector.active_mut() else {
            self.recycler.recycle(ctx);
            drop(ack);
            return;
        };
        let renderer = active.renderer();

        let frame = ctx.frame;
        let processed = renderer.process(&ctx);
        // The command list is fully consumed; the producer gets it back before it is released.
        self.recycler.recycle(ctx);

        if !processed {
            let failures = self.stats.record_process_failure();
            tracing::warn!(frame, failures, "renderer failed to process frame");
        }

        let held = ack.after_process(processed);
        let do_swap = processed && renderer.render();
        drop(held);

        if do_swap {
            renderer.present();
            self.stats.record_present();
        }
    }

    fn render_empty(&mut self, ack: AckToken) {
        if !self.prepare() {
            return;
        }
        let Some(active) = self.selector.active_mut() else {
            return;
        };
        let renderer = active.renderer();
        let do_swap = renderer.render();
        ack.acknowledge();
        if do_swap {
            renderer.present();
            self.stats.record_present();
        }
    }

    fn render_framebuffer(&mut self, ack: Option<AckToken>) {
        // Framebuffer presents never hold the producer beyond the start of the job.
        drop(ack);

        if !self.prepare() {
            return;
        }
        let Some(active) = self.selector.active_mut() else {
            return;
        };
        let renderer = active.renderer();
        if renderer.render_framebuffer() {
            renderer.present();
            self.stats.record_framebuffer_present();
        }
    }

    fn shutdown(&mut self) {
        self.selector.terminate();
        self.control.set_active(None);
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Everything render execution needs, minus the renderer itself.
///
/// Renderers are not required to be `Send`, so they are only constructed once the endpoint has
/// reached its rendering thread and been turned into a [`RenderLoop`].
pub struct RenderEndpoint {
    pub(crate) jobs: Receiver<RenderJob>,
    pub(crate) sync: Arc<RenderSync>,
    pub(crate) control: Arc<RendererControl>,
    pub(crate) stats: Arc<DispatchStats>,
    pub(crate) recycler: Arc<dyn ContextRecycler>,
    pub(crate) registry: Arc<BackendRegistry>,
    pub(crate) choice: BackendChoice,
    pub(crate) vram: VramHandle,
}

impl RenderEndpoint {
    pub fn into_loop(self) -> RenderLoop {
        let selector = BackendSelector::new(self.registry, self.choice, self.vram);
        RenderLoop {
            jobs: self.jobs,
            sync: self.sync,
            worker: RenderWorker::new(selector, self.control, self.stats, self.recycler),
        }
    }
}

pub struct RenderLoop {
    jobs: Receiver<RenderJob>,
    sync: Arc<RenderSync>,
    worker: RenderWorker,
}

impl RenderLoop {
    /// Run jobs until the dispatcher is dropped, then terminate the renderer.
    pub fn run(mut self) {
        tracing::debug!("render loop started");
        while let Ok(job) = self.jobs.recv() {
            self.worker.run_job(job);
        }
        self.worker.shutdown();
        tracing::debug!("render loop exited");
    }

    /// Wait up to `timeout` for `render_start`, then run every queued job.
    ///
    /// Returns the number of jobs run, or `None` once the dispatcher is gone and the queue is
    /// drained.
    pub fn pump(&mut self, timeout: Duration) -> Option<usize> {
        if self.jobs.is_empty() {
            // Timing out is fine: the queue is checked either way.
            self.sync.wait_start_timeout(timeout);
        }

        let mut ran = 0;
        loop {
            match self.jobs.try_recv() {
                Ok(job) => {
                    self.worker.run_job(job);
                    ran += 1;
                }
                Err(TryRecvError::Empty) => return Some(ran),
                Err(TryRecvError::Disconnected) => {
                    return if ran == 0 { None } else { Some(ran) };
                }
            }
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        // A host that stops pumping early must still hand back queued contexts.
        while let Ok(job) = self.jobs.try_recv() {
            job.abandon(self.worker.recycler.as_ref());
        }
    }
}

pub struct RenderThread {
    handle: JoinHandle<()>,
}

impl RenderThread {
    /// Wait for the render loop to exit. It exits once the dispatcher has been shut down or
    /// dropped.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub fn spawn_render_thread(endpoint: RenderEndpoint) -> std::io::Result<RenderThread> {
    let handle = thread::Builder::new()
        .name("swirl-render".to_string())
        .spawn(move || endpoint.into_loop().run())?;
    Ok(RenderThread { handle })
}
