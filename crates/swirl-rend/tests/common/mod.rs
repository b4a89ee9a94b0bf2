//! Shared helpers for `swirl-rend` integration tests.
//!
//! [`Mock`] is a scripted renderer that logs every call into a shared [`Events`] sink and flags
//! overlapping `process` calls.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use swirl_rend::{
    spawn_render_thread, BackendDescriptor, BackendRegistry, ContextPool, RendConfig,
    RendContext, RenderDispatcher, RenderThread, Renderer, Vram,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Created(&'static str),
    Init(&'static str),
    Process(&'static str, u64),
    Render(&'static str),
    RenderFramebuffer(&'static str),
    Present(&'static str),
    Resize(&'static str, u32, u32),
    Terminate(&'static str),
    Dropped(&'static str),
}

#[derive(Debug, Default)]
pub struct Events {
    log: Mutex<Vec<Event>>,
    in_process: AtomicBool,
    overlaps: AtomicU64,
}

impl Events {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, event: Event) {
        self.log.lock().unwrap().push(event);
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.log.lock().unwrap().contains(event)
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.log.lock().unwrap().iter().position(|e| e == event)
    }

    pub fn processed_frames(&self) -> Vec<u64> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::Process(_, frame) => Some(*frame),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.log.lock().unwrap().iter().filter(|e| pred(e)).count()
    }

    /// Number of `process` calls that started while another one was still running.
    pub fn overlaps(&self) -> u64 {
        self.overlaps.load(Ordering::SeqCst)
    }
}

/// Per-backend behavior.
#[derive(Debug, Clone)]
pub struct Script {
    pub init_ok: bool,
    pub process_ok: bool,
    pub render_ok: bool,
    pub process_delay: Duration,
    /// If set, `render` blocks until a unit arrives (or the sender is dropped).
    pub render_gate: Option<Receiver<()>>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            init_ok: true,
            process_ok: true,
            render_ok: true,
            process_delay: Duration::ZERO,
            render_gate: None,
        }
    }
}

impl Script {
    pub fn failing_init() -> Self {
        Self {
            init_ok: false,
            ..Self::default()
        }
    }

    /// Script whose `render` waits on the returned sender.
    pub fn gated() -> (Self, Sender<()>) {
        let (tx, rx) = channel::unbounded();
        (
            Self {
                render_gate: Some(rx),
                ..Self::default()
            },
            tx,
        )
    }
}

pub struct Mock {
    name: &'static str,
    script: Script,
    events: Arc<Events>,
}

impl Renderer for Mock {
    fn init(&mut self) -> bool {
        self.events.push(Event::Init(self.name));
        self.script.init_ok
    }

    fn process(&mut self, ctx: &RendContext) -> bool {
        if self.events.in_process.swap(true, Ordering::SeqCst) {
            self.events.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.events.push(Event::Process(self.name, ctx.frame));
        if !self.script.process_delay.is_zero() {
            std::thread::sleep(self.script.process_delay);
        }
        self.events.in_process.store(false, Ordering::SeqCst);
        self.script.process_ok
    }

    fn render(&mut self) -> bool {
        if let Some(gate) = &self.script.render_gate {
            let _ = gate.recv();
        }
        self.events.push(Event::Render(self.name));
        self.script.render_ok
    }

    fn render_framebuffer(&mut self) -> bool {
        self.events.push(Event::RenderFramebuffer(self.name));
        true
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.events.push(Event::Resize(self.name, width, height));
    }

    fn set_fb_scale(&mut self, _x: f32, _y: f32) {}

    fn present(&mut self) {
        self.events.push(Event::Present(self.name));
    }

    fn terminate(&mut self) {
        self.events.push(Event::Terminate(self.name));
    }
}

impl Drop for Mock {
    fn drop(&mut self) {
        self.events.push(Event::Dropped(self.name));
    }
}

pub fn register_mock(
    registry: &BackendRegistry,
    name: &'static str,
    priority: i32,
    script: Script,
    events: &Arc<Events>,
) {
    let events = Arc::clone(events);
    registry.register(BackendDescriptor::new(name, priority, move |_vram| {
        events.push(Event::Created(name));
        Box::new(Mock {
            name,
            script: script.clone(),
            events: Arc::clone(&events),
        })
    }));
}

/// Dispatcher plus a real render thread.
pub struct Rig {
    pub dispatcher: RenderDispatcher,
    pub pool: Arc<ContextPool>,
    thread: RenderThread,
}

/// Capture dispatcher logs in test output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

impl Rig {
    pub fn start(config: RendConfig, registry: BackendRegistry) -> Self {
        init_tracing();
        let pool = Arc::new(ContextPool::new());
        let (dispatcher, endpoint) =
            RenderDispatcher::new(config, Arc::new(registry), Vram::new(1024), pool.clone());
        let thread = spawn_render_thread(endpoint).expect("spawn render thread");
        Self {
            dispatcher,
            pool,
            thread,
        }
    }

    pub fn context(&self, frame: u64) -> Box<RendContext> {
        self.pool.acquire(frame)
    }

    /// Shut the dispatcher down and wait for the render thread to exit.
    pub fn finish(mut self) -> Arc<ContextPool> {
        self.dispatcher.shutdown();
        self.thread.join().expect("render thread panicked");
        self.pool
    }
}
