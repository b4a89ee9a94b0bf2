//! Per-frame render contexts and their recycling path.
//!
//! A [`RendContext`] is built by the producer (the tile accelerator front end), handed to the
//! dispatcher by value, and always comes back through [`ContextRecycler::recycle`]. Because the
//! context travels as a `Box` and `recycle` consumes it, "returned exactly once" holds by
//! construction on every path: rendered, dropped for overrun, or rejected after a fatal error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Frame-level metadata attached to a context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendParams {
    /// The producer ran out of buffer space while building the command list.
    pub overrun: bool,
    /// Filled in at dispatch time from `FB_W_SOF1`.
    pub is_rtt: bool,
    pub fb_x_clip: u32,
    pub fb_y_clip: u32,
    pub fog_clamp_min: u32,
    pub fog_clamp_max: u32,
}

/// Element counts of the producer's internal buffer pools for one frame.
///
/// Only used to track high-water marks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolUsage {
    pub idx: usize,
    pub verts: usize,
    pub global_param_op: usize,
    pub global_param_pt: usize,
    pub global_param_tr: usize,
    pub global_param_mvo: usize,
    pub modtrig: usize,
}

/// One frame's worth of parsed drawing commands plus render metadata.
#[derive(Debug, Clone, Default)]
pub struct RendContext {
    pub frame: u64,
    /// Opaque command data; only backends interpret it.
    pub commands: Vec<u8>,
    pub rend: RendParams,
    pub usage: PoolUsage,
}

impl RendContext {
    pub fn new(frame: u64) -> Self {
        Self {
            frame,
            ..Self::default()
        }
    }

    /// Clear the context for reuse while keeping the command buffer allocation.
    pub fn reset(&mut self, frame: u64) {
        self.frame = frame;
        self.commands.clear();
        self.rend = RendParams::default();
        self.usage = PoolUsage::default();
    }
}

/// Producer-side sink that takes contexts back once the dispatcher is done with them.
///
/// Called from the producer thread (overruns, fatal rejection) as well as from render execution
/// (after a frame was consumed), hence `Send + Sync`.
pub trait ContextRecycler: Send + Sync {
    fn recycle(&self, ctx: Box<RendContext>);
}

/// Free-list backed context allocator.
///
/// Tracks how many contexts were handed out and how many came back so leaks (or double returns,
/// which the type system already rules out) show up in diagnostics.
#[derive(Debug, Default)]
pub struct ContextPool {
    free: Mutex<Vec<Box<RendContext>>>,
    acquired: AtomicU64,
    recycled: AtomicU64,
}

impl ContextPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a cleared context from the free list, allocating if it is empty.
    pub fn acquire(&self, frame: u64) -> Box<RendContext> {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        let reused = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        match reused {
            Some(mut ctx) => {
                ctx.reset(frame);
                ctx
            }
            None => Box::new(RendContext::new(frame)),
        }
    }

    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn recycled(&self) -> u64 {
        self.recycled.load(Ordering::Relaxed)
    }

    /// Contexts currently owned by the dispatcher or the producer.
    pub fn outstanding(&self) -> u64 {
        self.acquired().saturating_sub(self.recycled())
    }
}

impl ContextRecycler for ContextPool {
    fn recycle(&self, ctx: Box<RendContext>) {
        self.recycled.fetch_add(1, Ordering::Relaxed);
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ctx);
    }
}
