use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

use crate::context::PoolUsage;

/// Counters shared by the producer and render execution.
#[derive(Debug, Default)]
pub struct DispatchStats {
    frames_started: AtomicU64,
    frames_dispatched: AtomicU64,
    empty_frames: AtomicU64,
    rtt_frames: AtomicU64,
    overruns: AtomicU64,
    process_failures: AtomicU64,
    frames_presented: AtomicU64,
    framebuffer_presents: AtomicU64,
    backend_inits: AtomicU64,
    backend_fallbacks: AtomicU64,
    max_usage: HighWater,
}

#[derive(Debug, Default)]
struct HighWater {
    idx: AtomicUsize,
    verts: AtomicUsize,
    global_param_op: AtomicUsize,
    global_param_pt: AtomicUsize,
    global_param_tr: AtomicUsize,
    global_param_mvo: AtomicUsize,
    modtrig: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolHighWater {
    pub idx: usize,
    pub verts: usize,
    pub global_param_op: usize,
    pub global_param_pt: usize,
    pub global_param_tr: usize,
    pub global_param_mvo: usize,
    pub modtrig: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStatsSnapshot {
    pub frames_started: u64,
    pub frames_dispatched: u64,
    pub empty_frames: u64,
    pub rtt_frames: u64,
    pub overruns: u64,
    pub process_failures: u64,
    pub frames_presented: u64,
    pub framebuffer_presents: u64,
    pub backend_inits: u64,
    pub backend_fallbacks: u64,
    pub max_usage: PoolHighWater,
}

fn bump(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_start(&self) {
        bump(&self.frames_started);
    }

    pub(crate) fn record_dispatch(&self, is_rtt: bool) {
        bump(&self.frames_dispatched);
        if is_rtt {
            bump(&self.rtt_frames);
        }
    }

    pub(crate) fn record_empty(&self) {
        bump(&self.empty_frames);
    }

    /// Returns the running overrun count.
    pub(crate) fn record_overrun(&self) -> u64 {
        bump(&self.overruns)
    }

    pub(crate) fn record_process_failure(&self) -> u64 {
        bump(&self.process_failures)
    }

    pub(crate) fn record_present(&self) {
        bump(&self.frames_presented);
    }

    pub(crate) fn record_framebuffer_present(&self) {
        bump(&self.framebuffer_presents);
    }

    pub(crate) fn record_backend_init(&self, fell_back: bool) {
        bump(&self.backend_inits);
        if fell_back {
            bump(&self.backend_fallbacks);
        }
    }

    pub(crate) fn record_usage(&self, usage: &PoolUsage) {
        let hw = &self.max_usage;
        hw.idx.fetch_max(usage.idx, Ordering::Relaxed);
        hw.verts.fetch_max(usage.verts, Ordering::Relaxed);
        hw.global_param_op
            .fetch_max(usage.global_param_op, Ordering::Relaxed);
        hw.global_param_pt
            .fetch_max(usage.global_param_pt, Ordering::Relaxed);
        hw.global_param_tr
            .fetch_max(usage.global_param_tr, Ordering::Relaxed);
        hw.global_param_mvo
            .fetch_max(usage.global_param_mvo, Ordering::Relaxed);
        hw.modtrig.fetch_max(usage.modtrig, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let hw = &self.max_usage;
        DispatchStatsSnapshot {
            frames_started: load(&self.frames_started),
            frames_dispatched: load(&self.frames_dispatched),
            empty_frames: load(&self.empty_frames),
            rtt_frames: load(&self.rtt_frames),
            overruns: load(&self.overruns),
            process_failures: load(&self.process_failures),
            frames_presented: load(&self.frames_presented),
            framebuffer_presents: load(&self.framebuffer_presents),
            backend_inits: load(&self.backend_inits),
            backend_fallbacks: load(&self.backend_fallbacks),
            max_usage: PoolHighWater {
                idx: hw.idx.load(Ordering::Relaxed),
                verts: hw.verts.load(Ordering::Relaxed),
                global_param_op: hw.global_param_op.load(Ordering::Relaxed),
                global_param_pt: hw.global_param_pt.load(Ordering::Relaxed),
                global_param_tr: hw.global_param_tr.load(Ordering::Relaxed),
                global_param_mvo: hw.global_param_mvo.load(Ordering::Relaxed),
                modtrig: hw.modtrig.load(Ordering::Relaxed),
            },
        }
    }
}
