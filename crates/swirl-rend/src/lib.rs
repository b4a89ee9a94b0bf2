//! Render dispatch between the PowerVR tile accelerator front end and interchangeable renderer
//! backends.
//!
//! The producer (cycle-accurate emulation) finishes one command list per frame interval and hands
//! it to a [`RenderDispatcher`]. Render execution, a [`RenderLoop`] on its own thread or pumped by
//! the host UI loop, turns it into pixels through whichever [`Renderer`] the selector brought up:
//!
//! - [`BackendRegistry`]: named, priority-ranked backend factories
//! - [`BackendSelector`]: primary plus fallback, lazy init, switch-and-terminate
//! - [`RenderDispatcher`]: `start_render` / `end_render` / `on_vblank` with at most one render
//!   pending at a time; render-to-texture frames hold the producer until rendered
//! - [`RenderSync`] / [`AckToken`]: the handoff protocol; acknowledgments fire exactly once
//!
//! The crate installs no `tracing` subscriber; hosts decide where events go.

#![forbid(unsafe_code)]

mod config;
mod context;
mod control;
mod dispatch;
mod error;
mod registry;
mod regs;
mod renderer;
mod selector;
mod stats;
mod sync;
mod vram;
mod worker;

pub use config::{
    BackendChoice, RendConfig, TaTiming, ENV_BACKEND, ENV_IDLE_WAIT_MS, ENV_TA_TIMING,
};
pub use context::{ContextPool, ContextRecycler, PoolUsage, RendContext, RendParams};
pub use dispatch::{DispatchOutcome, DumpSwitches, FrameObserver, RenderDispatcher};
pub use error::{RendError, Result};
pub use registry::{
    register_builtin_backends, BackendDescriptor, BackendInfo, BackendRegistry, RendererFactory,
};
pub use regs::{PvrRegs, FB_R_CTRL_ENABLE_BIT, FB_W_SOF1_RTT_BIT};
pub use renderer::{NullRenderer, Renderer};
pub use selector::{ActiveRenderer, BackendSelector, InitOutcome};
pub use stats::{DispatchStats, DispatchStatsSnapshot, PoolHighWater};
pub use sync::{AckToken, Acknowledgement, RenderEvent, RenderSync};
pub use vram::{Vram, VramHandle};
pub use worker::{spawn_render_thread, RenderEndpoint, RenderJob, RenderLoop, RenderThread};
