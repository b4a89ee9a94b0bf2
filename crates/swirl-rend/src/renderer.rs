use crate::context::RendContext;

/// Boundary between the dispatch core and a concrete rendering backend.
///
/// Every method is called from render execution only, one call at a time, so implementations do
/// not need interior synchronization and do not need to be `Send`: the selector constructs them on
/// the render side.
///
/// Guarantees made to implementations:
/// - `process` is never re-entered and never runs concurrently with any other method;
/// - every `process` call is followed by exactly one acknowledgment to the producer regardless of
///   its return value;
/// - `terminate` runs before the instance is dropped when the selector retires it.
pub trait Renderer {
    /// Acquire API resources. Returning `false` lets the selector fall back to another backend.
    fn init(&mut self) -> bool;

    /// Consume one frame's command list (geometry submission, texture uploads).
    ///
    /// Returning `false` signals an unrecoverable failure for this frame (e.g. exhausted GPU
    /// resources); the frame is then neither rendered nor presented.
    fn process(&mut self, ctx: &RendContext) -> bool;

    /// Draw the most recently processed frame. Returns whether there is something to present.
    fn render(&mut self) -> bool;

    /// Draw the emulated framebuffer directly (no tile accelerator frame this interval).
    fn render_framebuffer(&mut self) -> bool;

    fn resize(&mut self, width: u32, height: u32);

    fn set_fb_scale(&mut self, x: f32, y: f32);

    /// Swap the completed frame to the host surface.
    fn present(&mut self);

    /// Release cached textures and other GPU resources ahead of a backend switch or shutdown.
    fn terminate(&mut self) {}
}

/// Backend that accepts every frame and never produces output.
///
/// Registered as `none` with the lowest priority so headless hosts always have something to
/// dispatch to.
#[derive(Debug, Default)]
pub struct NullRenderer {
    frames: u64,
}

impl NullRenderer {
    pub const NAME: &'static str = "none";
    pub const PRIORITY: i32 = 0;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }
}

impl Renderer for NullRenderer {
    fn init(&mut self) -> bool {
        true
    }

    fn process(&mut self, _ctx: &RendContext) -> bool {
        self.frames += 1;
        true
    }

    fn render(&mut self) -> bool {
        false
    }

    fn render_framebuffer(&mut self) -> bool {
        false
    }

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn set_fb_scale(&mut self, _x: f32, _y: f32) {}

    fn present(&mut self) {}
}
