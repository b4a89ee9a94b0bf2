//! Register values the producer hands over at dispatch time.
//!
//! The dispatcher only needs a handful of PVR registers: the render-to-texture bit in `FB_W_SOF1`,
//! the framebuffer clip rectangle, the fog clamp colors and the framebuffer read enable. The
//! producer owns the real register file; it passes a copy of these values with every call.

/// `FB_W_SOF1` bit 24: the tile accelerator writes into texture memory instead of the framebuffer.
pub const FB_W_SOF1_RTT_BIT: u32 = 1 << 24;

/// `FB_R_CTRL` bit 0: framebuffer read (scanout) enable.
pub const FB_R_CTRL_ENABLE_BIT: u32 = 1 << 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PvrRegs {
    pub fb_w_sof1: u32,
    pub fb_x_clip: u32,
    pub fb_y_clip: u32,
    pub fog_clamp_min: u32,
    pub fog_clamp_max: u32,
    pub fb_r_ctrl: u32,
}

impl PvrRegs {
    pub fn is_rtt(&self) -> bool {
        self.fb_w_sof1 & FB_W_SOF1_RTT_BIT != 0
    }

    pub fn fb_enabled(&self) -> bool {
        self.fb_r_ctrl & FB_R_CTRL_ENABLE_BIT != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtt_bit_is_bit_24_of_fb_w_sof1() {
        let mut regs = PvrRegs::default();
        assert!(!regs.is_rtt());

        regs.fb_w_sof1 = 0x0020_0000;
        assert!(!regs.is_rtt());

        regs.fb_w_sof1 = 0x0120_0000;
        assert!(regs.is_rtt());
    }

    #[test]
    fn fb_enable_ignores_other_ctrl_bits() {
        let regs = PvrRegs {
            fb_r_ctrl: 0x0080_000c,
            ..PvrRegs::default()
        };
        assert!(!regs.fb_enabled());

        let regs = PvrRegs {
            fb_r_ctrl: 0x0080_000d,
            ..regs
        };
        assert!(regs.fb_enabled());
    }
}
