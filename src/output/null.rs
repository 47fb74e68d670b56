use framecast_engine::RasterImage;

use crate::output::{FrameSender, SenderStats};

/// Sender used when a transport is disabled or unavailable: every call is a no-op,
/// so the frame producer never has to branch on what is actually running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullSender {
    label: &'static str,
}

impl NullSender {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl FrameSender for NullSender {
    fn send_image(&mut self, _image: &RasterImage) {}

    fn close(&mut self) {}

    fn is_active(&self) -> bool {
        false
    }

    fn label(&self) -> &'static str {
        self.label
    }

    fn stats(&self) -> SenderStats {
        SenderStats::default()
    }
}
