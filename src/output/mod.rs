//! Output backends
//!
//! framecast publishes every produced frame to the enabled transports:
//! - **NDI**: network video source (BGRA frames), feature `ndi`
//! - **Syphon**: macOS Metal texture sharing (RGBA, optional vertical flip)
//! - **Null**: stand-in when a transport is disabled or could not be initialized
//!
//! The producer stays in control: frames are handed to each sender synchronously on
//! the calling thread. Backends are thin adapters (`Transport`) that translate
//! "packed pixels + layout" into the native API; all state and failure handling
//! lives in `TransportSender`.

pub mod convert;
pub mod destination;
pub mod error;
pub mod ndi;
pub mod null;
pub mod probe;
pub mod sender;
pub mod syphon;

#[cfg(test)]
pub(crate) mod testing;

use framecast_engine::{BroadcastSettings, NdiSettings, RasterImage, SyphonSettings};

use crate::logi;
use crate::output::convert::{packed_stride, PixelPolicy};
use crate::output::error::TransportError;
use crate::output::ndi::NdiTransport;
use crate::output::null::NullSender;
use crate::output::probe::TransportAvailability;
use crate::output::sender::{SenderConfig, TransportSender};
use crate::output::syphon::SyphonTransport;

/// Frame rate hint attached to every published frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct FrameRate {
    pub numerator: i32,
    pub denominator: i32,
}

impl FrameRate {
    pub const fn new(numerator: i32, denominator: i32) -> Self {
        Self { numerator, denominator }
    }

    pub fn as_f64(self) -> f64 {
        self.numerator.max(1) as f64 / self.denominator.max(1) as f64
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::new(60, 1)
    }
}

/// Metadata the sender fills in for each frame before handing it to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub line_stride: usize,
    pub frame_rate: FrameRate,
}

impl FrameLayout {
    /// 4 bytes per pixel, no row padding.
    pub fn packed(width: u32, height: u32, frame_rate: FrameRate) -> Self {
        Self {
            width,
            height,
            line_stride: packed_stride(width),
            frame_rate,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.line_stride * self.height as usize
    }
}

/// Native surface of one transport, fixed at build time.
pub trait Transport {
    /// Log tag; also the transport name carried by `TransportError`.
    const TAG: &'static str;

    /// Send instance / server, released exactly once.
    type Handle;

    /// Frame descriptor / texture sized to the current frame.
    type Destination;

    fn create_handle(&mut self, name: &str) -> Result<Self::Handle, TransportError>;

    fn allocate(
        &mut self,
        handle: &Self::Handle,
        width: u32,
        height: u32,
    ) -> Result<Self::Destination, TransportError>;

    /// `pixels` is already converted and owned; `layout.byte_len() == pixels.len()`.
    fn publish(
        &mut self,
        handle: &mut Self::Handle,
        dest: &mut Self::Destination,
        layout: &FrameLayout,
        pixels: Vec<u8>,
    ) -> Result<(), TransportError>;

    fn release(&mut self, handle: Self::Handle) -> Result<(), TransportError>;
}

/// Per-sender frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SenderStats {
    /// Frames handed to the native publish call successfully.
    pub published: u64,
    /// Frames skipped because no destination could be allocated at their size.
    pub dropped: u64,
    /// Frames whose native publish call failed.
    pub failed: u64,
}

/// Uniform contract of every sender, active or not.
pub trait FrameSender {
    /// Publish one frame. Never fails from the caller's point of view.
    fn send_image(&mut self, image: &RasterImage);

    /// Release native resources. Idempotent; later `send_image` calls are no-ops.
    fn close(&mut self);

    fn is_active(&self) -> bool;

    fn label(&self) -> &'static str;

    fn stats(&self) -> SenderStats;
}

/// NDI sender for `settings`, or a `NullSender` when NDI output is disabled.
pub fn ndi_sender(settings: &NdiSettings, available: bool) -> Box<dyn FrameSender> {
    if !settings.enabled {
        return Box::new(NullSender::new(NdiTransport::TAG));
    }
    let cfg = SenderConfig {
        name: settings.name.clone(),
        policy: PixelPolicy::ndi(settings.flip_vertical),
        frame_rate: FrameRate::new(settings.fps_n, settings.fps_d),
    };
    Box::new(TransportSender::open(NdiTransport::new(settings), available, cfg))
}

/// Syphon sender for `settings`, or a `NullSender` when Syphon output is disabled.
pub fn syphon_sender(settings: &SyphonSettings, available: bool) -> Box<dyn FrameSender> {
    if !settings.enabled {
        return Box::new(NullSender::new(SyphonTransport::TAG));
    }
    let cfg = SenderConfig {
        name: settings.name.clone(),
        policy: PixelPolicy::syphon(settings.flip_vertical),
        frame_rate: FrameRate::default(),
    };
    Box::new(TransportSender::open(SyphonTransport::new(), available, cfg))
}

/// All senders of one run, fed the same frames in a fixed order.
pub struct OutputSet {
    senders: Vec<Box<dyn FrameSender>>,
}

impl OutputSet {
    pub fn new(senders: Vec<Box<dyn FrameSender>>) -> Self {
        Self { senders }
    }

    pub fn from_settings(settings: &BroadcastSettings, availability: TransportAvailability) -> Self {
        let set = Self::new(vec![
            ndi_sender(&settings.ndi, availability.ndi),
            syphon_sender(&settings.syphon, availability.syphon),
        ]);
        logi!(
            "OUTPUT",
            "senders: {}",
            set.senders
                .iter()
                .map(|s| format!("{}={}", s.label(), if s.is_active() { "active" } else { "off" }))
                .collect::<Vec<_>>()
                .join(" ")
        );
        set
    }

    pub fn send_image(&mut self, image: &RasterImage) {
        for s in &mut self.senders {
            s.send_image(image);
        }
    }

    pub fn close(&mut self) {
        for s in &mut self.senders {
            s.close();
        }
    }

    pub fn active_count(&self) -> usize {
        self.senders.iter().filter(|s| s.is_active()).count()
    }

    pub fn stats(&self) -> Vec<(&'static str, SenderStats)> {
        self.senders.iter().map(|s| (s.label(), s.stats())).collect()
    }
}

impl Drop for OutputSet {
    fn drop(&mut self) {
        self.close();
    }
}
