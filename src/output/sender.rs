//! Per-transport sender: `Uninitialized -> Ready -> Closed`, or `Inert` forever.
//!
//! The sender owns the transport handle and its destination slot. Every failure
//! below `send_image` / `close` is logged here and swallowed; the frame producer
//! never sees a transport error.

use framecast_engine::RasterImage;

use crate::output::convert::{convert, PixelPolicy};
use crate::output::destination::DestinationSlot;
use crate::output::{FrameLayout, FrameRate, FrameSender, SenderStats, Transport};
use crate::{loge, logi, logw};

/// Per-sender settings resolved from the settings record.
#[derive(Debug, Clone, PartialEq)]
pub struct SenderConfig {
    /// Advertised name (NDI source name, Syphon server name).
    pub name: String,
    pub policy: PixelPolicy,
    pub frame_rate: FrameRate,
}

enum SenderState<T: Transport> {
    Uninitialized,
    /// Transport unavailable or handle creation failed. Behaves like `NullSender`.
    Inert,
    Ready {
        handle: T::Handle,
        slot: DestinationSlot<T::Destination>,
    },
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Inert,
    Ready,
    Closed,
}

pub struct TransportSender<T: Transport> {
    transport: T,
    cfg: SenderConfig,
    state: SenderState<T>,
    stats: SenderStats,
}

impl<T: Transport> TransportSender<T> {
    pub fn new(transport: T, cfg: SenderConfig) -> Self {
        Self {
            transport,
            cfg,
            state: SenderState::Uninitialized,
            stats: SenderStats::default(),
        }
    }

    /// Construct and initialize in one step.
    pub fn open(transport: T, available: bool, cfg: SenderConfig) -> Self {
        let mut sender = Self::new(transport, cfg);
        sender.initialize(available);
        sender
    }

    /// Move out of `Uninitialized`. Only the first call has any effect.
    ///
    /// Ends `Ready` when the transport probed available and the handle was created,
    /// `Inert` otherwise.
    pub fn initialize(&mut self, available: bool) -> bool {
        if !matches!(self.state, SenderState::Uninitialized) {
            return self.is_active();
        }

        if !available {
            logw!(T::TAG, "{} not available. {} send is disabled.", T::TAG, T::TAG);
            self.state = SenderState::Inert;
            return false;
        }

        match self.transport.create_handle(&self.cfg.name) {
            Ok(handle) => {
                logi!(T::TAG, "sender initialized: {}", self.cfg.name);
                self.state = SenderState::Ready {
                    handle,
                    slot: DestinationSlot::new(T::TAG),
                };
                true
            }
            Err(e) => {
                loge!(T::TAG, "{e}");
                self.state = SenderState::Inert;
                false
            }
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            SenderState::Uninitialized => Phase::Uninitialized,
            SenderState::Inert => Phase::Inert,
            SenderState::Ready { .. } => Phase::Ready,
            SenderState::Closed => Phase::Closed,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Size of the live destination, if the sender is `Ready` and holds one.
    pub fn destination_size(&self) -> Option<(u32, u32)> {
        match &self.state {
            SenderState::Ready { slot, .. } => slot.size(),
            _ => None,
        }
    }

    pub fn destination(&self) -> Option<&T::Destination> {
        match &self.state {
            SenderState::Ready { slot, .. } => slot.get(),
            _ => None,
        }
    }
}

impl<T: Transport> FrameSender for TransportSender<T> {
    fn send_image(&mut self, image: &RasterImage) {
        let SenderState::Ready { handle, slot } = &mut self.state else {
            return;
        };

        let (width, height) = image.size();
        let transport = &mut self.transport;
        let Some(dest) = slot.ensure(width, height, |w, h| transport.allocate(handle, w, h)) else {
            self.stats.dropped += 1;
            return;
        };

        let pixels = convert(image, self.cfg.policy);
        let layout = FrameLayout::packed(width, height, self.cfg.frame_rate);

        match self.transport.publish(handle, dest, &layout, pixels) {
            Ok(()) => self.stats.published += 1,
            Err(e) => {
                self.stats.failed += 1;
                loge!(T::TAG, "{e}");
            }
        }
    }

    fn close(&mut self) {
        match std::mem::replace(&mut self.state, SenderState::Closed) {
            SenderState::Ready { handle, mut slot } => {
                drop(slot.release());
                match self.transport.release(handle) {
                    Ok(()) => logi!(T::TAG, "sender closed: {}", self.cfg.name),
                    Err(e) => loge!(T::TAG, "{e}"),
                }
            }
            SenderState::Uninitialized | SenderState::Inert | SenderState::Closed => {}
        }
    }

    fn is_active(&self) -> bool {
        matches!(self.state, SenderState::Ready { .. })
    }

    fn label(&self) -> &'static str {
        T::TAG
    }

    fn stats(&self) -> SenderStats {
        self.stats
    }
}

impl<T: Transport> Drop for TransportSender<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::error::TransportError;
    use crate::output::null::NullSender;
    use crate::output::testing::{rgba, FakeTransport};

    fn cfg() -> SenderConfig {
        SenderConfig {
            name: "test".into(),
            policy: PixelPolicy::ndi(false),
            frame_rate: FrameRate::default(),
        }
    }

    fn ready() -> TransportSender<FakeTransport> {
        TransportSender::open(FakeTransport::default(), true, cfg())
    }

    #[test]
    fn starts_uninitialized_and_ignores_frames() {
        let mut s = TransportSender::new(FakeTransport::default(), cfg());
        assert_eq!(s.phase(), Phase::Uninitialized);
        s.send_image(&rgba(2, 2));
        assert_eq!(s.transport().log.total(), 0);
    }

    #[test]
    fn ready_sender_publishes_converted_frame() {
        let mut s = ready();
        assert_eq!(s.phase(), Phase::Ready);

        let img = RasterImage::from_rgba(1, 1, vec![1, 2, 3, 255]).unwrap();
        s.send_image(&img);

        let t = s.transport();
        assert_eq!(t.log.publishes, 1);
        assert_eq!(t.last_pixels.as_deref(), Some(&[3u8, 2, 1, 255][..]));
        let layout = t.last_layout.unwrap();
        assert_eq!((layout.width, layout.height, layout.line_stride), (1, 1, 4));
        assert_eq!(layout.frame_rate, FrameRate::new(60, 1));
        assert_eq!(s.stats().published, 1);
    }

    #[test]
    fn destination_is_reused_until_size_changes() {
        let mut s = ready();
        s.send_image(&rgba(640, 480));
        let first = s.destination().map(|d| d.id);
        s.send_image(&rgba(640, 480));
        assert_eq!(s.destination().map(|d| d.id), first);
        assert_eq!(s.transport().log.allocations, 1);

        s.send_image(&rgba(1280, 720));
        assert_ne!(s.destination().map(|d| d.id), first);
        assert_eq!(s.destination_size(), Some((1280, 720)));
        assert_eq!(s.transport().log.allocations, 2);
    }

    #[test]
    fn unavailable_transport_never_touches_native_side() {
        let mut s = TransportSender::open(FakeTransport::default(), false, cfg());
        let mut null = NullSender::new("TEST");

        assert_eq!(s.phase(), Phase::Inert);
        for img in [rgba(1, 1), rgba(4, 4), rgba(0, 0)] {
            s.send_image(&img);
            null.send_image(&img);
        }
        s.close();
        null.close();

        assert_eq!(s.transport().log.total(), 0);
        assert_eq!(s.is_active(), null.is_active());
        assert_eq!(s.stats(), null.stats());
    }

    #[test]
    fn failed_handle_creation_leaves_sender_inert() {
        let t = FakeTransport { fail_create: true, ..Default::default() };
        let mut s = TransportSender::open(t, true, cfg());

        assert_eq!(s.phase(), Phase::Inert);
        assert!(!s.initialize(true));
        s.send_image(&rgba(2, 2));
        s.close();

        let log = &s.transport().log;
        assert_eq!(log.creates, 1);
        assert_eq!(log.total(), 1);
    }

    #[test]
    fn publish_failure_drops_only_that_frame() {
        let t = FakeTransport { fail_publish_on: vec![1], ..Default::default() };
        let mut s = TransportSender::open(t, true, cfg());

        for _ in 0..3 {
            s.send_image(&rgba(2, 2));
        }

        assert_eq!(s.phase(), Phase::Ready);
        assert_eq!(s.transport().log.publishes, 3);
        assert_eq!(s.stats(), SenderStats { published: 2, dropped: 0, failed: 1 });
    }

    #[test]
    fn allocation_failure_drops_frames_until_size_changes() {
        let t = FakeTransport { fail_alloc_at: Some((3, 3)), ..Default::default() };
        let mut s = TransportSender::open(t, true, cfg());

        s.send_image(&rgba(3, 3));
        s.send_image(&rgba(3, 3));
        assert_eq!(s.transport().log.publishes, 0);
        assert_eq!(s.transport().log.allocations, 1);
        assert_eq!(s.stats().dropped, 2);

        s.send_image(&rgba(4, 4));
        assert_eq!(s.transport().log.publishes, 1);
        assert_eq!(s.destination_size(), Some((4, 4)));
    }

    #[test]
    fn close_is_idempotent_and_absorbing() {
        let mut s = ready();
        s.send_image(&rgba(2, 2));
        s.close();
        let after_first = s.transport().log.clone();
        assert_eq!(after_first.releases, 1);
        assert_eq!(s.phase(), Phase::Closed);

        s.close();
        s.send_image(&rgba(2, 2));
        assert_eq!(s.transport().log, after_first);
        assert_eq!(s.stats().published, 1);
        assert!(!s.initialize(true));
        assert_eq!(s.phase(), Phase::Closed);
    }

    #[test]
    fn close_drops_the_destination_before_releasing_the_handle() {
        let mut s = ready();
        s.send_image(&rgba(2, 2));
        assert_eq!(s.transport().destinations_dropped.get(), 0);

        s.close();
        let t = s.transport();
        assert_eq!(t.destinations_dropped.get(), 1);
        assert_eq!(t.dropped_before_release, Some(1));

        s.close();
        assert_eq!(s.transport().destinations_dropped.get(), 1);
    }

    #[test]
    fn each_size_change_drops_exactly_one_destination() {
        let mut s = ready();
        for (w, h) in [(2, 2), (2, 2), (4, 2), (4, 2), (2, 2)] {
            s.send_image(&rgba(w, h));
        }
        assert_eq!(s.transport().log.allocations, 3);
        assert_eq!(s.transport().destinations_dropped.get(), 2);

        s.close();
        assert_eq!(s.transport().destinations_dropped.get(), 3);
    }

    #[test]
    fn closing_without_a_destination_still_releases_the_handle() {
        let mut s = ready();
        s.close();
        assert_eq!(s.transport().dropped_before_release, Some(0));
        assert_eq!(s.transport().log.releases, 1);
    }

    #[test]
    fn teardown_failure_still_closes() {
        let t = FakeTransport { fail_release: true, ..Default::default() };
        let mut s = TransportSender::open(t, true, cfg());
        s.close();
        assert_eq!(s.phase(), Phase::Closed);
        assert_eq!(s.transport().log.releases, 1);
    }

    #[test]
    fn flip_policy_reaches_the_transport() {
        let mut s = TransportSender::open(
            FakeTransport::default(),
            true,
            SenderConfig { policy: PixelPolicy::syphon(true), ..cfg() },
        );
        let img = RasterImage::from_rgba(1, 2, vec![1, 1, 1, 1, 2, 2, 2, 2]).unwrap();
        s.send_image(&img);
        assert_eq!(
            s.transport().last_pixels.as_deref(),
            Some(&[2u8, 2, 2, 2, 1, 1, 1, 1][..])
        );
    }

    #[test]
    fn errors_name_their_transport() {
        let e = TransportError::Publish { transport: "NDI", reason: "x".into() };
        assert_eq!(e.transport(), "NDI");
        assert_eq!(e.to_string(), "NDI send failed: x");
    }
}
