//! In-memory transport that records every native call, for sender tests.

use std::cell::Cell;
use std::rc::Rc;

use framecast_engine::RasterImage;

use crate::output::error::TransportError;
use crate::output::{FrameLayout, Transport};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallLog {
    pub creates: usize,
    pub allocations: usize,
    pub publishes: usize,
    pub releases: usize,
}

impl CallLog {
    pub fn total(&self) -> usize {
        self.creates + self.allocations + self.publishes + self.releases
    }
}

#[derive(Debug)]
pub struct FakeDestination {
    pub id: usize,
    pub width: u32,
    pub height: u32,
    dropped: Rc<Cell<usize>>,
}

impl Drop for FakeDestination {
    fn drop(&mut self) {
        self.dropped.set(self.dropped.get() + 1);
    }
}

#[derive(Debug, Default)]
pub struct FakeTransport {
    pub fail_create: bool,
    pub fail_alloc_at: Option<(u32, u32)>,
    /// Zero-based publish call indices that fail.
    pub fail_publish_on: Vec<usize>,
    pub fail_release: bool,

    pub log: CallLog,
    pub last_pixels: Option<Vec<u8>>,
    pub last_layout: Option<FrameLayout>,

    /// Destinations dropped so far, shared with every `FakeDestination`.
    pub destinations_dropped: Rc<Cell<usize>>,
    /// `destinations_dropped` as seen by the handle release.
    pub dropped_before_release: Option<usize>,
}

impl Transport for FakeTransport {
    const TAG: &'static str = "FAKE";
    type Handle = ();
    type Destination = FakeDestination;

    fn create_handle(&mut self, _name: &str) -> Result<(), TransportError> {
        self.log.creates += 1;
        if self.fail_create {
            return Err(TransportError::HandleCreate { transport: Self::TAG, reason: "refused".into() });
        }
        Ok(())
    }

    fn allocate(&mut self, _handle: &(), width: u32, height: u32) -> Result<FakeDestination, TransportError> {
        self.log.allocations += 1;
        if self.fail_alloc_at == Some((width, height)) {
            return Err(TransportError::Allocation {
                transport: Self::TAG,
                width,
                height,
                reason: "refused".into(),
            });
        }
        Ok(FakeDestination {
            id: self.log.allocations,
            width,
            height,
            dropped: Rc::clone(&self.destinations_dropped),
        })
    }

    fn publish(
        &mut self,
        _handle: &mut (),
        dest: &mut FakeDestination,
        layout: &FrameLayout,
        pixels: Vec<u8>,
    ) -> Result<(), TransportError> {
        let index = self.log.publishes;
        self.log.publishes += 1;
        assert_eq!((dest.width, dest.height), (layout.width, layout.height));
        self.last_layout = Some(*layout);
        self.last_pixels = Some(pixels);
        if self.fail_publish_on.contains(&index) {
            return Err(TransportError::Publish { transport: Self::TAG, reason: "refused".into() });
        }
        Ok(())
    }

    fn release(&mut self, _handle: ()) -> Result<(), TransportError> {
        self.log.releases += 1;
        self.dropped_before_release = Some(self.destinations_dropped.get());
        if self.fail_release {
            return Err(TransportError::Teardown { transport: Self::TAG, reason: "refused".into() });
        }
        Ok(())
    }
}

/// Opaque RGBA raster of the given size.
pub fn rgba(width: u32, height: u32) -> RasterImage {
    let len = width as usize * height as usize * 4;
    RasterImage::from_rgba(width, height, vec![200; len]).unwrap()
}
