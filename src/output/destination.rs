//! Destination resource lifetime.
//!
//! A sender publishes into one transport-owned destination (NDI frame descriptor,
//! Metal texture). Allocating it per frame is wasteful, so the slot keeps it alive
//! across frames and only replaces it when the incoming frame size changes.

use crate::output::error::TransportError;
use crate::{loge, logi};

pub struct DestinationSlot<R> {
    tag: &'static str,
    resource: Option<R>,
    /// Size requested by the most recent `ensure`, whether or not it succeeded.
    requested: Option<(u32, u32)>,
    allocations: usize,
}

impl<R> DestinationSlot<R> {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            resource: None,
            requested: None,
            allocations: 0,
        }
    }

    /// Return the destination sized `width x height`, (re)allocating it on a size change.
    ///
    /// A failed allocation is logged and remembered: frames of that size get `None`
    /// without retrying until a frame of a different size arrives.
    pub fn ensure<F>(&mut self, width: u32, height: u32, allocate: F) -> Option<&mut R>
    where
        F: FnOnce(u32, u32) -> Result<R, TransportError>,
    {
        if self.requested == Some((width, height)) {
            return self.resource.as_mut();
        }

        // Release the old destination before asking for the new one.
        self.resource = None;
        self.requested = Some((width, height));
        self.allocations += 1;

        match allocate(width, height) {
            Ok(r) => {
                logi!(self.tag, "destination (re)created: {width}x{height} (#{})", self.allocations);
                self.resource = Some(r);
                self.resource.as_mut()
            }
            Err(e) => {
                loge!(self.tag, "{e}");
                None
            }
        }
    }

    pub fn get(&self) -> Option<&R> {
        self.resource.as_ref()
    }

    /// Dimensions of the live destination, if any.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.resource.as_ref().and(self.requested)
    }

    /// Number of allocation attempts so far.
    #[cfg(test)]
    pub(crate) fn allocations(&self) -> usize {
        self.allocations
    }

    pub fn release(&mut self) -> Option<R> {
        self.requested = None;
        self.resource.take()
    }
}
