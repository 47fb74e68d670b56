//! Syphon output (macOS only, only when Syphon is vendored)
//!
//! build.rs emits `--cfg has_syphon` when it finds vendor/Syphon.framework and compiles
//! native/syphon_metal_bridge.m. Every other build gets the stub below, which reports
//! Syphon unavailable so the sender stays inert.
//!
//! Frames are uploaded as RGBA8 into a Metal texture owned by the server's device and
//! published from there. The texture is kept until the frame size changes.

use crate::output::error::TransportError;
use crate::output::{FrameLayout, Transport};

pub const TAG: &str = "SYPHON";

#[derive(Debug, Default)]
pub struct SyphonTransport {
    _private: (),
}

impl SyphonTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for SyphonTransport {
    const TAG: &'static str = TAG;
    type Handle = bridge::SyphonServer;
    type Destination = bridge::MetalTexture;

    fn create_handle(&mut self, name: &str) -> Result<Self::Handle, TransportError> {
        bridge::SyphonServer::new(name)
    }

    fn allocate(
        &mut self,
        server: &Self::Handle,
        width: u32,
        height: u32,
    ) -> Result<Self::Destination, TransportError> {
        server.create_texture(width, height)
    }

    fn publish(
        &mut self,
        server: &mut Self::Handle,
        texture: &mut Self::Destination,
        layout: &FrameLayout,
        pixels: Vec<u8>,
    ) -> Result<(), TransportError> {
        texture.upload(layout, &pixels)?;
        server.publish(texture)
    }

    fn release(&mut self, server: Self::Handle) -> Result<(), TransportError> {
        drop(server);
        Ok(())
    }
}

pub fn probe_runtime() -> Result<(), TransportError> {
    bridge::runtime_ready()
}

fn checked_dims(width: u32, height: u32) -> Result<(i32, i32), TransportError> {
    let err = |reason: &str| TransportError::Allocation {
        transport: TAG,
        width,
        height,
        reason: reason.to_string(),
    };
    if width == 0 || height == 0 {
        return Err(err("zero-sized texture"));
    }
    let w = i32::try_from(width).map_err(|_| err("width exceeds i32"))?;
    let h = i32::try_from(height).map_err(|_| err("height exceeds i32"))?;
    Ok((w, h))
}

#[cfg(all(target_os = "macos", has_syphon))]
mod bridge {
    use std::ffi::{c_void, CString};

    use super::{checked_dims, TAG};
    use crate::output::error::TransportError;
    use crate::output::FrameLayout;

    extern "C" {
        fn syphon_metal_available() -> i32;
        fn syphon_metal_server_create(name_utf8: *const std::ffi::c_char) -> *mut c_void;
        fn syphon_metal_server_destroy(server: *mut c_void);
        fn syphon_metal_texture_create(server: *mut c_void, width: i32, height: i32) -> *mut c_void;
        fn syphon_metal_texture_release(texture: *mut c_void);
        fn syphon_metal_texture_upload(
            texture: *mut c_void,
            bytes: *const u8,
            width: i32,
            height: i32,
            bytes_per_row: i32,
        ) -> i32;
        fn syphon_metal_server_publish(server: *mut c_void, texture: *mut c_void) -> i32;
    }

    pub(super) fn runtime_ready() -> Result<(), TransportError> {
        if unsafe { syphon_metal_available() } == 1 {
            Ok(())
        } else {
            Err(TransportError::Unavailable {
                transport: TAG,
                reason: "no Metal device".into(),
            })
        }
    }

    pub struct SyphonServer {
        ptr: *mut c_void,
    }

    impl SyphonServer {
        pub fn new(name: &str) -> Result<Self, TransportError> {
            let c = CString::new(name).map_err(|_| TransportError::HandleCreate {
                transport: TAG,
                reason: format!("server name contains NUL: {name:?}"),
            })?;
            let ptr = unsafe { syphon_metal_server_create(c.as_ptr()) };
            if ptr.is_null() {
                Err(TransportError::HandleCreate {
                    transport: TAG,
                    reason: "SyphonMetalServer init failed".into(),
                })
            } else {
                Ok(Self { ptr })
            }
        }

        pub fn create_texture(&self, width: u32, height: u32) -> Result<MetalTexture, TransportError> {
            let (w, h) = checked_dims(width, height)?;
            let ptr = unsafe { syphon_metal_texture_create(self.ptr, w, h) };
            if ptr.is_null() {
                return Err(TransportError::Allocation {
                    transport: TAG,
                    width,
                    height,
                    reason: "MTLTexture allocation failed".into(),
                });
            }
            Ok(MetalTexture { ptr, width: w, height: h })
        }

        pub fn publish(&mut self, texture: &MetalTexture) -> Result<(), TransportError> {
            if unsafe { syphon_metal_server_publish(self.ptr, texture.ptr) } == 1 {
                Ok(())
            } else {
                Err(TransportError::Publish {
                    transport: TAG,
                    reason: "publishFrameTexture failed".into(),
                })
            }
        }
    }

    impl Drop for SyphonServer {
        fn drop(&mut self) {
            unsafe { syphon_metal_server_destroy(self.ptr) };
        }
    }

    pub struct MetalTexture {
        ptr: *mut c_void,
        width: i32,
        height: i32,
    }

    impl MetalTexture {
        pub fn upload(&mut self, layout: &FrameLayout, pixels: &[u8]) -> Result<(), TransportError> {
            let publish_err = |reason: String| TransportError::Publish { transport: TAG, reason };

            if (layout.width as i64, layout.height as i64) != (self.width as i64, self.height as i64) {
                return Err(publish_err(format!(
                    "frame is {}x{} but texture is {}x{}",
                    layout.width, layout.height, self.width, self.height
                )));
            }
            if pixels.len() < layout.byte_len() {
                return Err(publish_err(format!(
                    "expected {} bytes, got {}",
                    layout.byte_len(),
                    pixels.len()
                )));
            }
            let stride = i32::try_from(layout.line_stride)
                .map_err(|_| publish_err("row stride exceeds i32".into()))?;

            let ok = unsafe {
                syphon_metal_texture_upload(self.ptr, pixels.as_ptr(), self.width, self.height, stride)
            };
            if ok == 1 {
                Ok(())
            } else {
                Err(publish_err("texture upload failed".into()))
            }
        }
    }

    impl Drop for MetalTexture {
        fn drop(&mut self) {
            unsafe { syphon_metal_texture_release(self.ptr) };
        }
    }
}

#[cfg(not(all(target_os = "macos", has_syphon)))]
mod bridge {
    use super::{checked_dims, TAG};
    use crate::output::error::TransportError;
    use crate::output::FrameLayout;

    #[cfg(not(target_os = "macos"))]
    const UNAVAILABLE: &str = "Syphon is macOS-only";
    #[cfg(target_os = "macos")]
    const UNAVAILABLE: &str = "Syphon.framework was not vendored at build time";

    pub(super) fn runtime_ready() -> Result<(), TransportError> {
        Err(TransportError::Unavailable {
            transport: TAG,
            reason: UNAVAILABLE.into(),
        })
    }

    pub struct SyphonServer {
        _private: (),
    }

    impl SyphonServer {
        pub fn new(_name: &str) -> Result<Self, TransportError> {
            Err(TransportError::HandleCreate {
                transport: TAG,
                reason: UNAVAILABLE.into(),
            })
        }

        pub fn create_texture(&self, width: u32, height: u32) -> Result<MetalTexture, TransportError> {
            checked_dims(width, height)?;
            Err(TransportError::Allocation {
                transport: TAG,
                width,
                height,
                reason: UNAVAILABLE.into(),
            })
        }

        pub fn publish(&mut self, _texture: &MetalTexture) -> Result<(), TransportError> {
            Err(TransportError::Publish {
                transport: TAG,
                reason: UNAVAILABLE.into(),
            })
        }
    }

    pub struct MetalTexture {
        _private: (),
    }

    impl MetalTexture {
        pub fn upload(&mut self, _layout: &FrameLayout, _pixels: &[u8]) -> Result<(), TransportError> {
            Err(TransportError::Publish {
                transport: TAG,
                reason: UNAVAILABLE.into(),
            })
        }
    }
}

pub use bridge::{MetalTexture, SyphonServer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_dimensions_must_fit_metal() {
        assert_eq!(checked_dims(1920, 1080).unwrap(), (1920, 1080));
        assert!(matches!(
            checked_dims(0, 4),
            Err(TransportError::Allocation { width: 0, height: 4, .. })
        ));
        assert!(checked_dims(u32::MAX, 1).is_err());
    }

    #[cfg(not(all(target_os = "macos", has_syphon)))]
    #[test]
    fn stub_bridge_reports_unavailable() {
        let err = probe_runtime().unwrap_err();
        assert!(matches!(err, TransportError::Unavailable { transport: TAG, .. }));

        let mut t = SyphonTransport::new();
        assert!(matches!(
            t.create_handle("x"),
            Err(TransportError::HandleCreate { .. })
        ));
    }
}
