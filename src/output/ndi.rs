//! NDI output (optional, feature-gated)
//!
//! Publishes frames as an NDI source (e.g. for OBS via DistroAV).
//! Build with: `cargo run --features ndi`
//!
//! Notes:
//! - We send BGRA (4 bytes/pixel, packed rows); the converter swizzles from RGBA.
//! - The grafton-ndi runtime, the send instance and the native video frame live on a
//!   dedicated `ndi` thread. Every request (allocate, send) waits for the worker's
//!   reply, so allocation and publish failures reach the sender as what they are.
//! - Without the feature the probe reports NDI unavailable.

use std::sync::mpsc;
use std::thread;

use framecast_engine::NdiSettings;

use crate::logw;
use crate::output::error::TransportError;
use crate::output::{FrameLayout, Transport};

pub const TAG: &str = "NDI";

/// `BGRA` as the little-endian FourCC NDI uses.
pub const FOURCC_BGRA: u32 = u32::from_le_bytes(*b"BGRA");

/// Rust-side description of one native video frame (`NDIlib_video_frame_v2_t`).
///
/// Size, FourCC and frame rate are fixed when the native frame is built; the line
/// stride is refreshed for every published frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub width: i32,
    pub height: i32,
    pub fourcc: u32,
    pub line_stride: i32,
    pub frame_rate_n: i32,
    pub frame_rate_d: i32,
}

impl FrameDescriptor {
    pub fn new(width: u32, height: u32, fps: (i32, i32)) -> Result<Self, TransportError> {
        let too_big = |reason: &str| TransportError::Allocation {
            transport: TAG,
            width,
            height,
            reason: reason.to_string(),
        };

        if width == 0 || height == 0 {
            return Err(too_big("zero-sized frame"));
        }
        let w = i32::try_from(width).map_err(|_| too_big("width exceeds i32"))?;
        let h = i32::try_from(height).map_err(|_| too_big("height exceeds i32"))?;
        let stride = w.checked_mul(4).ok_or_else(|| too_big("line stride exceeds i32"))?;

        Ok(Self {
            width: w,
            height: h,
            fourcc: FOURCC_BGRA,
            line_stride: stride,
            frame_rate_n: fps.0.max(1),
            frame_rate_d: fps.1.max(1),
        })
    }

    /// Check the next frame against this descriptor and take over its stride.
    pub fn fill(&mut self, layout: &FrameLayout, byte_len: usize) -> Result<(), TransportError> {
        let publish_err = |reason: String| TransportError::Publish { transport: TAG, reason };

        if (layout.width as i64, layout.height as i64) != (self.width as i64, self.height as i64) {
            return Err(publish_err(format!(
                "frame is {}x{} but descriptor is {}x{}",
                layout.width, layout.height, self.width, self.height
            )));
        }
        if byte_len != layout.byte_len() {
            return Err(publish_err(format!("expected {} bytes, got {byte_len}", layout.byte_len())));
        }
        let rate = (layout.frame_rate.numerator.max(1), layout.frame_rate.denominator.max(1));
        if rate != (self.frame_rate_n, self.frame_rate_d) {
            return Err(publish_err(format!(
                "frame rate {}/{} but descriptor is {}/{}",
                rate.0, rate.1, self.frame_rate_n, self.frame_rate_d
            )));
        }

        self.line_stride = i32::try_from(layout.line_stride)
            .map_err(|_| publish_err("line stride exceeds i32".into()))?;
        Ok(())
    }
}

type Connector = Box<dyn FnMut(&str) -> Result<NdiLink, TransportError>>;

pub struct NdiTransport {
    connect: Connector,
    fps: (i32, i32),
}

impl NdiTransport {
    pub fn new(settings: &NdiSettings) -> Self {
        let groups = settings.groups.clone();
        let clock_video = settings.clock_video;
        Self::with_connector((settings.fps_n, settings.fps_d), move |name: &str| {
            link::open(name, groups.as_deref(), clock_video)
        })
    }

    /// Transport whose send instance comes from `connect` instead of the NDI runtime.
    pub(crate) fn with_connector(
        fps: (i32, i32),
        connect: impl FnMut(&str) -> Result<NdiLink, TransportError> + 'static,
    ) -> Self {
        Self {
            connect: Box::new(connect),
            fps: (fps.0.max(1), fps.1.max(1)),
        }
    }
}

impl Transport for NdiTransport {
    const TAG: &'static str = TAG;
    type Handle = NdiLink;
    type Destination = NdiFrame;

    fn create_handle(&mut self, name: &str) -> Result<NdiLink, TransportError> {
        (self.connect)(name)
    }

    fn allocate(&mut self, link: &NdiLink, width: u32, height: u32) -> Result<NdiFrame, TransportError> {
        link.allocate(FrameDescriptor::new(width, height, self.fps)?)
    }

    fn publish(
        &mut self,
        link: &mut NdiLink,
        frame: &mut NdiFrame,
        layout: &FrameLayout,
        pixels: Vec<u8>,
    ) -> Result<(), TransportError> {
        frame.desc.fill(layout, pixels.len())?;
        link.send(frame, pixels)
    }

    fn release(&mut self, link: NdiLink) -> Result<(), TransportError> {
        link.shutdown()
    }
}

/// Requests handled by the `ndi` worker, in order.
pub enum NdiMsg {
    /// Build the native frame for `desc`, replacing any previous one.
    Allocate {
        desc: FrameDescriptor,
        reply: mpsc::SyncSender<Result<(), String>>,
    },
    /// Drop the native frame.
    Release,
    Frame {
        desc: FrameDescriptor,
        bgra: Vec<u8>,
        reply: mpsc::SyncSender<Result<(), String>>,
    },
    Stop,
}

/// Destination of the NDI sender: the native frame held by the worker.
///
/// Dropping it releases the native frame.
pub struct NdiFrame {
    desc: FrameDescriptor,
    tx: mpsc::SyncSender<NdiMsg>,
}

impl NdiFrame {
    pub fn descriptor(&self) -> &FrameDescriptor {
        &self.desc
    }
}

impl Drop for NdiFrame {
    fn drop(&mut self) {
        let _ = self.tx.send(NdiMsg::Release);
    }
}

/// Owns the `ndi` worker thread, which owns the runtime and the send instance.
pub struct NdiLink {
    tx: Option<mpsc::SyncSender<NdiMsg>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl NdiLink {
    /// Start the worker. `body` reports startup on its second argument, then serves requests.
    #[cfg_attr(not(feature = "ndi"), allow(dead_code))]
    fn spawn<W>(body: W) -> Result<Self, TransportError>
    where
        W: FnOnce(mpsc::Receiver<NdiMsg>, mpsc::SyncSender<Result<(), String>>) + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<NdiMsg>(1);
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);

        let worker = thread::Builder::new()
            .name("ndi".to_string())
            .spawn(move || body(rx, ready_tx))
            .map_err(|e| TransportError::HandleCreate {
                transport: TAG,
                reason: format!("spawn ndi thread: {e}"),
            })?;

        let reason = match ready_rx.recv() {
            Ok(Ok(())) => return Ok(Self { tx: Some(tx), worker: Some(worker) }),
            Ok(Err(reason)) => reason,
            Err(_) => "ndi thread exited during startup".to_string(),
        };
        drop(tx);
        let _ = worker.join();
        Err(TransportError::HandleCreate { transport: TAG, reason })
    }

    fn request(
        &self,
        make: impl FnOnce(mpsc::SyncSender<Result<(), String>>) -> NdiMsg,
    ) -> Result<(), String> {
        let tx = self.tx.as_ref().ok_or_else(|| "sender stopped".to_string())?;
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        tx.send(make(reply_tx)).map_err(|_| "ndi thread is gone".to_string())?;
        reply_rx
            .recv()
            .unwrap_or_else(|_| Err("ndi thread exited mid-request".to_string()))
    }

    pub fn allocate(&self, desc: FrameDescriptor) -> Result<NdiFrame, TransportError> {
        let alloc_err = |reason: String| TransportError::Allocation {
            transport: TAG,
            width: desc.width as u32,
            height: desc.height as u32,
            reason,
        };
        let tx = self.tx.clone().ok_or_else(|| alloc_err("sender stopped".into()))?;
        self.request(|reply| NdiMsg::Allocate { desc, reply }).map_err(alloc_err)?;
        Ok(NdiFrame { desc, tx })
    }

    pub fn send(&mut self, frame: &NdiFrame, bgra: Vec<u8>) -> Result<(), TransportError> {
        let desc = frame.desc;
        self.request(|reply| NdiMsg::Frame { desc, bgra, reply })
            .map_err(|reason| TransportError::Publish { transport: TAG, reason })
    }

    pub fn shutdown(mut self) -> Result<(), TransportError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(NdiMsg::Stop);
        }
        if let Some(h) = self.worker.take() {
            h.join().map_err(|_| TransportError::Teardown {
                transport: TAG,
                reason: "ndi thread panicked".into(),
            })?;
        }
        Ok(())
    }
}

impl Drop for NdiLink {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            logw!(TAG, "{e}");
        }
    }
}

/// Worker loop: `build` turns a descriptor into a native frame, `send` publishes into it.
#[cfg_attr(not(feature = "ndi"), allow(dead_code))]
fn serve<F>(
    rx: mpsc::Receiver<NdiMsg>,
    mut build: impl FnMut(&FrameDescriptor) -> Result<F, String>,
    mut send: impl FnMut(&mut F, &FrameDescriptor, Vec<u8>) -> Result<(), String>,
) {
    let mut native: Option<(FrameDescriptor, F)> = None;

    while let Ok(msg) = rx.recv() {
        match msg {
            NdiMsg::Allocate { desc, reply } => {
                native = None;
                let result = build(&desc).map(|f| native = Some((desc, f)));
                let _ = reply.send(result);
            }
            NdiMsg::Release => native = None,
            NdiMsg::Frame { desc, bgra, reply } => {
                let result = match native.as_mut() {
                    Some((live, f)) if (live.width, live.height) == (desc.width, desc.height) => {
                        send(f, &desc, bgra)
                    }
                    Some((live, _)) => Err(format!(
                        "frame is {}x{} but native frame is {}x{}",
                        desc.width, desc.height, live.width, live.height
                    )),
                    None => Err("no native frame allocated".to_string()),
                };
                let _ = reply.send(result);
            }
            NdiMsg::Stop => break,
        }
    }
}

/// Check that the NDI runtime initializes, preparing the loader environment first.
pub fn probe_runtime() -> Result<(), TransportError> {
    #[cfg(feature = "ndi")]
    prepare_runtime();
    link::runtime_ready()
}

/// Help the dynamic loader find the NDI runtime and preload it with global symbols.
/// Safe to call repeatedly.
#[cfg(feature = "ndi")]
pub fn prepare_runtime() {
    use crate::logi;
    use crate::output::probe::{preload_global, prepend_search_path};

    let Some(lib) = runtime_library() else {
        return;
    };
    let Some(dir) = lib.parent().and_then(|d| d.to_str()).map(str::to_string) else {
        return;
    };

    if cfg!(target_os = "macos") {
        if std::env::var_os("NDI_RUNTIME_DIR_V5").is_none() {
            std::env::set_var("NDI_RUNTIME_DIR_V5", &dir);
        }
        let cur = std::env::var("DYLD_LIBRARY_PATH").ok();
        if let Some(next) = prepend_search_path(cur.as_deref(), &dir) {
            std::env::set_var("DYLD_LIBRARY_PATH", next);
        }
    }

    match preload_global(&lib) {
        Ok(()) => logi!(TAG, "preloaded runtime: {}", lib.display()),
        Err(e) => logw!(TAG, "Failed to preload NDI library {}: {e}", lib.display()),
    }
}

/// Location of the NDI runtime library on this platform, if one is installed.
#[cfg(feature = "ndi")]
fn runtime_library() -> Option<std::path::PathBuf> {
    use std::path::PathBuf;

    if cfg!(target_os = "macos") {
        let p = PathBuf::from("/usr/local/lib/libndi.dylib");
        return p.exists().then_some(p);
    }

    let names: &[&str] = if cfg!(windows) {
        &["Processing.NDI.Lib.x64.dll"]
    } else {
        &["libndi.so", "libndi.so.6", "libndi.so.5"]
    };

    ["NDI_RUNTIME_DIR_V6", "NDI_RUNTIME_DIR_V5"]
        .iter()
        .filter_map(|var| std::env::var_os(var).map(PathBuf::from))
        .flat_map(|dir| names.iter().map(move |n| dir.join(n)))
        .find(|p| p.exists())
}

#[cfg(feature = "ndi")]
mod link {
    use grafton_ndi::{LineStrideOrSize, PixelFormat, ScanType, Sender, SenderOptions, VideoFrame, NDI};

    use super::{serve, FrameDescriptor, NdiLink, FOURCC_BGRA, TAG};
    use crate::logi;
    use crate::output::error::TransportError;

    pub(super) fn runtime_ready() -> Result<(), TransportError> {
        NDI::new().map(|_| ()).map_err(|e| TransportError::Unavailable {
            transport: TAG,
            reason: format!("Failed to init NDI: {e:?}"),
        })
    }

    pub(super) fn open(name: &str, groups: Option<&str>, clock_video: bool) -> Result<NdiLink, TransportError> {
        let name = name.to_string();
        let groups = groups.map(str::to_string);

        NdiLink::spawn(move |rx, ready| {
            let ndi = match NDI::new() {
                Ok(v) => v,
                Err(e) => {
                    let _ = ready.send(Err(format!("Failed to init NDI: {e:?}")));
                    return;
                }
            };

            let mut builder = SenderOptions::builder(&name);
            if let Some(g) = groups.as_deref() {
                builder = builder.groups(g);
            }
            builder = builder.clock_video(clock_video);
            let opts = builder.build();

            let sender = match Sender::new(&ndi, &opts) {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready.send(Err(format!("Failed to create sender: {e:?}")));
                    return;
                }
            };
            let _ = ready.send(Ok(()));
            logi!(TAG, "Sender started: {name}");

            serve(
                rx,
                |desc: &FrameDescriptor| {
                    let pixel_format = match desc.fourcc {
                        FOURCC_BGRA => PixelFormat::BGRA,
                        other => return Err(format!("unsupported FourCC {other:#010x}")),
                    };
                    VideoFrame::builder()
                        .resolution(desc.width, desc.height)
                        .pixel_format(pixel_format)
                        .frame_rate(desc.frame_rate_n, desc.frame_rate_d)
                        .aspect_ratio((desc.width as f32) / (desc.height.max(1) as f32))
                        .scan_type(ScanType::Progressive)
                        .build()
                        .map_err(|e| format!("VideoFrame::build failed: {e:?}"))
                },
                |frame: &mut VideoFrame, desc: &FrameDescriptor, bgra: Vec<u8>| {
                    frame.data = bgra;
                    frame.line_stride_or_size = LineStrideOrSize::LineStrideBytes(desc.line_stride);
                    sender.send_video(frame);
                    Ok(())
                },
            );

            logi!(TAG, "Sender stopped");
        })
    }
}

#[cfg(not(feature = "ndi"))]
mod link {
    use super::{NdiLink, TAG};
    use crate::output::error::TransportError;

    const NOT_BUILT: &str = "built without the `ndi` feature (cargo build --features ndi)";

    pub(super) fn runtime_ready() -> Result<(), TransportError> {
        Err(TransportError::Unavailable {
            transport: TAG,
            reason: NOT_BUILT.into(),
        })
    }

    pub(super) fn open(_name: &str, _groups: Option<&str>, _clock_video: bool) -> Result<NdiLink, TransportError> {
        Err(TransportError::HandleCreate {
            transport: TAG,
            reason: NOT_BUILT.into(),
        })
    }
}
