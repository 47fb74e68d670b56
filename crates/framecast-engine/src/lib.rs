//! Transport-independent pieces of framecast: the settings record handed to the
//! senders, the caller-owned input raster, and the errors they can produce.

pub mod config;
pub mod error;
pub mod paths;
pub mod raster;

pub use config::{BroadcastSettings, ConfigMode, NdiSettings, SyphonSettings};
pub use error::EngineError;
pub use raster::{PixelMode, RasterImage};
