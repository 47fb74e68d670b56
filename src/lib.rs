//! framecast: publish rendered frames to NDI and Syphon.
//!
//! The frame producer builds a [`output::OutputSet`] from a settings record and hands it
//! every frame; each transport's sender converts, sizes and publishes on its own and
//! falls back to doing nothing when its runtime is missing.

pub mod logging;
pub mod output;
pub mod validate;

pub use framecast_engine as engine;
