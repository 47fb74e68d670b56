//! Startup capability probe.
//!
//! Each transport is probed once per process. The result never changes afterwards:
//! a transport that failed to load stays unavailable for the whole run, and its
//! sender behaves like a `NullSender`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use crate::output::{ndi, syphon};
use crate::{logi, logw};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Ndi,
    Syphon,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Ndi => f.write_str(ndi::TAG),
            TransportKind::Syphon => f.write_str(syphon::TAG),
        }
    }
}

/// Per-transport availability, computed once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportAvailability {
    pub ndi: bool,
    pub syphon: bool,
}

static DETECTED: OnceLock<TransportAvailability> = OnceLock::new();

impl TransportAvailability {
    /// Probe every transport on first use; later calls return the cached result.
    pub fn detect() -> Self {
        *DETECTED.get_or_init(|| Self {
            ndi: probe(TransportKind::Ndi),
            syphon: probe(TransportKind::Syphon),
        })
    }

    pub fn get(&self, kind: TransportKind) -> bool {
        match kind {
            TransportKind::Ndi => self.ndi,
            TransportKind::Syphon => self.syphon,
        }
    }
}

/// Try to bring up one transport's native runtime. Failures are logged, never raised.
pub fn probe(kind: TransportKind) -> bool {
    let result = match kind {
        TransportKind::Ndi => ndi::probe_runtime(),
        TransportKind::Syphon => syphon::probe_runtime(),
    };

    match result {
        Ok(()) => {
            logi!("PROBE", "{kind} available");
            true
        }
        Err(e) => {
            logw!("PROBE", "{e}");
            false
        }
    }
}

#[cfg(unix)]
type PreloadedLibrary = libloading::os::unix::Library;
#[cfg(not(unix))]
type PreloadedLibrary = libloading::Library;

/// Libraries preloaded for the process lifetime, keyed by path.
static PRELOADED: Mutex<Vec<(PathBuf, PreloadedLibrary)>> = Mutex::new(Vec::new());

/// Load a shared library with global symbol visibility and keep it loaded, so a
/// binding that resolves symbols later finds them. Loading the same path twice is a no-op.
pub fn preload_global(path: &Path) -> Result<(), libloading::Error> {
    let mut held = PRELOADED.lock().unwrap_or_else(|e| e.into_inner());
    if held.iter().any(|(p, _)| p == path) {
        return Ok(());
    }

    #[cfg(unix)]
    let lib = {
        use libloading::os::unix::{RTLD_GLOBAL, RTLD_NOW};
        // SAFETY: the runtime's initializers run on load; we only load vendor runtimes
        // found at well-known locations.
        unsafe { PreloadedLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL)? }
    };
    #[cfg(not(unix))]
    let lib = unsafe { PreloadedLibrary::new(path)? };

    held.push((path.to_path_buf(), lib));
    Ok(())
}

#[cfg(test)]
pub(crate) fn preloaded_paths() -> Vec<PathBuf> {
    let held = PRELOADED.lock().unwrap_or_else(|e| e.into_inner());
    held.iter().map(|(p, _)| p.clone()).collect()
}

/// `dir` prepended to a `:`-separated search path, or `None` when already listed.
pub fn prepend_search_path(existing: Option<&str>, dir: &str) -> Option<String> {
    match existing {
        Some(cur) if cur.split(':').any(|p| p == dir) => None,
        Some(cur) if !cur.is_empty() => Some(format!("{dir}:{cur}")),
        _ => Some(dir.to_string()),
    }
}
