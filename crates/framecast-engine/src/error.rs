use std::{fmt, path::PathBuf};

#[derive(Debug)]
pub enum EngineError {
    /// No settings file could be located from the given start directory.
    SettingsNotFound { start_dir: PathBuf },
    /// I/O error reading a file.
    Io { path: PathBuf, source: std::io::Error },
    /// JSON parse error for a file.
    Json { path: PathBuf, source: serde_json::Error },

    /// Settings are syntactically valid but semantically invalid.
    InvalidConfig { path: PathBuf, msg: String },

    /// Pixel buffer length does not match `width * height * channels`.
    InvalidRaster { width: u32, height: u32, expected: usize, actual: usize },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::SettingsNotFound { start_dir } => {
                write!(f, "Could not locate broadcast.json starting from {}", start_dir.display())
            }
            EngineError::Io { path, source } => {
                write!(f, "I/O error for {}: {}", path.display(), source)
            }
            EngineError::Json { path, source } => {
                write!(f, "JSON parse error for {}: {}", path.display(), source)
            }
            EngineError::InvalidConfig { path, msg } => {
                write!(f, "Invalid settings {}: {}", path.display(), msg)
            }
            EngineError::InvalidRaster { width, height, expected, actual } => {
                write!(
                    f,
                    "Raster {}x{} needs {} bytes of pixel data, got {}",
                    width, height, expected, actual
                )
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io { source, .. } => Some(source),
            EngineError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}
