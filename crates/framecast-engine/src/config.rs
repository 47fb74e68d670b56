use std::path::Path;

use serde_json::Value;

use crate::error::EngineError;
use crate::paths::read_to_string_result;

/// How strictly to interpret/validate the settings file.
///
/// - `Lenient` is forward-compatible: unknown fields are ignored and out-of-range
///   values are replaced with safe defaults.
/// - `Strict` is fail-fast: unknown fields and invalid values become errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Lenient,
    Strict,
}

pub const DEFAULT_NDI_NAME: &str = "framecast NDI";
pub const DEFAULT_SYPHON_NAME: &str = "framecast Syphon";

/// Validated settings record consumed by the sender constructors.
///
/// Every key is optional; a missing `broadcast.json` yields `BroadcastSettings::default()`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BroadcastSettings {
    pub ndi: NdiSettings,
    pub syphon: SyphonSettings,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NdiSettings {
    /// Master on/off for NDI output.
    pub enabled: bool,

    /// NDI source name as seen by receivers (e.g. OBS).
    pub name: String,

    /// Optional comma-separated NDI groups.
    pub groups: Option<String>,

    /// Let the NDI runtime pace `send_video` to the advertised frame rate.
    pub clock_video: bool,

    /// Frame rate numerator advertised on every frame.
    pub fps_n: i32,

    /// Frame rate denominator advertised on every frame.
    pub fps_d: i32,

    pub flip_vertical: bool,
}

impl Default for NdiSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            name: DEFAULT_NDI_NAME.to_string(),
            groups: None,
            clock_video: true,
            fps_n: 60,
            fps_d: 1,
            flip_vertical: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SyphonSettings {
    pub enabled: bool,

    /// Syphon server name as listed by clients.
    pub name: String,

    /// Raster rows are top-down, Metal textures are read bottom-up by most clients.
    pub flip_vertical: bool,
}

impl Default for SyphonSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            name: DEFAULT_SYPHON_NAME.to_string(),
            flip_vertical: true,
        }
    }
}

const KNOWN_TOP_KEYS: &[&str] = &["ndi", "syphon"];
const KNOWN_NDI_KEYS: &[&str] = &[
    "enabled",
    "name",
    "groups",
    "clock_video",
    "fps_n",
    "fps_d",
    "flip_vertical",
];
const KNOWN_SYPHON_KEYS: &[&str] = &["enabled", "name", "flip_vertical"];

impl BroadcastSettings {
    /// Apply environment overrides on top of file values.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("NDI_SEND").as_deref().and_then(parse_bool) {
            self.ndi.enabled = v;
        }
        if let Some(v) = lookup("NDI_NAME") {
            self.ndi.name = v;
        }
        if let Some(v) = lookup("NDI_GROUPS") {
            self.ndi.groups = Some(v);
        }
        if let Some(v) = lookup("SYPHON_SEND").as_deref().and_then(parse_bool) {
            self.syphon.enabled = v;
        }
        if let Some(v) = lookup("SYPHON_NAME") {
            self.syphon.name = v;
        }
        if let Some(v) = lookup("SYPHON_FLIP_VERTICAL").as_deref().and_then(parse_bool) {
            self.syphon.flip_vertical = v;
        }
    }

    /// Replace out-of-range values with defaults. Returns one note per correction.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut notes = Vec::new();

        if self.ndi.name.trim().is_empty() {
            notes.push(format!("ndi.name is blank, using '{DEFAULT_NDI_NAME}'"));
            self.ndi.name = DEFAULT_NDI_NAME.to_string();
        }
        if self.syphon.name.trim().is_empty() {
            notes.push(format!("syphon.name is blank, using '{DEFAULT_SYPHON_NAME}'"));
            self.syphon.name = DEFAULT_SYPHON_NAME.to_string();
        }
        if self.ndi.fps_n < 1 {
            notes.push(format!("ndi.fps_n={} clamped to 1", self.ndi.fps_n));
            self.ndi.fps_n = 1;
        }
        if self.ndi.fps_d < 1 {
            notes.push(format!("ndi.fps_d={} clamped to 1", self.ndi.fps_d));
            self.ndi.fps_d = 1;
        }
        if matches!(self.ndi.groups.as_deref(), Some(g) if g.trim().is_empty()) {
            self.ndi.groups = None;
        }

        notes
    }

    /// Apply the load mode: strict rejects what lenient repairs. Returns lenient's notes.
    pub fn settle(&mut self, path: &Path, mode: ConfigMode) -> Result<Vec<String>, EngineError> {
        match mode {
            ConfigMode::Strict => self.ensure_valid(path).map(|()| Vec::new()),
            ConfigMode::Lenient => Ok(self.sanitize()),
        }
    }

    /// Strict-mode check: same conditions `sanitize` repairs, reported as an error.
    pub fn ensure_valid(&self, path: &Path) -> Result<(), EngineError> {
        let mut probe = self.clone();
        let notes = probe.sanitize();
        if notes.is_empty() {
            Ok(())
        } else {
            Err(EngineError::InvalidConfig {
                path: path.to_path_buf(),
                msg: notes.join("; "),
            })
        }
    }
}

/// Accepts the usual spellings of a boolean flag; anything else is `None`.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// File values plus environment overrides, before any sanitizing.
///
/// Finish with [`BroadcastSettings::settle`] once problems have been reported.
pub fn read_settings(path: &Path, mode: ConfigMode) -> Result<BroadcastSettings, EngineError> {
    read_settings_with(path, mode, |k| std::env::var(k).ok())
}

pub fn read_settings_with(
    path: &Path,
    mode: ConfigMode,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<BroadcastSettings, EngineError> {
    let mut settings = if path.exists() {
        parse_settings_file(path, mode)?
    } else {
        BroadcastSettings::default()
    };
    settings.apply_env_overrides(lookup);
    Ok(settings)
}

fn parse_settings_file(path: &Path, mode: ConfigMode) -> Result<BroadcastSettings, EngineError> {
    let data = read_to_string_result(path)?;
    let value: Value = serde_json::from_str(&data).map_err(|e| EngineError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    if mode == ConfigMode::Strict {
        let unknown = unknown_keys(&value);
        if !unknown.is_empty() {
            return Err(EngineError::InvalidConfig {
                path: path.to_path_buf(),
                msg: format!("unknown keys: {}", unknown.join(", ")),
            });
        }
    }

    serde_json::from_value(value).map_err(|e| EngineError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

/// JSON-pointer style paths of keys the settings record does not know.
fn unknown_keys(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    let Some(top) = value.as_object() else {
        return out;
    };

    for (k, v) in top {
        if !KNOWN_TOP_KEYS.contains(&k.as_str()) {
            out.push(format!("/{k}"));
            continue;
        }
        let known = if k == "ndi" { KNOWN_NDI_KEYS } else { KNOWN_SYPHON_KEYS };
        if let Some(section) = v.as_object() {
            for sk in section.keys() {
                if !known.contains(&sk.as_str()) {
                    out.push(format!("/{k}/{sk}"));
                }
            }
        }
    }

    out
}
