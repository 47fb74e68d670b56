//! Settings validation (friendly errors)
//!
//! Purpose:
//! - Catch common misconfigurations before any sender is built
//! - Explain *what* is wrong, *where* it lives, and *what to do*
//! - Lenient runs still start; strict runs refuse on any error

use framecast_engine::BroadcastSettings;

use crate::{loge, logi, logw};

/// Frame rates above this are accepted but almost certainly a typo.
pub const MAX_SANE_FPS: f64 = 240.0;

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub level: IssueLevel,
    pub path: String,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Warn,
    Error,
}

impl ValidationIssue {
    pub fn warn(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Warn, path: path.into(), message: message.into(), hint }
    }
    pub fn error(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Error, path: path.into(), message: message.into(), hint }
    }
}

pub fn emit_issues(tag: &str, issues: &[ValidationIssue]) {
    for it in issues {
        let hint = it.hint.as_deref().map(|h| format!(" (hint: {h})")).unwrap_or_default();
        match it.level {
            IssueLevel::Warn => logw!(tag, "{}: {}{}", it.path, it.message, hint),
            IssueLevel::Error => loge!(tag, "{}: {}{}", it.path, it.message, hint),
        }
    }
}

/// Emit a one-line summary even when there are zero issues.
pub fn emit_summary(tag: &str, label: &str, issues: &[ValidationIssue]) {
    let warns = issues.iter().filter(|i| i.level == IssueLevel::Warn).count();
    let errs = error_count(issues);
    if errs == 0 && warns == 0 {
        logi!(tag, "validation: {label} OK (0 issues)");
    } else {
        logw!(tag, "validation: {label} issues found (errors={errs} warnings={warns})");
    }
}

pub fn error_count(issues: &[ValidationIssue]) -> usize {
    issues.iter().filter(|i| i.level == IssueLevel::Error).count()
}

/// Check a settings record as read from disk + env, before sanitizing.
///
/// `file` names the settings file in issue paths (e.g. `broadcast.macos.json`).
pub fn validate_settings(file: &str, settings: &BroadcastSettings) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let at = |pointer: &str| format!("{file}:{pointer}");
    let ndi = &settings.ndi;
    let syphon = &settings.syphon;

    if ndi.name.trim().is_empty() {
        issues.push(ValidationIssue::error(
            at("/ndi/name"),
            "source name is blank",
            Some("receivers list sources by name; set a non-empty name or NDI_NAME".into()),
        ));
    }
    if syphon.name.trim().is_empty() {
        issues.push(ValidationIssue::error(
            at("/syphon/name"),
            "server name is blank",
            Some("set a non-empty name or SYPHON_NAME".into()),
        ));
    }

    if ndi.fps_n < 1 || ndi.fps_d < 1 {
        issues.push(ValidationIssue::error(
            at("/ndi/fps_n"),
            format!("frame rate {}/{} is not positive", ndi.fps_n, ndi.fps_d),
            Some("use e.g. 60/1 or 30000/1001".into()),
        ));
    } else {
        let fps = ndi.fps_n as f64 / ndi.fps_d as f64;
        if fps > MAX_SANE_FPS {
            issues.push(ValidationIssue::warn(
                at("/ndi/fps_n"),
                format!("frame rate {fps:.1} is unusually high"),
                Some("fps_n/fps_d is a ratio, e.g. 60/1".into()),
            ));
        }
    }

    if ndi.enabled && !cfg!(feature = "ndi") {
        issues.push(ValidationIssue::warn(
            at("/ndi/enabled"),
            "NDI is enabled but this build has no NDI support",
            Some("rebuild with `cargo build --features ndi`".into()),
        ));
    }

    if syphon.enabled {
        if !cfg!(target_os = "macos") {
            issues.push(ValidationIssue::warn(
                at("/syphon/enabled"),
                "Syphon is enabled but Syphon is macOS-only",
                Some("disable it here or set SYPHON_SEND=0".into()),
            ));
        } else if !cfg!(has_syphon) {
            issues.push(ValidationIssue::warn(
                at("/syphon/enabled"),
                "Syphon is enabled but Syphon.framework was not vendored at build time",
                Some("place Syphon.framework under vendor/ and rebuild".into()),
            ));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.path.as_str()).collect()
    }

    #[test]
    fn issue_paths_name_the_file_that_was_read() {
        let mut s = BroadcastSettings::default();
        s.syphon.name = String::new();
        let issues = validate_settings("broadcast.macos.json", &s);
        assert_eq!(paths(&issues), vec!["broadcast.macos.json:/syphon/name"]);
    }

    #[test]
    fn defaults_are_clean() {
        assert!(validate_settings("broadcast.json", &BroadcastSettings::default()).is_empty());
    }

    #[test]
    fn blank_names_are_errors() {
        let mut s = BroadcastSettings::default();
        s.ndi.name = " ".into();
        s.syphon.name = String::new();

        let issues = validate_settings("broadcast.json", &s);
        assert_eq!(error_count(&issues), 2);
        assert!(paths(&issues).contains(&"broadcast.json:/ndi/name"));
        assert!(paths(&issues).contains(&"broadcast.json:/syphon/name"));
    }

    #[test]
    fn non_positive_frame_rate_is_an_error() {
        let mut s = BroadcastSettings::default();
        s.ndi.fps_d = 0;
        let issues = validate_settings("broadcast.json", &s);
        assert_eq!(error_count(&issues), 1);
        assert!(issues[0].message.contains("60/0"));
    }

    #[test]
    fn absurd_frame_rate_is_a_warning() {
        let mut s = BroadcastSettings::default();
        s.ndi.fps_n = 6000;
        let issues = validate_settings("broadcast.json", &s);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].level, IssueLevel::Warn);
    }

    #[cfg(not(feature = "ndi"))]
    #[test]
    fn enabled_ndi_without_feature_warns() {
        let mut s = BroadcastSettings::default();
        s.ndi.enabled = true;
        let issues = validate_settings("broadcast.json", &s);
        assert_eq!(paths(&issues), vec!["broadcast.json:/ndi/enabled"]);
        assert_eq!(error_count(&issues), 0);
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn enabled_syphon_off_macos_warns() {
        let mut s = BroadcastSettings::default();
        s.syphon.enabled = true;
        let issues = validate_settings("broadcast.json", &s);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("macOS-only"));
        assert!(issues[0].hint.is_some());
    }
}
