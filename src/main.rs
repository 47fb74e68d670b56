use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};

use framecast::engine::config::{read_settings, ConfigMode};
use framecast::engine::paths::{discover_settings, pick_platform_json, SETTINGS_STEM};
use framecast::engine::{BroadcastSettings, PixelMode, RasterImage};
use framecast::output::probe::TransportAvailability;
use framecast::output::{FrameRate, OutputSet};
use framecast::validate::{emit_issues, emit_summary, error_count, validate_settings};
use framecast::{loge, logi, logw};

struct Args {
    config: Option<PathBuf>,
    strict: bool,
    log_file: Option<PathBuf>,
    frames: u64,
    size: (u32, u32),
    fps: Option<f64>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: None,
            strict: false,
            log_file: None,
            frames: 300,
            size: (640, 360),
            fps: None,
        }
    }
}

fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

fn parse_args(argv: impl IntoIterator<Item = String>) -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut it = argv.into_iter();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--config" => args.config = Some(PathBuf::from(it.next().context("--config needs a path")?)),
            "--strict" => args.strict = true,
            "--log-file" => args.log_file = Some(PathBuf::from(it.next().context("--log-file needs a path")?)),
            "--frames" => {
                let v = it.next().context("--frames needs a count")?;
                args.frames = v.parse().with_context(|| format!("--frames: not a number: {v}"))?;
            }
            "--size" => {
                let v = it.next().context("--size needs WxH")?;
                args.size = parse_size(&v).with_context(|| format!("--size: expected WxH, got {v}"))?;
            }
            "--fps" => {
                let v = it.next().context("--fps needs a rate")?;
                let fps: f64 = v.parse().with_context(|| format!("--fps: not a number: {v}"))?;
                if !fps.is_finite() || fps <= 0.0 {
                    bail!("--fps must be positive, got {v}");
                }
                args.fps = Some(fps);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

/// Settings path: explicit `--config`, else discovered, else `./broadcast.json` (may not exist).
fn settings_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(p) = explicit {
        return p;
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    discover_settings(&cwd).unwrap_or_else(|e| {
        logi!("CONFIG", "{e}; using defaults");
        pick_platform_json(&cwd, SETTINGS_STEM)
    })
}

fn load(path: &Path, mode: ConfigMode) -> anyhow::Result<BroadcastSettings> {
    let mut settings = read_settings(path, mode)?;

    let label = path.file_name().and_then(|n| n.to_str()).unwrap_or("settings");
    let issues = validate_settings(label, &settings);
    emit_summary("CONFIG", label, &issues);
    emit_issues("CONFIG", &issues);

    if mode == ConfigMode::Strict && error_count(&issues) > 0 {
        bail!("{}: invalid settings (strict mode)", path.display());
    }
    for note in settings.settle(path, mode)? {
        logw!("CONFIG", "{note}");
    }
    Ok(settings)
}

/// Moving RGB gradient with a scrolling bar, 3 bytes per pixel.
fn test_pattern(width: u32, height: u32, frame: u64) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let shift = frame as usize;
    let bar = if w == 0 { 0 } else { (shift * 4) % w };
    let mut out = Vec::with_capacity(w * h * 3);
    for y in 0..h {
        for x in 0..w {
            if x.abs_diff(bar) < 4 {
                out.extend_from_slice(&[255, 255, 255]);
                continue;
            }
            let r = ((x + shift) * 255 / w.max(1)) as u8;
            let g = (y * 255 / h.max(1)) as u8;
            let b = (shift % 256) as u8;
            out.extend_from_slice(&[r, g, b]);
        }
    }
    out
}

fn run(args: Args) -> anyhow::Result<()> {
    let path = settings_path(args.config);
    let mode = if args.strict { ConfigMode::Strict } else { ConfigMode::Lenient };
    logi!("CONFIG", "settings: {} ({mode:?})", path.display());

    let settings = load(&path, mode)?;
    logi!("CONFIG", "effective: {}", serde_json::to_string(&settings)?);

    let availability = TransportAvailability::detect();
    let mut outputs = OutputSet::from_settings(&settings, availability);
    if outputs.active_count() == 0 {
        logw!("OUTPUT", "no active senders; frames will be produced and discarded");
    }

    let fps = args
        .fps
        .unwrap_or_else(|| FrameRate::new(settings.ndi.fps_n, settings.ndi.fps_d).as_f64());
    let period = Duration::from_secs_f64(1.0 / fps);
    let (w, h) = args.size;
    logi!("INIT", "producing {} frames at {w}x{h}, {fps:.2} fps", args.frames);

    let start = Instant::now();
    let mut next = start;
    for frame in 0..args.frames {
        let image = RasterImage::new(w, h, PixelMode::Rgb, test_pattern(w, h, frame))?;
        outputs.send_image(&image);

        next += period;
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else {
            next = now;
        }
    }

    logi!("INIT", "done in {:.2}s", start.elapsed().as_secs_f64());
    for (label, stats) in outputs.stats() {
        logi!("OUTPUT", "{label}: {}", serde_json::to_string(&stats)?);
    }
    outputs.close();
    Ok(())
}

fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("framecast: {e:#}");
            eprintln!(
                "usage: framecast [--config PATH] [--strict] [--log-file PATH] [--frames N] [--size WxH] [--fps F]"
            );
            std::process::exit(2);
        }
    };

    let log_file = args.log_file.clone().or_else(|| {
        std::env::var("FRAMECAST_LOG_FILE")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    });
    let run_id = framecast::logging::init(log_file);
    logi!("INIT", "run_id={run_id}");

    if let Err(e) = run(args) {
        loge!("INIT", "{e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn parses_all_flags() {
        let a = parse_args(argv("--config b.json --strict --frames 10 --size 320x240 --fps 29.97")).unwrap();
        assert_eq!(a.config, Some(PathBuf::from("b.json")));
        assert!(a.strict);
        assert_eq!(a.frames, 10);
        assert_eq!(a.size, (320, 240));
        assert_eq!(a.fps, Some(29.97));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(argv("--size 320")).is_err());
        assert!(parse_args(argv("--fps 0")).is_err());
        assert!(parse_args(argv("--frames")).is_err());
        assert!(parse_args(argv("--bogus")).is_err());
    }

    #[test]
    fn pattern_matches_rgb_raster_size() {
        let data = test_pattern(7, 3, 5);
        assert!(RasterImage::new(7, 3, PixelMode::Rgb, data).is_ok());
        assert!(test_pattern(0, 0, 0).is_empty());
    }
}
