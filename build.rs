// build.rs
//
// macOS only, and only when a Syphon.framework is vendored under vendor/:
// 1) Compiles the Objective-C Metal bridge (native/syphon_metal_bridge.m) into a static lib.
// 2) Links against vendor/Syphon.framework plus Metal/Foundation.
// 3) Adds LC_RPATHs so dyld can find Syphon.framework next to the binary (or in an
//    app bundle's Contents/Frameworks).
// 4) Copies vendor/Syphon.framework into target/{debug|release}/ for `cargo run`.
// 5) Emits `--cfg has_syphon` so src/output/syphon.rs compiles the real adapter.
//
// Without the framework the build still succeeds; the Syphon sender then probes as
// unavailable at runtime and behaves as a null sender.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=native/syphon_metal_bridge.m");
    println!("cargo:rerun-if-changed=native/syphon_metal_bridge.h");
    println!("cargo:rerun-if-changed=vendor/Syphon.framework");

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("macos") {
        return;
    }

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let vendor_dir = manifest_dir.join("vendor");
    let syphon_framework = vendor_dir.join("Syphon.framework");

    if !syphon_framework.exists() {
        println!(
            "cargo:warning=Syphon.framework not found at {}; Syphon output disabled",
            syphon_framework.display()
        );
        return;
    }

    // -------------------------
    // 1) Compile the ObjC bridge into libsyphon_metal_bridge.a
    // -------------------------
    cc::Build::new()
        .file("native/syphon_metal_bridge.m")
        .flag("-fobjc-arc")
        .flag("-ObjC")
        .include("native")
        .include(syphon_framework.join("Headers"))
        .include(syphon_framework.join("Versions/A/Headers"))
        .flag(&format!("-F{}", vendor_dir.display()))
        .flag("-Wno-deprecated-declarations")
        .compile("syphon_metal_bridge");

    // -------------------------
    // 2) Link against Syphon.framework + required Apple frameworks
    // -------------------------
    println!("cargo:rustc-link-search=framework={}", vendor_dir.display());
    println!("cargo:rustc-link-lib=framework=Syphon");
    println!("cargo:rustc-link-lib=framework=Metal");
    println!("cargo:rustc-link-lib=framework=Foundation");

    // -------------------------
    // 3) Runtime rpaths for @rpath/Syphon.framework/...
    // -------------------------
    println!("cargo:rustc-link-arg=-Wl,-rpath,@executable_path");
    println!("cargo:rustc-link-arg=-Wl,-rpath,@executable_path/../Frameworks");

    // -------------------------
    // 4) Copy Syphon.framework next to the built binary
    // -------------------------
    let profile = env::var("PROFILE").unwrap_or_else(|_| "debug".into());
    let target_dir = env::var("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| manifest_dir.join("target"));
    let dest_dir = target_dir.join(&profile).join("Syphon.framework");

    if !dest_dir.exists() {
        copy_dir_recursive(&syphon_framework, &dest_dir)
            .unwrap_or_else(|e| panic!("Failed to copy Syphon.framework -> {}: {e}", dest_dir.display()));
    }

    // -------------------------
    // 5) Tell the crate the bridge is linked
    // -------------------------
    println!("cargo:rustc-cfg=has_syphon");
}

/// Recursively copy a directory (framework bundles are directories).
fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    if dst.exists() {
        fs::remove_dir_all(dst)?;
    }
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else if file_type.is_file() {
            fs::copy(&from, &to)?;
        } else if file_type.is_symlink() {
            // Framework bundles rely on the Versions/Current symlink layout
            let target = fs::read_link(&from)?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(target, &to)?;
        }
    }
    Ok(())
}
