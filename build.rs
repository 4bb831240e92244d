//! Stamps the binary with `DIARY_MEDIA_VERSION`:
//!
//! - `0.1.0` when HEAD is tagged `v0.1.0` (the package version)
//! - `0.1.0-dev+<hash>` on any other commit
//! - `0.1.0-dev` outside a git checkout, e.g. from a source tarball
//!
//! Packagers can set `DIARY_MEDIA_VERSION` themselves to skip git entirely.

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    out.status
        .success()
        .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
}

fn main() {
    println!("cargo:rerun-if-env-changed=DIARY_MEDIA_VERSION");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/tags");

    let package = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let version = std::env::var("DIARY_MEDIA_VERSION").ok().unwrap_or_else(|| {
        let release_tag = format!("v{package}");
        let tags = git(&["tag", "--points-at", "HEAD"]).unwrap_or_default();
        if tags.lines().any(|tag| tag == release_tag) {
            return package.clone();
        }
        match git(&["rev-parse", "--short", "HEAD"]) {
            Some(hash) if !hash.is_empty() => format!("{package}-dev+{hash}"),
            _ => format!("{package}-dev"),
        }
    });

    println!("cargo:rustc-env=DIARY_MEDIA_VERSION={version}");
}
