// build.rs

//! Link libopusfile for the streaming decoder.
//!
//! libopus itself is linked by `audiopus_sys`. libopusfile has no maintained `-sys` crate, so we
//! probe it with pkg-config and fall back to a plain `-lopusfile` when pkg-config has no entry.

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OPUSFILE_NO_PKG_CONFIG");

    if env::var_os("CARGO_FEATURE_STREAM").is_none() {
        return;
    }

    if env::var_os("OPUSFILE_NO_PKG_CONFIG").is_none()
        && pkg_config::Config::new()
            .atleast_version("0.7")
            .probe("opusfile")
            .is_ok()
    {
        return;
    }

    println!("cargo:warning=pkg-config could not find opusfile; linking -lopusfile directly");
    println!("cargo:rustc-link-lib=opusfile");
    println!("cargo:rustc-link-lib=ogg");
}
