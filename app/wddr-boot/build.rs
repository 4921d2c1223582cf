// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Captures git state for the image header. Builds outside a work tree
//! (release tarballs, vendored checkouts) get zeros, which the packager
//! treats as "unknown".

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    Some(String::from_utf8(out.stdout).ok()?.trim().to_string())
}

fn main() {
    let sha = git(&["rev-parse", "--short=8", "HEAD"])
        .and_then(|s| u32::from_str_radix(&s, 16).ok())
        .unwrap_or(0);
    let dirty = git(&["status", "--porcelain"])
        .map(|s| !s.is_empty() as u8)
        .unwrap_or(0);
    let ahead = git(&["rev-list", "--count", "@{upstream}..HEAD"])
        .and_then(|s| s.parse().ok())
        .unwrap_or(0u32);

    let out = PathBuf::from(env::var("OUT_DIR").unwrap()).join("git.rs");
    fs::write(
        out,
        format!(
            "pub const GIT_SHA: u32 = {sha:#010x};\n\
             pub const GIT_DIRTY: u8 = {dirty};\n\
             pub const GIT_AHEAD: u32 = {ahead};\n"
        ),
    )
    .unwrap();
    println!("cargo:rerun-if-changed=.git/HEAD");
}
