// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

use std::process::Command;

fn main() {
    let version = env!("CARGO_PKG_VERSION");
    let describe = Command::new("git")
        .args(&["describe", "--always", "--dirty"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let version_string = match describe {
        Some(d) => format!("{}-{}", version, d),
        None => version.to_string(),
    };
    println!("cargo:rustc-env=VERSION_STRING={}", version_string);
    println!("cargo:rerun-if-changed=.git/HEAD");
}
