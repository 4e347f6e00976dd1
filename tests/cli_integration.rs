//! CLI integration tests for keel.
//!
//! These tests drive the binary against a temporary firmware workspace whose
//! toolchain archive is served from a `file://` URL.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use flate2::write::GzEncoder;
use flate2::Compression;
use predicates::prelude::*;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

/// A keel command isolated from the user's cache and configuration.
fn keel(workspace: &Path, cache: &Path) -> Command {
    let mut cmd = Command::cargo_bin("keel").unwrap();
    cmd.current_dir(workspace)
        .env("KEEL_CACHE_DIR", cache)
        .env("HOME", cache)
        .env_remove("RUST_LOG");
    cmd
}

fn write(root: &Path, path: &str, content: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A gzip tarball with a single top-level directory, like a toolchain release.
fn toolchain_archive(dir: &Path) -> (String, String) {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in [
        ("arm-gnu-toolchain-13.2/bin/arm-none-eabi-gcc", "#!/bin/sh\n"),
        ("arm-gnu-toolchain-13.2/bin/arm-none-eabi-objcopy", "#!/bin/sh\n"),
        ("arm-gnu-toolchain-13.2/share/doc/readme.txt", "docs"),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, path, content.as_bytes()).unwrap();
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&builder.into_inner().unwrap()).unwrap();
    let bytes = encoder.finish().unwrap();

    let archive = dir.join("arm-gnu-toolchain.tar.gz");
    fs::write(&archive, &bytes).unwrap();
    let url = url::Url::from_file_path(&archive).unwrap().to_string();
    (url, format!("sha256:{}", hex::encode(Sha256::digest(&bytes))))
}

/// cmsis and hal (requiring cmsis) as vendored headers, plus a prebuilt toolchain.
fn firmware_workspace(checksum_override: Option<&str>) -> (TempDir, TempDir) {
    let tmp = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let root = tmp.path();
    let (url, checksum) = toolchain_archive(root);
    let checksum = checksum_override.unwrap_or(&checksum);

    write(
        root,
        "Keel.toml",
        r#"[workspace]
members = ["cmsis", "stm32g4_hal_driver", "toolchains/*"]
"#,
    );

    write(
        root,
        "cmsis/recipe.toml",
        r#"[package]
name = "cmsis"
version = "5.9.0"
type = "header-only"

[[copy]]
pattern = "*.h"
from = "CMSIS/Core/Include"
to = "include"

[exports]
include_dirs = ["include"]
"#,
    );
    write(root, "cmsis/CMSIS/Core/Include/core_cm4.h", "#pragma once\n");

    write(
        root,
        "stm32g4_hal_driver/recipe.toml",
        r#"[package]
name = "stm32g4_hal_driver"
version = "1.2.5"
type = "source-header"
requires = ["cmsis/5.9.0"]

[[copy]]
pattern = "*.h"
from = "Inc"
to = "include"

[[copy]]
pattern = "*.c"
from = "Src"
to = "src"

[exports]
include_dirs = ["include"]
source_dirs = ["src"]
"#,
    );
    write(root, "stm32g4_hal_driver/Inc/stm32g4xx_hal.h", "#pragma once\n");
    write(root, "stm32g4_hal_driver/Src/stm32g4xx_hal.c", "int x;\n");

    write(
        root,
        "toolchains/arm-none-eabi-gcc/recipe.toml",
        &format!(
            r#"[package]
name = "arm-none-eabi-gcc"
version = {{ file = "version.txt" }}
type = "prebuilt-binary"

[remote]
url = "{url}"
checksum = "{checksum}"
strip_root = 1

[[copy]]
pattern = "*"
from = "bin"
to = "bin"

[exports.executables]
c = "arm-none-eabi-gcc"
objcopy = "arm-none-eabi-objcopy"

[exports.flags]
c = ["-mcpu=cortex-m4", "-mthumb"]

[[exports.env]]
var = "PATH"
op = "append"
value = "bin"
path = true
"#
        ),
    );

    write(root, "toolchains/arm-none-eabi-gcc/version.txt", "13.2.1\n");

    (tmp, cache)
}

// ============================================================================
// keel plan / tree
// ============================================================================

#[test]
fn test_plan_prints_dependencies_first() {
    let (tmp, cache) = firmware_workspace(None);

    keel(tmp.path(), cache.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "1. arm-none-eabi-gcc v13.2.1 [prebuilt-binary]",
        ))
        .stdout(predicate::str::contains("2. cmsis v5.9.0"))
        .stdout(predicate::str::contains(
            "3. stm32g4_hal_driver v1.2.5 [source-header] <- cmsis",
        ));
}

#[test]
fn test_plan_json() {
    let (tmp, cache) = firmware_workspace(None);

    let output = keel(tmp.path(), cache.path())
        .args(["plan", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["steps"][2]["name"], "stm32g4_hal_driver");
    assert_eq!(plan["steps"][2]["type"], "source-header");
    assert_eq!(plan["steps"][2]["dependencies"][0], "cmsis");
}

#[test]
fn test_tree() {
    let (tmp, cache) = firmware_workspace(None);

    keel(tmp.path(), cache.path())
        .args(["tree", "stm32g4_hal_driver"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stm32g4_hal_driver v1.2.5"))
        .stdout(predicate::str::contains("├── cmsis v5.9.0"));
}

#[test]
fn test_cycle_is_reported() {
    let tmp = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(tmp.path(), "Keel.toml", "[workspace]\nmembers = [\"*\"]\n");
    for (name, dep) in [("a", "b"), ("b", "a")] {
        write(
            tmp.path(),
            &format!("{name}/recipe.toml"),
            &format!(
                "[package]\nname = \"{name}\"\nversion = \"1.0.0\"\ntype = \"header-only\"\nrequires = [\"{dep}\"]\n"
            ),
        );
    }

    keel(tmp.path(), cache.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("dependency cycle detected"))
        .stderr(predicate::str::contains("a -> b -> a"));
}

#[test]
fn test_missing_workspace() {
    let tmp = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();

    keel(tmp.path(), cache.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not find Keel.toml"));
}

// ============================================================================
// keel build
// ============================================================================

#[test]
fn test_build_packages_and_writes_build_info() {
    let (tmp, cache) = firmware_workspace(None);
    let out = tmp.path().join(".keel/packages");

    keel(tmp.path(), cache.path())
        .arg("build")
        .assert()
        .success()
        .stderr(predicate::str::contains("Packaged arm-none-eabi-gcc"));

    assert!(out.join("cmsis/5.9.0/include/core_cm4.h").is_file());
    assert!(out.join("stm32g4_hal_driver/1.2.5/src/stm32g4xx_hal.c").is_file());
    assert!(out.join("arm-none-eabi-gcc/13.2.1/bin/arm-none-eabi-gcc").is_file());
    assert!(!out.join("arm-none-eabi-gcc/13.2.1/share").exists());

    let info: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("keel-buildinfo.json")).unwrap())
            .unwrap();
    assert_eq!(info["consumer"], "<workspace>");
    assert_eq!(info["compiler_executables"]["c"], "arm-none-eabi-gcc");
    let includes = info["include_dirs"].as_array().unwrap();
    assert_eq!(includes.len(), 2);
    assert!(includes[0].as_str().unwrap().ends_with("include"));
    assert!(includes[0].as_str().unwrap().contains("cmsis"));
    assert!(out.join("keel-plan.json").is_file());

    // Everything is fresh the second time, even offline.
    keel(tmp.path(), cache.path())
        .args(["build", "--offline"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Fresh cmsis"))
        .stderr(predicate::str::contains("0 repackaged"));
}

#[test]
fn test_build_checksum_mismatch_names_the_recipe() {
    let bad = format!("sha256:{}", "0".repeat(64));
    let (tmp, cache) = firmware_workspace(Some(&bad));

    keel(tmp.path(), cache.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "failed to build `arm-none-eabi-gcc`: checksum mismatch",
        ))
        .stderr(predicate::str::contains("expected sha256:0000"));

    assert!(!tmp.path().join(".keel/packages/keel-buildinfo.json").exists());
}

// ============================================================================
// keel env
// ============================================================================

#[test]
fn test_env_cmake_toolchain_file() {
    let (tmp, cache) = firmware_workspace(None);

    keel(tmp.path(), cache.path())
        .args(["env", "--format", "cmake"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "set(CMAKE_C_COMPILER \"arm-none-eabi-gcc\")",
        ))
        .stdout(predicate::str::contains(
            "set(CMAKE_C_FLAGS_INIT \"-mcpu=cortex-m4 -mthumb\")",
        ));
}

#[test]
fn test_env_shell_for_one_recipe() {
    let (tmp, cache) = firmware_workspace(None);

    keel(tmp.path(), cache.path())
        .args(["env", "--format", "shell", "--recipe", "cmsis"])
        .assert()
        .success()
        .stdout(predicate::str::contains("export KEEL_INCLUDE_DIRS="))
        .stdout(predicate::str::contains("CC=").not());
}

#[test]
fn test_env_rejects_unknown_format() {
    let (tmp, cache) = firmware_workspace(None);

    keel(tmp.path(), cache.path())
        .args(["env", "--format", "yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format `yaml`"));
}

// ============================================================================
// keel fetch / cache
// ============================================================================

#[test]
fn test_fetch_then_cache_list_and_clean() {
    let (tmp, cache) = firmware_workspace(None);

    keel(tmp.path(), cache.path())
        .args(["fetch", "--offline"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("offline"));

    keel(tmp.path(), cache.path())
        .arg("fetch")
        .assert()
        .success()
        .stderr(predicate::str::contains("Fetched arm-none-eabi-gcc"));

    keel(tmp.path(), cache.path())
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("arm-gnu-toolchain.tar.gz"));

    keel(tmp.path(), cache.path())
        .args(["cache", "clean"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed 1 artifact(s)"));

    keel(tmp.path(), cache.path())
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(none)"));
}

#[test]
fn test_cache_path_honors_env() {
    let tmp = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();

    keel(tmp.path(), cache.path())
        .args(["cache", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(cache.path().to_str().unwrap()));
}

#[test]
fn test_completions() {
    let tmp = TempDir::new().unwrap();

    keel(tmp.path(), tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keel"));
}

// ============================================================================
// demos/stm32g4
// ============================================================================

fn demo_manifest() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/stm32g4/Keel.toml")
}

#[test]
fn test_demo_workspace_plan() {
    let tmp = TempDir::new().unwrap();
    let output = keel(tmp.path(), tmp.path())
        .args(["plan", "--json", "--manifest-path"])
        .arg(demo_manifest())
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let order: Vec<&str> = plan["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        order,
        [
            "arm-none-eabi-gcc",
            "cmsis",
            "freertos",
            "stm32g4_hal_driver",
            "st67w6x_network_driver",
        ]
    );
}

#[test]
fn test_demo_workspace_env_without_download() {
    let tmp = TempDir::new().unwrap();
    keel(tmp.path(), tmp.path())
        .args(["env", "--format", "cmake", "--manifest-path"])
        .arg(demo_manifest())
        .assert()
        .success()
        .stdout(predicate::str::contains("set(CMAKE_CXX_COMPILER \"arm-none-eabi-g++\")"))
        .stdout(predicate::str::contains("stm32g4_hal_driver/1.2.5/include/Legacy"));
}
