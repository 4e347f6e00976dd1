//! Rendering a composed [`BuildInfo`] for the firmware build.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::build_info::{BuildInfo, EnvOp, FlagCategory, PATH_LIST_SEPARATOR};
use crate::error::{Error, Result};

/// Output formats for `keel env` and the build reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitFormat {
    #[default]
    Json,
    Shell,
    Cmake,
}

impl EmitFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmitFormat::Json => "json",
            EmitFormat::Shell => "shell",
            EmitFormat::Cmake => "cmake",
        }
    }
}

impl fmt::Display for EmitFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmitFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "json" => Ok(EmitFormat::Json),
            "shell" | "sh" => Ok(EmitFormat::Shell),
            "cmake" => Ok(EmitFormat::Cmake),
            other => Err(format!("unknown format `{}` (expected json, shell or cmake)", other)),
        }
    }
}

/// Render `info` in `format`. Shell output applies env edits on top of `base`.
pub fn render(
    info: &BuildInfo,
    format: EmitFormat,
    base: &BTreeMap<String, String>,
) -> Result<String> {
    match format {
        EmitFormat::Json => to_json(info),
        EmitFormat::Shell => Ok(to_shell(info, base)),
        EmitFormat::Cmake => Ok(to_cmake(info)),
    }
}

pub fn to_json(info: &BuildInfo) -> Result<String> {
    serde_json::to_string_pretty(info)
        .map_err(|e| Error::io("failed to serialize build info", std::io::Error::other(e)))
}

/// Conventional variable for a tool role, as used by make and autotools.
fn shell_tool_var(role: &str) -> String {
    match role {
        "c" | "cc" => "CC".to_string(),
        "cpp" | "cxx" | "c++" => "CXX".to_string(),
        "asm" | "as" => "AS".to_string(),
        other => other.to_uppercase().replace(['-', '+', '.'], "_"),
    }
}

/// POSIX `export` lines.
pub fn to_shell(info: &BuildInfo, base: &BTreeMap<String, String>) -> String {
    let mut vars: BTreeMap<String, String> = BTreeMap::new();

    for (role, exe) in &info.compiler_executables {
        vars.insert(shell_tool_var(role), exe.clone());
    }

    let flag_vars = [
        (FlagCategory::C, "CFLAGS"),
        (FlagCategory::Cxx, "CXXFLAGS"),
        (FlagCategory::Asm, "ASFLAGS"),
        (FlagCategory::Link, "LDFLAGS"),
    ];
    for (category, var) in flag_vars {
        let flags = info.flags(category);
        if !flags.is_empty() {
            vars.insert(var.to_string(), flags.join(" "));
        }
    }

    for (var, dirs) in [
        ("KEEL_INCLUDE_DIRS", &info.include_dirs),
        ("KEEL_SOURCE_DIRS", &info.source_dirs),
        ("KEEL_LIB_DIRS", &info.lib_dirs),
    ] {
        if !dirs.is_empty() {
            vars.insert(var.to_string(), join_paths(dirs, PATH_LIST_SEPARATOR));
        }
    }

    // Recipe env edits win over the derived variables above.
    vars.extend(info.environment(base));

    let mut out = String::new();
    for (var, value) in &vars {
        let _ = writeln!(out, "export {}={}", var, shell_quote(value));
    }
    out
}

fn join_paths(dirs: &[PathBuf], sep: char) -> String {
    dirs.iter()
        .map(|d| d.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(&sep.to_string())
}

/// Single-quote `value` for a POSIX shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn cmake_tool_var(role: &str) -> String {
    match role {
        "c" | "cc" => "CMAKE_C_COMPILER".to_string(),
        "cpp" | "cxx" | "c++" => "CMAKE_CXX_COMPILER".to_string(),
        "asm" | "as" => "CMAKE_ASM_COMPILER".to_string(),
        "ar" | "ranlib" | "nm" | "objcopy" | "objdump" | "strip" | "linker" => {
            format!("CMAKE_{}", role.to_uppercase())
        }
        other => format!("KEEL_TOOL_{}", other.to_uppercase().replace(['-', '+', '.'], "_")),
    }
}

fn cmake_quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn cmake_path(path: &Path) -> String {
    cmake_quote(&path.to_string_lossy().replace('\\', "/"))
}

/// A CMake toolchain file.
pub fn to_cmake(info: &BuildInfo) -> String {
    let mut out = String::from("# Generated by keel. Do not edit.\n\n");

    for (role, exe) in &info.compiler_executables {
        let _ = writeln!(out, "set({} {})", cmake_tool_var(role), cmake_quote(exe));
    }

    let flag_vars = [
        (FlagCategory::C, "CMAKE_C_FLAGS_INIT"),
        (FlagCategory::Cxx, "CMAKE_CXX_FLAGS_INIT"),
        (FlagCategory::Asm, "CMAKE_ASM_FLAGS_INIT"),
    ];
    for (category, var) in flag_vars {
        let flags = info.flags(category);
        if !flags.is_empty() {
            let _ = writeln!(out, "set({} {})", var, cmake_quote(&flags.join(" ")));
        }
    }
    let link = info.flags(FlagCategory::Link);
    if !link.is_empty() {
        let joined = cmake_quote(&link.join(" "));
        let _ = writeln!(out, "set(CMAKE_EXE_LINKER_FLAGS_INIT {})", joined);
        let _ = writeln!(out, "set(CMAKE_SHARED_LINKER_FLAGS_INIT {})", joined);
    }

    out.push('\n');
    for (var, dirs) in [
        ("KEEL_INCLUDE_DIRS", &info.include_dirs),
        ("KEEL_SOURCE_DIRS", &info.source_dirs),
        ("KEEL_LIB_DIRS", &info.lib_dirs),
    ] {
        let items: Vec<String> = dirs.iter().map(|d| cmake_path(d)).collect();
        if items.is_empty() {
            let _ = writeln!(out, "set({})", var);
        } else {
            let _ = writeln!(out, "set({}\n    {}\n)", var, items.join("\n    "));
        }
    }

    if !info.env_edits.is_empty() {
        out.push('\n');
    }
    for edit in &info.env_edits {
        let current = format!("$ENV{{{}}}", edit.var);
        let value = match edit.op {
            EnvOp::Set => cmake_quote(&edit.value),
            EnvOp::Prepend => cmake_quote(&format!("{}{}{}", edit.value, PATH_LIST_SEPARATOR, current)),
            EnvOp::Append => cmake_quote(&format!("{}{}{}", current, PATH_LIST_SEPARATOR, edit.value)),
        };
        let _ = writeln!(out, "set(ENV{{{}}} {})", edit.var, value);
    }

    out
}
