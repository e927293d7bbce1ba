//! Compile-and-run support for the execution tests.
//!
//! Programs are lowered to LLVM IR, handed to whatever clang is on PATH,
//! linked against the `mvs-rt-native` static archive, and executed; the
//! caller asserts on the real stdout. When clang or the archive is
//! missing the helpers return `None` and the test logs a skip instead of
//! failing.

use std::path::{Path, PathBuf};
use std::process::Command;

use miette::{IntoDiagnostic, Result};
use mvs_backend_llvm::{emit_program, CodegenOptions};
use mvs_core::{check_program, CheckOptions};

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
}

pub fn find_clang() -> Option<PathBuf> {
    if Command::new("clang").arg("--version").output().is_ok() {
        return Some(PathBuf::from("clang"));
    }
    None
}

/// The static runtime archive. This crate dev-depends on `mvs-rt-native`,
/// so cargo has built it before any test here runs; the artifact is
/// uplifted next to the profile directory for workspace builds and kept
/// under `deps/` otherwise.
pub fn runtime_static_lib() -> Option<PathBuf> {
    let target_dir = std::env::var_os("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                .join("..")
                .join("target")
        });
    let profile = if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    };
    let profile_dir = target_dir.join(profile);

    let uplifted = profile_dir.join("libmvs_rt_native.a");
    if uplifted.exists() {
        return Some(uplifted);
    }

    // Fall back to the hashed artifacts under deps/, newest first.
    let deps = profile_dir.join("deps");
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(&deps)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("libmvs_rt_native") && n.ends_with(".a"))
        })
        .collect();
    candidates.sort_by_key(|p| {
        std::fs::metadata(p)
            .and_then(|m| m.modified())
            .ok()
    });
    candidates.pop()
}

pub fn ensure_required_tooling_available() -> Result<()> {
    if std::env::var("MVS_EXECUTION_REQUIRE_CC").ok().as_deref() == Some("1") {
        if find_clang().is_none() {
            return Err(miette::miette!(
                "MVS_EXECUTION_REQUIRE_CC=1 but no clang found in PATH"
            ));
        }
        if runtime_static_lib().is_none() {
            return Err(miette::miette!(
                "MVS_EXECUTION_REQUIRE_CC=1 but libmvs_rt_native.a was not built"
            ));
        }
    }
    Ok(())
}

/// Compiles `src` to a native executable and runs it. `None` means the
/// required tooling is unavailable.
pub fn compile_and_run(case_name: &str, src: &str, out_dir: &Path) -> Result<Option<RunOutcome>> {
    let Some(clang) = find_clang() else {
        return Ok(None);
    };
    let Some(runtime) = runtime_static_lib() else {
        return Ok(None);
    };

    let program = match mvs_parse::parse_source(src) {
        Ok(p) => p,
        Err(e) => {
            return Ok(Some(RunOutcome {
                ok: false,
                stdout: String::new(),
                stderr: format!("{case_name}: parse failed: {e:?}"),
            }));
        }
    };

    let typed = match check_program(&program, CheckOptions::default()) {
        Ok(t) => t,
        Err(e) => {
            return Ok(Some(RunOutcome {
                ok: false,
                stdout: String::new(),
                stderr: format!("{case_name}: checking failed: {e:?}"),
            }));
        }
    };

    let opts = CodegenOptions {
        source_name: format!("{case_name}.mvs"),
        ..CodegenOptions::default()
    };
    let artifacts = match emit_program(&typed, &opts) {
        Ok(a) => a,
        Err(e) => {
            return Ok(Some(RunOutcome {
                ok: false,
                stdout: String::new(),
                stderr: format!("{case_name}: codegen failed: {e}"),
            }));
        }
    };

    std::fs::create_dir_all(out_dir).into_diagnostic()?;
    let ll_path = out_dir.join("module.ll");
    std::fs::write(&ll_path, artifacts.llvm_ir).into_diagnostic()?;

    let exe = out_dir.join("run_llvm");
    let status = Command::new(&clang)
        .arg("-O2")
        .arg(&ll_path)
        .arg(&runtime)
        .arg("-lpthread")
        .arg("-ldl")
        .arg("-lm")
        .arg("-o")
        .arg(&exe)
        .current_dir(out_dir)
        .status()
        .into_diagnostic()?;

    if !status.success() {
        return Ok(Some(RunOutcome {
            ok: false,
            stdout: String::new(),
            stderr: format!("LLVM compilation failed: {status}"),
        }));
    }

    let output = Command::new(&exe).output().into_diagnostic()?;
    Ok(Some(RunOutcome {
        ok: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }))
}
