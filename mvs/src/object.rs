#![forbid(unsafe_code)]

//! Object emission through an external `clang`.
//!
//! The backend produces LLVM IR text; assembling it into a native object
//! file is delegated to whatever clang is on PATH. The resulting object
//! links against the static runtime library (`mvs-rt-native`).

use std::path::{Path, PathBuf};
use std::process::Command;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("object emission error: {message}")]
#[diagnostic(code(mvs::object))]
pub struct ObjectError {
    pub message: String,
}

pub fn find_clang() -> Option<PathBuf> {
    if let Ok(out) = Command::new("which").arg("clang").output() {
        if out.status.success() {
            if let Ok(s) = String::from_utf8(out.stdout) {
                if let Some(first) = s.lines().next() {
                    let p = PathBuf::from(first.trim());
                    if p.exists() {
                        return Some(p);
                    }
                }
            }
        }
    }
    None
}

pub fn emit_object(module_ll: &Path, out_obj: &Path, optimize: bool) -> Result<(), ObjectError> {
    let clang = find_clang().ok_or_else(|| ObjectError {
        message: "could not locate clang (install LLVM or put clang in PATH)".to_string(),
    })?;

    let mut args: Vec<String> = Vec::new();
    args.push("-c".to_string());
    args.push(module_ll.display().to_string());
    if optimize {
        args.push("-O2".to_string());
    }
    args.push("-o".to_string());
    args.push(out_obj.display().to_string());

    let out = Command::new(clang)
        .args(&args)
        .output()
        .map_err(|e| ObjectError {
            message: format!("failed to run clang: {e}"),
        })?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(ObjectError {
            message: format!(
                "clang failed (exit {})\ncommand:\n  clang {}\nstderr:\n{}",
                out.status,
                args.join(" "),
                stderr
            ),
        });
    }
    Ok(())
}
