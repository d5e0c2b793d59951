//! External executables: the `dci` packager and the alpha8 converter.
//!
//! Both are blocking, one-shot subprocesses. A non-zero exit status is a
//! failure whose captured stdout/stderr is handed back verbatim; only a
//! missing executable or a spawn failure is an `Err`.
//!
//! | Tool | Invocation |
//! |---|---|
//! | pack | `dci --create <destDir> <stagedIconDir>` |
//! | unpack | `dci --export <destDir> <bundlePath>` |
//! | alpha8 | `dci-image-converter --toAlpha8 <outputPath> <inputPng>` |

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Required executable {0:?} was not found")]
    NotFound(String),
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Exit status and captured streams of one tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success() -> Self {
        Self {
            status: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Packs a staged icon tree into a bundle and unpacks bundles for preview.
pub trait Packager {
    /// Fail early when the packager can't be run at all.
    fn ensure_available(&self) -> Result<(), ToolError>;

    fn pack(&self, staged_dir: &Path, dest_dir: &Path) -> Result<ToolOutput, ToolError>;

    fn unpack(&self, bundle: &Path, dest_dir: &Path) -> Result<ToolOutput, ToolError>;
}

/// Produces an alpha-only rendition of a PNG.
pub trait AlphaConverter {
    fn ensure_available(&self) -> Result<(), ToolError>;

    fn to_alpha8(&self, input_png: &Path, output: &Path) -> Result<ToolOutput, ToolError>;
}

/// The `dci` command-line packager.
#[derive(Debug, Clone)]
pub struct DciTool {
    program: String,
}

impl DciTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Packager for DciTool {
    fn ensure_available(&self) -> Result<(), ToolError> {
        require_executable(&self.program)
    }

    fn pack(&self, staged_dir: &Path, dest_dir: &Path) -> Result<ToolOutput, ToolError> {
        run(
            &self.program,
            [OsStr::new("--create"), dest_dir.as_os_str(), staged_dir.as_os_str()],
        )
    }

    fn unpack(&self, bundle: &Path, dest_dir: &Path) -> Result<ToolOutput, ToolError> {
        run(
            &self.program,
            [OsStr::new("--export"), dest_dir.as_os_str(), bundle.as_os_str()],
        )
    }
}

/// The `dci-image-converter` executable.
#[derive(Debug, Clone)]
pub struct DciImageConverter {
    program: String,
}

impl DciImageConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl AlphaConverter for DciImageConverter {
    fn ensure_available(&self) -> Result<(), ToolError> {
        require_executable(&self.program)
    }

    fn to_alpha8(&self, input_png: &Path, output: &Path) -> Result<ToolOutput, ToolError> {
        run(
            &self.program,
            [OsStr::new("--toAlpha8"), output.as_os_str(), input_png.as_os_str()],
        )
    }
}

fn run<'a>(
    program: &str,
    args: impl IntoIterator<Item = &'a OsStr>,
) -> Result<ToolOutput, ToolError> {
    let args: Vec<&OsStr> = args.into_iter().collect();
    tracing::debug!("Command: {program}, Arguments: {args:?}");
    let output = Command::new(program)
        .args(&args)
        .output()
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;
    let result = ToolOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    tracing::debug!("{program} exited with {:?}", result.status);
    Ok(result)
}

/// Locate `program`: a path is checked directly, a bare name is searched on `PATH`.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}

fn require_executable(program: &str) -> Result<(), ToolError> {
    find_executable(program)
        .map(|_| ())
        .ok_or_else(|| ToolError::NotFound(program.to_string()))
}
