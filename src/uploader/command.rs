use crate::coldsync::config::UploaderConfig;
use crate::coldsync::util::{run_command_with_optional_timeout, tail_with_ellipsis};
use crate::error::ColdsyncError;
use crate::uploader::{UploadReceipt, Uploader};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const OUTPUT_TAIL_CHARS: usize = 400;

/// Runs an external program once per archive; exit status 0 means success.
#[derive(Debug, Clone)]
pub struct CommandUploader {
    program: PathBuf,
    args: Vec<String>,
    timeout_secs: Option<u64>,
}

fn ensure_file(path: &Path) -> Result<()> {
    let meta = fs::metadata(path)
        .with_context(|| format!("uploader binary path does not exist: {}", path.display()))?;
    if !meta.is_file() {
        anyhow::bail!("uploader binary path is not a file: {}", path.display());
    }
    Ok(())
}

/// Bare names are looked up on `PATH`; anything with a separator must exist.
pub fn resolve_program(program: &str) -> Result<PathBuf> {
    let trimmed = program.trim();
    if trimmed.is_empty() {
        return Err(ColdsyncError::MissingUploaderBinary("empty program name".to_string()).into());
    }
    let candidate = Path::new(trimmed);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        ensure_file(candidate)
            .map_err(|err| ColdsyncError::MissingUploaderBinary(format!("{err:#}")))?;
        return Ok(candidate.to_path_buf());
    }
    which::which(trimmed).map_err(|err| {
        ColdsyncError::MissingUploaderBinary(format!("`{trimmed}` not found on PATH: {err}"))
            .into()
    })
}

pub fn render_args(template: &[String], vault: &str, archive_name: &str, archive_path: &str) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            arg.replace("{vault}", vault)
                .replace("{archive}", archive_name)
                .replace("{path}", archive_path)
        })
        .collect()
}

impl CommandUploader {
    pub fn from_config(cfg: &UploaderConfig) -> Result<Self> {
        let program = resolve_program(&cfg.program)?;
        Ok(Self {
            program,
            args: cfg.args.clone(),
            timeout_secs: cfg.timeout_secs,
        })
    }
}

impl Uploader for CommandUploader {
    fn upload(&self, archive: &Path, vault: &str) -> Result<UploadReceipt> {
        let archive_name = archive
            .file_name()
            .and_then(|s| s.to_str())
            .with_context(|| format!("archive path has no UTF-8 file name: {}", archive.display()))?;
        let absolute = std::path::absolute(archive)
            .with_context(|| format!("failed to resolve {}", archive.display()))?;
        let archive_path = absolute.display().to_string();
        let args = render_args(&self.args, vault, archive_name, &archive_path);

        let mut cmd = Command::new(&self.program);
        cmd.args(&args);
        // The uploader derives the remote description from the name it is
        // given, so it must see the bare file name relative to its own dir.
        if let Some(dir) = absolute.parent() {
            cmd.current_dir(dir);
        }

        let out = run_command_with_optional_timeout(&mut cmd, self.timeout_secs).with_context(
            || format!("failed to run `{} {}`", self.program.display(), args.join(" ")),
        )?;

        let stdout = String::from_utf8_lossy(&out.stdout).to_string();
        let stderr = String::from_utf8_lossy(&out.stderr).to_string();
        if !out.status.success() {
            anyhow::bail!(
                "uploader exited with {} for {}\nstdout: {}\nstderr: {}",
                out.status,
                archive_name,
                tail_with_ellipsis(&stdout, OUTPUT_TAIL_CHARS),
                tail_with_ellipsis(&stderr, OUTPUT_TAIL_CHARS)
            );
        }

        Ok(UploadReceipt {
            summary: tail_with_ellipsis(&stdout, OUTPUT_TAIL_CHARS),
        })
    }

    fn describe(&self) -> String {
        format!("{} {}", self.program.display(), self.args.join(" "))
    }
}
