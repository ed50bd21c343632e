use crate::coldsync::names::LocalNameRules;
use crate::coldsync::paths::ColdsyncPaths;
use crate::coldsync::reconcile::ReconcileRules;
use crate::error::ColdsyncError;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const WIDE_TOLERANCE_BYTES: u64 = 2 * 1024 * 1024;
pub const NARROW_TOLERANCE_BYTES: u64 = 256 * 1024;

/// Named presets for the two historical checklist variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileProfile {
    /// 2 MiB tolerance, `"` rewritten to `-`, remote-only archives reported.
    #[default]
    Wide,
    /// 256 KiB tolerance, quotes kept, remote-only archives ignored.
    Narrow,
}

impl ReconcileProfile {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "wide" => Some(Self::Wide),
            "narrow" => Some(Self::Narrow),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wide => "wide",
            Self::Narrow => "narrow",
        }
    }

    pub fn tolerance_bytes(self) -> u64 {
        match self {
            Self::Wide => WIDE_TOLERANCE_BYTES,
            Self::Narrow => NARROW_TOLERANCE_BYTES,
        }
    }

    pub fn replace_quotes(self) -> bool {
        matches!(self, Self::Wide)
    }

    pub fn report_missing_local(self) -> bool {
        matches!(self, Self::Wide)
    }
}

/// Per-setting overrides sit on top of the profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub profile: ReconcileProfile,
    pub tolerance_bytes: Option<u64>,
    pub replace_quotes: Option<bool>,
    pub report_missing_local: Option<bool>,
}

impl ReconcileConfig {
    pub fn tolerance_bytes(&self) -> u64 {
        self.tolerance_bytes
            .unwrap_or_else(|| self.profile.tolerance_bytes())
    }

    pub fn name_rules(&self) -> LocalNameRules {
        LocalNameRules {
            replace_quotes: self
                .replace_quotes
                .unwrap_or_else(|| self.profile.replace_quotes()),
        }
    }

    pub fn rules(&self) -> ReconcileRules {
        ReconcileRules {
            tolerance_bytes: self.tolerance_bytes(),
            report_missing_local: self
                .report_missing_local
                .unwrap_or_else(|| self.profile.report_missing_local()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Directory scanned for archives. Defaults to the working directory.
    pub dir: Option<PathBuf>,
    pub poll_interval_secs: u64,
    pub done_prefix: String,
    pub archive_extension: String,
    pub partial_suffix: String,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            dir: None,
            poll_interval_secs: 30,
            done_prefix: "done_".to_string(),
            archive_extension: "zip".to_string(),
            partial_suffix: ".part".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    pub program: String,
    /// Argument template; `{vault}`, `{archive}` and `{path}` are substituted.
    pub args: Vec<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            program: "java".to_string(),
            args: vec![
                "-Dvault={vault}".to_string(),
                "-Darchive={archive}".to_string(),
                "-jar".to_string(),
                "glupload.jar".to_string(),
            ],
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultNames {
    pub movies: String,
    pub tv_shows: String,
}

impl Default for VaultNames {
    fn default() -> Self {
        Self {
            movies: "Movies".to_string(),
            tv_shows: "TVShows".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ColdsyncConfig {
    pub reconcile: ReconcileConfig,
    pub watcher: WatcherConfig,
    pub uploader: UploaderConfig,
    pub vaults: VaultNames,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialColdsyncConfig {
    reconcile: Option<ReconcileConfig>,
    watcher: Option<WatcherConfig>,
    uploader: Option<UploaderConfig>,
    vaults: Option<VaultNames>,
}

fn env_nonempty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn parse_u64_value(var: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| anyhow!("invalid {var} `{raw}`: expected a whole number"))
}

fn parse_bool_value(var: &str, raw: &str) -> Result<bool> {
    match raw.trim() {
        "1" | "true" | "TRUE" | "yes" | "on" => Ok(true),
        "0" | "false" | "FALSE" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("invalid {var} `{raw}`: expected true or false")),
    }
}

fn env_or_u64(var: &str, fallback: u64) -> Result<u64> {
    match env_nonempty(var) {
        Some(raw) => parse_u64_value(var, &raw),
        None => Ok(fallback),
    }
}

fn env_or_opt_u64(var: &str, fallback: Option<u64>) -> Result<Option<u64>> {
    match env_nonempty(var) {
        Some(raw) => parse_u64_value(var, &raw).map(Some),
        None => Ok(fallback),
    }
}

fn env_or_opt_bool(var: &str, fallback: Option<bool>) -> Result<Option<bool>> {
    match env_nonempty(var) {
        Some(raw) => parse_bool_value(var, &raw).map(Some),
        None => Ok(fallback),
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    env_nonempty(var).unwrap_or_else(|| fallback.to_string())
}

pub fn validate(cfg: &ColdsyncConfig) -> Result<()> {
    if cfg.watcher.poll_interval_secs == 0 {
        return Err(anyhow!(
            "invalid watcher poll interval: must be >= 1 second"
        ));
    }
    if cfg.watcher.done_prefix.trim().is_empty() {
        return Err(anyhow!("invalid watcher done prefix: cannot be empty"));
    }
    if cfg.watcher.archive_extension.trim().is_empty()
        || cfg.watcher.archive_extension.contains('.')
    {
        return Err(anyhow!(
            "invalid archive extension: use a bare extension such as `zip`"
        ));
    }
    if cfg.watcher.partial_suffix.trim().is_empty() {
        return Err(anyhow!("invalid partial-upload suffix: cannot be empty"));
    }
    if cfg.uploader.program.trim().is_empty() {
        return Err(anyhow!("invalid uploader program: cannot be empty"));
    }
    if !cfg.uploader.args.iter().any(|a| a.contains("{vault}")) {
        return Err(anyhow!(
            "invalid uploader args: the template must pass `{{vault}}`"
        ));
    }
    if !cfg
        .uploader
        .args
        .iter()
        .any(|a| a.contains("{archive}") || a.contains("{path}"))
    {
        return Err(anyhow!(
            "invalid uploader args: the template must pass `{{archive}}` or `{{path}}`"
        ));
    }
    if cfg.uploader.timeout_secs == Some(0) {
        return Err(anyhow!("invalid uploader timeout: must be >= 1 second"));
    }
    if cfg.vaults.movies.trim().is_empty() || cfg.vaults.tv_shows.trim().is_empty() {
        return Err(anyhow!("invalid vault names: cannot be empty"));
    }
    Ok(())
}

fn merge_file_config(base: &mut ColdsyncConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path).map_err(|err| {
        ColdsyncError::InvalidConfig(format!(
            "failed to read coldsync config {}: {err}",
            path.display()
        ))
    })?;
    let parsed: PartialColdsyncConfig = toml::from_str(&raw).map_err(|err| {
        ColdsyncError::InvalidConfig(format!(
            "failed to parse coldsync config {}: {err}",
            path.display()
        ))
    })?;
    if let Some(reconcile) = parsed.reconcile {
        base.reconcile = reconcile;
    }
    if let Some(watcher) = parsed.watcher {
        base.watcher = watcher;
    }
    if let Some(uploader) = parsed.uploader {
        base.uploader = uploader;
    }
    if let Some(vaults) = parsed.vaults {
        base.vaults = vaults;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut ColdsyncConfig) -> Result<()> {
    if let Some(raw) = env_nonempty("COLDSYNC_PROFILE") {
        cfg.reconcile.profile = ReconcileProfile::parse(&raw)
            .ok_or_else(|| anyhow!("invalid COLDSYNC_PROFILE `{raw}`: use `wide` or `narrow`"))?;
    }
    cfg.reconcile.tolerance_bytes =
        env_or_opt_u64("COLDSYNC_TOLERANCE_BYTES", cfg.reconcile.tolerance_bytes)?;
    cfg.reconcile.replace_quotes =
        env_or_opt_bool("COLDSYNC_REPLACE_QUOTES", cfg.reconcile.replace_quotes)?;
    cfg.reconcile.report_missing_local = env_or_opt_bool(
        "COLDSYNC_REPORT_MISSING_LOCAL",
        cfg.reconcile.report_missing_local,
    )?;

    if let Some(dir) = env_nonempty("COLDSYNC_WATCH_DIR") {
        cfg.watcher.dir = Some(PathBuf::from(dir));
    }
    cfg.watcher.poll_interval_secs =
        env_or_u64("COLDSYNC_POLL_INTERVAL_SECS", cfg.watcher.poll_interval_secs)?;

    cfg.uploader.program = env_or_string("COLDSYNC_UPLOADER_BIN", &cfg.uploader.program);
    cfg.uploader.timeout_secs =
        env_or_opt_u64("COLDSYNC_UPLOAD_TIMEOUT_SECS", cfg.uploader.timeout_secs)?;

    cfg.vaults.movies = env_or_string("COLDSYNC_MOVIES_VAULT", &cfg.vaults.movies);
    cfg.vaults.tv_shows = env_or_string("COLDSYNC_TV_VAULT", &cfg.vaults.tv_shows);
    Ok(())
}

pub fn load_config_from(path: &Path) -> Result<ColdsyncConfig> {
    let mut cfg = ColdsyncConfig::default();
    merge_file_config(&mut cfg, path)?;
    apply_env_overrides(&mut cfg)?;
    validate(&cfg)?;
    Ok(cfg)
}

pub fn load_config(paths: &ColdsyncPaths) -> Result<ColdsyncConfig> {
    load_config_from(&paths.config_file)
}
