use crate::Config;
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "REPOMD_";

/// Platform configuration file location, e.g. `~/.config/repomd/repomd.toml`
/// on Linux.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "repomd").map(|dirs| dirs.config_dir().join("repomd.toml"))
}

/// Load and validate configuration.
///
/// With an explicit `path` the file must exist. Without one, the
/// [`default_path()`] is used if it exists and skipped otherwise.
/// Environment variables override file values either way.
#[tracing::instrument(level = "debug")]
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::new();
    let file = match path {
        Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
        Some(path) => Some(path.to_path_buf()),
        None => default_path().filter(|path| path.is_file()),
    };
    if let Some(file) = file {
        tracing::debug!(file = %file.display(), "merging configuration file");
        figment = merge_file(figment, &file)?;
    }
    let config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ErrorKind::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

fn merge_file(figment: Figment, file: &Path) -> Result<Figment> {
    let extension = file.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(file)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(file)),
        Some("json") => figment.merge(Json::file_exact(file)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(file.to_path_buf())),
    })
}
