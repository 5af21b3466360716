use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const API_KEY_FILE: &str = "api_key";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct ConfigDir {
    root: PathBuf,
}

impl ConfigDir {
    /// Resolve the config directory from, in order of priority:
    /// 1. An explicit path (from --config-dir)
    /// 2. The DOCSCOUT_CONFIG_DIR environment variable
    /// 3. The XDG config directory (~/.config/docscout/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("DOCSCOUT_CONFIG_DIR") {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("docscout")
                .get_config_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG config home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::ConfigDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn api_key_file(&self) -> PathBuf {
        self.root.join(API_KEY_FILE)
    }
}

/// Persistent settings. A missing config file loads as all-defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default root directory for search, chat, and the MCP server.
    pub root_dir: Option<PathBuf>,
    /// Absolute paths whose subtrees are never searched.
    pub exclusions: Vec<PathBuf>,
    /// Gemini model override.
    pub model: Option<String>,
}

impl Config {
    pub fn load(dir: &ConfigDir) -> Result<Self> {
        let path = dir.config_file();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        toml::from_str(&raw).map_err(|e| {
            Error::Config(format!("invalid config {}: {e}", path.display()))
        })
    }

    pub fn save(&self, dir: &ConfigDir) -> Result<()> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot serialize config: {e}")))?;
        std::fs::write(dir.config_file(), raw)?;
        Ok(())
    }

    /// The effective search root: an explicit flag wins over the config
    /// file; having neither is a configuration error.
    pub fn resolve_root(&self, explicit: Option<PathBuf>) -> Result<PathBuf> {
        explicit
            .or_else(|| self.root_dir.clone())
            .ok_or_else(|| {
                Error::Config(
                    "no root directory; pass --root or run `docscout config set-root`"
                        .into(),
                )
            })
    }
}

/// Look up the Gemini API key: the environment variable wins, then the
/// key file under the config directory.
pub fn load_api_key(dir: &ConfigDir) -> Result<Option<String>> {
    api_key_from(dir, std::env::var(API_KEY_ENV).ok().as_deref())
}

fn api_key_from(
    dir: &ConfigDir,
    env_override: Option<&str>,
) -> Result<Option<String>> {
    if let Some(key) = env_override {
        let key = key.trim();
        if !key.is_empty() {
            return Ok(Some(key.to_string()));
        }
    }

    let path = dir.api_key_file();
    if !path.exists() {
        return Ok(None);
    }
    let key = std::fs::read_to_string(&path)?;
    let key = key.trim();
    if key.is_empty() {
        Ok(None)
    } else {
        Ok(Some(key.to_string()))
    }
}

pub fn store_api_key(dir: &ConfigDir, key: &str) -> Result<()> {
    let path = dir.api_key_file();

    // The file is created owner-only; it never exists with wider
    // permissions, not even between creation and a chmod.
    #[cfg(unix)]
    {
        use std::io::Write as _;
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)?;
        file.write_all(key.trim().as_bytes())?;

        // mode() only applies on creation; tighten a pre-existing file.
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(&path, perms)?;
    }

    #[cfg(not(unix))]
    std::fs::write(&path, key.trim())?;

    Ok(())
}

pub fn clear_api_key(dir: &ConfigDir) -> Result<bool> {
    let path = dir.api_key_file();
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(&path)?;
    Ok(true)
}
