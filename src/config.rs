// meshctl - CLI for the mesh data API
// Copyright (C) 2025 meshctl contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};
use thiserror::Error;

pub const DEFAULT_HOST: &str = "http://localhost:3000";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Default,
    Json,
}

/// The persisted login record. Always replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub host: String,
    pub access_token: String,
    pub output_format: OutputFormat,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a writable config directory for the current user")]
    MissingConfigDir,
    #[error(
        "No credentials found. Run `meshctl config --email <your_email> --password <your_password>` to log in."
    )]
    Missing,
}

pub fn credential_path() -> Result<PathBuf> {
    if let Ok(custom) = env::var("MESHCTL_CONFIG_DIR") {
        return Ok(PathBuf::from(custom).join("credentials.json"));
    }
    let base = config_dir().ok_or(ConfigError::MissingConfigDir)?;
    Ok(base.join("meshctl").join("credentials.json"))
}

pub fn load() -> Result<Credential> {
    let path = credential_path()?;
    if !path.exists() {
        return Err(ConfigError::Missing.into());
    }
    let contents = fs::read_to_string(&path).with_context(|| format!("reading {path:?}"))?;
    let credential =
        serde_json::from_str(&contents).with_context(|| format!("parsing {path:?}"))?;
    Ok(credential)
}

pub fn save(credential: &Credential) -> Result<PathBuf> {
    let path = credential_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {parent:?}"))?;
    }
    let serialized = serde_json::to_string_pretty(credential).context("serializing credentials")?;
    fs::write(&path, serialized).with_context(|| format!("writing {path:?}"))?;
    restrict_permissions(&path)?;
    Ok(path)
}

// The stored token is a secret; only the owner may read the file.
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)
        .with_context(|| format!("inspecting {path:?}"))?
        .permissions();
    permissions.set_mode(0o600);
    fs::set_permissions(path, permissions).with_context(|| format!("restricting {path:?}"))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
