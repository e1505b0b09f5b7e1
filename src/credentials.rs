// Where credentials come from: explicit values, the environment, or a
// JSON file in the user's config directory readable only by its owner.

use crate::error::{Result, TonieError};
use crate::session::Credentials;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const USERNAME_VAR: &str = "TONIE_USERNAME";
pub const PASSWORD_VAR: &str = "TONIE_PASSWORD";

#[derive(Debug, Clone)]
pub enum CredentialSource {
    Explicit(Credentials),
    Environment,
    File(PathBuf),
}

#[derive(Serialize, Deserialize)]
struct StoredCredentials {
    username: String,
    password: String,
}

/// `<config_dir>/tonie-api/credentials.json`, if a config dir exists.
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tonie-api").join("credentials.json"))
}

impl CredentialSource {
    /// `Ok(None)` when this source simply has nothing to offer.
    pub fn load(&self) -> Result<Option<Credentials>> {
        match self {
            CredentialSource::Explicit(creds) => Ok(Some(creds.clone()).filter(Credentials::is_complete)),
            CredentialSource::Environment => Ok(from_env()),
            CredentialSource::File(path) => load_file(path),
        }
    }
}

/// First complete set of credentials from `sources`, in order.
pub fn resolve_credentials(sources: &[CredentialSource]) -> Result<Credentials> {
    for source in sources {
        if let Some(creds) = source.load()? {
            return Ok(creds);
        }
    }
    Err(TonieError::authentication("no credentials configured"))
}

/// Environment, then the default credentials file.
pub fn default_sources() -> Vec<CredentialSource> {
    let mut sources = vec![CredentialSource::Environment];
    if let Some(path) = default_credentials_path() {
        sources.push(CredentialSource::File(path));
    }
    sources
}

fn from_env() -> Option<Credentials> {
    let username = std::env::var(USERNAME_VAR).ok()?;
    let password = std::env::var(PASSWORD_VAR).ok()?;
    Some(Credentials::new(username, password)).filter(Credentials::is_complete)
}

fn load_file(path: &Path) -> Result<Option<Credentials>> {
    if !path.exists() {
        return Ok(None);
    }
    check_owner_only(path)?;
    let data = fs::read_to_string(path)
        .map_err(|e| TonieError::authentication(format!("cannot read credentials file: {e}")))?;
    let stored: StoredCredentials = serde_json::from_str(&data)
        .map_err(|_| TonieError::authentication("credentials file is not valid JSON"))?;
    Ok(Some(Credentials::new(stored.username, stored.password)).filter(Credentials::is_complete))
}

/// Write credentials to `path`, creating parent dirs; mode 0600 on Unix.
pub fn save_credentials(path: &Path, creds: &Credentials) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| TonieError::validation(format!("cannot create {}: {e}", parent.display())))?;
    }
    let stored = StoredCredentials {
        username: creds.username().to_string(),
        password: creds.password().to_string(),
    };
    let data = serde_json::to_vec_pretty(&stored)?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .map_err(|e| TonieError::validation(format!("cannot write credentials file: {e}")))?;
    file.write_all(&data)
        .map_err(|e| TonieError::validation(format!("cannot write credentials file: {e}")))?;
    Ok(())
}

#[cfg(unix)]
fn check_owner_only(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(path)
        .map_err(|e| TonieError::authentication(format!("cannot stat credentials file: {e}")))?
        .permissions()
        .mode();
    if mode & 0o077 != 0 {
        return Err(TonieError::authentication(format!(
            "credentials file {} must not be readable by group or others (chmod 600)",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_owner_only(_path: &Path) -> Result<()> {
    Ok(())
}
