use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub const SERVICE: &str = "yt-upload";
pub const ACCOUNT: &str = "refresh-token";

/// Keyed secret storage. The rest of the program only ever reads and writes
/// one entry: the OAuth refresh token.
pub trait SecretStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>>;
    fn set(&self, service: &str, account: &str, value: &str) -> Result<()>;
}

/// Stores secrets as dot-files in a root directory (the home directory in
/// normal operation).
pub struct FileSecretStore {
    root: PathBuf,
}

impl FileSecretStore {
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().context("could not determine the home directory")?;
        Ok(Self::at(home))
    }

    pub fn at(root: PathBuf) -> Self {
        Self { root }
    }

    fn secret_path(&self, service: &str, account: &str) -> PathBuf {
        self.root.join(format!(".{service}.{account}"))
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.secret_path(service, account)) {
            Ok(value) => Ok(Some(value.trim_end().to_string())),
            // first run: nothing stored yet
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).context("failed to read the stored credential"),
        }
    }

    fn set(&self, service: &str, account: &str, value: &str) -> Result<()> {
        let path = self.secret_path(service, account);
        fs::write(&path, value)
            .with_context(|| format!("failed to write credential to '{}'", path.display()))?;

        // owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
                .with_context(|| format!("failed to restrict permissions on '{}'", path.display()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn get_returns_none_when_nothing_is_stored() {
        let dir = TempDir::new().unwrap();
        let store = FileSecretStore::at(dir.path().to_path_buf());

        assert_eq!(store.get(SERVICE, ACCOUNT).unwrap(), None);
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = FileSecretStore::at(dir.path().to_path_buf());

        store.set(SERVICE, ACCOUNT, "1//refresh-token").unwrap();

        assert_eq!(
            store.get(SERVICE, ACCOUNT).unwrap().as_deref(),
            Some("1//refresh-token")
        );
    }

    #[test]
    fn set_overwrites_the_previous_value() {
        let dir = TempDir::new().unwrap();
        let store = FileSecretStore::at(dir.path().to_path_buf());

        store.set(SERVICE, ACCOUNT, "old").unwrap();
        store.set(SERVICE, ACCOUNT, "new").unwrap();

        assert_eq!(store.get(SERVICE, ACCOUNT).unwrap().as_deref(), Some("new"));
    }

    #[cfg(unix)]
    #[test]
    fn stored_secret_is_only_readable_by_the_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FileSecretStore::at(dir.path().to_path_buf());
        store.set(SERVICE, ACCOUNT, "secret").unwrap();

        let path = dir.path().join(format!(".{SERVICE}.{ACCOUNT}"));
        let mode = fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
