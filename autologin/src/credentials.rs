//! Flat-file credential store.
//!
//! One YAML file per account, holding a base64 blob of the repeating-key
//! XOR over `"username,password"`. This is a reversible obfuscation that
//! deters casual inspection of the files; it is NOT encryption and makes no
//! confidentiality guarantee.

use std::fs;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::AutoLoginError;

const OBFUSCATION_KEY: &[u8] = b"qk2WdD84fLnm3ZrVyTtB6UcPeXhA1GsJoEwR5vYiMbN0xCaKgHuQ9jSzFlO7pIm";

/// Separates username from password inside the obfuscated record. The
/// password may contain it (decoding splits on the first occurrence only);
/// a username containing it would corrupt the record and is rejected.
const RECORD_DELIMITER: char = ',';

#[derive(Debug, Serialize, Deserialize)]
struct AccountRecord {
    obfuscated_credentials: String,
}

pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    /// Opens the store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, AutoLoginError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            AutoLoginError::Credential(format!(
                "failed to create account directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self { dir })
    }

    pub fn put(&self, name: &str, username: &str, password: &str) -> Result<(), AutoLoginError> {
        if username.contains(RECORD_DELIMITER) {
            return Err(AutoLoginError::Credential(format!(
                "username must not contain '{RECORD_DELIMITER}'"
            )));
        }

        let plain = format!("{username}{RECORD_DELIMITER}{password}");
        let record = AccountRecord {
            obfuscated_credentials: BASE64.encode(xor_obfuscate(plain.as_bytes())),
        };
        let yaml = serde_yaml::to_string(&record)
            .map_err(|e| AutoLoginError::Credential(format!("failed to encode account: {e}")))?;

        let path = self.account_path(name)?;
        fs::write(&path, yaml).map_err(|e| {
            AutoLoginError::Credential(format!("failed to write {}: {e}", path.display()))
        })?;
        info!(account = name, "saved account");
        Ok(())
    }

    /// `Ok(None)` when no account of that name exists.
    pub fn get(&self, name: &str) -> Result<Option<(String, String)>, AutoLoginError> {
        let path = self.account_path(name)?;
        if !path.exists() {
            debug!(account = name, "no such account");
            return Ok(None);
        }

        let yaml = fs::read_to_string(&path).map_err(|e| {
            AutoLoginError::Credential(format!("failed to read {}: {e}", path.display()))
        })?;
        let record: AccountRecord = serde_yaml::from_str(&yaml).map_err(|e| {
            AutoLoginError::Credential(format!("malformed account file {}: {e}", path.display()))
        })?;

        let bytes = BASE64.decode(record.obfuscated_credentials.trim()).map_err(|e| {
            AutoLoginError::Credential(format!(
                "undecodable credential blob in {}: {e}",
                path.display()
            ))
        })?;
        let plain = String::from_utf8(xor_obfuscate(&bytes)).map_err(|e| {
            AutoLoginError::Credential(format!(
                "credential blob in {} is not valid UTF-8: {e}",
                path.display()
            ))
        })?;

        let (username, password) = plain.split_once(RECORD_DELIMITER).ok_or_else(|| {
            AutoLoginError::Credential(format!(
                "account file {} holds no delimited record",
                path.display()
            ))
        })?;
        info!(account = name, "loaded account");
        Ok(Some((username.to_string(), password.to_string())))
    }

    /// Sorted account names.
    pub fn list(&self) -> Result<Vec<String>, AutoLoginError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            AutoLoginError::Credential(format!(
                "failed to list account directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "yaml"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn delete(&self, name: &str) -> Result<(), AutoLoginError> {
        let path = self.account_path(name)?;
        if !path.exists() {
            return Err(AutoLoginError::Credential(format!(
                "no such account: {name}"
            )));
        }
        fs::remove_file(&path).map_err(|e| {
            AutoLoginError::Credential(format!("failed to delete {}: {e}", path.display()))
        })?;
        info!(account = name, "deleted account");
        Ok(())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.account_path(name)
            .map(|path| path.exists())
            .unwrap_or(false)
    }

    fn account_path(&self, name: &str) -> Result<PathBuf, AutoLoginError> {
        if name.is_empty()
            || name.contains(['/', '\\'])
            || name.contains("..")
            || name.contains(':')
        {
            return Err(AutoLoginError::InvalidArgument(format!(
                "invalid account name: {name:?}"
            )));
        }
        Ok(self.dir.join(format!("{name}.yaml")))
    }
}

fn xor_obfuscate(data: &[u8]) -> Vec<u8> {
    data.iter()
        .zip(OBFUSCATION_KEY.iter().cycle())
        .map(|(byte, key)| byte ^ key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("accounts")).unwrap();
        (dir, store)
    }

    #[test]
    fn round_trip_returns_credentials_unchanged() {
        let (_dir, store) = store();
        store.put("acct1", "alice", "s3cr3t").unwrap();
        assert_eq!(
            store.get("acct1").unwrap(),
            Some(("alice".to_string(), "s3cr3t".to_string()))
        );
    }

    #[test]
    fn file_contents_are_not_plaintext() {
        let (_dir, store) = store();
        store.put("acct1", "alice", "hunter2").unwrap();
        let raw = fs::read_to_string(store.account_path("acct1").unwrap()).unwrap();
        assert!(!raw.contains("alice"));
        assert!(!raw.contains("hunter2"));
    }

    #[test]
    fn username_with_the_delimiter_is_rejected() {
        let (_dir, store) = store();
        let err = store.put("acct1", "ali,ce", "pw").unwrap_err();
        assert!(matches!(err, AutoLoginError::Credential(_)));
        assert!(!store.exists("acct1"));
    }

    #[test]
    fn password_with_the_delimiter_round_trips() {
        let (_dir, store) = store();
        store.put("acct1", "alice", "p,a,s,s").unwrap();
        assert_eq!(
            store.get("acct1").unwrap(),
            Some(("alice".to_string(), "p,a,s,s".to_string()))
        );
    }

    #[test]
    fn unicode_credentials_round_trip() {
        let (_dir, store) = store();
        store.put("acct1", "旅行者", "пароль£").unwrap();
        assert_eq!(
            store.get("acct1").unwrap(),
            Some(("旅行者".to_string(), "пароль£".to_string()))
        );
    }

    #[test]
    fn missing_account_is_none() {
        let (_dir, store) = store();
        assert_eq!(store.get("ghost").unwrap(), None);
        assert!(!store.exists("ghost"));
    }

    #[test]
    fn list_is_sorted() {
        let (_dir, store) = store();
        store.put("charlie", "c", "3").unwrap();
        store.put("alice", "a", "1").unwrap();
        store.put("bob", "b", "2").unwrap();
        assert_eq!(store.list().unwrap(), vec!["alice", "bob", "charlie"]);
    }

    #[test]
    fn delete_removes_the_account() {
        let (_dir, store) = store();
        store.put("acct1", "a", "b").unwrap();
        store.delete("acct1").unwrap();
        assert!(!store.exists("acct1"));
        assert!(store.delete("acct1").is_err());
    }

    #[test]
    fn malformed_account_file_is_a_credential_error() {
        let (_dir, store) = store();
        fs::write(store.account_path("broken").unwrap(), "not: [valid").unwrap();
        assert!(matches!(
            store.get("broken").unwrap_err(),
            AutoLoginError::Credential(_)
        ));
    }

    #[test]
    fn path_escaping_account_names_are_rejected() {
        let (_dir, store) = store();
        for name in ["", "../evil", "a/b", "a\\b"] {
            assert!(matches!(
                store.put(name, "u", "p").unwrap_err(),
                AutoLoginError::InvalidArgument(_)
            ));
        }
    }
}
