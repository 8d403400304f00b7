//! Tonie credential storage and resolution
//!
//! Credentials resolve in a fixed order: explicit values (from a front
//! end), environment variables, then the OS secret store (macOS Keychain /
//! Windows Credential Manager). The secure store is only offered on those
//! two platforms; everywhere else only env vars work.

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SERVICE_NAME: &str = "tubetoonie";
pub const USERNAME_KEY: &str = "tonie_username";
pub const PASSWORD_KEY: &str = "tonie_password";

/// Tonie cloud account credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TonieCredentials {
    pub username: String,
    pub password: String,
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn is_supported_os() -> bool {
    matches!(std::env::consts::OS, "macos" | "windows")
}

/// Whether the OS secret store can be offered on this platform.
pub fn supports_secure_store() -> bool {
    is_supported_os()
}

/// Build credentials from two optional fields, requiring both.
pub fn credentials_from_parts(
    username: Option<&str>,
    password: Option<&str>,
) -> Option<TonieCredentials> {
    let username = username.map(str::trim).filter(|s| !s.is_empty())?;
    let password = password.map(str::trim).filter(|s| !s.is_empty())?;
    Some(TonieCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Read credentials from `TONIE_USERNAME` / `TONIE_PASSWORD`.
pub fn get_tonie_credentials_from_env() -> Option<TonieCredentials> {
    credentials_from_parts(
        env_nonempty("TONIE_USERNAME").as_deref(),
        env_nonempty("TONIE_PASSWORD").as_deref(),
    )
}

fn keyring_get(key: &str) -> Option<String> {
    match keyring::Entry::new(SERVICE_NAME, key) {
        Ok(entry) => entry.get_password().ok(),
        Err(err) => {
            debug!("Secret store unavailable for {}: {}", key, err);
            None
        }
    }
}

/// Read credentials from the OS secret store, if this platform has one.
pub fn get_tonie_credentials_from_keyring() -> Option<TonieCredentials> {
    if !is_supported_os() {
        return None;
    }

    credentials_from_parts(
        keyring_get(USERNAME_KEY).as_deref(),
        keyring_get(PASSWORD_KEY).as_deref(),
    )
}

/// Resolve credentials: env vars win over the OS secret store.
pub fn get_tonie_credentials() -> Option<TonieCredentials> {
    get_tonie_credentials_from_env().or_else(get_tonie_credentials_from_keyring)
}

/// Persist credentials in the OS secret store.
pub fn set_tonie_credentials_in_keyring(creds: &TonieCredentials) -> crate::core::models::AppResult<()> {
    use crate::core::models::AppError;

    if !is_supported_os() {
        return Err(AppError::Config(
            "Secure storage is only supported on macOS and Windows for this app.".to_string(),
        ));
    }

    for (key, value) in [
        (USERNAME_KEY, creds.username.as_str()),
        (PASSWORD_KEY, creds.password.as_str()),
    ] {
        keyring::Entry::new(SERVICE_NAME, key)
            .and_then(|entry| entry.set_password(value))
            .map_err(|err| AppError::Config(format!("Failed to store {}: {}", key, err)))?;
    }

    Ok(())
}

/// Delete stored credentials. Best-effort: missing entries are not errors.
pub fn delete_tonie_credentials_from_keyring() {
    if !is_supported_os() {
        return;
    }

    for key in [USERNAME_KEY, PASSWORD_KEY] {
        if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, key) {
            let _ = entry.delete_password();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_require_both_parts() {
        assert!(credentials_from_parts(Some("user"), None).is_none());
        assert!(credentials_from_parts(None, Some("pw")).is_none());
        assert!(credentials_from_parts(Some("  "), Some("pw")).is_none());

        let creds = credentials_from_parts(Some(" user@example.com "), Some(" pw ")).unwrap();
        assert_eq!(creds.username, "user@example.com");
        assert_eq!(creds.password, "pw");
    }

    #[test]
    fn test_secure_store_matches_platform_support() {
        assert_eq!(
            supports_secure_store(),
            matches!(std::env::consts::OS, "macos" | "windows")
        );
    }
}
