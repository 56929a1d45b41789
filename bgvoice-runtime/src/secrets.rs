use anyhow::Context;

/// Keyring service name. Constant so upgrades don't orphan stored keys.
const SERVICE: &str = "bgvoice";

/// Overrides the stored ElevenLabs key when set and non-blank.
pub const API_KEY_ENV: &str = "ELEVENLABS_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKey {
    ElevenLabsApiKey,
}

impl SecretKey {
    fn user(self) -> &'static str {
        match self {
            SecretKey::ElevenLabsApiKey => "elevenlabs_api_key",
        }
    }
}

pub fn set_secret(key: SecretKey, value: &str) -> anyhow::Result<()> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;
    entry.set_password(value).context("set secret")
}

pub fn get_secret(key: SecretKey) -> anyhow::Result<Option<String>> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;

    match entry.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(anyhow::Error::new(e)).context("get secret"),
    }
}

pub fn delete_secret(key: SecretKey) -> anyhow::Result<()> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(anyhow::Error::new(e)).context("delete secret"),
    }
}

/// The ElevenLabs API key from `ELEVENLABS_API_KEY`, falling back to the keyring.
pub fn resolve_api_key() -> anyhow::Result<Option<String>> {
    pick_api_key(std::env::var(API_KEY_ENV).ok(), || {
        get_secret(SecretKey::ElevenLabsApiKey)
    })
}

fn pick_api_key(
    from_env: Option<String>,
    stored: impl FnOnce() -> anyhow::Result<Option<String>>,
) -> anyhow::Result<Option<String>> {
    if let Some(v) = from_env.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        log::debug!("using ElevenLabs API key from {API_KEY_ENV}");
        return Ok(Some(v));
    }
    Ok(stored()?.filter(|v| !v.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // These never touch the real keyring.

    #[test]
    fn keyring_user_name_is_stable() {
        assert_eq!(SecretKey::ElevenLabsApiKey.user(), "elevenlabs_api_key");
    }

    #[test]
    fn env_value_wins_over_stored() {
        let key = pick_api_key(Some(" xi-env ".into()), || {
            panic!("keyring should not be consulted")
        })
        .unwrap();
        assert_eq!(key.as_deref(), Some("xi-env"));
    }

    #[test]
    fn blank_env_falls_back_to_stored() {
        let key = pick_api_key(Some("   ".into()), || Ok(Some("xi-stored".into()))).unwrap();
        assert_eq!(key.as_deref(), Some("xi-stored"));
    }

    #[test]
    fn blank_stored_key_counts_as_missing() {
        assert_eq!(pick_api_key(None, || Ok(Some("".into()))).unwrap(), None);
        assert_eq!(pick_api_key(None, || Ok(None)).unwrap(), None);
    }

    #[test]
    fn keyring_failure_propagates() {
        let err = pick_api_key(None, || Err(anyhow::anyhow!("locked"))).unwrap_err();
        assert!(err.to_string().contains("locked"));
    }
}
