// Secret encryption (encryption-at-rest)
//
// Seals the stored database password with AES-256-GCM before the configuration record is
// written. The master key is created lazily on first use and kept as base64 in a file under
// the data folder. Sealed values carry the `sealed:v1:` prefix; anything else is treated as
// plaintext so older records keep loading.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use log::{info, warn};
use ring::rand::{SecureRandom, SystemRandom};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

const SEALED_PREFIX: &str = "sealed:v1:";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug)]
pub struct SecretProtector {
    key_file: PathBuf,
    key: OnceCell<[u8; KEY_LEN]>,
}

impl SecretProtector {
    pub fn new(key_file: PathBuf) -> Self {
        Self {
            key_file,
            key: OnceCell::new(),
        }
    }

    /// Encrypt `plaintext`; output is `sealed:v1:` + base64(nonce || ciphertext+tag).
    pub async fn seal(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Ok(SEALED_PREFIX.to_string());
        }

        let cipher = self.cipher().await?;
        let mut nonce = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce)
            .map_err(|_| anyhow::anyhow!("Failed to generate nonce"))?;

        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| anyhow::anyhow!("Secret encryption failed"))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);
        Ok(format!("{}{}", SEALED_PREFIX, B64.encode(blob)))
    }

    /// Reverse of [`seal`](Self::seal). Unsealed input is returned as-is.
    pub async fn unseal(&self, value: &str) -> Result<String> {
        let Some(encoded) = value.strip_prefix(SEALED_PREFIX) else {
            return Ok(value.to_string());
        };
        if encoded.is_empty() {
            return Ok(String::new());
        }

        let blob = B64
            .decode(encoded)
            .context("Sealed secret is not valid base64")?;
        if blob.len() <= NONCE_LEN {
            anyhow::bail!("Sealed secret is too short");
        }
        let (nonce, sealed) = blob.split_at(NONCE_LEN);

        let cipher = self.cipher().await?;
        let plain = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| anyhow::anyhow!("Secret decryption failed (wrong key or corrupt value)"))?;
        String::from_utf8(plain).context("Unsealed secret is not valid UTF-8")
    }

    async fn cipher(&self) -> Result<Aes256Gcm> {
        let key = self
            .key
            .get_or_try_init(|| load_or_create_key(&self.key_file))
            .await?;
        Aes256Gcm::new_from_slice(key)
            .map_err(|_| anyhow::anyhow!("Internal error: invalid AES-256 key length"))
    }
}

fn parse_key(raw: &str) -> Result<[u8; KEY_LEN]> {
    let decoded = B64
        .decode(raw.trim())
        .context("Master key file is not valid base64")?;
    decoded.try_into().map_err(|_| {
        anyhow::anyhow!("Master key file has invalid length (expected {KEY_LEN} bytes)")
    })
}

/// Rename an unusable key file to `<name>.corrupt-<timestamp>` so a fresh key can take its place.
async fn set_aside_key_file(path: &Path) {
    let mut aside = path.as_os_str().to_owned();
    aside.push(format!(
        ".corrupt-{}",
        chrono::Utc::now().format("%Y%m%d%H%M%S")
    ));
    let aside = PathBuf::from(aside);
    match tokio::fs::rename(path, &aside).await {
        Ok(()) => warn!(
            "[PHASE: storage] [STEP: master_key] Moved unusable master key file to {:?}",
            aside
        ),
        Err(e) => warn!(
            "[PHASE: storage] [STEP: master_key] Could not move unusable master key file {:?}: {}",
            path, e
        ),
    }
}

async fn load_or_create_key(path: &Path) -> Result<[u8; KEY_LEN]> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let loaded = match tokio::fs::read_to_string(path).await {
            Ok(raw) => parse_key(&raw),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read master key file")),
        };
        match loaded {
            Ok(key) => return Ok(key),
            Err(e) => {
                // Values sealed with the old key already read as absent; start over.
                warn!(
                    "[PHASE: storage] [STEP: master_key] Master key file {:?} is unusable ({:#}); generating a new key",
                    path, e
                );
                set_aside_key_file(path).await;
            }
        }
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create key directory: {:?}", parent))?;
    }

    let mut key = [0u8; KEY_LEN];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| anyhow::anyhow!("Failed to generate master key"))?;
    let encoded = B64.encode(key);

    // create_new: a concurrent writer wins and we keep our in-memory key for this run.
    let write_key = || async {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to create master key file: {:?}", path))?;
        file.write_all(encoded.as_bytes()).await?;
        file.flush().await?;
        Ok::<(), anyhow::Error>(())
    };

    let backoff = ExponentialBackoff::from_millis(50)
        .factor(2)
        .max_delay(std::time::Duration::from_millis(750))
        .take(3)
        .map(jitter);

    match RetryIf::spawn(backoff, write_key, is_transient_io_error).await {
        Ok(()) => info!(
            "[PHASE: storage] [STEP: master_key] Created master key file {:?}",
            path
        ),
        Err(e) => warn!(
            "[PHASE: storage] [STEP: master_key] Could not persist master key ({}); sealed values from this run will not survive a restart",
            e
        ),
    }

    Ok(key)
}

fn is_transient_io_error(err: &anyhow::Error) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("used by another process")
        || msg.contains("resource temporarily unavailable")
        || msg.contains("sharing violation")
}

pub fn default_key_path(data_folder: &Path) -> PathBuf {
    data_folder.join("secrets").join("master.key")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seal_then_unseal_returns_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let protector = SecretProtector::new(default_key_path(dir.path()));

        let sealed = protector.seal("s3cret-pass").await.unwrap();
        assert!(sealed.starts_with(SEALED_PREFIX));
        assert!(!sealed.contains("s3cret-pass"));
        assert_eq!(protector.unseal(&sealed).await.unwrap(), "s3cret-pass");
    }

    #[tokio::test]
    async fn key_file_is_reused_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = default_key_path(dir.path());

        let first = SecretProtector::new(key_path.clone());
        let sealed = first.seal("carry-over").await.unwrap();
        assert!(key_path.exists());

        let second = SecretProtector::new(key_path);
        assert_eq!(second.unseal(&sealed).await.unwrap(), "carry-over");
    }

    #[tokio::test]
    async fn plaintext_passes_through_unseal() {
        let dir = tempfile::tempdir().unwrap();
        let protector = SecretProtector::new(default_key_path(dir.path()));
        assert_eq!(protector.unseal("legacy").await.unwrap(), "legacy");
        assert_eq!(protector.seal("").await.unwrap(), SEALED_PREFIX);
        assert_eq!(protector.unseal(SEALED_PREFIX).await.unwrap(), "");
    }

    #[tokio::test]
    async fn corrupt_key_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = default_key_path(dir.path());
        std::fs::create_dir_all(key_path.parent().unwrap()).unwrap();
        std::fs::write(&key_path, "not-a-key").unwrap();

        let protector = SecretProtector::new(key_path.clone());
        let sealed = protector.seal("after-recovery").await.unwrap();
        assert_eq!(protector.unseal(&sealed).await.unwrap(), "after-recovery");

        let fresh = std::fs::read_to_string(&key_path).unwrap();
        assert!(parse_key(&fresh).is_ok());
        let set_aside = std::fs::read_dir(key_path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .count();
        assert_eq!(set_aside, 1);

        // A restart picks up the replacement key.
        let restarted = SecretProtector::new(key_path);
        assert_eq!(restarted.unseal(&sealed).await.unwrap(), "after-recovery");
    }

    #[tokio::test]
    async fn short_key_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = default_key_path(dir.path());
        std::fs::create_dir_all(key_path.parent().unwrap()).unwrap();
        std::fs::write(&key_path, B64.encode([7u8; 8])).unwrap();

        let protector = SecretProtector::new(key_path);
        assert!(protector.seal("value").await.is_ok());
    }

    #[tokio::test]
    async fn tampered_value_fails_to_unseal() {
        let dir = tempfile::tempdir().unwrap();
        let protector = SecretProtector::new(default_key_path(dir.path()));
        assert!(protector.unseal("sealed:v1:!!notbase64").await.is_err());

        let other_dir = tempfile::tempdir().unwrap();
        let other = SecretProtector::new(default_key_path(other_dir.path()));
        let sealed = other.seal("value").await.unwrap();
        assert!(protector.unseal(&sealed).await.is_err());
    }
}
