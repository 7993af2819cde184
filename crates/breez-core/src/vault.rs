//! Encrypted credential vault
//!
//! Holds the wallet's API key, seed phrase and network selection in a single
//! file encrypted with AES-256-CBC. The on-disk form is
//! `hex(iv):hex(ciphertext || hmac)`, where the HMAC-SHA256 tag covers the IV
//! and the CBC output so a wrong key or a flipped byte is always rejected.
//!
//! The first `load` on a fresh installation generates a BIP-39 seed phrase
//! and persists it immediately. Every later `load` returns the cached value.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use bip39::Mnemonic;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::ConfigError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Size of the symmetric vault key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of the CBC initialization vector in bytes
pub const IV_SIZE: usize = 16;

/// Size of the HMAC-SHA256 tag appended to the ciphertext
pub const MAC_SIZE: usize = 32;

/// AES block size
const BLOCK_SIZE: usize = 16;

/// Default vault filename, relative to the working directory
pub const DEFAULT_VAULT_FILE: &str = "config.enc";

/// Separator between the IV and ciphertext hex strings
const BLOB_SEPARATOR: char = ':';

const MAC_KEY_DOMAIN: &[u8] = b"breez-mcp/vault-mac/v1";

/// Entropy for a 12-word seed phrase
const MNEMONIC_ENTROPY_BYTES: usize = 16;

/// Wallet network
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Regtest,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Regtest => write!(f, "regtest"),
        }
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(ConfigError::InvalidSetting {
                name: "network".to_string(),
                reason: format!("unknown network '{}'", other),
            }),
        }
    }
}

/// Decrypted vault contents
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    /// Breez API key
    #[serde(default)]
    pub sdk_key: String,

    /// BIP-39 seed phrase; the wallet's only key-derivation root
    pub mnemonic: String,

    /// Network the wallet operates on
    #[serde(default)]
    #[zeroize(skip)]
    pub network: Network,
}

impl VaultConfig {
    pub fn new(sdk_key: impl Into<String>, mnemonic: impl Into<String>, network: Network) -> Self {
        Self {
            sdk_key: sdk_key.into(),
            mnemonic: mnemonic.into(),
            network,
        }
    }

    /// Number of words in the seed phrase
    pub fn word_count(&self) -> usize {
        self.mnemonic.split_whitespace().count()
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("sdk_key", &if self.sdk_key.is_empty() { "<empty>" } else { "<redacted>" })
            .field("mnemonic", &format_args!("<{} words>", self.word_count()))
            .field("network", &self.network)
            .finish()
    }
}

/// Partial update merged into the cached config by [`SecretVault::update`]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfigUpdate {
    pub sdk_key: Option<String>,
    pub mnemonic: Option<String>,
    pub network: Option<Network>,
}

impl VaultConfigUpdate {
    fn apply_to(self, config: &mut VaultConfig) -> Result<(), ConfigError> {
        if let Some(mnemonic) = self.mnemonic {
            validate_mnemonic(&mnemonic)?;
            if mnemonic != config.mnemonic {
                warn!("Replacing wallet seed phrase on explicit update");
            }
            config.mnemonic = mnemonic;
        }
        if let Some(sdk_key) = self.sdk_key {
            config.sdk_key = sdk_key;
        }
        if let Some(network) = self.network {
            config.network = network;
        }
        Ok(())
    }
}

/// 32-byte vault key, wiped on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct VaultKey([u8; KEY_SIZE]);

impl VaultKey {
    pub(crate) fn from_hex(key_hex: &str) -> Result<Self, ConfigError> {
        let key_hex = key_hex.trim();
        if key_hex.len() != KEY_SIZE * 2 {
            return Err(ConfigError::InvalidKey(format!(
                "must be {} hex characters ({} bytes), got {} characters",
                KEY_SIZE * 2,
                KEY_SIZE,
                key_hex.len()
            )));
        }
        let bytes = Zeroizing::new(
            hex::decode(key_hex).map_err(|e| ConfigError::InvalidKey(e.to_string()))?,
        );
        Self::from_bytes(&bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            ConfigError::InvalidKey(format!(
                "must be {} bytes, got {} bytes",
                KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    /// MAC subkey, domain-separated from the encryption key
    fn mac_key(&self) -> Zeroizing<[u8; 32]> {
        let digest = Sha256::new()
            .chain_update(MAC_KEY_DOMAIN)
            .chain_update(self.0)
            .finalize();
        Zeroizing::new(digest.into())
    }
}

/// On-disk representation of the encrypted vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub iv: [u8; IV_SIZE],
    /// CBC ciphertext followed by the HMAC tag
    pub ciphertext: Vec<u8>,
}

impl EncryptedBlob {
    /// Encrypt `plaintext` under a freshly randomized IV
    fn seal(plaintext: &[u8], key: &VaultKey) -> Result<Self, ConfigError> {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let mut ciphertext =
            Aes256CbcEnc::new((&key.0).into(), (&iv).into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let tag = Self::tag(key, &iv, &ciphertext)?;
        ciphertext.extend_from_slice(&tag);

        Ok(Self { iv, ciphertext })
    }

    /// Authenticate and decrypt
    fn open(&self, key: &VaultKey) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
        if self.ciphertext.len() < MAC_SIZE + BLOCK_SIZE {
            return Err(ConfigError::CorruptFile("ciphertext too short".to_string()));
        }
        let (body, tag) = self.ciphertext.split_at(self.ciphertext.len() - MAC_SIZE);
        if body.len() % BLOCK_SIZE != 0 {
            return Err(ConfigError::CorruptFile(
                "ciphertext is not a whole number of blocks".to_string(),
            ));
        }

        let mac_key = key.mac_key();
        let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key.as_ref())
            .map_err(|e| ConfigError::InvalidKey(e.to_string()))?;
        mac.update(&self.iv);
        mac.update(body);
        mac.verify_slice(tag)
            .map_err(|_| ConfigError::CorruptFile("authentication failed".to_string()))?;

        let plaintext = Aes256CbcDec::new((&key.0).into(), (&self.iv).into())
            .decrypt_padded_vec_mut::<Pkcs7>(body)
            .map_err(|_| ConfigError::CorruptFile("invalid padding".to_string()))?;

        Ok(Zeroizing::new(plaintext))
    }

    fn tag(key: &VaultKey, iv: &[u8], body: &[u8]) -> Result<[u8; MAC_SIZE], ConfigError> {
        let mac_key = key.mac_key();
        let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key.as_ref())
            .map_err(|e| ConfigError::InvalidKey(e.to_string()))?;
        mac.update(iv);
        mac.update(body);
        Ok(mac.finalize().into_bytes().into())
    }

    /// Serialize as `iv_hex:ciphertext_hex`
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}",
            hex::encode(self.iv),
            BLOB_SEPARATOR,
            hex::encode(&self.ciphertext)
        )
    }

    /// Parse `iv_hex:ciphertext_hex`
    pub fn decode(data: &str) -> Result<Self, ConfigError> {
        let (iv_hex, ciphertext_hex) = data
            .trim()
            .split_once(BLOB_SEPARATOR)
            .ok_or_else(|| ConfigError::CorruptFile("missing IV separator".to_string()))?;

        if iv_hex.is_empty() || ciphertext_hex.is_empty() {
            return Err(ConfigError::CorruptFile(
                "empty IV or ciphertext component".to_string(),
            ));
        }

        let iv: [u8; IV_SIZE] = hex::decode(iv_hex)
            .map_err(|e| ConfigError::CorruptFile(format!("IV is not hex: {}", e)))?
            .try_into()
            .map_err(|v: Vec<u8>| {
                ConfigError::CorruptFile(format!("IV must be {} bytes, got {}", IV_SIZE, v.len()))
            })?;

        let ciphertext = hex::decode(ciphertext_hex)
            .map_err(|e| ConfigError::CorruptFile(format!("ciphertext is not hex: {}", e)))?;

        Ok(Self { iv, ciphertext })
    }
}

/// Generate a 12-word BIP-39 phrase from OS randomness
pub fn generate_mnemonic() -> Result<String, ConfigError> {
    let mut entropy = Zeroizing::new([0u8; MNEMONIC_ENTROPY_BYTES]);
    OsRng.fill_bytes(&mut *entropy);
    let mnemonic = Mnemonic::from_entropy(&*entropy)
        .map_err(|e| ConfigError::InvalidMnemonic(e.to_string()))?;
    Ok(mnemonic.to_string())
}

/// Check that a phrase is a well-formed BIP-39 mnemonic
pub fn validate_mnemonic(phrase: &str) -> Result<(), ConfigError> {
    Mnemonic::parse_normalized(phrase)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidMnemonic(e.to_string()))
}

/// Encrypted, cached store of wallet credentials
pub struct SecretVault {
    key: VaultKey,
    path: PathBuf,
    /// API key used only when a new vault is synthesized
    api_key: Option<String>,
    cache: RwLock<Option<VaultConfig>>,
    /// Serializes first-load so two callers never both generate a wallet
    load_lock: Mutex<()>,
    /// Held across read-merge-write-cache so the file and the cache never diverge
    write_lock: Mutex<()>,
}

impl SecretVault {
    /// Create a vault from a 64-character hex key. No file I/O happens here.
    pub fn new(key_hex: &str, path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Ok(Self::with_key(VaultKey::from_hex(key_hex)?, path.into()))
    }

    /// Create a vault from raw key bytes, which must be exactly 32 bytes
    pub fn from_key_bytes(key: &[u8], path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Ok(Self::with_key(VaultKey::from_bytes(key)?, path.into()))
    }

    fn with_key(key: VaultKey, path: PathBuf) -> Self {
        Self {
            key,
            path,
            api_key: None,
            cache: RwLock::new(None),
            load_lock: Mutex::new(()),
            write_lock: Mutex::new(()),
        }
    }

    /// Set the API key written into a newly generated vault
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    /// Path of the encrypted file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached config, if `load` has succeeded
    pub async fn cached(&self) -> Option<VaultConfig> {
        self.cache.read().await.clone()
    }

    /// Load the vault, generating and persisting a new one on first run
    pub async fn load(&self) -> Result<VaultConfig, ConfigError> {
        if let Some(config) = self.cache.read().await.as_ref() {
            return Ok(config.clone());
        }

        let _guard = self.load_lock.lock().await;

        // Another caller may have finished loading while we waited
        if let Some(config) = self.cache.read().await.as_ref() {
            return Ok(config.clone());
        }

        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => {
                debug!("Decrypting vault at {}", self.path.display());
                let blob = EncryptedBlob::decode(&data)?;
                let plaintext = blob.open(&self.key)?;
                let config: VaultConfig = serde_json::from_slice(&plaintext).map_err(|e| {
                    ConfigError::CorruptFile(format!("decrypted vault is not valid JSON: {}", e))
                })?;

                *self.cache.write().await = Some(config.clone());
                info!("Vault loaded (network: {})", config.network);
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "No vault found at {}, generating a new wallet",
                    self.path.display()
                );
                let config = self.generate()?;
                self.save(config.clone()).await?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Encrypt and persist `config`, then replace the cache
    pub async fn save(&self, config: VaultConfig) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().await;
        self.persist(config).await
    }

    /// Merge `partial` into the loaded config and persist it
    pub async fn update(&self, partial: VaultConfigUpdate) -> Result<VaultConfig, ConfigError> {
        let _guard = self.write_lock.lock().await;

        let mut config = self
            .cache
            .read()
            .await
            .clone()
            .ok_or(ConfigError::NotLoaded)?;

        partial.apply_to(&mut config)?;
        self.persist(config.clone()).await?;
        Ok(config)
    }

    /// Caller holds `write_lock`
    async fn persist(&self, config: VaultConfig) -> Result<(), ConfigError> {
        let plaintext = Zeroizing::new(serde_json::to_vec_pretty(&config)?);
        let blob = EncryptedBlob::seal(&plaintext, &self.key)?;

        self.write_atomic(blob.encode()).await?;
        debug!("Vault written to {}", self.path.display());

        *self.cache.write().await = Some(config);
        Ok(())
    }

    fn generate(&self) -> Result<VaultConfig, ConfigError> {
        if self.api_key.is_none() {
            warn!("No SDK API key available; generated vault stores an empty key");
        }
        Ok(VaultConfig::new(
            self.api_key.clone().unwrap_or_default(),
            generate_mnemonic()?,
            Network::default(),
        ))
    }

    async fn write_atomic(&self, contents: String) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Unique per write so another process sharing the file never shares the temp
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let tmp = PathBuf::from(tmp);

        let result = Self::write_then_rename(&tmp, &self.path, contents.as_bytes()).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result
    }

    async fn write_then_rename(tmp: &Path, path: &Path, contents: &[u8]) -> Result<(), ConfigError> {
        tokio::fs::write(tmp, contents).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(tmp, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
    const OTHER_KEY: &str = "ff0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn vault_in(dir: &TempDir, key: &str) -> SecretVault {
        SecretVault::new(key, dir.path().join(DEFAULT_VAULT_FILE)).unwrap()
    }

    #[test]
    fn test_key_length_rejected() {
        assert!(matches!(
            SecretVault::new("abcd", "/nonexistent/config.enc"),
            Err(ConfigError::InvalidKey(_))
        ));
        assert!(matches!(
            SecretVault::new(&"a".repeat(66), "/nonexistent/config.enc"),
            Err(ConfigError::InvalidKey(_))
        ));
        assert!(matches!(
            SecretVault::from_key_bytes(&[0u8; 31], "/nonexistent/config.enc"),
            Err(ConfigError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_key_must_be_hex() {
        let not_hex = "zz".repeat(32);
        assert!(matches!(
            SecretVault::new(&not_hex, "config.enc"),
            Err(ConfigError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_blob_encode_decode() {
        let key = VaultKey::from_hex(TEST_KEY).unwrap();
        let blob = EncryptedBlob::seal(b"{\"hello\":1}", &key).unwrap();
        let encoded = blob.encode();

        let (iv_hex, _) = encoded.split_once(':').unwrap();
        assert_eq!(iv_hex.len(), IV_SIZE * 2);

        let decoded = EncryptedBlob::decode(&encoded).unwrap();
        assert_eq!(decoded, blob);
        assert_eq!(decoded.open(&key).unwrap().as_slice(), b"{\"hello\":1}");
    }

    #[test]
    fn test_iv_is_fresh_per_seal() {
        let key = VaultKey::from_hex(TEST_KEY).unwrap();
        let a = EncryptedBlob::seal(b"same", &key).unwrap();
        let b = EncryptedBlob::seal(b"same", &key).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        for bad in ["", "deadbeef", ":abcd", "abcd:", "00:0011", "nothex:0011"] {
            assert!(
                matches!(EncryptedBlob::decode(bad), Err(ConfigError::CorruptFile(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_generated_mnemonic_is_valid() {
        let phrase = generate_mnemonic().unwrap();
        assert_eq!(phrase.split_whitespace().count(), 12);
        validate_mnemonic(&phrase).unwrap();
        assert_ne!(phrase, generate_mnemonic().unwrap());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = VaultConfig::new("secret-api-key", generate_mnemonic().unwrap(), Network::Testnet);
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-api-key"));
        assert!(!debug.contains(&config.mnemonic));
        assert!(debug.contains("12 words"));
    }

    #[test]
    fn test_network_defaults_to_testnet_when_absent() {
        let config: VaultConfig =
            serde_json::from_str(r#"{"sdkKey":"k","mnemonic":"m"}"#).unwrap();
        assert_eq!(config.network, Network::Testnet);
    }

    #[tokio::test]
    async fn test_first_run_generates_and_persists() {
        let dir = TempDir::new().unwrap();
        let vault = vault_in(&dir, TEST_KEY).with_api_key(Some("api-key".to_string()));

        let config = vault.load().await.unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.sdk_key, "api-key");
        validate_mnemonic(&config.mnemonic).unwrap();
        assert!(vault.path().exists());

        // Fresh instance with the same key sees the same wallet
        let reopened = vault_in(&dir, TEST_KEY);
        assert_eq!(reopened.load().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_load_is_cached() {
        let dir = TempDir::new().unwrap();
        let vault = vault_in(&dir, TEST_KEY);
        let first = vault.load().await.unwrap();

        std::fs::remove_file(vault.path()).unwrap();
        let second = vault.load().await.unwrap();
        assert_eq!(first, second);
        assert!(!vault.path().exists());
    }

    #[tokio::test]
    async fn test_wrong_key_fails_loudly() {
        let dir = TempDir::new().unwrap();
        vault_in(&dir, TEST_KEY).load().await.unwrap();

        let result = vault_in(&dir, OTHER_KEY).load().await;
        assert!(matches!(result, Err(ConfigError::CorruptFile(_))));
    }

    #[tokio::test]
    async fn test_untagged_cbc_blob_is_rejected() {
        let dir = TempDir::new().unwrap();
        let key: [u8; KEY_SIZE] = hex::decode(TEST_KEY).unwrap().try_into().unwrap();
        let iv = [7u8; IV_SIZE];
        let config = VaultConfig::new("", generate_mnemonic().unwrap(), Network::Testnet);
        let plaintext = serde_json::to_vec(&config).unwrap();
        let ciphertext =
            Aes256CbcEnc::new((&key).into(), (&iv).into()).encrypt_padded_vec_mut::<Pkcs7>(&plaintext);
        std::fs::write(
            dir.path().join(DEFAULT_VAULT_FILE),
            format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)),
        )
        .unwrap();

        let result = vault_in(&dir, TEST_KEY).load().await;
        assert!(matches!(result, Err(ConfigError::CorruptFile(_))));
    }

    #[tokio::test]
    async fn test_update_requires_load() {
        let dir = TempDir::new().unwrap();
        let vault = vault_in(&dir, TEST_KEY);
        let result = vault
            .update(VaultConfigUpdate {
                network: Some(Network::Mainnet),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(ConfigError::NotLoaded)));
        assert!(!vault.path().exists());
    }

    #[tokio::test]
    async fn test_update_merges_and_persists() {
        let dir = TempDir::new().unwrap();
        let vault = vault_in(&dir, TEST_KEY);
        let original = vault.load().await.unwrap();

        let updated = vault
            .update(VaultConfigUpdate {
                network: Some(Network::Regtest),
                sdk_key: Some("new-key".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.mnemonic, original.mnemonic);
        assert_eq!(updated.network, Network::Regtest);
        assert_eq!(vault.cached().await.unwrap(), updated);
        assert_eq!(vault_in(&dir, TEST_KEY).load().await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_mnemonic() {
        let dir = TempDir::new().unwrap();
        let vault = vault_in(&dir, TEST_KEY);
        let original = vault.load().await.unwrap();

        let result = vault
            .update(VaultConfigUpdate {
                mnemonic: Some("not a seed phrase".to_string()),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(ConfigError::InvalidMnemonic(_))));
        assert_eq!(vault.cached().await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_concurrent_first_load_generates_once() {
        let dir = TempDir::new().unwrap();
        let vault = std::sync::Arc::new(vault_in(&dir, TEST_KEY));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let vault = vault.clone();
                tokio::spawn(async move { vault.load().await.unwrap() })
            })
            .collect();

        let mut configs = Vec::new();
        for handle in handles {
            configs.push(handle.await.unwrap());
        }
        assert!(configs.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_updates_keep_file_and_cache_in_step() {
        let dir = TempDir::new().unwrap();
        let vault = std::sync::Arc::new(vault_in(&dir, TEST_KEY));
        vault.load().await.unwrap();

        for round in 0..20 {
            let handles: Vec<_> = (1..=16)
                .map(|i| {
                    let vault = vault.clone();
                    tokio::spawn(async move {
                        vault
                            .update(VaultConfigUpdate {
                                sdk_key: Some("k".repeat(i * 50)),
                                ..Default::default()
                            })
                            .await
                            .unwrap()
                    })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap();
            }

            let cached = vault.cached().await.unwrap();
            let reloaded = vault_in(&dir, TEST_KEY).load().await.unwrap();
            assert_eq!(reloaded, cached, "round {}", round);
        }

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
