// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing and verification key loading with a single-slot cache per use.
//!
//! ## Key selection
//!
//! - Signing prefers `keys.private`, then `secret`
//! - Verification prefers `keys.public`, then `secret`
//!
//! ## Caching
//!
//! Each slot remembers the key source (secret value + file path) that produced
//! the cached bytes and the algorithm the key was built for. A call whose
//! resolved source differs reloads; a call whose algorithm differs rebuilds
//! from the cached bytes. The compare and the reload happen under the same
//! lock, so a config change is never answered with the previous key.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use tracing::info;

use super::config::JwtConfig;
use super::error::TokenError;

/// What a key is loaded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyUse {
    /// Producing signatures (private key or shared secret)
    Signing,
    /// Checking signatures (public key or shared secret)
    Verification,
}

impl fmt::Display for KeyUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyUse::Signing => write!(f, "signing"),
            KeyUse::Verification => write!(f, "verification"),
        }
    }
}

/// Identity of the configuration fields a key was loaded from.
#[derive(Clone, PartialEq, Eq)]
struct KeySource {
    secret: Option<String>,
    path: Option<PathBuf>,
}

impl KeySource {
    fn for_use(config: &JwtConfig, key_use: KeyUse) -> Self {
        let path = match key_use {
            KeyUse::Signing => config.keys.private_path(),
            KeyUse::Verification => config.keys.public_path(),
        };
        Self {
            secret: config.secret().map(str::to_owned),
            path: path.map(Path::to_path_buf),
        }
    }
}

/// Raw key bytes: a shared secret or the content of a PEM file.
#[derive(Clone)]
pub struct KeyMaterial {
    bytes: Arc<[u8]>,
    path: Option<PathBuf>,
}

impl KeyMaterial {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// File the key was read from, `None` for inline secrets.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("path", &self.path)
            .finish()
    }
}

struct LoadedKey<K> {
    source: KeySource,
    material: KeyMaterial,
    algorithm: Algorithm,
    key: Arc<K>,
}

type Slot<K> = Mutex<Option<LoadedKey<K>>>;

/// Loads key material for signing and verification and caches the last load,
/// together with the `jsonwebtoken` key built from it.
#[derive(Default)]
pub struct KeyMaterialLoader {
    signing: Slot<EncodingKey>,
    verification: Slot<DecodingKey>,
}

impl KeyMaterialLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key material used to sign tokens under `config`.
    pub fn signing_key(&self, config: &JwtConfig) -> Result<KeyMaterial, TokenError> {
        self.encoding(config).map(|(material, _)| material)
    }

    /// Key material used to verify tokens under `config`.
    pub fn verification_key(&self, config: &JwtConfig) -> Result<KeyMaterial, TokenError> {
        self.decoding(config).map(|(material, _)| material)
    }

    /// Signing key for `config`, built for its algorithm.
    pub fn encoding_key(&self, config: &JwtConfig) -> Result<Arc<EncodingKey>, TokenError> {
        self.encoding(config).map(|(_, key)| key)
    }

    /// Verification key for `config`, built for its algorithm.
    pub fn decoding_key(&self, config: &JwtConfig) -> Result<Arc<DecodingKey>, TokenError> {
        self.decoding(config).map(|(_, key)| key)
    }

    /// Drop both cached keys.
    pub fn invalidate(&self) {
        *self.signing.lock().unwrap_or_else(PoisonError::into_inner) = None;
        *self.verification.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn encoding(
        &self,
        config: &JwtConfig,
    ) -> Result<(KeyMaterial, Arc<EncodingKey>), TokenError> {
        load(&self.signing, KeyUse::Signing, config, build_encoding_key)
    }

    fn decoding(
        &self,
        config: &JwtConfig,
    ) -> Result<(KeyMaterial, Arc<DecodingKey>), TokenError> {
        load(&self.verification, KeyUse::Verification, config, build_decoding_key)
    }
}

fn load<K>(
    slot: &Slot<K>,
    key_use: KeyUse,
    config: &JwtConfig,
    build: fn(Algorithm, &KeyMaterial) -> Result<K, TokenError>,
) -> Result<(KeyMaterial, Arc<K>), TokenError> {
    let source = KeySource::for_use(config, key_use);
    let algorithm = config.algorithm;

    let mut cached = slot.lock().unwrap_or_else(PoisonError::into_inner);
    let material = match cached.as_ref() {
        Some(loaded) if loaded.source == source => {
            if loaded.algorithm == algorithm {
                return Ok((loaded.material.clone(), Arc::clone(&loaded.key)));
            }
            loaded.material.clone()
        }
        _ => {
            let material = read_key(key_use, &source)?;
            info!(
                key_use = %key_use,
                from_file = material.path.is_some(),
                "Loaded key material"
            );
            material
        }
    };

    let key = Arc::new(build(algorithm, &material)?);
    *cached = Some(LoadedKey {
        source,
        material: material.clone(),
        algorithm,
        key: Arc::clone(&key),
    });
    Ok((material, key))
}

fn read_key(key_use: KeyUse, source: &KeySource) -> Result<KeyMaterial, TokenError> {
    if let Some(path) = &source.path {
        if !path.is_file() {
            return Err(TokenError::KeyFileNotFound {
                key_use,
                path: path.clone(),
            });
        }
        let bytes = fs::read(path).map_err(|e| TokenError::KeyFileUnreadable {
            key_use,
            path: path.clone(),
            source: e,
        })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(TokenError::MissingKey(key_use));
        }
        return Ok(KeyMaterial {
            bytes: bytes.into(),
            path: Some(path.clone()),
        });
    }

    match source.secret.as_deref() {
        Some(secret) if !secret.is_empty() => Ok(KeyMaterial {
            bytes: secret.as_bytes().into(),
            path: None,
        }),
        _ => Err(TokenError::MissingKey(key_use)),
    }
}

/// Build a `jsonwebtoken` signing key for `algorithm`.
fn build_encoding_key(
    algorithm: Algorithm,
    material: &KeyMaterial,
) -> Result<EncodingKey, TokenError> {
    let bytes = material.as_bytes();
    #[allow(unreachable_patterns)]
    let key = match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Ok(EncodingKey::from_secret(bytes))
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => EncodingKey::from_rsa_pem(bytes),
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(bytes),
        Algorithm::EdDSA => EncodingKey::from_ed_pem(bytes),
        other => {
            return Err(TokenError::SigningFailed(format!(
                "unsupported algorithm {other:?}"
            )))
        }
    };
    key.map_err(TokenError::from_signing)
}

/// Build a `jsonwebtoken` verification key for `algorithm`.
fn build_decoding_key(
    algorithm: Algorithm,
    material: &KeyMaterial,
) -> Result<DecodingKey, TokenError> {
    let bytes = material.as_bytes();
    #[allow(unreachable_patterns)]
    let key = match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Ok(DecodingKey::from_secret(bytes))
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(bytes),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(bytes),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(bytes),
        other => {
            return Err(TokenError::VerificationFailed(format!(
                "unsupported algorithm {other:?}"
            )))
        }
    };
    key.map_err(|e| TokenError::VerificationFailed(e.to_string()))
}
