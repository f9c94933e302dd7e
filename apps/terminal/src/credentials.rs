//! # Supervisor Credentials
//!
//! The PIN check behind the authorization gate. The register stores only an
//! argon2 PHC string; `mostrador hash-pin` produces it.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use tracing::warn;

use mostrador_core::validation::validate_pin;
use mostrador_core::{CoreError, CredentialVerifier};

use crate::config::TerminalConfig;
use crate::error::{TerminalError, TerminalResult};

/// Verifies PINs against an argon2 hash.
#[derive(Debug, Clone)]
pub struct Argon2Verifier {
    hash: String,
}

impl Argon2Verifier {
    /// Fails when `hash` is not a PHC string.
    pub fn from_hash(hash: impl Into<String>) -> TerminalResult<Self> {
        let hash = hash.into();
        PasswordHash::new(&hash)
            .map_err(|e| TerminalError::Credential(format!("invalid PIN hash: {}", e)))?;
        Ok(Argon2Verifier { hash })
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn verify(&self, pin: &str) -> bool {
        let parsed_hash = match PasswordHash::new(&self.hash) {
            Ok(h) => h,
            Err(_) => return false,
        };

        Argon2::default()
            .verify_password(pin.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Rejects every PIN. Used when no supervisor hash is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl CredentialVerifier for DenyAll {
    fn verify(&self, _pin: &str) -> bool {
        false
    }
}

/// Hash a supervisor PIN for the config file.
pub fn hash_pin(pin: &str) -> TerminalResult<String> {
    validate_pin(pin).map_err(CoreError::from)?;

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|e| TerminalError::Credential(format!("Failed to hash PIN: {}", e)))?;

    Ok(hash.to_string())
}

/// Builds the verifier the register runs with.
pub fn verifier_from_config(config: &TerminalConfig) -> TerminalResult<Arc<dyn CredentialVerifier>> {
    match &config.supervisor.pin_hash {
        Some(hash) => Ok(Arc::new(Argon2Verifier::from_hash(hash.clone())?)),
        None => {
            warn!("No supervisor PIN configured; protected actions will be refused");
            Ok(Arc::new(DenyAll))
        }
    }
}
