// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer administration and per-bearer secret operations.
//!
//! Key hierarchy, per call:
//! - the bearer's wrapping key is derived from the server master passphrase
//!   and the bearer's salt (PBKDF2),
//! - the wrapping key unwraps the bearer's KEK,
//! - the KEK wraps a fresh DEK for every stored value,
//! - the DEK encrypts the value.
//!
//! Nothing is cached between calls. Every failure below this layer is mapped
//! to a [`VaultError`]; decryption failures at any stage look identical.

use coffer_core::{BearerRecord, CofferError, SecretRecord, StoreAction, VaultError};
use coffer_storage::queries::{bearers, secrets};
use coffer_storage::{now_timestamp, Database};
use secrecy::{ExposeSecret, SecretString};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::crypto::{self, Key};
use crate::kdf;

/// Longest accepted bearer or secret name, in bytes.
pub const MAX_NAME_LEN: usize = 256;

/// A newly created bearer. The token is not stored anywhere and cannot be
/// recovered later.
#[derive(Debug)]
pub struct IssuedBearer {
    pub id: String,
    pub name: String,
    pub token: SecretString,
}

impl Serialize for IssuedBearer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("IssuedBearer", 3)?;
        s.serialize_field("bearer_id", &self.id)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("token", self.token.expose_secret())?;
        s.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevokedBearer {
    #[serde(rename = "bearer_id")]
    pub id: String,
}

/// Bearer metadata. Never includes key material or the token hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BearerSummary {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub revoked: bool,
    pub revoked_at: Option<String>,
}

impl From<BearerRecord> for BearerSummary {
    fn from(record: BearerRecord) -> Self {
        Self {
            revoked: record.is_revoked(),
            id: record.id,
            name: record.name,
            created_at: record.created_at,
            revoked_at: record.revoked_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BearerListing {
    pub bearers: Vec<BearerSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredSecret {
    pub name: String,
    pub action: StoreAction,
}

/// A decrypted secret. The only result whose serialization exposes a value.
#[derive(Debug)]
pub struct RevealedSecret {
    pub name: String,
    pub value: SecretString,
    pub created_at: String,
    pub updated_at: String,
}

impl Serialize for RevealedSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("RevealedSecret", 4)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("value", self.value.expose_secret())?;
        s.serialize_field("created_at", &self.created_at)?;
        s.serialize_field("updated_at", &self.updated_at)?;
        s.end()
    }
}

/// Secret metadata, no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretSummary {
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretListing {
    pub secrets: Vec<SecretSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedSecret {
    pub name: String,
}

/// Reject empty or oversized names.
pub fn validate_name(kind: &str, name: &str) -> Result<(), VaultError> {
    if name.is_empty() {
        return Err(VaultError::InvalidInput(format!("{kind} name must not be empty")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(VaultError::InvalidInput(format!(
            "{kind} name exceeds {MAX_NAME_LEN} bytes"
        )));
    }
    Ok(())
}

/// Map a lower-layer failure to the caller-visible error, logging what is safe to log.
fn surface(op: &'static str, err: CofferError) -> VaultError {
    match &err {
        CofferError::AuthenticationFailure | CofferError::Vault(_) => {
            warn!(op, "key unwrap or decryption failed");
        }
        CofferError::ConstraintViolation(_) => {
            warn!(op, "write lost a uniqueness race");
        }
        other => {
            warn!(op, error = %other, "vault operation failed");
        }
    }
    err.into()
}

/// The vault's operations over one record store.
pub struct VaultManager {
    db: Database,
    master_passphrase: SecretString,
    admin_token: Option<SecretString>,
}

impl std::fmt::Debug for VaultManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultManager")
            .field("master_passphrase", &"[REDACTED]")
            .field(
                "admin_token",
                &self.admin_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl VaultManager {
    /// Create a manager. With `admin_token` absent every admin call is rejected.
    pub fn new(
        db: Database,
        master_passphrase: SecretString,
        admin_token: Option<SecretString>,
    ) -> Self {
        Self {
            db,
            master_passphrase,
            admin_token,
        }
    }

    /// The record store this manager operates on.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Resolve a token to its live bearer.
    ///
    /// Unknown and revoked tokens are both [`VaultError::Unauthorized`].
    pub async fn authenticate(&self, token: &str) -> Result<BearerRecord, VaultError> {
        if token.is_empty() {
            warn!("empty bearer token rejected");
            return Err(VaultError::Unauthorized);
        }
        let token_hash = crypto::hash_token(token);
        match bearers::get_bearer_by_token_hash(&self.db, &token_hash).await {
            Ok(Some(bearer)) if !bearer.is_revoked() => Ok(bearer),
            Ok(Some(bearer)) => {
                warn!(bearer_id = %bearer.id, "revoked bearer token rejected");
                Err(VaultError::Unauthorized)
            }
            Ok(None) => {
                warn!("unknown bearer token rejected");
                Err(VaultError::Unauthorized)
            }
            Err(e) => Err(surface("authenticate", e)),
        }
    }

    /// Check the admin credential in constant time and open the admin operations.
    pub fn admin(&self, credential: &str) -> Result<AdminScope<'_>, VaultError> {
        match &self.admin_token {
            Some(expected) if crypto::credentials_match(credential, expected.expose_secret()) => {
                Ok(AdminScope { manager: self })
            }
            Some(_) => {
                warn!("admin credential rejected");
                Err(VaultError::Unauthorized)
            }
            None => {
                warn!("admin call rejected: no admin credential configured");
                Err(VaultError::Unauthorized)
            }
        }
    }

    /// Encrypt and store `value` under `name`, replacing any existing value.
    pub async fn store_secret(
        &self,
        token: &str,
        name: &str,
        value: &str,
    ) -> Result<StoredSecret, VaultError> {
        let bearer = self.authenticate(token).await?;
        validate_name("secret", name)?;

        let Some(action) = self
            .seal_and_upsert(&bearer, name, value)
            .await
            .map_err(|e| surface("store_secret", e))?
        else {
            warn!(bearer_id = %bearer.id, "bearer revoked before store committed");
            return Err(VaultError::Unauthorized);
        };
        info!(bearer_id = %bearer.id, name, %action, "secret stored");
        Ok(StoredSecret {
            name: name.to_string(),
            action,
        })
    }

    /// Decrypt one of the caller's secrets.
    ///
    /// The row is read after the KEK is unwrapped, so a revocation that
    /// commits while the key is being derived still denies the read.
    pub async fn get_secret(&self, token: &str, name: &str) -> Result<RevealedSecret, VaultError> {
        let bearer = self.authenticate(token).await?;
        validate_name("secret", name)?;

        let kek = self
            .unwrap_kek(&bearer)
            .await
            .map_err(|e| surface("get_secret", e))?;
        let record = match secrets::get_secret(&self.db, name, &bearer.id)
            .await
            .map_err(|e| surface("get_secret", e))?
        {
            Some(record) => record,
            None => return Err(self.missing_secret(&bearer, name).await),
        };
        let value = open_secret(&kek, &record).map_err(|e| surface("get_secret", e))?;

        debug!(bearer_id = %bearer.id, name, "secret read");
        Ok(RevealedSecret {
            name: record.name,
            value,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Names and timestamps of the caller's secrets, ordered by name.
    pub async fn list_secrets(&self, token: &str) -> Result<SecretListing, VaultError> {
        let bearer = self.authenticate(token).await?;
        let records = secrets::list_secrets(&self.db, &bearer.id)
            .await
            .map_err(|e| surface("list_secrets", e))?;

        let secrets: Vec<SecretSummary> = records
            .into_iter()
            .map(|r| SecretSummary {
                name: r.name,
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
            .collect();
        debug!(bearer_id = %bearer.id, count = secrets.len(), "secrets listed");
        Ok(SecretListing {
            count: secrets.len(),
            secrets,
        })
    }

    /// Delete one of the caller's secrets.
    pub async fn delete_secret(&self, token: &str, name: &str) -> Result<DeletedSecret, VaultError> {
        let bearer = self.authenticate(token).await?;
        validate_name("secret", name)?;

        let removed = secrets::delete_secret(&self.db, name, &bearer.id)
            .await
            .map_err(|e| surface("delete_secret", e))?;
        if !removed {
            return Err(self.missing_secret(&bearer, name).await);
        }
        info!(bearer_id = %bearer.id, name, "secret deleted");
        Ok(DeletedSecret {
            name: name.to_string(),
        })
    }

    /// Why a secret row of an authenticated bearer could not be reached.
    async fn missing_secret(&self, bearer: &BearerRecord, name: &str) -> VaultError {
        match bearers::get_bearer(&self.db, &bearer.id).await {
            Ok(Some(current)) if !current.is_revoked() => {
                VaultError::SecretNotFound(name.to_string())
            }
            Ok(_) => {
                warn!(bearer_id = %bearer.id, "bearer revoked during request");
                VaultError::Unauthorized
            }
            Err(e) => surface("lookup_bearer", e),
        }
    }

    async fn wrapping_key(&self, salt: &[u8]) -> Result<Key, CofferError> {
        kdf::derive_key_blocking(&self.master_passphrase, salt).await
    }

    async fn unwrap_kek(&self, bearer: &BearerRecord) -> Result<Key, CofferError> {
        let wrapping_key = self.wrapping_key(&bearer.salt).await?;
        let kek = crypto::decrypt(&wrapping_key, &bearer.wrapped_kek, &bearer.kek_nonce)?;
        crypto::key_from_bytes(&kek)
    }

    async fn seal_and_upsert(
        &self,
        bearer: &BearerRecord,
        name: &str,
        value: &str,
    ) -> Result<Option<StoreAction>, CofferError> {
        let kek = self.unwrap_kek(bearer).await?;
        let dek = crypto::generate_key()?;
        let (encrypted_value, value_nonce) = crypto::encrypt(&dek, value.as_bytes())?;
        let (wrapped_dek, dek_nonce) = crypto::encrypt(&kek, &dek[..])?;

        let now = now_timestamp();
        let record = SecretRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            bearer_id: bearer.id.clone(),
            encrypted_value,
            value_nonce,
            wrapped_dek,
            dek_nonce,
            created_at: now.clone(),
            updated_at: now,
        };
        secrets::upsert_secret(&self.db, &record).await
    }

}

fn open_secret(kek: &[u8; 32], record: &SecretRecord) -> Result<SecretString, CofferError> {
    let dek = crypto::key_from_bytes(&crypto::decrypt(
        kek,
        &record.wrapped_dek,
        &record.dek_nonce,
    )?)?;
    let plaintext = crypto::decrypt(&dek, &record.encrypted_value, &record.value_nonce)?;
    let text = std::str::from_utf8(&plaintext)
        .map_err(|_| CofferError::Vault("decrypted value is not UTF-8".to_string()))?;
    Ok(SecretString::from(text.to_string()))
}

/// Admin operations, reachable only through [`VaultManager::admin`].
#[derive(Debug, Clone, Copy)]
pub struct AdminScope<'a> {
    manager: &'a VaultManager,
}

impl AdminScope<'_> {
    /// Create a bearer with its own salt and KEK. The returned token is shown once.
    pub async fn create_bearer(&self, name: &str) -> Result<IssuedBearer, VaultError> {
        validate_name("bearer", name)?;
        let issued = self
            .issue(name)
            .await
            .map_err(|e| surface("create_bearer", e))?;
        info!(bearer_id = %issued.id, name, "bearer created");
        Ok(issued)
    }

    /// Revoke a bearer. Its secrets stay in the store but become unreachable.
    pub async fn revoke_bearer(&self, id: &str) -> Result<RevokedBearer, VaultError> {
        let changed = bearers::revoke_bearer(&self.manager.db, id, &now_timestamp())
            .await
            .map_err(|e| surface("revoke_bearer", e))?;
        if !changed {
            return Err(VaultError::BearerNotFound);
        }
        info!(bearer_id = %id, "bearer revoked");
        Ok(RevokedBearer { id: id.to_string() })
    }

    /// Every bearer, revoked ones included, oldest first.
    pub async fn list_bearers(&self) -> Result<BearerListing, VaultError> {
        let bearers: Vec<BearerSummary> = bearers::list_bearers(&self.manager.db)
            .await
            .map_err(|e| surface("list_bearers", e))?
            .into_iter()
            .map(BearerSummary::from)
            .collect();
        Ok(BearerListing {
            count: bearers.len(),
            bearers,
        })
    }

    async fn issue(&self, name: &str) -> Result<IssuedBearer, CofferError> {
        let token = crypto::generate_bearer_token()?;
        let salt = kdf::generate_salt()?;
        let wrapping_key = self.manager.wrapping_key(&salt).await?;
        let kek = crypto::generate_key()?;
        let (wrapped_kek, kek_nonce) = crypto::encrypt(&wrapping_key, &kek[..])?;

        let record = BearerRecord {
            id: uuid::Uuid::new_v4().to_string(),
            token_hash: crypto::hash_token(token.expose_secret()),
            wrapped_kek,
            kek_nonce,
            salt: salt.to_vec(),
            name: name.to_string(),
            created_at: now_timestamp(),
            revoked_at: None,
        };
        bearers::insert_bearer(&self.manager.db, &record).await?;

        Ok(IssuedBearer {
            id: record.id,
            name: record.name,
            token,
        })
    }
}

/// The vault as configured at startup: fully usable, or permanently disabled.
#[derive(Debug)]
pub enum Vault {
    Ready(VaultManager),
    /// No master passphrase was supplied.
    Disabled,
}

impl Vault {
    /// Build the vault. A missing or empty passphrase disables it; an empty
    /// admin token counts as absent.
    pub fn new(
        db: Database,
        master_passphrase: Option<SecretString>,
        admin_token: Option<SecretString>,
    ) -> Self {
        let passphrase = master_passphrase.filter(|p| !p.expose_secret().is_empty());
        let admin_token = admin_token.filter(|t| !t.expose_secret().is_empty());
        match passphrase {
            Some(passphrase) => {
                info!(admin = admin_token.is_some(), "vault enabled");
                Vault::Ready(VaultManager::new(db, passphrase, admin_token))
            }
            None => {
                warn!("no master passphrase supplied; vault disabled");
                Vault::Disabled
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Vault::Ready(_))
    }

    /// The manager, or [`VaultError::NotConfigured`] for a disabled vault.
    pub fn manager(&self) -> Result<&VaultManager, VaultError> {
        match self {
            Vault::Ready(manager) => Ok(manager),
            Vault::Disabled => Err(VaultError::NotConfigured),
        }
    }
}
