// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret CRUD operations.
//!
//! Secrets are always addressed by `(name, bearer_id)`; a bearer can never
//! reach another bearer's rows through these functions. Upsert, get, list and
//! delete also require the bearer to be live in the same statement, so a
//! revocation committed first wins over any of them.

use coffer_core::{CofferError, StoreAction};
use rusqlite::{params, OptionalExtension};

use crate::database::{catch_constraint, map_tr_err, Database};
use crate::models::SecretRecord;

const SECRET_COLUMNS: &str = "id, name, bearer_id, encrypted_value, value_nonce, wrapped_dek, \
                              dek_nonce, created_at, updated_at";

const LIVE_BEARER: &str =
    "EXISTS (SELECT 1 FROM bearers WHERE bearers.id = secrets.bearer_id AND revoked_at IS NULL)";

fn secret_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SecretRecord> {
    Ok(SecretRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        bearer_id: row.get(2)?,
        encrypted_value: row.get(3)?,
        value_nonce: row.get(4)?,
        wrapped_dek: row.get(5)?,
        dek_nonce: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Insert a new secret.
///
/// Fails with [`CofferError::ConstraintViolation`] on a duplicate
/// `(name, bearer_id)` or when the bearer does not exist.
pub async fn insert_secret(db: &Database, secret: &SecretRecord) -> Result<(), CofferError> {
    let s = secret.clone();
    let outcome = db
        .connection()
        .call(move |conn| {
            catch_constraint(conn.execute(
                "INSERT INTO secrets (id, name, bearer_id, encrypted_value, value_nonce, \
                 wrapped_dek, dek_nonce, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    s.id,
                    s.name,
                    s.bearer_id,
                    s.encrypted_value,
                    s.value_nonce,
                    s.wrapped_dek,
                    s.dek_nonce,
                    s.created_at,
                    s.updated_at,
                ],
            ))
        })
        .await
        .map_err(map_tr_err)?;
    outcome.map(|_| ()).map_err(CofferError::ConstraintViolation)
}

/// Insert the secret, or replace the ciphertext of an existing one with the
/// same `(name, bearer_id)` in a single statement.
///
/// On replacement the stored `id` and `created_at` are kept and `updated_at`
/// is taken from `secret`. Returns `None` without writing anything when the
/// bearer is unknown or revoked.
pub async fn upsert_secret(
    db: &Database,
    secret: &SecretRecord,
) -> Result<Option<StoreAction>, CofferError> {
    let s = secret.clone();
    let outcome = db
        .connection()
        .call(move |conn| {
            let stored_id = catch_constraint(conn.query_row(
                "INSERT INTO secrets (id, name, bearer_id, encrypted_value, value_nonce, \
                 wrapped_dek, dek_nonce, created_at, updated_at)
                 SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9
                 WHERE EXISTS (SELECT 1 FROM bearers WHERE id = ?3 AND revoked_at IS NULL)
                 ON CONFLICT(name, bearer_id) DO UPDATE SET
                     encrypted_value = excluded.encrypted_value,
                     value_nonce = excluded.value_nonce,
                     wrapped_dek = excluded.wrapped_dek,
                     dek_nonce = excluded.dek_nonce,
                     updated_at = excluded.updated_at
                 RETURNING id",
                params![
                    s.id,
                    s.name,
                    s.bearer_id,
                    s.encrypted_value,
                    s.value_nonce,
                    s.wrapped_dek,
                    s.dek_nonce,
                    s.created_at,
                    s.updated_at,
                ],
                |row| row.get::<_, String>(0),
            )
            .optional())?;
            Ok(stored_id.map(|id| {
                id.map(|id| {
                    if id == s.id {
                        StoreAction::Created
                    } else {
                        StoreAction::Updated
                    }
                })
            }))
        })
        .await
        .map_err(map_tr_err)?;
    outcome.map_err(CofferError::ConstraintViolation)
}

/// Get one secret of a live bearer.
pub async fn get_secret(
    db: &Database,
    name: &str,
    bearer_id: &str,
) -> Result<Option<SecretRecord>, CofferError> {
    let name = name.to_string();
    let bearer_id = bearer_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {SECRET_COLUMNS} FROM secrets
                     WHERE name = ?1 AND bearer_id = ?2 AND {LIVE_BEARER}"
                ),
                params![name, bearer_id],
                secret_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All secrets of a live bearer, ordered by name. Empty for a revoked one.
pub async fn list_secrets(
    db: &Database,
    bearer_id: &str,
) -> Result<Vec<SecretRecord>, CofferError> {
    let bearer_id = bearer_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SECRET_COLUMNS} FROM secrets
                 WHERE bearer_id = ?1 AND {LIVE_BEARER}
                 ORDER BY name ASC"
            ))?;
            let rows = stmt.query_map(params![bearer_id], secret_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Replace the ciphertext columns and `updated_at` of an existing secret.
///
/// Returns `false` if no secret matched `(name, bearer_id)`.
pub async fn update_secret(db: &Database, secret: &SecretRecord) -> Result<bool, CofferError> {
    let s = secret.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE secrets SET encrypted_value = ?1, value_nonce = ?2, wrapped_dek = ?3,
                     dek_nonce = ?4, updated_at = ?5
                 WHERE name = ?6 AND bearer_id = ?7",
                params![
                    s.encrypted_value,
                    s.value_nonce,
                    s.wrapped_dek,
                    s.dek_nonce,
                    s.updated_at,
                    s.name,
                    s.bearer_id,
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete one secret of a live bearer. Returns `false` if nothing matched.
pub async fn delete_secret(
    db: &Database,
    name: &str,
    bearer_id: &str,
) -> Result<bool, CofferError> {
    let name = name.to_string();
    let bearer_id = bearer_id.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                &format!("DELETE FROM secrets WHERE name = ?1 AND bearer_id = ?2 AND {LIVE_BEARER}"),
                params![name, bearer_id],
            )?;
            Ok(removed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of secret rows owned by a bearer, revoked or not.
pub async fn count_secrets_for_bearer(db: &Database, bearer_id: &str) -> Result<u64, CofferError> {
    let bearer_id = bearer_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM secrets WHERE bearer_id = ?1",
                params![bearer_id],
                |row| row.get::<_, i64>(0),
            )
        })
        .await
        .map(|n| n.max(0) as u64)
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::now_timestamp;
    use crate::models::BearerRecord;
    use crate::queries::bearers::{insert_bearer, revoke_bearer};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        for id in ["b-1", "b-2"] {
            insert_bearer(
                &db,
                &BearerRecord {
                    id: id.to_string(),
                    token_hash: format!("hash-{id}"),
                    wrapped_kek: vec![1; 48],
                    kek_nonce: vec![2; 12],
                    salt: vec![3; 16],
                    name: id.to_string(),
                    created_at: now_timestamp(),
                    revoked_at: None,
                },
            )
            .await
            .unwrap();
        }
        (db, dir)
    }

    fn make_secret(id: &str, name: &str, bearer_id: &str, fill: u8) -> SecretRecord {
        let ts = now_timestamp();
        SecretRecord {
            id: id.to_string(),
            name: name.to_string(),
            bearer_id: bearer_id.to_string(),
            encrypted_value: vec![fill; 20],
            value_nonce: vec![fill; 12],
            wrapped_dek: vec![fill; 48],
            dek_nonce: vec![fill; 12],
            created_at: ts.clone(),
            updated_at: ts,
        }
    }

    #[tokio::test]
    async fn insert_get_and_duplicate() {
        let (db, _dir) = setup_db().await;
        let secret = make_secret("s-1", "API_KEY", "b-1", 7);
        insert_secret(&db, &secret).await.unwrap();

        let fetched = get_secret(&db, "API_KEY", "b-1").await.unwrap();
        assert_eq!(fetched, Some(secret));

        let err = insert_secret(&db, &make_secret("s-2", "API_KEY", "b-1", 8))
            .await
            .unwrap_err();
        assert!(matches!(err, CofferError::ConstraintViolation(_)));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn insert_for_unknown_bearer_violates_foreign_key() {
        let (db, _dir) = setup_db().await;
        let err = insert_secret(&db, &make_secret("s-1", "K", "ghost", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, CofferError::ConstraintViolation(_)), "got {err:?}");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn same_name_is_scoped_per_bearer() {
        let (db, _dir) = setup_db().await;
        insert_secret(&db, &make_secret("s-1", "K", "b-1", 1)).await.unwrap();
        insert_secret(&db, &make_secret("s-2", "K", "b-2", 2)).await.unwrap();

        let one = get_secret(&db, "K", "b-1").await.unwrap().unwrap();
        let two = get_secret(&db, "K", "b-2").await.unwrap().unwrap();
        assert_eq!(one.encrypted_value, vec![1; 20]);
        assert_eq!(two.encrypted_value, vec![2; 20]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_creates_then_updates_in_place() {
        let (db, _dir) = setup_db().await;
        let first = make_secret("s-1", "K", "b-1", 1);
        assert_eq!(
            upsert_secret(&db, &first).await.unwrap(),
            Some(StoreAction::Created)
        );

        let mut second = make_secret("s-2", "K", "b-1", 2);
        second.created_at = "2099-01-01T00:00:00.000000Z".to_string();
        second.updated_at = "2099-01-01T00:00:00.000000Z".to_string();
        assert_eq!(
            upsert_secret(&db, &second).await.unwrap(),
            Some(StoreAction::Updated)
        );

        let stored = get_secret(&db, "K", "b-1").await.unwrap().unwrap();
        assert_eq!(stored.id, "s-1");
        assert_eq!(stored.created_at, first.created_at);
        assert_eq!(stored.updated_at, second.updated_at);
        assert_eq!(stored.encrypted_value, vec![2; 20]);
        assert_eq!(count_secrets_for_bearer(&db, "b-1").await.unwrap(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_upserts_yield_one_row() {
        let (db, _dir) = setup_db().await;
        let mut tasks = Vec::new();
        for i in 0..8u8 {
            let db = db.clone();
            tasks.push(tokio::spawn(async move {
                upsert_secret(&db, &make_secret(&format!("s-{i}"), "RACE", "b-1", i)).await
            }));
        }
        let mut created = 0;
        for task in tasks {
            if task.await.unwrap().unwrap() == Some(StoreAction::Created) {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(count_secrets_for_bearer(&db, "b-1").await.unwrap(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_preserves_identity() {
        let (db, _dir) = setup_db().await;
        let original = make_secret("s-1", "K", "b-1", 1);
        insert_secret(&db, &original).await.unwrap();

        let mut replacement = make_secret("ignored", "K", "b-1", 9);
        replacement.updated_at = "2099-01-01T00:00:00.000000Z".to_string();
        assert!(update_secret(&db, &replacement).await.unwrap());

        let stored = get_secret(&db, "K", "b-1").await.unwrap().unwrap();
        assert_eq!(stored.id, "s-1");
        assert_eq!(stored.created_at, original.created_at);
        assert_eq!(stored.wrapped_dek, vec![9; 48]);

        let missing = make_secret("x", "NOPE", "b-1", 1);
        assert!(!update_secret(&db, &missing).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_is_sorted_and_scoped() {
        let (db, _dir) = setup_db().await;
        insert_secret(&db, &make_secret("s-1", "zeta", "b-1", 1)).await.unwrap();
        insert_secret(&db, &make_secret("s-2", "alpha", "b-1", 1)).await.unwrap();
        insert_secret(&db, &make_secret("s-3", "other", "b-2", 1)).await.unwrap();

        let names: Vec<String> = list_secrets(&db, "b-1")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let (db, _dir) = setup_db().await;
        insert_secret(&db, &make_secret("s-1", "K", "b-1", 1)).await.unwrap();

        assert!(!delete_secret(&db, "K", "b-2").await.unwrap());
        assert!(delete_secret(&db, "K", "b-1").await.unwrap());
        assert!(!delete_secret(&db, "K", "b-1").await.unwrap());
        assert!(get_secret(&db, "K", "b-1").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_for_unknown_bearer_writes_nothing() {
        let (db, _dir) = setup_db().await;
        let outcome = upsert_secret(&db, &make_secret("s-1", "K", "ghost", 1))
            .await
            .unwrap();
        assert_eq!(outcome, None);
        assert_eq!(count_secrets_for_bearer(&db, "ghost").await.unwrap(), 0);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn revoked_bearer_rows_are_unreachable_but_kept() {
        let (db, _dir) = setup_db().await;
        let original = make_secret("s-1", "K", "b-1", 1);
        upsert_secret(&db, &original).await.unwrap();
        assert!(revoke_bearer(&db, "b-1", &now_timestamp()).await.unwrap());

        assert_eq!(
            upsert_secret(&db, &make_secret("s-2", "K", "b-1", 2)).await.unwrap(),
            None
        );
        assert_eq!(
            upsert_secret(&db, &make_secret("s-3", "NEW", "b-1", 3)).await.unwrap(),
            None
        );
        assert!(get_secret(&db, "K", "b-1").await.unwrap().is_none());
        assert!(list_secrets(&db, "b-1").await.unwrap().is_empty());
        assert!(!delete_secret(&db, "K", "b-1").await.unwrap());

        // The original row is untouched.
        assert_eq!(count_secrets_for_bearer(&db, "b-1").await.unwrap(), 1);
        let raw = db
            .connection()
            .call(|conn| {
                conn.query_row(
                    "SELECT encrypted_value FROM secrets WHERE name = 'K' AND bearer_id = 'b-1'",
                    [],
                    |row| row.get::<_, Vec<u8>>(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(raw, original.encrypted_value);
        db.close().await.unwrap();
    }
}
