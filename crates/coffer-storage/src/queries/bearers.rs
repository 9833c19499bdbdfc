// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer CRUD operations.

use coffer_core::CofferError;
use rusqlite::params;

use crate::database::{catch_constraint, map_tr_err, Database};
use crate::models::BearerRecord;

const BEARER_COLUMNS: &str =
    "id, token_hash, wrapped_kek, kek_nonce, salt, name, created_at, revoked_at";

fn bearer_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BearerRecord> {
    Ok(BearerRecord {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        wrapped_kek: row.get(2)?,
        kek_nonce: row.get(3)?,
        salt: row.get(4)?,
        name: row.get(5)?,
        created_at: row.get(6)?,
        revoked_at: row.get(7)?,
    })
}

/// Insert a new bearer.
///
/// Fails with [`CofferError::ConstraintViolation`] if the id or token hash is
/// already taken.
pub async fn insert_bearer(db: &Database, bearer: &BearerRecord) -> Result<(), CofferError> {
    let bearer = bearer.clone();
    let outcome = db
        .connection()
        .call(move |conn| {
            catch_constraint(conn.execute(
                "INSERT INTO bearers (id, token_hash, wrapped_kek, kek_nonce, salt, name, created_at, revoked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    bearer.id,
                    bearer.token_hash,
                    bearer.wrapped_kek,
                    bearer.kek_nonce,
                    bearer.salt,
                    bearer.name,
                    bearer.created_at,
                    bearer.revoked_at,
                ],
            ))
        })
        .await
        .map_err(map_tr_err)?;
    outcome.map(|_| ()).map_err(CofferError::ConstraintViolation)
}

/// Look up a bearer by the hex SHA-256 of its token. Revoked bearers are returned too.
pub async fn get_bearer_by_token_hash(
    db: &Database,
    token_hash: &str,
) -> Result<Option<BearerRecord>, CofferError> {
    let token_hash = token_hash.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {BEARER_COLUMNS} FROM bearers WHERE token_hash = ?1"),
                params![token_hash],
                bearer_from_row,
            );
            match result {
                Ok(bearer) => Ok(Some(bearer)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a bearer by id.
pub async fn get_bearer(db: &Database, id: &str) -> Result<Option<BearerRecord>, CofferError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {BEARER_COLUMNS} FROM bearers WHERE id = ?1"),
                params![id],
                bearer_from_row,
            );
            match result {
                Ok(bearer) => Ok(Some(bearer)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a bearer revoked. Returns `false` if it was unknown or already revoked.
pub async fn revoke_bearer(
    db: &Database,
    id: &str,
    revoked_at: &str,
) -> Result<bool, CofferError> {
    let id = id.to_string();
    let revoked_at = revoked_at.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE bearers SET revoked_at = ?1 WHERE id = ?2 AND revoked_at IS NULL",
                params![revoked_at, id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// All bearers, revoked included, oldest first.
pub async fn list_bearers(db: &Database) -> Result<Vec<BearerRecord>, CofferError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BEARER_COLUMNS} FROM bearers ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map([], bearer_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}
