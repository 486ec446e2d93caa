// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synthesis record CRUD operations.
//!
//! `created_at` is stored as Unix milliseconds so expiry is a plain integer
//! comparison that can use the index.

use std::str::FromStr;

use casenote_core::CasenoteError;
use casenote_core::types::{ConversationId, MessageId, SynthesisMode, SynthesisRecord};
use chrono::DateTime;
use rusqlite::params;
use rusqlite::types::Type;

use crate::database::{Database, map_tr_err};

/// Inserts `record`, replacing any row with the same conversation and message id.
pub async fn upsert_record(db: &Database, record: &SynthesisRecord) -> Result<(), CasenoteError> {
    let source_media =
        serde_json::to_string(&record.source_media).map_err(|e| CasenoteError::Storage {
            source: Box::new(e),
        })?;
    let conversation_id = record.conversation_id.0.clone();
    let message_id = record.message_id.0.clone();
    let response_text = record.response_text.clone();
    let mode = record.mode.to_string();
    let created_at = record.created_at.timestamp_millis();

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO synthesis_records
                     (conversation_id, message_id, source_media, response_text, mode, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    conversation_id,
                    message_id,
                    source_media,
                    response_text,
                    mode,
                    created_at
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetches a record created at or after `not_before_millis`.
pub async fn get_record(
    db: &Database,
    conversation_id: &ConversationId,
    message_id: &MessageId,
    not_before_millis: i64,
) -> Result<Option<SynthesisRecord>, CasenoteError> {
    let conversation_id = conversation_id.0.clone();
    let message_id = message_id.0.clone();

    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT conversation_id, message_id, source_media, response_text, mode, created_at
                 FROM synthesis_records
                 WHERE conversation_id = ?1 AND message_id = ?2 AND created_at >= ?3",
            )?;
            let result = stmt.query_row(params![conversation_id, message_id, not_before_millis], |row| {
                let source_media: String = row.get(2)?;
                let mode: String = row.get(4)?;
                let created_at: i64 = row.get(5)?;
                Ok(SynthesisRecord {
                    conversation_id: ConversationId(row.get(0)?),
                    message_id: MessageId(row.get(1)?),
                    source_media: serde_json::from_str(&source_media).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
                    })?,
                    response_text: row.get(3)?,
                    mode: SynthesisMode::from_str(&mode).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e))
                    })?,
                    created_at: DateTime::from_timestamp_millis(created_at)
                        .ok_or(rusqlite::Error::IntegralValueOutOfRange(5, created_at))?,
                })
            });
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes records created before `cutoff_millis`. Returns the number removed.
pub async fn delete_created_before(db: &Database, cutoff_millis: i64) -> Result<usize, CasenoteError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM synthesis_records WHERE created_at < ?1",
                params![cutoff_millis],
            )
        })
        .await
        .map_err(map_tr_err)
}
