use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use tracing::warn;

use super::DraftStore;
use crate::{
    models::{DraftFile, DraftId, TaskDraft},
    Result,
};

/// Task draft repository
#[derive(Clone, Debug)]
pub struct DraftRepository {
    pool: PgPool,
}

impl DraftRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DraftStore for DraftRepository {
    async fn fetch_stale_drafts(&self, older_than: DateTime<Utc>) -> Result<Vec<TaskDraft>> {
        let rows = sqlx::query(
            r"
            SELECT id, uploaded_files, updated_at
            FROM task_drafts
            WHERE updated_at < $1
              AND CASE jsonb_typeof(uploaded_files)
                    WHEN 'array' THEN jsonb_array_length(uploaded_files)
                    ELSE 0
                  END > 0
            ",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(decode_row).collect())
    }

    async fn clear_draft_files(&self, draft_id: DraftId) -> Result<()> {
        sqlx::query("UPDATE task_drafts SET uploaded_files = '[]'::jsonb WHERE id = $1")
            .bind(draft_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn decode_row(row: &PgRow) -> Option<TaskDraft> {
    match read_columns(row) {
        Ok((id, files, updated_at)) => decode_draft(id, files, updated_at),
        Err(e) => {
            warn!(error = %e, "Skipping unreadable draft row");
            None
        }
    }
}

fn read_columns(row: &PgRow) -> sqlx::Result<(DraftId, serde_json::Value, DateTime<Utc>)> {
    let Json(files) = row.try_get("uploaded_files")?;
    Ok((row.try_get("id")?, files, row.try_get("updated_at")?))
}

/// A draft whose file list does not decode is left alone; the rest of the
/// batch is still cleaned.
fn decode_draft(
    id: DraftId,
    uploaded_files: serde_json::Value,
    updated_at: DateTime<Utc>,
) -> Option<TaskDraft> {
    match serde_json::from_value::<Vec<DraftFile>>(uploaded_files) {
        Ok(uploaded_files) => Some(TaskDraft {
            id,
            uploaded_files,
            updated_at,
        }),
        Err(e) => {
            warn!(draft_id = %id, error = %e, "Skipping draft with malformed uploaded_files");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_malformed_draft_does_not_hide_the_rest() {
        let now = Utc::now();
        let rows = vec![
            (DraftId::new(), json!([{"filePath": "drafts/a.pdf"}])),
            (DraftId::new(), json!([42, "not a file"])),
            (DraftId::new(), json!([{"fileName": "b.png", "filePath": "drafts/b.png"}])),
        ];

        let drafts: Vec<TaskDraft> = rows
            .into_iter()
            .filter_map(|(id, files)| decode_draft(id, files, now))
            .collect();

        let paths: Vec<&str> = drafts.iter().flat_map(TaskDraft::file_paths).collect();
        assert_eq!(paths, vec!["drafts/a.pdf", "drafts/b.png"]);
    }

    #[test]
    fn test_missing_file_name_decodes() {
        let draft = decode_draft(DraftId::new(), json!([{"filePath": "drafts/x"}]), Utc::now())
            .unwrap();
        assert_eq!(draft.uploaded_files[0].file_name, "");
        assert_eq!(draft.uploaded_files[0].file_path, "drafts/x");
    }
}
