use async_trait::async_trait;
use sqlx::PgPool;

use super::FileRecordStore;
use crate::{models::FileTable, Result};

/// File reference rows across all file tables
#[derive(Clone, Debug)]
pub struct FileRecordRepository {
    pool: PgPool,
}

impl FileRecordRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRecordStore for FileRecordRepository {
    async fn fetch_all_paths(&self, table: FileTable) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT file_path FROM {} WHERE file_path IS NOT NULL AND file_path <> ''",
            table.table_name()
        );
        let paths = sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(paths)
    }

    async fn delete_path_record(&self, table: FileTable, path: &str) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE file_path = $1", table.table_name());
        let result = sqlx::query(&sql).bind(path).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
