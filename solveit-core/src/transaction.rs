//! Unit of Work over a single Postgres transaction

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::{Error, Result};

/// Open transaction shared by several writes.
///
/// Finishing consumes the unit. A unit dropped while still open is rolled
/// back by sqlx when the inner transaction drops.
pub struct UnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl UnitOfWork {
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        Ok(Self {
            tx: Some(pool.begin().await?),
        })
    }

    pub async fn commit(mut self) -> Result<()> {
        self.take()?.commit().await?;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        self.take()?.rollback().await?;
        Ok(())
    }

    /// Connection bound to the open transaction
    pub fn connection(&mut self) -> Result<&mut PgConnection> {
        self.tx.as_deref_mut().ok_or_else(Self::finished)
    }

    fn take(&mut self) -> Result<Transaction<'static, Postgres>> {
        self.tx.take().ok_or_else(Self::finished)
    }

    fn finished() -> Error {
        Error::Internal("Transaction already finished".to_string())
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::debug!("Unit of work dropped while open, rolling back");
        }
    }
}
