//! Legacy agenda writer: confirmation columns plus the status procedure.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use confirma_core::{
    appointment::ConfirmationOutcome, config::LegacyConfig, error::ConfirmaError,
    traits::LegacyAgenda,
};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::pool::bounded;

pub(crate) fn update_sql(config: &LegacyConfig) -> String {
    let cols = &config.columns;
    format!(
        "UPDATE {} SET {} = $1, {} = $2 WHERE {} = $3",
        config.agenda_table, cols.confirmed_at, cols.confirmation_text, cols.schedule_key
    )
}

pub(crate) fn sync_sql(config: &LegacyConfig) -> Option<String> {
    let procedure = config.sync_procedure.trim();
    (!procedure.is_empty()).then(|| format!("CALL {procedure}($1, $2)"))
}

/// Writes confirmation outcomes to the legacy scheduling table.
pub struct SqlAgenda {
    pool: PgPool,
    update_sql: String,
    sync_sql: Option<String>,
    timeout: Duration,
}

impl SqlAgenda {
    pub fn new(pool: PgPool, config: &LegacyConfig) -> Self {
        Self {
            pool,
            update_sql: update_sql(config),
            sync_sql: sync_sql(config),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl LegacyAgenda for SqlAgenda {
    async fn update_confirmation(
        &self,
        schedule_key: i64,
        outcome: ConfirmationOutcome,
        at: NaiveDateTime,
    ) -> Result<u64, ConfirmaError> {
        let result = bounded(
            self.timeout,
            "agenda update",
            sqlx::query(&self.update_sql)
                .bind(at)
                .bind(outcome.legacy_text())
                .bind(schedule_key)
                .execute(&self.pool),
            ConfirmaError::LegacyUpdateFailed,
        )
        .await?;

        let rows = result.rows_affected();
        info!(
            "agenda: key={schedule_key} set '{}' ({rows} rows)",
            outcome.legacy_text()
        );
        Ok(rows)
    }

    async fn sync_status(
        &self,
        schedule_key: i64,
        outcome: ConfirmationOutcome,
    ) -> Result<(), ConfirmaError> {
        let Some(sql) = &self.sync_sql else {
            debug!("agenda: no sync procedure configured");
            return Ok(());
        };
        bounded(
            self.timeout,
            "status procedure",
            sqlx::query(sql)
                .bind(schedule_key)
                .bind(outcome.sync_code())
                .execute(&self.pool),
            ConfirmaError::LegacyUpdateFailed,
        )
        .await?;
        debug!("agenda: key={schedule_key} synced {}", outcome.sync_code());
        Ok(())
    }
}
