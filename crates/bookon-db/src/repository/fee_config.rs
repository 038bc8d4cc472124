//! # Fee Config Repository
//!
//! Fee terms are versioned: a change inserts a new row with a later
//! `effective_from` and never updates an old one.
//!
//! ```text
//! biz-1   effective_from   fee          vat
//! ─────   ──────────────   ──────────   ─────────
//!         2026-01-01       5%           inclusive
//!         2026-09-01       7.5%         inclusive   ◄── in effect today
//!         2027-01-01       7.5% + 30p   exclusive   (scheduled)
//! ```

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::audit::{self, AuditEntry};
use bookon_core::fees::{FeeConfig, FeeType, FranchiseFee};
use bookon_core::{Money, Rate, VatMode};

/// Row shape of `fee_configs`.
#[derive(Debug, sqlx::FromRow)]
struct FeeConfigRow {
    id: String,
    business_account_id: String,
    franchise_fee_type: FeeType,
    franchise_fee_value: i64,
    vat_mode: VatMode,
    vat_rate_bps: i32,
    admin_fee_pence: i64,
    effective_from: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<FeeConfigRow> for FeeConfig {
    type Error = DbError;

    fn try_from(row: FeeConfigRow) -> DbResult<Self> {
        let vat_rate = u32::try_from(row.vat_rate_bps)
            .map_err(|_| DbError::Internal(format!("negative VAT rate on {}", row.id)))?;

        Ok(FeeConfig {
            franchise_fee: FranchiseFee::from_parts(row.franchise_fee_type, row.franchise_fee_value)?,
            id: row.id,
            business_account_id: row.business_account_id,
            vat_mode: row.vat_mode,
            vat_rate: Rate::from_bps(vat_rate),
            admin_fee: Money::from_pence(row.admin_fee_pence),
            effective_from: row.effective_from,
            created_at: row.created_at,
        })
    }
}

const SELECT_FEE_CONFIG: &str = r#"
    SELECT id, business_account_id, franchise_fee_type, franchise_fee_value,
           vat_mode, vat_rate_bps, admin_fee_pence, effective_from, created_at
    FROM fee_configs
"#;

/// Config in effect for `business_account_id` at `at`, on an open connection.
pub(crate) async fn in_effect_at(
    conn: &mut PgConnection,
    business_account_id: &str,
    at: DateTime<Utc>,
) -> DbResult<Option<FeeConfig>> {
    let sql = format!(
        "{} WHERE business_account_id = $1 AND effective_from <= $2 \
         ORDER BY effective_from DESC LIMIT 1",
        SELECT_FEE_CONFIG
    );
    let row: Option<FeeConfigRow> = sqlx::query_as(&sql)
        .bind(business_account_id)
        .bind(at)
        .fetch_optional(conn)
        .await?;

    row.map(FeeConfig::try_from).transpose()
}

/// Repository for fee configuration.
#[derive(Debug, Clone)]
pub struct FeeConfigRepository {
    pool: PgPool,
}

impl FeeConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        FeeConfigRepository { pool }
    }

    /// Config in effect now.
    pub async fn current(&self, business_account_id: &str) -> DbResult<Option<FeeConfig>> {
        self.in_effect_at(business_account_id, Utc::now()).await
    }

    /// Config in effect at `at`.
    pub async fn in_effect_at(
        &self,
        business_account_id: &str,
        at: DateTime<Utc>,
    ) -> DbResult<Option<FeeConfig>> {
        let mut conn = self.pool.acquire().await?;
        in_effect_at(&mut conn, business_account_id, at).await
    }

    /// Every version, newest first.
    pub async fn history(&self, business_account_id: &str) -> DbResult<Vec<FeeConfig>> {
        let sql = format!(
            "{} WHERE business_account_id = $1 ORDER BY effective_from DESC",
            SELECT_FEE_CONFIG
        );
        let rows: Vec<FeeConfigRow> = sqlx::query_as(&sql)
            .bind(business_account_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(FeeConfig::try_from).collect()
    }

    /// Adds a new version.
    ///
    /// ## Errors
    /// - `Core(InvalidFeeConfig)` when the config fails validation
    /// - `UniqueViolation` when a version with the same `effective_from` exists
    pub async fn insert(&self, config: &FeeConfig, actor_id: &str) -> DbResult<()> {
        config.validate()?;
        debug!(
            business_account_id = %config.business_account_id,
            effective_from = %config.effective_from,
            "Inserting fee config"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO fee_configs (
                id, business_account_id, franchise_fee_type, franchise_fee_value,
                vat_mode, vat_rate_bps, admin_fee_pence, effective_from, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&config.id)
        .bind(&config.business_account_id)
        .bind(config.franchise_fee.fee_type())
        .bind(config.franchise_fee.value())
        .bind(config.vat_mode)
        .bind(config.vat_rate.bps() as i32)
        .bind(config.admin_fee.pence())
        .bind(config.effective_from)
        .bind(config.created_at)
        .execute(&mut *tx)
        .await?;

        let entry = AuditEntry::new(actor_id, "fee_config.created", "fee_config", &config.id)
            .business(&config.business_account_id)
            .details(serde_json::to_value(config).unwrap_or_default());
        audit::record(&mut tx, &entry).await?;

        tx.commit().await?;

        info!(
            business_account_id = %config.business_account_id,
            fee_config_id = %config.id,
            "Fee config version added"
        );
        Ok(())
    }
}
