//! # Fee / VAT Split Calculator
//!
//! Splits a gross booking amount into the platform's franchise fee, the VAT
//! on that fee, the optional admin fee, and what is paid out to the venue.
//!
//! ## The Split
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  gross ─┬─► franchise fee = percent ? round(gross × bps / 10000) : fixed│
//! │         │                                                               │
//! │         │   VAT on the franchise fee:                                   │
//! │         │     inclusive: vat = round(fee × r / (1 + r))  (inside fee)   │
//! │         │                fee_gross = fee, fee_net = fee − vat           │
//! │         │     exclusive: vat = round(fee × r)            (on top)       │
//! │         │                fee_gross = fee + vat, fee_net = fee           │
//! │         │                                                               │
//! │         ├─► admin fee (flat, no VAT)                                    │
//! │         │                                                               │
//! │         └─► net to venue = gross − fee_gross − admin fee                │
//! │                                                                         │
//! │  Invariant: net_to_venue + franchise_fee_gross + admin_fee == gross     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The venue always bears whatever VAT is charged on the platform's fee.
//! In inclusive mode that VAT is already inside the fee; in exclusive mode
//! it is deducted in addition to the fee.
//!
//! ## Versioning
//! Configurations carry `effective_from`. [`select_config_at`] picks the one
//! in effect when the transaction happened, so recomputing old transactions
//! after a config change uses the old terms. The ledger also stores the
//! computed split, so historic rows never need recomputing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{PaymentMethod, Rate, VatMode};

// =============================================================================
// Franchise Fee
// =============================================================================

/// Stored discriminator for [`FranchiseFee`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    Percent,
    Fixed,
}

/// How the platform's franchise fee is charged.
///
/// Serialized as `{ "type": "percent", "value": 750 }` (basis points) or
/// `{ "type": "fixed", "value": 150 }` (pence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FranchiseFee {
    /// A share of the gross amount.
    Percent(Rate),
    /// A flat amount per transaction.
    Fixed(Money),
}

impl FranchiseFee {
    /// Rebuilds a fee from its stored columns.
    pub fn from_parts(fee_type: FeeType, value: i64) -> CoreResult<Self> {
        match fee_type {
            FeeType::Percent => {
                let bps = u32::try_from(value).map_err(|_| CoreError::InvalidFeeConfig {
                    reason: format!("percent value {} is not a valid rate", value),
                })?;
                Ok(FranchiseFee::Percent(Rate::from_bps(bps)))
            }
            FeeType::Fixed => Ok(FranchiseFee::Fixed(Money::from_pence(value))),
        }
    }

    /// Stored discriminator.
    pub fn fee_type(&self) -> FeeType {
        match self {
            FranchiseFee::Percent(_) => FeeType::Percent,
            FranchiseFee::Fixed(_) => FeeType::Fixed,
        }
    }

    /// Stored value: basis points for percent, pence for fixed.
    pub fn value(&self) -> i64 {
        match self {
            FranchiseFee::Percent(rate) => rate.bps() as i64,
            FranchiseFee::Fixed(amount) => amount.pence(),
        }
    }

    /// Fee charged on `gross`.
    pub fn amount_for(&self, gross: Money) -> Money {
        match self {
            FranchiseFee::Percent(rate) => gross.apply_rate(*rate),
            FranchiseFee::Fixed(amount) => *amount,
        }
    }
}

// =============================================================================
// Fee Config
// =============================================================================

/// A business account's fee terms from `effective_from` onwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FeeConfig {
    pub id: String,
    pub business_account_id: String,
    pub franchise_fee: FranchiseFee,
    pub vat_mode: VatMode,
    pub vat_rate: Rate,
    pub admin_fee: Money,
    #[ts(as = "String")]
    pub effective_from: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl FeeConfig {
    /// Creates a config at the UK standard VAT rate, effective now.
    pub fn new(
        business_account_id: impl Into<String>,
        franchise_fee: FranchiseFee,
        vat_mode: VatMode,
        admin_fee: Money,
    ) -> Self {
        let now = Utc::now();
        FeeConfig {
            id: Uuid::new_v4().to_string(),
            business_account_id: business_account_id.into(),
            franchise_fee,
            vat_mode,
            vat_rate: Rate::UK_STANDARD_VAT,
            admin_fee,
            effective_from: now,
            created_at: now,
        }
    }

    /// Overrides the VAT rate.
    pub fn with_vat_rate(mut self, rate: Rate) -> Self {
        self.vat_rate = rate;
        self
    }

    /// Overrides the effective date.
    pub fn effective_from(mut self, at: DateTime<Utc>) -> Self {
        self.effective_from = at;
        self
    }

    /// Checks the config is internally consistent.
    ///
    /// ## Rules
    /// - Percent fee at most 100%
    /// - Fixed fee and admin fee not negative
    /// - VAT rate at most 100%
    pub fn validate(&self) -> CoreResult<()> {
        match self.franchise_fee {
            FranchiseFee::Percent(rate) if rate > Rate::FULL => {
                return Err(CoreError::InvalidFeeConfig {
                    reason: format!("franchise fee of {}% exceeds 100%", rate.percentage()),
                });
            }
            FranchiseFee::Fixed(amount) if amount.is_negative() => {
                return Err(CoreError::InvalidFeeConfig {
                    reason: "fixed franchise fee cannot be negative".to_string(),
                });
            }
            FranchiseFee::Fixed(amount) if amount.pence() > crate::MAX_FIXED_FEE_PENCE => {
                return Err(CoreError::InvalidFeeConfig {
                    reason: format!(
                        "fixed franchise fee cannot exceed {}",
                        Money::from_pence(crate::MAX_FIXED_FEE_PENCE)
                    ),
                });
            }
            _ => {}
        }

        if self.admin_fee.is_negative() {
            return Err(CoreError::InvalidFeeConfig {
                reason: "admin fee cannot be negative".to_string(),
            });
        }
        if self.admin_fee.pence() > crate::MAX_FIXED_FEE_PENCE {
            return Err(CoreError::InvalidFeeConfig {
                reason: format!(
                    "admin fee cannot exceed {}",
                    Money::from_pence(crate::MAX_FIXED_FEE_PENCE)
                ),
            });
        }

        if self.vat_rate > Rate::FULL {
            return Err(CoreError::InvalidFeeConfig {
                reason: format!("VAT rate of {}% exceeds 100%", self.vat_rate.percentage()),
            });
        }

        Ok(())
    }

    /// Splits `gross` into fee, VAT, admin fee and venue payout.
    ///
    /// ## Errors
    /// - `InvalidAmount` for a negative gross
    /// - `InvalidFeeConfig` when [`validate`](Self::validate) fails
    /// - `FeesExceedGross` when the deductions are larger than gross
    /// - `InvalidAmount` when the arithmetic would overflow
    ///
    /// ## Example
    /// ```rust
    /// use bookon_core::fees::{FeeConfig, FranchiseFee};
    /// use bookon_core::money::Money;
    /// use bookon_core::types::VatMode;
    ///
    /// let config = FeeConfig::new(
    ///     "biz-1",
    ///     FranchiseFee::Fixed(Money::from_pence(100)),
    ///     VatMode::Exclusive,
    ///     Money::zero(),
    /// );
    ///
    /// let split = config.split(Money::from_pence(2000)).unwrap();
    /// assert_eq!(split.vat.pence(), 20);
    /// assert_eq!(split.franchise_fee_gross.pence(), 120);
    /// assert_eq!(split.net_to_venue.pence(), 1880);
    /// ```
    pub fn split(&self, gross: Money) -> CoreResult<FeeBreakdown> {
        if gross.is_negative() {
            return Err(CoreError::invalid_amount(format!(
                "gross amount {} cannot be negative",
                gross
            )));
        }
        self.validate()?;

        let franchise_fee = self.franchise_fee.amount_for(gross);

        let (vat, franchise_fee_net, franchise_fee_gross) = match self.vat_mode {
            VatMode::Inclusive => {
                let vat = franchise_fee.inclusive_portion(self.vat_rate);
                (vat, franchise_fee - vat, franchise_fee)
            }
            VatMode::Exclusive => {
                let vat = franchise_fee.apply_rate(self.vat_rate);
                let with_vat = franchise_fee.checked_add(vat).ok_or_else(overflow)?;
                (vat, franchise_fee, with_vat)
            }
        };

        let deductions = franchise_fee_gross
            .checked_add(self.admin_fee)
            .ok_or_else(overflow)?;
        if deductions > gross {
            return Err(CoreError::FeesExceedGross { gross, deductions });
        }

        Ok(FeeBreakdown {
            gross,
            franchise_fee,
            vat,
            franchise_fee_net,
            franchise_fee_gross,
            admin_fee: self.admin_fee,
            net_to_venue: gross - deductions,
            vat_mode: self.vat_mode,
        })
    }
}

fn overflow() -> CoreError {
    CoreError::invalid_amount("fee arithmetic overflowed")
}

// =============================================================================
// Fee Breakdown
// =============================================================================

/// Result of [`FeeConfig::split`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub gross: Money,
    /// Franchise fee as configured (before exclusive VAT is added).
    pub franchise_fee: Money,
    /// VAT on the franchise fee.
    pub vat: Money,
    /// Franchise fee excluding VAT.
    pub franchise_fee_net: Money,
    /// Franchise fee including VAT: what the platform actually takes.
    pub franchise_fee_gross: Money,
    pub admin_fee: Money,
    pub net_to_venue: Money,
    pub vat_mode: VatMode,
}

impl FeeBreakdown {
    /// Checks `net_to_venue + franchise_fee_gross + admin_fee == gross`.
    pub fn is_balanced(&self) -> bool {
        self.net_to_venue + self.franchise_fee_gross + self.admin_fee == self.gross
            && self.franchise_fee_net + self.vat == self.franchise_fee_gross
    }
}

/// Picks the config in effect at `at`: the latest `effective_from` not after `at`.
///
/// Returns `None` when every config starts after `at`.
pub fn select_config_at(configs: &[FeeConfig], at: DateTime<Utc>) -> Option<&FeeConfig> {
    configs
        .iter()
        .filter(|config| config.effective_from <= at)
        .max_by_key(|config| config.effective_from)
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// A settled payment with the split computed when it was taken.
///
/// Stored once per confirmed payment. Later fee config changes never
/// rewrite these rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub booking_id: String,
    pub business_account_id: String,
    pub fee_config_id: String,
    pub payment_method: PaymentMethod,
    pub gross_pence: i64,
    pub franchise_fee_pence: i64,
    pub vat_pence: i64,
    pub admin_fee_pence: i64,
    pub net_to_venue_pence: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Ledger row for `booking_id` settled under `config`.
    ///
    /// `franchise_fee_pence` holds the VAT-inclusive fee the platform keeps.
    pub fn record(
        booking_id: impl Into<String>,
        config: &FeeConfig,
        payment_method: PaymentMethod,
        split: &FeeBreakdown,
    ) -> Self {
        LedgerEntry {
            id: Uuid::new_v4().to_string(),
            booking_id: booking_id.into(),
            business_account_id: config.business_account_id.clone(),
            fee_config_id: config.id.clone(),
            payment_method,
            gross_pence: split.gross.pence(),
            franchise_fee_pence: split.franchise_fee_gross.pence(),
            vat_pence: split.vat.pence(),
            admin_fee_pence: split.admin_fee.pence(),
            net_to_venue_pence: split.net_to_venue.pence(),
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn percent(bps: u32, mode: VatMode, admin: i64) -> FeeConfig {
        FeeConfig::new(
            "biz-1",
            FranchiseFee::Percent(Rate::from_bps(bps)),
            mode,
            Money::from_pence(admin),
        )
    }

    #[test]
    fn test_percent_inclusive_split() {
        let split = percent(1000, VatMode::Inclusive, 0)
            .split(Money::from_pence(10_000))
            .unwrap();

        assert_eq!(split.franchise_fee.pence(), 1000);
        // 1000 × 0.2 / 1.2 = 166.67 → 167
        assert_eq!(split.vat.pence(), 167);
        assert_eq!(split.franchise_fee_net.pence(), 833);
        assert_eq!(split.franchise_fee_gross.pence(), 1000);
        assert_eq!(split.net_to_venue.pence(), 9000);
        assert!(split.is_balanced());
    }

    #[test]
    fn test_percent_exclusive_split_deducts_vat_from_venue() {
        let split = percent(1000, VatMode::Exclusive, 0)
            .split(Money::from_pence(10_000))
            .unwrap();

        assert_eq!(split.franchise_fee.pence(), 1000);
        assert_eq!(split.vat.pence(), 200);
        assert_eq!(split.franchise_fee_gross.pence(), 1200);
        assert_eq!(split.net_to_venue.pence(), 8800);
        assert!(split.is_balanced());
    }

    #[test]
    fn test_admin_fee_is_deducted() {
        let split = percent(500, VatMode::Inclusive, 75)
            .split(Money::from_pence(2_000))
            .unwrap();

        assert_eq!(split.franchise_fee.pence(), 100);
        assert_eq!(split.admin_fee.pence(), 75);
        assert_eq!(split.net_to_venue.pence(), 1825);
    }

    #[test]
    fn test_fixed_fee_ignores_gross() {
        let config = FeeConfig::new(
            "biz-1",
            FranchiseFee::Fixed(Money::from_pence(150)),
            VatMode::Inclusive,
            Money::zero(),
        );

        assert_eq!(config.split(Money::from_pence(1_000)).unwrap().franchise_fee.pence(), 150);
        assert_eq!(config.split(Money::from_pence(9_999)).unwrap().franchise_fee.pence(), 150);
    }

    #[test]
    fn test_fee_rounding_matches_half_up() {
        // 7.5% of £12.50 = 93.75p → 94p
        let split = percent(750, VatMode::Inclusive, 0)
            .split(Money::from_pence(1250))
            .unwrap();
        assert_eq!(split.franchise_fee.pence(), 94);
    }

    #[test]
    fn test_split_always_balances() {
        let rates = [0, 1, 250, 750, 1000, 1250, 3333, 10_000];
        for mode in [VatMode::Inclusive, VatMode::Exclusive] {
            for bps in rates {
                for gross in [0_i64, 1, 99, 1250, 4_999, 123_457] {
                    let config = percent(bps, mode, 0);
                    match config.split(Money::from_pence(gross)) {
                        Ok(split) => {
                            assert!(split.is_balanced(), "unbalanced: {:?}", split);
                            assert_eq!(
                                split.franchise_fee,
                                Money::from_pence(gross).apply_rate(Rate::from_bps(bps))
                            );
                        }
                        // Exclusive VAT on a 100% fee cannot be covered by gross
                        Err(CoreError::FeesExceedGross { .. }) => {
                            assert_eq!(mode, VatMode::Exclusive);
                        }
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
            }
        }
    }

    #[test]
    fn test_fees_exceeding_gross_are_rejected() {
        let config = FeeConfig::new(
            "biz-1",
            FranchiseFee::Fixed(Money::from_pence(500)),
            VatMode::Inclusive,
            Money::from_pence(100),
        );

        let err = config.split(Money::from_pence(550)).unwrap_err();
        assert!(matches!(err, CoreError::FeesExceedGross { .. }));
    }

    #[test]
    fn test_negative_gross_rejected() {
        let err = percent(1000, VatMode::Inclusive, 0)
            .split(Money::from_pence(-1))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount { .. }));
    }

    #[test]
    fn test_invalid_configs() {
        assert!(percent(10_001, VatMode::Inclusive, 0).validate().is_err());
        assert!(percent(1000, VatMode::Inclusive, -1).validate().is_err());
        assert!(percent(1000, VatMode::Inclusive, 0)
            .with_vat_rate(Rate::from_bps(20_000))
            .validate()
            .is_err());

        let negative_fixed = FeeConfig::new(
            "biz-1",
            FranchiseFee::Fixed(Money::from_pence(-5)),
            VatMode::Inclusive,
            Money::zero(),
        );
        assert!(negative_fixed.validate().is_err());
    }

    #[test]
    fn test_oversized_fees_are_errors_not_overflow() {
        let huge_fixed = FeeConfig::new(
            "biz-1",
            FranchiseFee::Fixed(Money::from_pence(i64::MAX)),
            VatMode::Exclusive,
            Money::from_pence(1),
        );
        let err = huge_fixed.split(Money::from_pence(100)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFeeConfig { .. }));

        let huge_admin = percent(1000, VatMode::Inclusive, i64::MAX);
        let err = huge_admin.split(Money::from_pence(100)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFeeConfig { .. }));

        // at the cap the split is rejected by the gross check instead
        let capped = FeeConfig::new(
            "biz-1",
            FranchiseFee::Fixed(Money::from_pence(crate::MAX_FIXED_FEE_PENCE)),
            VatMode::Exclusive,
            Money::from_pence(crate::MAX_FIXED_FEE_PENCE),
        );
        let err = capped.split(Money::from_pence(100)).unwrap_err();
        assert!(matches!(err, CoreError::FeesExceedGross { .. }));
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(
            FranchiseFee::from_parts(FeeType::Percent, 750).unwrap(),
            FranchiseFee::Percent(Rate::from_bps(750))
        );
        assert_eq!(
            FranchiseFee::from_parts(FeeType::Fixed, 150).unwrap(),
            FranchiseFee::Fixed(Money::from_pence(150))
        );
        assert!(FranchiseFee::from_parts(FeeType::Percent, -1).is_err());

        let fee = FranchiseFee::Percent(Rate::from_bps(750));
        assert_eq!(fee.fee_type(), FeeType::Percent);
        assert_eq!(fee.value(), 750);
    }

    #[test]
    fn test_franchise_fee_json_shape() {
        let json = serde_json::to_value(FranchiseFee::Percent(Rate::from_bps(750))).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "percent", "value": 750 }));
    }

    #[test]
    fn test_select_config_at_uses_config_in_effect() {
        let now = Utc::now();
        let old = percent(500, VatMode::Inclusive, 0).effective_from(now - Duration::days(60));
        let current = percent(800, VatMode::Inclusive, 0).effective_from(now - Duration::days(10));
        let future = percent(900, VatMode::Inclusive, 0).effective_from(now + Duration::days(10));
        let configs = vec![old.clone(), current.clone(), future];

        assert_eq!(select_config_at(&configs, now).unwrap().id, current.id);
        assert_eq!(
            select_config_at(&configs, now - Duration::days(30)).unwrap().id,
            old.id
        );
        assert!(select_config_at(&configs, now - Duration::days(90)).is_none());
    }

    #[test]
    fn test_ledger_entry_snapshots_split() {
        let config = FeeConfig::new(
            "biz-1",
            FranchiseFee::Fixed(Money::from_pence(100)),
            VatMode::Exclusive,
            Money::from_pence(30),
        );
        let split = config.split(Money::from_pence(2000)).unwrap();
        let entry = LedgerEntry::record("booking-1", &config, PaymentMethod::Card, &split);

        assert_eq!(entry.fee_config_id, config.id);
        assert_eq!(entry.franchise_fee_pence, 120);
        assert_eq!(entry.vat_pence, 20);
        assert_eq!(
            entry.net_to_venue_pence + entry.franchise_fee_pence + entry.admin_fee_pence,
            entry.gross_pence
        );
    }
}
