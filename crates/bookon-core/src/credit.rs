//! # Credit Wallet
//!
//! Parents accumulate credit from refunds, TFC conversions and admin grants,
//! and spend it at checkout.
//!
//! ## Redemption Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Wallet                                 Redeem £30.00                   │
//! │  ───────────────────────────────        ─────────────────────────────   │
//! │  A  £20.00  expires 2026-11-01   ──►   1. A  £20.00 (expires first)     │
//! │  B  £15.00  expires 2027-01-01   ──►   2. B  £10.00                     │
//! │  C  £50.00  never expires               3. C  untouched                 │
//! │                                                                         │
//! │  Soonest expiry first, then no-expiry credits oldest first.             │
//! │  Never more than a credit's remaining amount.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The plan is pure; the database layer executes it with the parent's
//! credits locked and a guarded update per step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::validation::{validate_id, validate_positive_amount};

// =============================================================================
// Enums
// =============================================================================

/// Where a credit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CreditSource {
    Refund,
    TfcConversion,
    AdminGrant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CreditStatus {
    Active,
    /// Fully spent.
    Used,
    Expired,
    Cancelled,
}

// =============================================================================
// Credit
// =============================================================================

/// One credit grant in a parent's wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Credit {
    pub id: String,
    pub parent_id: String,
    pub amount_pence: i64,
    pub used_amount_pence: i64,
    pub source: CreditSource,
    pub status: CreditStatus,
    /// Booking or TFC record that produced this credit, if any.
    pub source_ref: Option<String>,
    #[ts(as = "Option<String>")]
    pub expires_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Credit {
    /// Creates an active credit.
    pub fn new(
        parent_id: impl Into<String>,
        amount: Money,
        source: CreditSource,
        source_ref: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> CoreResult<Self> {
        let parent_id = parent_id.into();
        validate_id("parentId", &parent_id)?;
        validate_positive_amount("amount", amount)?;

        Ok(Credit {
            id: Uuid::new_v4().to_string(),
            parent_id,
            amount_pence: amount.pence(),
            used_amount_pence: 0,
            source,
            status: CreditStatus::Active,
            source_ref,
            expires_at,
            created_at: Utc::now(),
        })
    }

    /// Amount left to spend.
    pub fn remaining(&self) -> Money {
        Money::from_pence(self.amount_pence - self.used_amount_pence)
    }

    /// Active, unexpired and not exhausted.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.status == CreditStatus::Active
            && self.expires_at.map_or(true, |at| at > now)
            && self.remaining().is_positive()
    }

    /// Spends `amount` from this credit.
    ///
    /// Marks the credit `used` when nothing remains.
    pub fn redeem(&mut self, amount: Money) -> CoreResult<()> {
        validate_positive_amount("amount", amount)?;
        if self.status != CreditStatus::Active || amount > self.remaining() {
            return Err(CoreError::InsufficientCredit {
                available: self.remaining(),
                requested: amount,
            });
        }
        self.used_amount_pence += amount.pence();
        if self.remaining().is_zero() {
            self.status = CreditStatus::Used;
        }
        Ok(())
    }
}

// =============================================================================
// Wallet Operations
// =============================================================================

/// Spendable balance across a parent's credits.
pub fn balance(credits: &[Credit], now: DateTime<Utc>) -> Money {
    credits
        .iter()
        .filter(|c| c.is_redeemable(now))
        .map(Credit::remaining)
        .sum()
}

/// One step of a redemption plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionStep {
    pub credit_id: String,
    pub amount: Money,
}

/// Plans which credits pay for `amount`.
///
/// ## Errors
/// `InsufficientCredit` if the redeemable balance is less than `amount`.
///
/// ## Example
/// ```rust
/// use bookon_core::credit::{plan_redemption, Credit, CreditSource};
/// use bookon_core::Money;
/// use chrono::Utc;
///
/// let parent = "550e8400-e29b-41d4-a716-446655440000";
/// let wallet = vec![
///     Credit::new(parent, Money::from_pence(1000), CreditSource::Refund, None, None).unwrap(),
/// ];
/// let plan = plan_redemption(&wallet, Money::from_pence(400), Utc::now()).unwrap();
/// assert_eq!(plan[0].amount.pence(), 400);
/// ```
pub fn plan_redemption(
    credits: &[Credit],
    amount: Money,
    now: DateTime<Utc>,
) -> CoreResult<Vec<RedemptionStep>> {
    validate_positive_amount("amount", amount)?;

    let available = balance(credits, now);
    if available < amount {
        return Err(CoreError::InsufficientCredit {
            available,
            requested: amount,
        });
    }

    let mut usable: Vec<&Credit> = credits.iter().filter(|c| c.is_redeemable(now)).collect();
    // None sorts after every Some
    usable.sort_by_key(|c| (c.expires_at.is_none(), c.expires_at, c.created_at));

    let mut left = amount;
    let mut plan = Vec::new();
    for credit in usable {
        if left.is_zero() {
            break;
        }
        let take = credit.remaining().min(left);
        plan.push(RedemptionStep {
            credit_id: credit.id.clone(),
            amount: take,
        });
        left -= take;
    }

    Ok(plan)
}
