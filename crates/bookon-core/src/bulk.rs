//! # Bulk Action Reports
//!
//! A bulk admin request applies one action to many records. Every id is
//! attempted independently and gets its own line in the report, so one bad
//! id never hides the outcome of the others.
//!
//! ```text
//! ids: [a, b, a, zzz]
//!        │
//!        ▼ validate_bulk_ids (dedupe, cap)
//! ids: [a, b, zzz]
//!        │
//!        ▼ one transaction per id
//! ┌────────────────────────────────────────────────┐
//! │ a   ✓ paid                                     │
//! │ b   ✓ paid                                     │
//! │ zzz ✗ "TFC booking zzz not found"              │
//! └────────────────────────────────────────────────┘
//! { succeeded: 2, failed: 1, results: [...] }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::tfc::{TfcAction, TfcStatus};

/// Actions available in bulk.
///
/// Part-paid needs a per-record amount and has no bulk form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BulkTfcAction {
    MarkPaid,
    Cancel,
    /// Only meaningful for part-paid records; pending ones fail per item.
    ConvertToCredit,
}

impl From<BulkTfcAction> for TfcAction {
    fn from(action: BulkTfcAction) -> Self {
        match action {
            BulkTfcAction::MarkPaid => TfcAction::MarkPaid,
            BulkTfcAction::Cancel => TfcAction::Cancel,
            BulkTfcAction::ConvertToCredit => TfcAction::ConvertToCredit { amount: None },
        }
    }
}

/// Outcome for one id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BulkItemResult {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TfcStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkItemResult {
    pub fn ok(id: impl Into<String>, status: TfcStatus) -> Self {
        BulkItemResult {
            id: id.into(),
            success: true,
            status: Some(status),
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        BulkItemResult {
            id: id.into(),
            success: false,
            status: None,
            error: Some(error.into()),
        }
    }
}

/// Per-id report for a bulk request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkItemResult>,
}

impl BulkReport {
    pub fn with_capacity(n: usize) -> Self {
        BulkReport {
            succeeded: 0,
            failed: 0,
            results: Vec::with_capacity(n),
        }
    }

    /// Appends one outcome and updates the counters.
    pub fn push(&mut self, result: BulkItemResult) {
        if result.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl FromIterator<BulkItemResult> for BulkReport {
    fn from_iter<I: IntoIterator<Item = BulkItemResult>>(iter: I) -> Self {
        let mut report = BulkReport::default();
        for result in iter {
            report.push(result);
        }
        report
    }
}
