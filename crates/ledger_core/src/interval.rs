use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{IntervalId, LedgerError, LedgerResult, SubjectId, ValidTime};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensationInterval {
    pub id: IntervalId,
    pub subject_id: SubjectId,
    pub amount: Decimal,
    pub from: ValidTime,
    /// Inclusive end; `None` while the interval is still current.
    pub to: Option<ValidTime>,
}

impl CompensationInterval {
    pub fn is_open(&self) -> bool {
        self.to.is_none()
    }

    pub fn span(&self) -> IntervalSpan {
        IntervalSpan {
            from: self.from,
            to: self.to,
        }
    }
}

/// Time extent of an interval that may not be stored yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSpan {
    pub from: ValidTime,
    pub to: Option<ValidTime>,
}

impl IntervalSpan {
    pub fn new(from: ValidTime, to: Option<ValidTime>) -> Self {
        Self { from, to }
    }
}

/// Field checks shared by create and update, in the order callers expect:
/// subject id, amount, then bounds.
pub fn validate_fields(
    subject_id: SubjectId,
    amount: Decimal,
    span: IntervalSpan,
) -> LedgerResult<()> {
    if subject_id.is_nil() {
        return Err(LedgerError::bad_request("subject id is required"));
    }
    if amount <= Decimal::ZERO {
        return Err(LedgerError::bad_request("amount must be greater than 0"));
    }
    if let Some(to) = span.to {
        if to < span.from {
            return Err(LedgerError::bad_request(
                "interval end must be greater than or equal to its start",
            ));
        }
    }
    Ok(())
}
