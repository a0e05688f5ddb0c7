use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CompensationInterval, IntegrityReport, IntervalId, LedgerResult, SubjectId, ValidTime};

/// Subject identity lives outside the ledger; only existence is consulted.
#[async_trait]
pub trait SubjectRegistry: Send + Sync {
    async fn exists(&self, subject_id: SubjectId) -> LedgerResult<bool>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntervalInput {
    pub subject_id: SubjectId,
    pub amount: Decimal,
    /// Defaults to the current instant.
    #[serde(default)]
    pub from: Option<ValidTime>,
    #[serde(default)]
    pub to: Option<ValidTime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIntervalInput {
    pub subject_id: SubjectId,
    pub amount: Decimal,
    /// Defaults to the current instant.
    #[serde(default)]
    pub from: Option<ValidTime>,
    #[serde(default)]
    pub to: Option<ValidTime>,
}

#[async_trait]
pub trait CompensationWriteApi {
    /// Opens a new current interval, closing the subject's open one first.
    async fn create_current(&self, input: CreateIntervalInput)
        -> LedgerResult<CompensationInterval>;

    /// Rewrites an interval in place. Neighbouring intervals are not adjusted.
    async fn update_interval(&self, id: IntervalId, input: UpdateIntervalInput)
        -> LedgerResult<()>;

    /// Removes an interval. Neighbouring intervals are not adjusted.
    async fn delete_interval(&self, id: IntervalId) -> LedgerResult<()>;

    /// Removes every interval of a subject, returning how many were deleted.
    async fn purge_subject(&self, subject_id: SubjectId) -> LedgerResult<u64>;
}

#[async_trait]
pub trait CompensationReadApi {
    /// Intervals ordered by `from` descending, then id descending.
    async fn list_intervals(
        &self,
        subject_id: Option<SubjectId>,
    ) -> LedgerResult<Vec<CompensationInterval>>;

    async fn get_interval(&self, id: IntervalId) -> LedgerResult<CompensationInterval>;

    async fn current_value_as_of(
        &self,
        subject_id: SubjectId,
        at: ValidTime,
    ) -> LedgerResult<Option<Decimal>>;
}

#[async_trait]
pub trait IntegrityApi {
    async fn check_subject(&self, subject_id: SubjectId) -> LedgerResult<IntegrityReport>;
}
