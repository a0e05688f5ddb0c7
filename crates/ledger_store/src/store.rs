use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict, Order, Query, SelectStatement};
use sea_orm::{
    ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DatabaseTransaction,
    TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use wageline_ledger_core::{
    check_intervals, find_conflict, resolver, validate_fields, CompensationInterval,
    CompensationReadApi, CompensationWriteApi, CreateIntervalInput, IntegrityApi,
    IntegrityReport, IntervalId, IntervalSpan, LedgerError, LedgerResult, SubjectId,
    SubjectRegistry, UpdateIntervalInput, ValidTime,
};

use crate::db::{WagelineIntervals, WagelineSubjectLocks};
use crate::locks::{SubjectGuard, SubjectLocks};
use crate::migration::Migrator;
use crate::registry::SqlSubjectRegistry;
use crate::sql::{exec, fetch_all, fetch_one, read_interval, read_interval_id, subject_expr};
use crate::LedgerConfig;

pub const FAILPOINT_CREATE_AFTER_CLOSE: &str = "create_current.after_close";
pub const FAILPOINT_CREATE_BEFORE_COMMIT: &str = "create_current.before_commit";
pub const FAILPOINT_UPDATE_BEFORE_COMMIT: &str = "update_interval.before_commit";

/// A write whose work is done and which only awaits its commit. Holding it
/// keeps both the in-process and the database subject locks.
struct PendingWrite<T> {
    _guard: SubjectGuard,
    tx: DatabaseTransaction,
    outcome: T,
}

#[derive(Clone)]
pub struct LedgerStore {
    conn: DatabaseConnection,
    backend: DatabaseBackend,
    registry: Arc<dyn SubjectRegistry>,
    locks: SubjectLocks,
    transaction_timeout: Option<Duration>,
    failpoints: HashSet<String>,
}

impl LedgerStore {
    pub async fn connect(
        config: &LedgerConfig,
        base_dir: &Path,
        registry: Arc<dyn SubjectRegistry>,
    ) -> LedgerResult<Self> {
        let conn = open_connection(config, base_dir).await?;
        Ok(Self::from_connection(conn, config, registry))
    }

    /// Connects and checks subjects against the datastore's own subjects table.
    pub async fn connect_with_sql_registry(
        config: &LedgerConfig,
        base_dir: &Path,
    ) -> LedgerResult<Self> {
        let conn = open_connection(config, base_dir).await?;
        let registry = Arc::new(SqlSubjectRegistry::new(conn.clone()));
        Ok(Self::from_connection(conn, config, registry))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(
        conn: DatabaseConnection,
        config: &LedgerConfig,
        registry: Arc<dyn SubjectRegistry>,
    ) -> Self {
        Self {
            backend: conn.get_database_backend(),
            conn,
            registry,
            locks: SubjectLocks::new(),
            transaction_timeout: config.transaction_timeout(),
            failpoints: config.failpoints.iter().flatten().cloned().collect(),
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn subject_locks(&self) -> &SubjectLocks {
        &self.locks
    }

    fn maybe_failpoint(&self, key: &str) -> LedgerResult<()> {
        if self.failpoints.contains(key) {
            Err(LedgerError::internal(format!("failpoint {key}")))
        } else {
            Ok(())
        }
    }

    /// Runs a write's work under the configured deadline, then commits. The
    /// deadline covers lock waits and statements but never the commit, so an
    /// expired deadline always means the transaction was dropped uncommitted.
    async fn run_write<T, F>(&self, operation: &str, work: F) -> LedgerResult<T>
    where
        F: Future<Output = LedgerResult<PendingWrite<T>>>,
    {
        let pending = match self.transaction_timeout {
            Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                LedgerError::internal(format!(
                    "{operation} timed out after {}ms and was rolled back",
                    limit.as_millis()
                ))
            })??,
            None => work.await?,
        };
        let PendingWrite {
            _guard,
            tx,
            outcome,
        } = pending;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Takes the in-process lock, then opens a transaction that holds the
    /// database row lock for every subject. The row lock makes writers in
    /// other processes or on other pool connections queue as well.
    async fn begin_write(
        &self,
        subjects: &[SubjectId],
    ) -> LedgerResult<(SubjectGuard, DatabaseTransaction)> {
        let guard = self.locks.acquire_many(subjects).await?;
        let tx = self.conn.begin().await?;
        let mut ordered = subjects.to_vec();
        ordered.sort();
        ordered.dedup();
        for subject_id in ordered {
            let upsert = Query::insert()
                .into_table(WagelineSubjectLocks::Table)
                .columns([WagelineSubjectLocks::SubjectId, WagelineSubjectLocks::LockedAt])
                .values_panic([
                    subject_expr(subject_id),
                    ValidTime::now_micros().as_i64().into(),
                ])
                .on_conflict(
                    OnConflict::column(WagelineSubjectLocks::SubjectId)
                        .update_column(WagelineSubjectLocks::LockedAt)
                        .to_owned(),
                )
                .to_owned();
            exec(&tx, &upsert).await?;
            debug!("ledger: locked subject {subject_id}");
        }
        Ok((guard, tx))
    }

    async fn ensure_subject_exists(&self, subject_id: SubjectId) -> LedgerResult<()> {
        if self.registry.exists(subject_id).await? {
            Ok(())
        } else {
            Err(LedgerError::bad_request(format!(
                "subject {subject_id} does not exist"
            )))
        }
    }

    fn select_intervals(&self) -> SelectStatement {
        Query::select()
            .from(WagelineIntervals::Table)
            .columns([
                WagelineIntervals::Id,
                WagelineIntervals::SubjectId,
                WagelineIntervals::Amount,
                WagelineIntervals::ValidFrom,
                WagelineIntervals::ValidTo,
            ])
            .to_owned()
    }

    async fn fetch_interval<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: IntervalId,
    ) -> LedgerResult<Option<CompensationInterval>> {
        let select = self
            .select_intervals()
            .and_where(Expr::col(WagelineIntervals::Id).eq(id.as_i64()))
            .limit(1)
            .to_owned();
        fetch_one(conn, &select)
            .await?
            .map(|row| read_interval(&row))
            .transpose()
    }

    async fn fetch_intervals<C: ConnectionTrait>(
        &self,
        conn: &C,
        subject_id: Option<SubjectId>,
    ) -> LedgerResult<Vec<CompensationInterval>> {
        let mut select = self.select_intervals();
        if let Some(subject_id) = subject_id {
            select.and_where(Expr::col(WagelineIntervals::SubjectId).eq(subject_expr(subject_id)));
        }
        select
            .order_by(WagelineIntervals::ValidFrom, Order::Desc)
            .order_by(WagelineIntervals::Id, Order::Desc);
        let rows = fetch_all(conn, &select).await?;
        rows.iter().map(read_interval).collect()
    }

    /// The subject's open interval with the latest start. More than one open
    /// row means the table was edited outside the ledger; the newest wins.
    async fn fetch_open_interval(
        &self,
        tx: &DatabaseTransaction,
        subject_id: SubjectId,
    ) -> LedgerResult<Option<CompensationInterval>> {
        let select = self
            .select_intervals()
            .and_where(Expr::col(WagelineIntervals::SubjectId).eq(subject_expr(subject_id)))
            .and_where(Expr::col(WagelineIntervals::ValidTo).is_null())
            .order_by(WagelineIntervals::ValidFrom, Order::Desc)
            .order_by(WagelineIntervals::Id, Order::Desc)
            .to_owned();
        let rows = fetch_all(tx, &select).await?;
        if rows.len() > 1 {
            warn!(
                "ledger: subject {subject_id} has {} open intervals, using the latest",
                rows.len()
            );
        }
        rows.first().map(read_interval).transpose()
    }

    /// Re-reads `id` under the subject lock and checks it still belongs to
    /// the subject that was locked.
    async fn fetch_locked_interval(
        &self,
        tx: &DatabaseTransaction,
        id: IntervalId,
        locked_subject: SubjectId,
    ) -> LedgerResult<CompensationInterval> {
        let current = self
            .fetch_interval(tx, id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("interval {id} not found")))?;
        if current.subject_id != locked_subject {
            return Err(LedgerError::conflict(format!(
                "interval {id} was moved to another subject concurrently"
            )));
        }
        Ok(current)
    }

    async fn ensure_no_overlap(
        &self,
        tx: &DatabaseTransaction,
        subject_id: SubjectId,
        span: &IntervalSpan,
        exclude: Option<IntervalId>,
    ) -> LedgerResult<()> {
        let existing = self.fetch_intervals(tx, Some(subject_id)).await?;
        match find_conflict(span, &existing, exclude) {
            Some(conflict) => Err(LedgerError::bad_request(format!(
                "interval overlaps existing interval {} for subject {subject_id}",
                conflict.id
            ))),
            None => Ok(()),
        }
    }

    async fn close_interval(
        &self,
        tx: &DatabaseTransaction,
        id: IntervalId,
        end: ValidTime,
    ) -> LedgerResult<()> {
        let update = Query::update()
            .table(WagelineIntervals::Table)
            .value(WagelineIntervals::ValidTo, end.as_i64())
            .and_where(Expr::col(WagelineIntervals::Id).eq(id.as_i64()))
            .to_owned();
        if exec(tx, &update).await?.rows_affected() == 0 {
            return Err(LedgerError::conflict(format!(
                "open interval {id} disappeared while being closed"
            )));
        }
        Ok(())
    }

    async fn insert_interval(
        &self,
        tx: &DatabaseTransaction,
        subject_id: SubjectId,
        amount: Decimal,
        span: IntervalSpan,
    ) -> LedgerResult<IntervalId> {
        let mut insert = Query::insert()
            .into_table(WagelineIntervals::Table)
            .columns([
                WagelineIntervals::SubjectId,
                WagelineIntervals::Amount,
                WagelineIntervals::ValidFrom,
                WagelineIntervals::ValidTo,
            ])
            .values_panic([
                subject_expr(subject_id),
                amount.to_string().into(),
                span.from.as_i64().into(),
                span.to.map(ValidTime::as_i64).into(),
            ])
            .to_owned();
        if self.backend == DatabaseBackend::MySql {
            let result = exec(tx, &insert).await?;
            let id = i64::try_from(result.last_insert_id())
                .map_err(|_| LedgerError::internal("insert id out of range"))?;
            return Ok(IntervalId(id));
        }
        insert.returning_col(WagelineIntervals::Id);
        let row = fetch_one(tx, &insert)
            .await?
            .ok_or_else(|| LedgerError::internal("insert returned no id"))?;
        read_interval_id(&row)
    }

    async fn create_current_in(
        &self,
        tx: &DatabaseTransaction,
        subject_id: SubjectId,
        amount: Decimal,
        span: IntervalSpan,
    ) -> LedgerResult<CompensationInterval> {
        if let Some(open) = self.fetch_open_interval(tx, subject_id).await? {
            if span.from <= open.from {
                return Err(LedgerError::bad_request(format!(
                    "new interval must start after the currently open one \
                     (interval {} opened at {})",
                    open.id, open.from
                )));
            }
            let end = span.from.previous_tick()?;
            self.close_interval(tx, open.id, end).await?;
            debug!(
                "ledger: closing interval {} for subject {subject_id} at {end}",
                open.id
            );
        }
        self.maybe_failpoint(FAILPOINT_CREATE_AFTER_CLOSE)?;

        self.ensure_no_overlap(tx, subject_id, &span, None).await?;
        let id = self.insert_interval(tx, subject_id, amount, span).await?;
        Ok(CompensationInterval {
            id,
            subject_id,
            amount,
            from: span.from,
            to: span.to,
        })
    }

    async fn update_interval_in(
        &self,
        tx: &DatabaseTransaction,
        id: IntervalId,
        locked_subject: SubjectId,
        input: &UpdateIntervalInput,
        span: IntervalSpan,
    ) -> LedgerResult<()> {
        self.fetch_locked_interval(tx, id, locked_subject).await?;
        self.ensure_no_overlap(tx, input.subject_id, &span, Some(id))
            .await?;

        let update = Query::update()
            .table(WagelineIntervals::Table)
            .values([
                (WagelineIntervals::SubjectId, subject_expr(input.subject_id)),
                (WagelineIntervals::Amount, input.amount.to_string().into()),
                (WagelineIntervals::ValidFrom, span.from.as_i64().into()),
                (
                    WagelineIntervals::ValidTo,
                    span.to.map(ValidTime::as_i64).into(),
                ),
            ])
            .and_where(Expr::col(WagelineIntervals::Id).eq(id.as_i64()))
            .to_owned();
        exec(tx, &update).await?;
        Ok(())
    }

    async fn delete_interval_in(
        &self,
        tx: &DatabaseTransaction,
        id: IntervalId,
        locked_subject: SubjectId,
    ) -> LedgerResult<()> {
        self.fetch_locked_interval(tx, id, locked_subject).await?;
        let delete = Query::delete()
            .from_table(WagelineIntervals::Table)
            .and_where(Expr::col(WagelineIntervals::Id).eq(id.as_i64()))
            .to_owned();
        exec(tx, &delete).await?;
        Ok(())
    }

    async fn purge_subject_in(
        &self,
        tx: &DatabaseTransaction,
        subject_id: SubjectId,
    ) -> LedgerResult<u64> {
        let delete = Query::delete()
            .from_table(WagelineIntervals::Table)
            .and_where(Expr::col(WagelineIntervals::SubjectId).eq(subject_expr(subject_id)))
            .to_owned();
        Ok(exec(tx, &delete).await?.rows_affected())
    }
}

#[async_trait]
impl CompensationWriteApi for LedgerStore {
    async fn create_current(
        &self,
        input: CreateIntervalInput,
    ) -> LedgerResult<CompensationInterval> {
        let from = input.from.unwrap_or_else(ValidTime::now_micros);
        let span = IntervalSpan::new(from, input.to);
        validate_fields(input.subject_id, input.amount, span)?;
        self.ensure_subject_exists(input.subject_id).await?;

        let created = self
            .run_write("create_current", async {
                let (guard, tx) = self.begin_write(&[input.subject_id]).await?;
                let outcome = self
                    .create_current_in(&tx, input.subject_id, input.amount, span)
                    .await?;
                self.maybe_failpoint(FAILPOINT_CREATE_BEFORE_COMMIT)?;
                Ok(PendingWrite {
                    _guard: guard,
                    tx,
                    outcome,
                })
            })
            .await?;
        info!(
            "ledger: created interval {} for subject {} from {}",
            created.id, created.subject_id, created.from
        );
        Ok(created)
    }

    async fn update_interval(&self, id: IntervalId, input: UpdateIntervalInput) -> LedgerResult<()> {
        let current = self.get_interval(id).await?;
        let from = input.from.unwrap_or_else(ValidTime::now_micros);
        let span = IntervalSpan::new(from, input.to);
        validate_fields(input.subject_id, input.amount, span)?;
        self.ensure_subject_exists(input.subject_id).await?;

        self.run_write("update_interval", async {
            let (guard, tx) = self
                .begin_write(&[current.subject_id, input.subject_id])
                .await?;
            self.update_interval_in(&tx, id, current.subject_id, &input, span)
                .await?;
            self.maybe_failpoint(FAILPOINT_UPDATE_BEFORE_COMMIT)?;
            Ok(PendingWrite {
                _guard: guard,
                tx,
                outcome: (),
            })
        })
        .await?;
        info!("ledger: updated interval {id} for subject {}", input.subject_id);
        Ok(())
    }

    async fn delete_interval(&self, id: IntervalId) -> LedgerResult<()> {
        let current = self.get_interval(id).await?;
        self.run_write("delete_interval", async {
            let (guard, tx) = self.begin_write(&[current.subject_id]).await?;
            self.delete_interval_in(&tx, id, current.subject_id).await?;
            Ok(PendingWrite {
                _guard: guard,
                tx,
                outcome: (),
            })
        })
        .await?;
        info!(
            "ledger: deleted interval {id} for subject {}",
            current.subject_id
        );
        Ok(())
    }

    async fn purge_subject(&self, subject_id: SubjectId) -> LedgerResult<u64> {
        let removed = self
            .run_write("purge_subject", async {
                let (guard, tx) = self.begin_write(&[subject_id]).await?;
                let outcome = self.purge_subject_in(&tx, subject_id).await?;
                Ok(PendingWrite {
                    _guard: guard,
                    tx,
                    outcome,
                })
            })
            .await?;
        info!("ledger: purged {removed} intervals for subject {subject_id}");
        Ok(removed)
    }
}

#[async_trait]
impl CompensationReadApi for LedgerStore {
    async fn list_intervals(
        &self,
        subject_id: Option<SubjectId>,
    ) -> LedgerResult<Vec<CompensationInterval>> {
        self.fetch_intervals(&self.conn, subject_id).await
    }

    async fn get_interval(&self, id: IntervalId) -> LedgerResult<CompensationInterval> {
        self.fetch_interval(&self.conn, id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("interval {id} not found")))
    }

    async fn current_value_as_of(
        &self,
        subject_id: SubjectId,
        at: ValidTime,
    ) -> LedgerResult<Option<Decimal>> {
        let intervals = self.list_intervals(Some(subject_id)).await?;
        Ok(resolver::current_value_as_of(&intervals, at))
    }
}

#[async_trait]
impl IntegrityApi for LedgerStore {
    async fn check_subject(&self, subject_id: SubjectId) -> LedgerResult<IntegrityReport> {
        let intervals = self.list_intervals(Some(subject_id)).await?;
        let report = check_intervals(subject_id, &intervals);
        if !report.is_healthy() {
            warn!(
                "ledger: subject {subject_id} integrity check found {} open intervals and {} overlaps",
                report.open_intervals.len(),
                report.overlapping_pairs.len()
            );
        }
        Ok(report)
    }
}

async fn open_connection(config: &LedgerConfig, base_dir: &Path) -> LedgerResult<DatabaseConnection> {
    let conn = Database::connect(config.connect_options(base_dir)?).await?;
    Migrator::up(&conn, None).await?;
    debug!(
        "ledger: connected to {} datastore and applied migrations",
        config.backend_name()
    );
    Ok(conn)
}
