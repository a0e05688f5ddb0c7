//! Statement execution and row decoding for the ledger tables.

use std::str::FromStr;

use rust_decimal::Decimal;
use sea_orm::sea_query::SimpleExpr;
use sea_orm::{ConnectionTrait, ExecResult, QueryResult, StatementBuilder};

use wageline_ledger_core::{
    CompensationInterval, IntervalId, LedgerError, LedgerResult, SubjectId, ValidTime,
};

/// Subject ids are stored as hyphenated uuid text.
pub(crate) fn subject_expr(subject_id: SubjectId) -> SimpleExpr {
    subject_id.to_string().into()
}

pub(crate) fn read_interval_id(row: &QueryResult) -> LedgerResult<IntervalId> {
    // Postgres reports the serial key as int4.
    match row.try_get::<i64>("", "id") {
        Ok(id) => Ok(IntervalId(id)),
        Err(_) => Ok(IntervalId(i64::from(row.try_get::<i32>("", "id")?))),
    }
}

pub(crate) fn read_subject_id(row: &QueryResult, column: &str) -> LedgerResult<SubjectId> {
    let raw: String = row.try_get("", column)?;
    SubjectId::from_str(&raw)
        .map_err(|_| LedgerError::internal(format!("stored subject id '{raw}' is not a uuid")))
}

pub(crate) fn read_interval(row: &QueryResult) -> LedgerResult<CompensationInterval> {
    let amount: String = row.try_get("", "amount")?;
    let valid_to: Option<i64> = row.try_get("", "valid_to")?;
    Ok(CompensationInterval {
        id: read_interval_id(row)?,
        subject_id: read_subject_id(row, "subject_id")?,
        amount: Decimal::from_str(&amount)
            .map_err(|err| LedgerError::internal(format!("stored amount '{amount}': {err}")))?,
        from: ValidTime(row.try_get("", "valid_from")?),
        to: valid_to.map(ValidTime),
    })
}

pub(crate) async fn exec<C, S>(conn: &C, stmt: &S) -> LedgerResult<ExecResult>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    let stmt = conn.get_database_backend().build(stmt);
    Ok(conn.execute(stmt).await?)
}

pub(crate) async fn fetch_all<C, S>(conn: &C, stmt: &S) -> LedgerResult<Vec<QueryResult>>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    let stmt = conn.get_database_backend().build(stmt);
    Ok(conn.query_all(stmt).await?)
}

pub(crate) async fn fetch_one<C, S>(conn: &C, stmt: &S) -> LedgerResult<Option<QueryResult>>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    let stmt = conn.get_database_backend().build(stmt);
    Ok(conn.query_one(stmt).await?)
}
