use async_trait::async_trait;
use sea_orm::sea_query::{Expr, OnConflict, Query};
use sea_orm::DatabaseConnection;

use wageline_ledger_core::{LedgerError, LedgerResult, SubjectId, SubjectRegistry, ValidTime};

use crate::db::WagelineSubjects;
use crate::sql::{exec, fetch_one, subject_expr};

/// Registry backed by the datastore's own `wageline_subjects` table.
#[derive(Clone)]
pub struct SqlSubjectRegistry {
    conn: DatabaseConnection,
}

impl SqlSubjectRegistry {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Returns `false` when the subject was already registered.
    pub async fn register(&self, subject_id: SubjectId) -> LedgerResult<bool> {
        if subject_id.is_nil() {
            return Err(LedgerError::bad_request("subject id is required"));
        }
        let insert = Query::insert()
            .into_table(WagelineSubjects::Table)
            .columns([WagelineSubjects::SubjectId, WagelineSubjects::CreatedAt])
            .values_panic([
                subject_expr(subject_id),
                ValidTime::now_micros().as_i64().into(),
            ])
            .on_conflict(
                OnConflict::column(WagelineSubjects::SubjectId)
                    .do_nothing()
                    .to_owned(),
            )
            .to_owned();
        let result = exec(&self.conn, &insert).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn unregister(&self, subject_id: SubjectId) -> LedgerResult<bool> {
        let delete = Query::delete()
            .from_table(WagelineSubjects::Table)
            .and_where(Expr::col(WagelineSubjects::SubjectId).eq(subject_expr(subject_id)))
            .to_owned();
        let result = exec(&self.conn, &delete).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SubjectRegistry for SqlSubjectRegistry {
    async fn exists(&self, subject_id: SubjectId) -> LedgerResult<bool> {
        let select = Query::select()
            .from(WagelineSubjects::Table)
            .column(WagelineSubjects::SubjectId)
            .and_where(Expr::col(WagelineSubjects::SubjectId).eq(subject_expr(subject_id)))
            .limit(1)
            .to_owned();
        Ok(fetch_one(&self.conn, &select).await?.is_some())
    }
}
