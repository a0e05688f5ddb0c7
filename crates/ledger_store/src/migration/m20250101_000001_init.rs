use sea_orm_migration::prelude::*;

use crate::db::{WagelineIntervals, WagelineSubjectLocks, WagelineSubjects};

/// Hyphenated uuid text, identical on every backend.
const SUBJECT_ID_LEN: u32 = 36;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WagelineSubjects::Table)
                    .if_not_exists()
                    .col(subject_key(WagelineSubjects::SubjectId))
                    .col(
                        ColumnDef::new(WagelineSubjects::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WagelineSubjectLocks::Table)
                    .if_not_exists()
                    .col(subject_key(WagelineSubjectLocks::SubjectId))
                    .col(
                        ColumnDef::new(WagelineSubjectLocks::LockedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WagelineIntervals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WagelineIntervals::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WagelineIntervals::SubjectId)
                            .string_len(SUBJECT_ID_LEN)
                            .not_null(),
                    )
                    // Decimal text keeps the caller's scale on every backend.
                    .col(
                        ColumnDef::new(WagelineIntervals::Amount)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WagelineIntervals::ValidFrom)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WagelineIntervals::ValidTo).big_integer().null())
                    .check(
                        Expr::col(WagelineIntervals::ValidTo)
                            .is_null()
                            .or(Expr::col(WagelineIntervals::ValidTo)
                                .gte(Expr::col(WagelineIntervals::ValidFrom))),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_wageline_intervals_subject_from")
                    .table(WagelineIntervals::Table)
                    .col(WagelineIntervals::SubjectId)
                    .col(WagelineIntervals::ValidFrom)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WagelineIntervals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WagelineSubjectLocks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WagelineSubjects::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn subject_key(column: impl IntoIden) -> ColumnDef {
    ColumnDef::new(column)
        .string_len(SUBJECT_ID_LEN)
        .not_null()
        .primary_key()
        .to_owned()
}
