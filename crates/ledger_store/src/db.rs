use sea_orm::DeriveIden;

/// Subjects known to the SQL-backed registry.
#[derive(DeriveIden, Clone, Copy)]
pub enum WagelineSubjects {
    Table,
    SubjectId,
    CreatedAt,
}

/// One row per subject that has been written. Every write transaction
/// upserts its subject's row first, which holds that row's lock until commit.
#[derive(DeriveIden, Clone, Copy)]
pub enum WagelineSubjectLocks {
    Table,
    SubjectId,
    LockedAt,
}

#[derive(DeriveIden, Clone, Copy)]
pub enum WagelineIntervals {
    Table,
    Id,
    SubjectId,
    Amount,
    ValidFrom,
    ValidTo,
}
