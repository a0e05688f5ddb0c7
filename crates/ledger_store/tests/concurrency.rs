use std::sync::Arc;

use tempfile::tempdir;
use wageline_ledger_store::{
    CompensationReadApi, CompensationWriteApi, CreateIntervalInput, Decimal, IntegrityApi,
    LedgerConfig, LedgerError, LedgerResult, LedgerStore, StaticSubjectRegistry, SubjectId,
    ValidTime,
};

const WRITERS: i64 = 12;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_keep_a_single_open_interval() -> LedgerResult<()> {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    let config = LedgerConfig::default_sqlite(base.join("ledger.sqlite").to_string_lossy());
    let subject = SubjectId::new();
    let registry = Arc::new(StaticSubjectRegistry::with_subjects([subject]));
    let store = LedgerStore::connect(&config, base, registry).await?;
    let start = ValidTime::parse_rfc3339("2024-01-01T00:00:00Z")?;

    let mut handles = Vec::new();
    for offset in 0..WRITERS {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .create_current(CreateIntervalInput {
                    subject_id: subject,
                    amount: Decimal::new(1_000 + offset, 0),
                    from: Some(ValidTime(start.0 + offset * 86_400_000_000)),
                    to: None,
                })
                .await
        }));
    }
    let mut succeeded = 0;
    for handle in handles {
        // Writers that arrive after a later start was recorded are rejected.
        if handle.await.expect("join").is_ok() {
            succeeded += 1;
        }
    }
    assert!(succeeded >= 1);

    let report = store.check_subject(subject).await?;
    assert!(report.is_healthy(), "{report:?}");
    assert_eq!(report.open_intervals.len(), 1);
    assert_eq!(report.interval_count, succeeded);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn subjects_are_written_independently() -> LedgerResult<()> {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    let config = LedgerConfig::default_sqlite(base.join("ledger.sqlite").to_string_lossy());
    let subjects: Vec<SubjectId> = (0..6).map(|_| SubjectId::new()).collect();
    let registry = Arc::new(StaticSubjectRegistry::with_subjects(subjects.clone()));
    let store = LedgerStore::connect(&config, base, registry).await?;
    let start = ValidTime::parse_rfc3339("2024-01-01T00:00:00Z")?;

    let mut handles = Vec::new();
    for subject in subjects.iter().copied() {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            for month in 0..3i64 {
                store
                    .create_current(CreateIntervalInput {
                        subject_id: subject,
                        amount: Decimal::new(100 * (month + 1), 0),
                        from: Some(ValidTime(start.0 + month * 30 * 86_400_000_000)),
                        to: None,
                    })
                    .await?;
            }
            LedgerResult::Ok(())
        }));
    }
    for handle in handles {
        handle.await.expect("join")?;
    }

    for subject in subjects {
        let rows = store.list_intervals(Some(subject)).await?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().filter(|row| row.is_open()).count(), 1);
        assert!(store.check_subject(subject).await?.is_healthy());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_stores_on_one_database_serialize_writes() -> LedgerResult<()> {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    let config = LedgerConfig::default_sqlite(base.join("ledger.sqlite").to_string_lossy());
    let subject = SubjectId::new();
    let registry = Arc::new(StaticSubjectRegistry::with_subjects([subject]));
    // Each store has its own pool and its own in-process locks, like two processes.
    let stores = [
        LedgerStore::connect(&config, base, registry.clone()).await?,
        LedgerStore::connect(&config, base, registry).await?,
    ];
    let start = ValidTime::parse_rfc3339("2024-01-01T00:00:00Z")?;

    let mut handles = Vec::new();
    for offset in 0..WRITERS {
        let store = stores[(offset % 2) as usize].clone();
        handles.push(tokio::spawn(async move {
            store
                .create_current(CreateIntervalInput {
                    subject_id: subject,
                    amount: Decimal::new(2_000 + offset, 0),
                    from: Some(ValidTime(start.0 + offset * 86_400_000_000)),
                    to: None,
                })
                .await
        }));
    }
    let mut succeeded = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => succeeded += 1,
            Err(err) => assert!(
                matches!(err, LedgerError::BadRequest { .. }),
                "unexpected failure: {err:?}"
            ),
        }
    }
    assert!(succeeded >= 1);

    for store in &stores {
        let report = store.check_subject(subject).await?;
        assert!(report.is_healthy(), "{report:?}");
        assert_eq!(report.open_intervals.len(), 1);
        assert_eq!(report.interval_count, succeeded);
    }
    Ok(())
}
