use std::sync::Arc;

use tempfile::tempdir;
use wageline_ledger_store::{
    CompensationReadApi, CompensationWriteApi, CreateIntervalInput, Decimal, LedgerConfig,
    LedgerResult, LedgerStore, StaticSubjectRegistry, SubjectId, ValidTime,
};

fn at(text: &str) -> ValidTime {
    ValidTime::parse_rfc3339(text).expect("timestamp")
}

fn closed(subject: SubjectId, amount: i64, from: &str, to: &str) -> CreateIntervalInput {
    CreateIntervalInput {
        subject_id: subject,
        amount: Decimal::new(amount, 0),
        from: Some(at(from)),
        to: Some(at(to)),
    }
}

#[tokio::test]
async fn falls_back_to_latest_start_when_nothing_is_running() -> LedgerResult<()> {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    let config = LedgerConfig::default_sqlite(base.join("ledger.sqlite").to_string_lossy());
    let subject = SubjectId::new();
    let registry = Arc::new(StaticSubjectRegistry::with_subjects([subject]));
    let store = LedgerStore::connect(&config, base, registry).await?;

    store
        .create_current(closed(subject, 100, "2020-01-01T00:00:00Z", "2020-12-31T00:00:00Z"))
        .await?;
    store
        .create_current(closed(subject, 200, "2021-01-01T00:00:00Z", "2021-12-31T00:00:00Z"))
        .await?;

    let value = store
        .current_value_as_of(subject, at("2022-06-01T00:00:00Z"))
        .await?;
    assert_eq!(value, Some(Decimal::new(200, 0)));

    // Intervals that have not ended by the instant outrank earlier history.
    let value = store
        .current_value_as_of(subject, at("2020-06-01T00:00:00Z"))
        .await?;
    assert_eq!(value, Some(Decimal::new(200, 0)));
    Ok(())
}

#[tokio::test]
async fn open_interval_is_current_value() -> LedgerResult<()> {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    let config = LedgerConfig::default_sqlite(base.join("ledger.sqlite").to_string_lossy());
    let subject = SubjectId::new();
    let registry = Arc::new(StaticSubjectRegistry::with_subjects([subject]));
    let store = LedgerStore::connect(&config, base, registry).await?;

    for (from, amount) in [("2024-01-01T00:00:00Z", 1_000), ("2024-06-01T00:00:00Z", 1_200)] {
        store
            .create_current(CreateIntervalInput {
                subject_id: subject,
                amount: Decimal::new(amount, 0),
                from: Some(at(from)),
                to: None,
            })
            .await?;
    }

    let value = store
        .current_value_as_of(subject, at("2024-07-01T00:00:00Z"))
        .await?;
    assert_eq!(value, Some(Decimal::new(1_200, 0)));
    let again = store
        .current_value_as_of(subject, at("2024-07-01T00:00:00Z"))
        .await?;
    assert_eq!(again, value);
    Ok(())
}

#[tokio::test]
async fn unknown_or_empty_subjects_have_no_value() -> LedgerResult<()> {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    let config = LedgerConfig::default_sqlite(base.join("ledger.sqlite").to_string_lossy());
    let alice = SubjectId::new();
    let bob = SubjectId::new();
    let registry = Arc::new(StaticSubjectRegistry::with_subjects([alice, bob]));
    let store = LedgerStore::connect(&config, base, registry).await?;

    store
        .create_current(CreateIntervalInput {
            subject_id: alice,
            amount: Decimal::new(5_000, 0),
            from: Some(at("2024-01-01T00:00:00Z")),
            to: None,
        })
        .await?;

    let now = ValidTime::now_micros();
    assert_eq!(store.current_value_as_of(bob, now).await?, None);
    assert_eq!(store.current_value_as_of(SubjectId::new(), now).await?, None);
    assert_eq!(
        store.current_value_as_of(alice, now).await?,
        Some(Decimal::new(5_000, 0))
    );
    Ok(())
}
