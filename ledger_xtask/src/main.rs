use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use wageline_ledger_store::{
    open_store, CompensationReadApi, CompensationWriteApi, CreateIntervalInput, IntegrityApi,
    IntervalId, LedgerStore, SqlSubjectRegistry, SubjectId, UpdateIntervalInput, ValidTime,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let store = open_store(&cli.datastore)
        .await
        .with_context(|| format!("open datastore under {}", cli.datastore.display()))?;
    match cli.command {
        Command::RegisterSubject(args) => register_subject(&store, args).await,
        Command::Create(args) => create_interval(&store, args).await,
        Command::Update(args) => update_interval(&store, args).await,
        Command::Delete(args) => delete_interval(&store, args).await,
        Command::List(args) => list_intervals(&store, args).await,
        Command::Current(args) => current_value(&store, args).await,
        Command::Health(args) => check_health(&store, args).await,
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Operator utilities for the wageline compensation ledger"
)]
struct Cli {
    /// Directory where the datastore lives (contains wageline.json and the sqlite file).
    #[arg(long, global = true, default_value = ".wageline")]
    datastore: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a subject to the datastore's registry, generating an id when none is given.
    RegisterSubject(RegisterSubjectArgs),
    /// Record a new interval, closing the subject's open one if needed.
    Create(IntervalArgs),
    /// Rewrite an existing interval in place.
    Update(UpdateArgs),
    /// Remove one interval.
    Delete(DeleteArgs),
    /// Print intervals, newest first.
    List(ListArgs),
    /// Resolve the value in force for a subject at an instant.
    Current(CurrentArgs),
    /// Scan subjects for overlapping or multiply-open intervals.
    Health(HealthArgs),
}

#[derive(Parser)]
struct RegisterSubjectArgs {
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Parser)]
struct IntervalArgs {
    #[arg(long)]
    subject: String,
    /// Decimal amount, e.g. 52000.00
    #[arg(long)]
    amount: String,
    /// RFC 3339 start; defaults to now.
    #[arg(long)]
    from: Option<String>,
    /// RFC 3339 inclusive end; omit for an open interval.
    #[arg(long)]
    to: Option<String>,
}

#[derive(Parser)]
struct UpdateArgs {
    #[arg(long)]
    id: i64,
    #[command(flatten)]
    interval: IntervalArgs,
}

#[derive(Parser)]
struct DeleteArgs {
    #[arg(long)]
    id: i64,
}

#[derive(Parser)]
struct ListArgs {
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Parser)]
struct CurrentArgs {
    #[arg(long)]
    subject: String,
    /// RFC 3339 instant; defaults to now.
    #[arg(long)]
    at: Option<String>,
}

#[derive(Parser)]
struct HealthArgs {
    /// Limit the scan to one subject.
    #[arg(long)]
    subject: Option<String>,
    /// Reduce output to unhealthy subjects only.
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IntervalView {
    id: IntervalId,
    subject_id: SubjectId,
    amount: String,
    from: String,
    to: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentView {
    subject_id: SubjectId,
    at: String,
    amount: Option<String>,
}

fn parse_subject(value: &str) -> Result<SubjectId> {
    Ok(value.parse::<SubjectId>()?)
}

fn parse_time(value: Option<&str>) -> Result<Option<ValidTime>> {
    value
        .map(|raw| ValidTime::parse_rfc3339(raw).with_context(|| format!("parse time '{raw}'")))
        .transpose()
}

fn parse_amount(value: &str) -> Result<Decimal> {
    Decimal::from_str(value).with_context(|| format!("parse amount '{value}'"))
}

fn interval_view(interval: &wageline_ledger_store::CompensationInterval) -> Result<IntervalView> {
    Ok(IntervalView {
        id: interval.id,
        subject_id: interval.subject_id,
        amount: interval.amount.to_string(),
        from: interval.from.to_rfc3339()?,
        to: interval.to.map(ValidTime::to_rfc3339).transpose()?,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn register_subject(store: &LedgerStore, args: RegisterSubjectArgs) -> Result<()> {
    let subject = match args.subject.as_deref() {
        Some(raw) => parse_subject(raw)?,
        None => SubjectId::new(),
    };
    let registry = SqlSubjectRegistry::new(store.connection().clone());
    let added = registry.register(subject).await?;
    if !added {
        warn!("subject {subject} was already registered");
    }
    print_json(&serde_json::json!({ "subjectId": subject, "added": added }))
}

async fn create_interval(store: &LedgerStore, args: IntervalArgs) -> Result<()> {
    let input = CreateIntervalInput {
        subject_id: parse_subject(&args.subject)?,
        amount: parse_amount(&args.amount)?,
        from: parse_time(args.from.as_deref())?,
        to: parse_time(args.to.as_deref())?,
    };
    let created = store.create_current(input).await?;
    print_json(&interval_view(&created)?)
}

async fn update_interval(store: &LedgerStore, args: UpdateArgs) -> Result<()> {
    let id = IntervalId(args.id);
    let input = UpdateIntervalInput {
        subject_id: parse_subject(&args.interval.subject)?,
        amount: parse_amount(&args.interval.amount)?,
        from: parse_time(args.interval.from.as_deref())?,
        to: parse_time(args.interval.to.as_deref())?,
    };
    store.update_interval(id, input).await?;
    let updated = store.get_interval(id).await?;
    print_json(&interval_view(&updated)?)
}

async fn delete_interval(store: &LedgerStore, args: DeleteArgs) -> Result<()> {
    let id = IntervalId(args.id);
    store.delete_interval(id).await?;
    print_json(&serde_json::json!({ "deleted": id }))
}

async fn list_intervals(store: &LedgerStore, args: ListArgs) -> Result<()> {
    let subject = args.subject.as_deref().map(parse_subject).transpose()?;
    let intervals = store.list_intervals(subject).await?;
    let views = intervals
        .iter()
        .map(interval_view)
        .collect::<Result<Vec<_>>>()?;
    print_json(&views)
}

async fn current_value(store: &LedgerStore, args: CurrentArgs) -> Result<()> {
    let subject_id = parse_subject(&args.subject)?;
    let at = parse_time(args.at.as_deref())?.unwrap_or_else(ValidTime::now_micros);
    let amount = store.current_value_as_of(subject_id, at).await?;
    print_json(&CurrentView {
        subject_id,
        at: at.to_rfc3339()?,
        amount: amount.map(|value| value.to_string()),
    })
}

async fn check_health(store: &LedgerStore, args: HealthArgs) -> Result<()> {
    let subjects: BTreeSet<SubjectId> = match args.subject.as_deref() {
        Some(raw) => BTreeSet::from([parse_subject(raw)?]),
        None => store
            .list_intervals(None)
            .await?
            .into_iter()
            .map(|interval| interval.subject_id)
            .collect(),
    };
    if subjects.is_empty() {
        info!("no intervals recorded; nothing to check");
    }

    let mut unhealthy = 0usize;
    for subject in subjects {
        let report = store.check_subject(subject).await?;
        if !report.is_healthy() {
            unhealthy += 1;
        }
        if !args.quiet || !report.is_healthy() {
            print_json(&report)?;
        }
    }

    if unhealthy > 0 {
        return Err(anyhow!("{unhealthy} subject(s) failed the integrity check"));
    }
    Ok(())
}
