//! Subcommand implementations
//!
//! Each returns `Ok(false)` when the command ran but some operation failed,
//! which the binary turns into a non-zero exit status.

use anyhow::{bail, Context};
use chrono::DateTime;
use clap::ArgMatches;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use timelock_abi::Call;
use timelock_core::{
    ExecutePhase, FailurePolicy, JsonRpcDelayContract, OperationFailure, QueuePhase, QueuePlan,
    TimelockConfig,
};
use timelock_ledger::{Ledger, ProposedOperation};

/// Configuration resolved from file, environment and global flags
pub(crate) struct Settings {
    config: TimelockConfig,
}

impl Settings {
    pub(crate) fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let explicit = matches.get_one::<PathBuf>("config");
        let path = explicit.cloned().unwrap_or_else(|| PathBuf::from(crate::DEFAULT_CONFIG));

        let config = if explicit.is_some() || path.exists() {
            TimelockConfig::from_path(&path)
                .with_context(|| format!("loading configuration from {}", path.display()))?
        } else {
            TimelockConfig::default()
        };
        let mut config = config.with_env_overrides();
        if let Some(dir) = matches.get_one::<PathBuf>("ledger-dir") {
            config = config.with_ledger_dir(dir.clone());
        }
        Ok(Self { config })
    }

    async fn ledger(&self) -> anyhow::Result<Arc<Ledger>> {
        let ledger = Ledger::open(&self.config.ledger_dir)
            .await
            .with_context(|| format!("opening ledger at {}", self.config.ledger_dir.display()))?;
        Ok(Arc::new(ledger))
    }

    fn contract(&self) -> anyhow::Result<Arc<JsonRpcDelayContract>> {
        self.config.validate().context("configuration is incomplete")?;
        Ok(Arc::new(JsonRpcDelayContract::from_config(&self.config)?))
    }
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing --{name}"))
}

pub(crate) async fn queue(settings: &Settings, args: &ArgMatches) -> anyhow::Result<bool> {
    let plan_path = args
        .get_one::<PathBuf>("plan")
        .context("missing --plan")?;
    let label = required(args, "label")?;
    let policy = if args.get_flag("continue-on-error") {
        FailurePolicy::Continue
    } else {
        FailurePolicy::Abort
    };

    let plan = QueuePlan::from_path(plan_path).await?;
    if plan.is_empty() {
        bail!("plan {} has no operations", plan_path.display());
    }
    let contract = settings.contract()?;
    let phase = QueuePhase::new(contract, settings.ledger().await?, settings.config.address_book()?)
        .with_gas(settings.config.gas)
        .with_sequence_numbers(settings.config.use_sequence_numbers)
        .with_failure_policy(policy);

    let report = phase.run(label, &plan).await?;
    for op in &report.recorded {
        println!(
            "queued   {}  eta {}  tx {}",
            op.description(),
            format_time(op.maturity_time()),
            op.queue_receipt()
        );
    }
    print_failures(&report.failures);
    if report.skipped > 0 {
        println!("skipped  {} operation(s) after the first failure", report.skipped);
    }
    match &report.batch {
        Some(batch) => println!("batch    {}", batch.file_name()),
        None => println!("batch    none written"),
    }
    Ok(report.is_success())
}

pub(crate) async fn execute(settings: &Settings, args: &ArgMatches) -> anyhow::Result<bool> {
    let ledger = settings.ledger().await?;
    let source = ledger.resolve(required(args, "batch")?).await?;
    let contract = settings.contract()?;

    let mut phase = ExecutePhase::new(contract, ledger)
        .with_gas(settings.config.gas)
        .with_sequence_numbers(settings.config.use_sequence_numbers);
    if let Some(label) = args.get_one::<String>("label") {
        phase = phase.with_result_label(label.clone());
    }

    let report = phase.run(&source).await?;
    for op in &report.executed {
        println!(
            "executed {}  tx {}",
            op.description(),
            op.execute_receipt().unwrap_or_default()
        );
    }
    if report.carried_over > 0 {
        println!("carried  {} already executed entries", report.carried_over);
    }
    print_failures(&report.failures);
    if report.skipped > 0 {
        println!("skipped  {} entries after a ledger failure", report.skipped);
    }
    println!("batch    {} -> {}", report.source.file_name(), report.output.file_name());
    Ok(report.is_success())
}

pub(crate) async fn show(settings: &Settings, args: &ArgMatches) -> anyhow::Result<bool> {
    let ledger = settings.ledger().await?;
    let batch = ledger.resolve(required(args, "batch")?).await?;
    let entries = ledger.read_batch(&batch).await?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(true);
    }
    println!("{} ({} entries)", batch.file_name(), entries.len());
    for (index, op) in entries.iter().enumerate() {
        print_entry(index, op);
    }
    Ok(true)
}

pub(crate) async fn list(settings: &Settings) -> anyhow::Result<bool> {
    let ledger = settings.ledger().await?;
    for batch in ledger.list_batches().await? {
        let created = batch
            .created_at_utc()
            .map_or_else(|| batch.created_at().to_string(), |t| t.to_rfc3339());
        let entries = match ledger.read_batch(&batch).await {
            Ok(entries) => entries.len().to_string(),
            Err(e) => {
                tracing::warn!(batch = %batch, error = %e, "unreadable batch");
                "?".to_string()
            }
        };
        println!("{:<40} {created}  {entries} entries", batch.file_name());
    }
    Ok(true)
}

pub(crate) async fn pending(settings: &Settings, args: &ArgMatches) -> anyhow::Result<bool> {
    let ledger = settings.ledger().await?;
    let queued_batch = ledger.resolve(required(args, "queued")?).await?;
    let queued = ledger.read_batch(&queued_batch).await?;

    let mut executed = Vec::new();
    for name in args.get_many::<String>("executed").into_iter().flatten() {
        let batch = ledger.resolve(name).await?;
        executed.extend(ledger.read_batch(&batch).await?);
    }

    let remaining = timelock_ledger::pending(&queued, &executed);
    println!("{} of {} entries pending", remaining.len(), queued.len());
    for (index, op) in remaining.iter().enumerate() {
        print_entry(index, op);
    }
    Ok(true)
}

pub(crate) fn encode(args: &ArgMatches) -> anyhow::Result<bool> {
    let signature = required(args, "signature")?;
    let types: Vec<String> =
        serde_json::from_str(required(args, "types")?).context("--types must be a JSON array of strings")?;
    let params: Vec<Value> =
        serde_json::from_str(required(args, "params")?).context("--params must be a JSON array")?;

    let call = Call::from_json(signature, types.as_slice(), &params)?;
    let bytes = if args.get_flag("calldata") {
        call.calldata()?
    } else {
        call.encode()?
    };
    println!("0x{}", hex::encode(bytes));
    Ok(true)
}

pub(crate) async fn replay(settings: &Settings, args: &ArgMatches) -> anyhow::Result<bool> {
    let ledger = settings.ledger().await?;
    let batch = ledger.resolve(required(args, "batch")?).await?;
    for op in ledger.read_batch(&batch).await? {
        println!("// {}", op.description());
        println!("{}", op.replay_command());
    }
    Ok(true)
}

fn print_entry(index: usize, op: &ProposedOperation) {
    println!("#{index} [{}] {}", op.state(), op.description());
    println!("    target    {}", op.target().to_checksum(None));
    if !op.value().is_zero() {
        println!("    value     {}", op.value());
    }
    println!("    call      {}", op.call().signature());
    println!("    params    {}", Value::Array(op.call().params_json()));
    println!("    eta       {}", format_time(op.maturity_time()));
    if let Some(nonce) = op.sequence_number() {
        println!("    nonce     {nonce}");
    }
    println!("    queued    {}", op.queue_receipt());
    if let Some(receipt) = op.execute_receipt() {
        println!("    executed  {receipt}");
    }
}

fn print_failures(failures: &[OperationFailure]) {
    for failure in failures {
        println!("FAILED   {failure}");
    }
}

fn format_time(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|t| DateTime::from_timestamp(t, 0))
        .map_or_else(|| timestamp.to_string(), |t| format!("{} ({timestamp})", t.to_rfc3339()))
}
