//! feedaemon CLI entry point
//!
//! Operational surface for the pipeline: simulate a message end to end,
//! send reminders, recompute a fee aggregate, inspect a fee account.

use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use feedaemon::cli::{Cli, Command};
use feedaemon::config::{Config, LedgerBackend};
use feedaemon::llm::{ChatClient, GroqClient};
use feedaemon::notify::{ConsoleDelivery, DeliveryAdapter, ReminderService, WhatsAppClient};
use feedaemon::pipeline::{
    Classifier, ConfirmationStore, MessageRouter, MutationService, ReadService, WriteParser,
};
use feeledger::{FeeStatus, LedgerStore, MemoryStore, SheetsStore};

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "feedaemon loaded config: provider={}, model={}",
        config.llm.provider, config.llm.model
    );

    match cli.command {
        Some(Command::Simulate { from, message }) => {
            cmd_simulate(&config, &from, &message.join(" "), cli.memory).await
        }
        Some(Command::Remind { target }) => cmd_remind(&config, &target, cli.memory).await,
        Some(Command::Recompute { stud_id }) => cmd_recompute(&config, &stud_id, cli.memory).await,
        Some(Command::Status { stud_id }) => cmd_status(&config, &stud_id, cli.memory).await,
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn build_ledger(config: &Config, force_memory: bool) -> Result<Arc<dyn LedgerStore>> {
    if force_memory || config.ledger.backend == LedgerBackend::Memory {
        info!("using in-memory ledger");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let token = std::env::var(&config.ledger.token_env).map_err(|_| {
        eyre::eyre!(
            "Ledger API token not found. Set the {} environment variable.",
            config.ledger.token_env
        )
    })?;
    let store = SheetsStore::new(config.ledger.spreadsheet_id.clone(), token)
        .context("Failed to create spreadsheet client")?;
    Ok(Arc::new(store))
}

fn build_delivery(config: &Config, console: bool) -> Result<Arc<dyn DeliveryAdapter>> {
    if console {
        return Ok(Arc::new(ConsoleDelivery));
    }
    let client = WhatsAppClient::from_config(&config.whatsapp)
        .map_err(|e| eyre::eyre!("Failed to create WhatsApp client: {e}"))?;
    Ok(Arc::new(client))
}

fn reminder_service(
    config: &Config,
    ledger: Arc<dyn LedgerStore>,
    delivery: Arc<dyn DeliveryAdapter>,
) -> ReminderService {
    ReminderService::new(
        ledger,
        delivery,
        config.school.name.clone(),
        config.school.payment_base_url.clone(),
        config.whatsapp.country_code.clone(),
    )
}

/// Run one message through the full pipeline; replies print to stdout.
async fn cmd_simulate(config: &Config, from: &str, message: &str, memory: bool) -> Result<()> {
    if std::env::var(&config.llm.api_key_env).is_err() {
        return Err(eyre::eyre!(
            "LLM API key not found. Set the {} environment variable.",
            config.llm.api_key_env
        ));
    }

    let ledger = build_ledger(config, memory)?;
    let delivery: Arc<dyn DeliveryAdapter> = Arc::new(ConsoleDelivery);
    let llm: Arc<dyn ChatClient> =
        Arc::new(GroqClient::from_config(&config.llm).map_err(|e| eyre::eyre!("{e}"))?);

    let router = MessageRouter::new(
        Classifier::new(llm.clone()),
        WriteParser::new(llm.clone()),
        ReadService::new(llm, ledger.clone()),
        Arc::new(ConfirmationStore::new(config.confirmation.ttl_minutes)),
        Arc::new(MutationService::new(ledger.clone())),
        reminder_service(config, ledger.clone(), delivery.clone()),
        ledger,
        delivery,
    );

    println!("Processing message from {from}: {message:?}\n");
    router.handle_message(from, message).await
}

/// Send reminders to all guardians or one student's guardian.
async fn cmd_remind(config: &Config, target: &str, memory: bool) -> Result<()> {
    let ledger = build_ledger(config, memory)?;
    let delivery = build_delivery(config, memory)?;
    let reminders = reminder_service(config, ledger, delivery);

    let summary = if target.eq_ignore_ascii_case("all") {
        reminders.remind_all().await
    } else {
        reminders.remind_one(target).await
    };
    println!("{summary}");
    Ok(())
}

/// Rebuild a student's fee aggregate from their installment rows.
async fn cmd_recompute(config: &Config, stud_id: &str, memory: bool) -> Result<()> {
    let ledger = build_ledger(config, memory)?;
    let mutation = MutationService::new(ledger);

    match mutation.recompute_fee_account(stud_id).await? {
        Some(account) => {
            println!("{} fee account recomputed:", "✓".green());
            print_account_lines(&account);
            Ok(())
        }
        None => Err(eyre::eyre!("No fee account found for {stud_id}")),
    }
}

/// Print a student's fee account.
async fn cmd_status(config: &Config, stud_id: &str, memory: bool) -> Result<()> {
    let ledger = build_ledger(config, memory)?;
    match ledger.fee_account(stud_id).await? {
        Some(account) => {
            println!("Fee account for {} ({})", account.name.bold(), account.stud_id);
            print_account_lines(&account);
            Ok(())
        }
        None => Err(eyre::eyre!("No fee account found for {stud_id}")),
    }
}

fn print_account_lines(account: &feeledger::FeeAccount) {
    let status = match account.status {
        FeeStatus::Paid => account.status.to_string().green(),
        FeeStatus::Partial => account.status.to_string().yellow(),
        FeeStatus::Pending | FeeStatus::Unpaid => account.status.to_string().red(),
    };
    println!("  Class:      {}", account.class);
    println!("  Total fees: ₹{}", account.total_fees);
    println!("  Total paid: ₹{}", account.total_paid);
    println!("  Balance:    ₹{}", account.balance);
    println!("  Status:     {status}");
}
