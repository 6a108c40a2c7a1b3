use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rent_ledger::{
    Config, Contract, ContractDraft, ContractEdit, EscalationQuote, Event, IndexTable, IndexType,
    Period, ProposedPeriod, RentLedger, SqliteStore, UpdateRecord,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Rent escalation ledger for index-adjusted rental contracts
#[derive(Parser)]
#[command(name = "rent-ledger")]
#[command(about = "Validate and apply index-based rent escalations")]
#[command(version = rent_ledger::VERSION)]
struct Cli {
    /// Config file (default: ./rent-ledger.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `database_path` from the config
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    #[command(about = "Create the database schema")]
    Init,

    #[command(about = "Manage contracts")]
    Contract {
        #[command(subcommand)]
        command: ContractCmd,
    },

    #[command(about = "Validate and compute an escalation without saving it")]
    Quote(EscalationArgs),

    #[command(about = "Validate, compute and save an escalation")]
    Update(EscalationArgs),

    #[command(about = "Show the escalation history of a contract")]
    History { id: String },

    #[command(about = "Show the audit events of a contract")]
    Events { id: String },
}

#[derive(Subcommand)]
enum ContractCmd {
    #[command(about = "Register a new contract")]
    Add(AddArgs),

    #[command(about = "List active contracts")]
    List,

    #[command(about = "Show a contract and its history")]
    Show { id: String },

    #[command(about = "Edit contract fields")]
    Edit(EditArgs),

    #[command(about = "Retire (soft delete) a contract")]
    Retire { id: String },
}

#[derive(Args)]
struct AddArgs {
    #[arg(long)]
    property: String,

    #[arg(long)]
    tenant: String,

    /// YYYY-MM-DD
    #[arg(long)]
    start: String,

    /// YYYY-MM-DD
    #[arg(long)]
    end: String,

    /// Initial monthly rent
    #[arg(long)]
    rent: Decimal,

    /// Months between escalations (1-12)
    #[arg(long, default_value = "3")]
    frequency: u32,

    #[arg(long, default_value = "ICL")]
    index: String,

    /// Deposit as a multiple of the rent
    #[arg(long, default_value = "1.5")]
    deposit: Decimal,
}

#[derive(Args)]
struct EditArgs {
    id: String,

    #[arg(long)]
    property: Option<String>,

    #[arg(long)]
    tenant: Option<String>,

    #[arg(long)]
    start: Option<String>,

    #[arg(long)]
    end: Option<String>,

    #[arg(long)]
    frequency: Option<u32>,

    #[arg(long)]
    index: Option<String>,

    #[arg(long)]
    deposit: Option<Decimal>,

    #[arg(long)]
    initial_rent: Option<Decimal>,

    /// Corrects the current rent without recording an escalation
    #[arg(long)]
    current_rent: Option<Decimal>,
}

#[derive(Args)]
struct EscalationArgs {
    id: String,

    /// First month of the period (YYYY-MM)
    #[arg(long)]
    from: Option<String>,

    /// Last month of the period (YYYY-MM)
    #[arg(long)]
    to: Option<String>,

    /// Monthly index in percent, once per month in order
    #[arg(long = "index", value_name = "PERCENT", allow_hyphen_values = true)]
    indices: Vec<String>,

    /// Read the indices for the period from a `month,value` CSV
    #[arg(long, conflicts_with = "indices")]
    index_file: Option<PathBuf>,
}

impl EscalationArgs {
    fn proposed(&self) -> ProposedPeriod {
        ProposedPeriod {
            start: self.from.clone(),
            end: self.to.clone(),
        }
    }

    /// Raw index values, either typed or looked up in the index table
    fn raw_indices(&self) -> Result<Vec<String>> {
        let Some(path) = &self.index_file else {
            return Ok(self.indices.clone());
        };

        let table = IndexTable::from_path(path)
            .with_context(|| format!("failed to load index table {}", path.display()))?;

        let period = match (&self.from, &self.to) {
            (Some(from), Some(to)) => Period::parse(from, to),
            _ => None,
        };
        // Bad or missing periods are reported by the validator
        let Some(period) = period else {
            return Ok(Vec::new());
        };

        let values = table.select(&period)?;
        Ok(values.iter().map(Decimal::to_string).collect())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(database) = cli.database.clone() {
        config.database_path = database;
    }
    init_tracing(&config.log_filter);

    let store = open_store(&config.database_path)?;
    let ledger = RentLedger::new(store);
    let actor = config.actor.as_str();

    match cli.command {
        Cmd::Init => {
            let count = ledger.store().count_contracts()?;
            println!("✓ Database ready at {}", config.database_path.display());
            println!("  {} contracts stored", count);
        }
        Cmd::Contract { command } => run_contract(&ledger, command, actor, cli.json)?,
        Cmd::Quote(args) => {
            let quote = ledger.quote(&args.id, &args.proposed(), &args.raw_indices()?)?;
            if cli.json {
                print_json(&quote)?;
            } else {
                print_quote(&quote);
                println!("\n(not saved - run `update` to apply)");
            }
        }
        Cmd::Update(args) => {
            let quote = ledger.quote(&args.id, &args.proposed(), &args.raw_indices()?)?;
            let record = ledger.apply(&quote, actor)?;
            if cli.json {
                print_json(&record)?;
            } else {
                print_quote(&quote);
                println!("\n✅ Escalation saved ({})", record.id);
            }
        }
        Cmd::History { id } => {
            let (_, history) = ledger.contract_with_history(&id)?;
            if cli.json {
                print_json(&history)?;
            } else {
                print_history(&history);
            }
        }
        Cmd::Events { id } => {
            let events = ledger.events(&id)?;
            if cli.json {
                print_json(&events)?;
            } else {
                print_events(&events);
            }
        }
    }

    Ok(())
}

fn run_contract(
    ledger: &RentLedger<SqliteStore>,
    command: ContractCmd,
    actor: &str,
    json: bool,
) -> Result<()> {
    match command {
        ContractCmd::Add(args) => {
            let draft = ContractDraft {
                property: args.property,
                tenant: args.tenant,
                start_date: args.start,
                end_date: args.end,
                update_frequency: args.frequency,
                index_type: IndexType::parse(&args.index),
                deposit_multiplier: args.deposit,
                initial_rent: Some(args.rent),
            };
            let contract = ledger.register_contract(draft, actor)?;
            if json {
                print_json(&contract)?;
            } else {
                println!("✓ Contract registered: {}", contract.id);
            }
        }
        ContractCmd::List => {
            let contracts = ledger.list_contracts(actor)?;
            if json {
                print_json(&contracts)?;
            } else if contracts.is_empty() {
                println!("No active contracts for {}", actor);
            } else {
                for contract in &contracts {
                    print_contract_line(contract);
                }
            }
        }
        ContractCmd::Show { id } => {
            let (contract, history) = ledger.contract_with_history(&id)?;
            if json {
                print_json(&serde_json::json!({ "contract": contract, "history": history }))?;
            } else {
                print_contract(&contract);
                println!();
                print_history(&history);
            }
        }
        ContractCmd::Edit(args) => {
            let edit = ContractEdit {
                property: args.property,
                tenant: args.tenant,
                start_date: args.start,
                end_date: args.end,
                update_frequency: args.frequency,
                index_type: args.index.as_deref().map(IndexType::parse),
                deposit_multiplier: args.deposit,
                initial_rent: args.initial_rent,
                current_rent: args.current_rent,
            };
            if edit.is_empty() {
                bail!("nothing to edit: pass at least one field flag");
            }
            let contract = ledger.edit_contract(&args.id, &edit)?;
            if json {
                print_json(&contract)?;
            } else {
                println!("✓ Contract updated (version {})", contract.version);
            }
        }
        ContractCmd::Retire { id } => {
            ledger.retire_contract(&id)?;
            println!("✓ Contract {} retired", id);
        }
    }
    Ok(())
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(path: &Path) -> Result<SqliteStore> {
    SqliteStore::open(path).with_context(|| format!("failed to open database {}", path.display()))
}

// ============================================================================
// OUTPUT
// ============================================================================

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_contract_line(contract: &Contract) {
    println!(
        "{}  {:<30} {:<25} {:>14}  every {} months ({})",
        contract.id,
        contract.property,
        contract.tenant,
        contract.current_rent,
        contract.update_frequency,
        contract.index_type.as_str(),
    );
}

fn print_contract(contract: &Contract) {
    println!("🏠 {}", contract.property);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  id:           {}", contract.id);
    println!("  tenant:       {}", contract.tenant);
    println!("  term:         {} to {}", contract.start_date, contract.end_date);
    println!(
        "  escalation:   every {} months, {}",
        contract.update_frequency,
        contract.index_type.as_str()
    );
    println!("  initial rent: {}", contract.initial_rent);
    println!("  current rent: {}", contract.current_rent);
    match contract.current_deposit() {
        Some(deposit) => println!("  deposit:      {} (x{})", deposit, contract.deposit_multiplier),
        None => println!("  deposit:      out of range (x{})", contract.deposit_multiplier),
    }
    println!("  first escalation from {}", contract.first_allowed_month());
    if !contract.active {
        println!("  ⚠️  retired");
    }
}

fn print_quote(quote: &EscalationQuote) {
    let result = &quote.result;
    println!("📈 {} - {}", quote.contract.property, quote.period);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (month, index) in quote.period.months().zip(&result.applied_indices) {
        println!("  {}  {:>8}%", month, index);
    }
    println!("  rent:    {} → {}", result.old_rent, result.new_rent);
    println!("  deposit: {} → {}", result.old_deposit, result.new_deposit);
    println!("  deposit difference: {}", result.diff_deposit);
}

fn print_history(history: &[UpdateRecord]) {
    if history.is_empty() {
        println!("No escalations recorded");
        return;
    }
    println!("📜 Escalation history ({})", history.len());
    for record in history {
        println!(
            "  {} to {}  {} → {}  by {} on {}",
            record.period_start,
            record.period_end,
            record.old_rent,
            record.new_rent,
            record.updated_by,
            record.applied_at.format("%Y-%m-%d"),
        );
    }
}

fn print_events(events: &[Event]) {
    if events.is_empty() {
        println!("No events");
        return;
    }
    for event in events {
        println!(
            "  {}  {:<18} {}  {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.event_type,
            event.actor,
            event.data,
        );
    }
}
