use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use folio_config::Settings;
use folio_core::{CompanyId, ItemId, NewCompany, NewInventoryItem, SedeId};
use folio_ledger::{audit_all, CodeAssigner, SqliteCodeStore};

#[derive(Parser)]
#[command(name = "folio", version, about = "Operate the Folio code-issuance store")]
struct Cli {
    /// Path to a TOML settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Database path, overriding the settings file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage companies (tenants; each carries a client code).
    Company {
        #[command(subcommand)]
        command: CompanyCommand,
    },
    /// Manage asset categories of a tenant.
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },
    /// Manage sedes (sites) of a tenant.
    Sede {
        #[command(subcommand)]
        command: SedeCommand,
    },
    /// Manage inventory items (each carries an asset code).
    Item {
        #[command(subcommand)]
        command: ItemCommand,
    },
    /// Check every sequence ledger against live codes and correct drift.
    Audit {
        /// Emit findings as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum CompanyCommand {
    /// Register a company and issue its client code.
    Add {
        #[arg(long)]
        name: String,
        /// Short alphanumeric prefix used in the tenant's asset codes.
        #[arg(long)]
        prefix: String,
    },
    /// Soft-delete a company, freeing its client code.
    Rm { id: i64 },
    /// List live companies.
    List,
}

#[derive(Subcommand)]
enum CategoryCommand {
    /// Register an asset category for a tenant.
    Add {
        #[arg(long)]
        tenant: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        prefix: String,
    },
}

#[derive(Subcommand)]
enum SedeCommand {
    /// Register a sede for a tenant.
    Add {
        #[arg(long)]
        tenant: i64,
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum ItemCommand {
    /// Create an inventory item and issue its asset code.
    Add {
        #[arg(long)]
        tenant: i64,
        #[arg(long)]
        sede: Option<i64>,
        /// Category name, matched case-insensitively.
        #[arg(long)]
        category: String,
        #[arg(long)]
        name: String,
    },
    /// Soft-delete an item, freeing its code for reuse.
    Rm { id: i64 },
    /// List a tenant's live items.
    List {
        #[arg(long)]
        tenant: i64,
    },
}

pub fn run() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let db = cli.db.unwrap_or_else(|| settings.store.path.clone());
    let store = SqliteCodeStore::open_with_timeout(db, settings.store.busy_timeout())?;
    debug!(db = %store.path().display(), "store opened");
    let assigner =
        CodeAssigner::new(store.clone()).with_retry_budget(settings.assigner.retry_budget);

    match cli.command {
        Command::Company { command } => match command {
            CompanyCommand::Add { name, prefix } => {
                let company = assigner.create_company(&NewCompany { name, prefix })?;
                println!(
                    "created company {} '{}' with code {}",
                    company.id, company.name, company.client_code
                );
            }
            CompanyCommand::Rm { id } => {
                if !store.delete_company(CompanyId(id))? {
                    bail!("no live company {id}");
                }
                println!("deleted company {id}");
            }
            CompanyCommand::List => {
                for company in store.live_companies()? {
                    println!(
                        "{}  {}  {}  (prefix {})",
                        company.client_code, company.id, company.name, company.prefix
                    );
                }
            }
        },
        Command::Category { command } => match command {
            CategoryCommand::Add {
                tenant,
                name,
                prefix,
            } => {
                let category = store.add_category(CompanyId(tenant), &name, &prefix)?;
                println!(
                    "created category {} '{}' (prefix {}) for tenant {}",
                    category.id, category.name, category.prefix, category.tenant
                );
            }
        },
        Command::Sede { command } => match command {
            SedeCommand::Add { tenant, name } => {
                let sede = store.add_sede(CompanyId(tenant), &name)?;
                println!("created sede {} '{}' for tenant {}", sede.id, sede.name, sede.tenant);
            }
        },
        Command::Item { command } => match command {
            ItemCommand::Add {
                tenant,
                sede,
                category,
                name,
            } => {
                let item = assigner.create_item(&NewInventoryItem {
                    tenant: CompanyId(tenant),
                    sede: sede.map(SedeId),
                    category,
                    name,
                })?;
                println!("created item {} '{}' with code {}", item.id, item.name, item.code);
            }
            ItemCommand::Rm { id } => {
                if !store.delete_item(ItemId(id))? {
                    bail!("no live item {id}");
                }
                println!("deleted item {id}");
            }
            ItemCommand::List { tenant } => {
                for item in store.live_items(CompanyId(tenant))? {
                    println!("{}  {}  {}", item.code, item.id, item.name);
                }
            }
        },
        Command::Audit { json } => {
            let findings = audit_all(&store)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&findings)?);
            } else if findings.is_empty() {
                println!("all sequences consistent");
            } else {
                for finding in &findings {
                    println!(
                        "{}: ledger {} behind live max {}; corrected to {}",
                        finding.scope, finding.ledger_next, finding.live_max, finding.corrected_to
                    );
                }
                println!("{} sequence(s) corrected", findings.len());
            }
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
