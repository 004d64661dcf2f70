use std::{fs::File, io, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use planta_ledger::{
    bootstrap,
    config::{self, AppConfig},
    db,
    events::{self, EventSender},
    models::{KardexQuery, SourceDocumentKind},
    repositories::SettingsRepository,
    tabular, LedgerServices,
};

#[derive(Parser)]
#[command(name = "planta-ledger", about = "Warehouse ledger maintenance tool", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations and create the default settings row
    Migrate,
    /// Consolidated on-hand quantity and cost of a product
    Stock { product_id: String },
    /// One page of a product's Kardex
    Kardex(KardexArgs),
    /// Whole Kardex range as CSV
    KardexExport(KardexExportArgs),
    /// CSV template for a bulk load with current quantities and costs
    BulkTemplate {
        #[arg(long)]
        out: PathBuf,
    },
    /// Reconcile declared stock from a bulk CSV file
    BulkLoad {
        file: PathBuf,
        #[arg(long, help = "User recorded as approver of the load")]
        user: String,
    },
    /// Report everything that depends on a purchase or production order
    StudyDeletion { kind: DocumentKindArg, id: i32 },
    /// Delete a purchase or production order without ledger history
    DeleteDocument { kind: DocumentKindArg, id: i32 },
    /// Show or change the operator switches
    Settings(SettingsArgs),
}

#[derive(Args)]
struct KardexArgs {
    product_id: String,
    #[arg(long)]
    from: NaiveDate,
    #[arg(long)]
    to: NaiveDate,
    #[arg(long)]
    page: Option<i64>,
    #[arg(long)]
    size: Option<i64>,
}

#[derive(Args)]
struct KardexExportArgs {
    product_id: String,
    #[arg(long)]
    from: NaiveDate,
    #[arg(long)]
    to: NaiveDate,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args)]
struct SettingsArgs {
    #[arg(long)]
    forced_deletion: Option<bool>,
    #[arg(long)]
    bulk_load: Option<bool>,
    #[arg(long)]
    adjustments: Option<bool>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DocumentKindArg {
    /// Purchase order
    Po,
    /// Production order
    Op,
}

impl From<DocumentKindArg> for SourceDocumentKind {
    fn from(value: DocumentKindArg) -> Self {
        match value {
            DocumentKindArg::Po => SourceDocumentKind::PurchaseOrder,
            DocumentKindArg::Op => SourceDocumentKind::ProductionOrder,
        }
    }
}

struct CliContext {
    config: AppConfig,
    services: LedgerServices,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(&config.log_level, config.log_json);

        let pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        if config.auto_migrate {
            db::run_migrations(&pool).await.context("failed to run migrations")?;
        }
        let db = Arc::new(pool);

        let (event_sender, event_rx) = EventSender::channel(config.ledger.event_channel_capacity);
        tokio::spawn(events::process_events(event_rx));

        let services = LedgerServices::new(db, &config.ledger, None, Some(event_sender));
        Ok(Self { config, services })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;
    let services = &context.services;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&services.db)
                .await
                .context("failed to run migrations")?;
            bootstrap::ensure_defaults(&*services.db)
                .await
                .context("failed to create default settings")?;
            println!("Database is up to date ({})", context.config.environment);
        }
        Commands::Stock { product_id } => {
            let stock = services
                .kardex
                .stock_of(&product_id)
                .await
                .context("failed to read stock")?;
            if cli.json {
                print_json(&stock)?;
            } else {
                println!(
                    "{} {}: {} {} at cost {}",
                    stock.product_id,
                    stock.product_name,
                    stock.quantity,
                    stock.unit_of_measure,
                    stock.cost
                );
            }
        }
        Commands::Kardex(args) => {
            let mut query = KardexQuery::new(args.product_id, args.from, args.to);
            query.page = args.page;
            query.size = args.size;
            let page = services
                .kardex
                .page(query)
                .await
                .context("failed to build kardex")?;
            if cli.json {
                print_json(&page)?;
            } else {
                println!(
                    "{} {} ({}) opening balance {}",
                    page.product_id, page.product_name, page.unit_of_measure, page.opening_balance
                );
                for row in &page.rows {
                    println!(
                        "{}  #{:<6} {:<12} {:<12} in {:>10} out {:>10} balance {:>10}  {}",
                        row.occurred_at.format("%Y-%m-%d %H:%M:%S"),
                        row.movement_id,
                        row.movement_type,
                        row.warehouse,
                        row.entrada,
                        row.salida,
                        row.balance,
                        row.batch_number.as_deref().unwrap_or("-")
                    );
                }
                println!(
                    "page {} of {} ({} per page, {} movements)",
                    page.page + 1,
                    page.total_pages.max(1),
                    page.size,
                    page.total_elements
                );
            }
        }
        Commands::KardexExport(args) => {
            let export = services
                .kardex
                .export(&args.product_id, args.from, args.to)
                .await
                .context("failed to build kardex")?;
            let file = File::create(&args.out)
                .with_context(|| format!("cannot create {}", args.out.display()))?;
            tabular::write_kardex(file, &export)?;
            println!(
                "Wrote {} movements to {} (closing balance {})",
                export.rows.len(),
                args.out.display(),
                export.closing_balance
            );
        }
        Commands::BulkTemplate { out } => {
            let rows = services.bulk.template_rows().await?;
            let file =
                File::create(&out).with_context(|| format!("cannot create {}", out.display()))?;
            tabular::write_bulk_template(file, &rows)?;
            println!("Wrote {} materials to {}", rows.len(), out.display());
        }
        Commands::BulkLoad { file, user } => {
            let reader =
                File::open(&file).with_context(|| format!("cannot open {}", file.display()))?;
            let rows = tabular::read_bulk_rows(reader)?;
            info!(rows = rows.len(), "Bulk file parsed");
            let report = services
                .bulk
                .reconcile(rows, &user)
                .await
                .context("bulk load failed")?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "{} changed, {} unchanged, {} failed",
                    report.success_count, report.unchanged_count, report.failure_count
                );
                if let Some(id) = report.transaction_id {
                    println!("Adjustment transaction {} ({} lines)", id, report.adjustment_lines);
                }
                for error in &report.errors {
                    println!("  row {} ({}): {}", error.row_number, error.product_id, error.message);
                }
            }
        }
        Commands::StudyDeletion { kind, id } => {
            let report = services
                .deletion
                .study(kind.into(), id)
                .await
                .context("failed to study document")?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "{} {} [{}] {}",
                    report.document.kind,
                    report.document.id,
                    report.document.status,
                    report.document.counterpart
                );
                println!("  line items:   {}", report.line_items.len());
                println!("  lots:         {}", report.lots.len());
                println!("  transactions: {}", report.transactions.len());
                println!("  journal refs: {:?}", report.journal_entries);
                println!("  deletable:    {}", report.deletable);
            }
        }
        Commands::DeleteDocument { kind, id } => {
            let outcome = services
                .deletion
                .execute(kind.into(), id)
                .await
                .context("deletion refused")?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                println!(
                    "Deleted {} {} ({} line items, {} lots detached)",
                    outcome.kind, outcome.id, outcome.line_items_deleted, outcome.lots_detached
                );
            }
        }
        Commands::Settings(args) => {
            let current = SettingsRepository::current(&*services.db).await?;
            let settings = if args.forced_deletion.is_some()
                || args.bulk_load.is_some()
                || args.adjustments.is_some()
            {
                SettingsRepository::update(
                    &*services.db,
                    args.forced_deletion.unwrap_or(current.forced_deletion_enabled),
                    args.bulk_load.unwrap_or(current.bulk_load_enabled),
                    args.adjustments.unwrap_or(current.adjustments_enabled),
                )
                .await?
            } else {
                current
            };
            print_json(&settings)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    serde_json::to_writer_pretty(io::stdout(), value)?;
    println!();
    Ok(())
}
