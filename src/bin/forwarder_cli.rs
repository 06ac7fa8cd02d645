use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use forwarder_api::{
    config::{self, AppConfig},
    db,
    errors::ServiceError,
    handlers::AppServices,
    services::{
        clock::SystemClock,
        import::{ImportOptions, ImportReport, RowOutcome},
        manifest::manifest_file_name,
        notifications::NoopSmsGateway,
    },
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "forwarder", about = "Back-office tooling for shipment files", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Import shipments from a CSV or XLSX file
    Import(ImportArgs),
    /// Export every shipment as CSV or XLSX
    Export(ExportArgs),
    /// Write the cargo manifest of a shipment
    Manifest(DocumentArgs),
    /// Print the invoice view of a shipment
    Invoice(DocumentArgs),
}

#[derive(Args)]
struct ImportArgs {
    file: PathBuf,
    /// Validate and report without keeping anything
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Keep the valid rows even when others are rejected
    #[arg(long, action = ArgAction::SetTrue)]
    skip_invalid_rows: bool,
    /// Staff username recorded as the acting user
    #[arg(long = "as")]
    acting_user: Option<String>,
}

#[derive(Args)]
struct OutputArgs {
    /// Output path; defaults to the generated file name
    #[arg(long, short)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct ExportArgs {
    /// Write an XLSX workbook instead of CSV
    #[arg(long, action = ArgAction::SetTrue)]
    xlsx: bool,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct DocumentArgs {
    /// Shipment reference, e.g. 240305001
    reference: String,
    #[command(flatten)]
    output: OutputArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db).await?;
            println!("migrations applied");
        }
        Commands::Import(args) => handle_import(&context, args, cli.json).await?,
        Commands::Export(args) => {
            let exports = &context.services.exports;
            let path = if args.xlsx {
                let (file_name, workbook) = exports.export_xlsx().await?;
                write_output(args.output.out, &file_name, &workbook)?
            } else {
                let (file_name, body) = exports.export().await?;
                write_output(args.output.out, &file_name, &body)?
            };
            println!("wrote {}", path.display());
        }
        Commands::Manifest(args) => {
            let shipment = context.shipment_by_reference(&args.reference).await?;
            let (reference, text) = context.services.manifests.render(shipment.id).await?;
            let path = write_output(args.output.out, &manifest_file_name(&reference), &text)?;
            println!("wrote {}", path.display());
        }
        Commands::Invoice(args) => {
            let shipment = context.shipment_by_reference(&args.reference).await?;
            let invoice = context.services.invoices.invoice(shipment.id).await?;
            if cli.json {
                print_json(&invoice)?;
            } else {
                println!("Invoice for {}", invoice.reference);
                for line in &invoice.lines {
                    println!("- {} • {} {}", line.description, line.amount, line.currency);
                }
                for total in &invoice.line_totals {
                    println!("  total {} {}", total.amount, total.currency);
                }
                if let Some(total) = invoice.total_charges {
                    println!("  shipment charges {}", total);
                }
            }
        }
    }

    Ok(())
}

async fn handle_import(context: &CliContext, args: ImportArgs, json: bool) -> Result<()> {
    let bytes =
        fs::read(&args.file).with_context(|| format!("failed to read {}", args.file.display()))?;
    let is_workbook = args
        .file
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));

    let acting_user = match args.acting_user.as_deref() {
        Some(username) => Some(
            context
                .services
                .staff_users
                .find_by_username(username)
                .await?
                .ok_or_else(|| anyhow!("unknown staff user '{}'", username))?
                .id,
        ),
        None => None,
    };

    let options = ImportOptions {
        dry_run: args.dry_run,
        skip_invalid_rows: args.skip_invalid_rows,
    };
    let imports = &context.services.imports;
    let outcome = if is_workbook {
        imports.import_xlsx(&bytes, options, acting_user).await
    } else {
        let text = std::str::from_utf8(&bytes)
            .with_context(|| format!("{} is not UTF-8 text", args.file.display()))?;
        imports.import_csv(text, options, acting_user).await
    };
    match outcome {
        Ok(report) if json => print_json(&report),
        Ok(report) => {
            render_report(&report);
            Ok(())
        }
        Err(ServiceError::ImportRejected(rows)) => {
            for row in &rows {
                eprintln!("{}", row);
            }
            Err(anyhow!("import rejected; nothing was saved"))
        }
        Err(err) => Err(err.into()),
    }
}

fn render_report(report: &ImportReport) {
    for row in &report.rows {
        match row.outcome {
            RowOutcome::Error => {
                for err in &row.errors {
                    println!("! {}", err);
                }
            }
            outcome => println!(
                "- row {} • {:?} • {}",
                row.row,
                outcome,
                row.reference.as_deref().unwrap_or("-")
            ),
        }
    }
    println!(
        "{} new, {} updated, {} rejected{}",
        report.totals.new,
        report.totals.update,
        report.totals.error,
        if report.dry_run { " (dry run)" } else { "" }
    );
    let created = &report.created;
    println!(
        "created {} parties, {} lookups, {} consoles, {} staff users",
        created.parties, created.lookups, created.consoles, created.staff_users
    );
}

fn write_output(
    out: Option<PathBuf>,
    default_name: &str,
    body: impl AsRef<[u8]>,
) -> Result<PathBuf> {
    let path = out.unwrap_or_else(|| PathBuf::from(default_name));
    fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

struct CliContext {
    db: Arc<db::DbPool>,
    services: AppServices,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config: AppConfig = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        let db = Arc::new(db_pool);

        let services = AppServices::new(
            db.clone(),
            Arc::new(SystemClock::new(config.business_offset())),
            Arc::new(NoopSmsGateway),
            None,
        );

        Ok(Self { db, services })
    }

    async fn shipment_by_reference(
        &self,
        reference: &str,
    ) -> Result<forwarder_api::entities::shipment::Model> {
        self.services
            .shipments
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| anyhow!("no shipment with reference '{}'", reference))
    }
}
