use crate::commands::{
    run_admin_login, run_admin_logout, run_admin_remove, run_browse, run_export, run_migrate,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use imoveis::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "imoveis-api",
    about = "Serve and manage the imoveis listing catalog",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Download every listing from the API into a backup file
    Export(ExportArgs),
    /// Load a legacy backup into the local listing store
    Migrate(MigrateArgs),
    /// Search the remote catalog from the terminal
    Browse(BrowseArgs),
    /// Admin session and listing management against the API
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// Log in and remember the session token locally
    Login(AdminLoginArgs),
    /// Revoke the stored session token
    Logout,
    /// Delete a listing by id
    Remove(RemoveArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Serve listings from this JSON file instead of IMOVEIS_DATA_PATH
    #[arg(long)]
    pub(crate) data: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Destination file
    #[arg(long, short, default_value = imoveis::migration::BACKUP_FILE)]
    pub(crate) output: PathBuf,
    /// API base URL (defaults to IMOVEIS_API_BASE)
    #[arg(long)]
    pub(crate) api: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct MigrateArgs {
    /// Legacy backup to read
    #[arg(long, short, default_value = imoveis::migration::BACKUP_FILE)]
    pub(crate) input: PathBuf,
    /// Listing store to write into (defaults to IMOVEIS_DATA_PATH)
    #[arg(long)]
    pub(crate) data: Option<PathBuf>,
    /// Only report what would be imported
    #[arg(long)]
    pub(crate) dry_run: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct BrowseArgs {
    /// Free-text search over title, kind, city and neighbourhood
    #[arg(long, short)]
    pub(crate) query: Option<String>,
    /// Property kind, e.g. CASA or APARTAMENTO
    #[arg(long)]
    pub(crate) tipo: Option<String>,
    /// VENDA, ALUGUEL or VENDA_ALUGUEL
    #[arg(long)]
    pub(crate) finalidade: Option<String>,
    #[arg(long)]
    pub(crate) cidade: Option<String>,
    /// recent, price-asc, price-desc or area
    #[arg(long)]
    pub(crate) sort: Option<String>,
    #[arg(long, default_value_t = 1)]
    pub(crate) page: u32,
    #[arg(long, default_value_t = 12)]
    pub(crate) limit: u32,
    /// API base URL (defaults to IMOVEIS_API_BASE)
    #[arg(long)]
    pub(crate) api: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct AdminLoginArgs {
    #[arg(long)]
    pub(crate) email: String,
    #[arg(long)]
    pub(crate) password: String,
    /// API base URL (defaults to IMOVEIS_API_BASE)
    #[arg(long)]
    pub(crate) api: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct RemoveArgs {
    /// Listing id
    pub(crate) id: String,
    /// API base URL (defaults to IMOVEIS_API_BASE)
    #[arg(long)]
    pub(crate) api: Option<String>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Export(args) => run_export(args).await,
        Command::Migrate(args) => run_migrate(args),
        Command::Browse(args) => run_browse(args).await,
        Command::Admin { command } => match command {
            AdminCommand::Login(args) => run_admin_login(args).await,
            AdminCommand::Logout => run_admin_logout().await,
            AdminCommand::Remove(args) => run_admin_remove(args).await,
        },
    }
}
