use crate::cli::{AdminLoginArgs, BrowseArgs, ExportArgs, MigrateArgs, RemoveArgs};
use imoveis::catalog::format::{area_label, price_label};
use imoveis::catalog::{
    page_window, CatalogService, JsonFileListingRepository, Listing, ListingId, Page, PageRequest,
    PageSlot,
};
use imoveis::client::{ImoveisClient, ListParams, TokenStore};
use imoveis::config::{AppConfig, ConfigError};
use imoveis::error::AppError;
use imoveis::migration::{write_backup, ExportSummary, LegacyImporter};
use imoveis::telemetry;
use std::sync::Arc;
use tracing::{info, warn};

const EXPORT_PAGE_SIZE: u32 = PageRequest::MAX_LIMIT;

fn load_config() -> Result<AppConfig, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    Ok(config)
}

fn client(config: &AppConfig, api: Option<String>) -> Result<ImoveisClient, AppError> {
    let client = match api {
        Some(base) => ImoveisClient::new(&base)?,
        None => ImoveisClient::from_config(&config.client)?,
    };
    Ok(client)
}

fn authenticated_client(
    config: &AppConfig,
    api: Option<String>,
) -> Result<(ImoveisClient, TokenStore), AppError> {
    let store = TokenStore::new(config.client.token_path.clone());
    let token = store.load()?;
    if token.is_none() {
        warn!(path = %store.path().display(), "no stored admin token; request will be anonymous");
    }
    Ok((client(config, api)?.with_token(token), store))
}

pub(crate) async fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let client = client(&config, args.api)?;

    println!("Exportando imóveis de {}", client.base());
    let listings = client.fetch_all(EXPORT_PAGE_SIZE).await?;

    write_backup(&args.output, &listings)?;
    info!(count = listings.len(), path = %args.output.display(), "backup written");

    println!("Backup salvo em: {}", args.output.display());
    println!("{}", ExportSummary::from_listings(&listings));
    Ok(())
}

pub(crate) fn run_migrate(args: MigrateArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let report = LegacyImporter::from_path(&args.input)?;

    println!(
        "{} imóveis lidos de {} ({} com erro)",
        report.imported,
        args.input.display(),
        report.failed
    );
    for failure in &report.failures {
        println!("  #{}: {}", failure.index, failure.reason);
    }
    if args.dry_run {
        println!("{}", ExportSummary::from_listings(&report.listings));
        return Ok(());
    }

    let data_path = args
        .data
        .or(config.catalog.data_path)
        .ok_or(ConfigError::MissingDataPath)?;
    let repository = JsonFileListingRepository::open(&data_path)?;
    let service = CatalogService::new(Arc::new(repository));
    let outcome = service.import(report.listings)?;

    println!(
        "Migração concluída em {}: {} novos, {} já existentes",
        data_path.display(),
        outcome.inserted,
        outcome.skipped
    );
    Ok(())
}

pub(crate) async fn run_browse(args: BrowseArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let client = client(&config, args.api)?;
    let params = ListParams {
        page: Some(args.page),
        limit: Some(args.limit),
        busca: args.query,
        tipo: args.tipo,
        finalidade: args.finalidade,
        cidade: args.cidade,
        sort: args.sort,
    };
    let result = client.list(&params).await?;

    if result.items.is_empty() {
        println!("Nenhum imóvel encontrado");
        return Ok(());
    }
    for listing in &result.items {
        println!("{}", summary_line(listing));
    }

    let request = PageRequest::new(
        result.page.or(Some(args.page)),
        result.limit.or(Some(args.limit)),
    );
    let page = Page {
        data: result.items,
        total: result.total,
        page: request.page,
        limit: request.limit,
    };
    println!(
        "\n{} imóveis | página {}",
        page.total,
        pager_line(page.page, page.total_pages())
    );
    Ok(())
}

pub(crate) async fn run_admin_login(args: AdminLoginArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let client = client(&config, args.api)?;
    let reply = client.admin_login(&args.email, &args.password).await?;

    let store = TokenStore::new(config.client.token_path.clone());
    store.save(&reply.token)?;
    match reply.expires_at {
        Some(expires_at) => println!("Sessão válida até {}", expires_at.to_rfc3339()),
        None => println!("Sessão iniciada"),
    }
    Ok(())
}

pub(crate) async fn run_admin_logout() -> Result<(), AppError> {
    let config = load_config()?;
    let (client, store) = authenticated_client(&config, None)?;
    if let Err(err) = client.admin_logout().await {
        warn!(error = %err, "server-side logout failed; clearing local token anyway");
    }
    store.clear()?;
    println!("Sessão encerrada");
    Ok(())
}

pub(crate) async fn run_admin_remove(args: RemoveArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let (client, _) = authenticated_client(&config, args.api)?;
    let id = ListingId(args.id);
    client.remove(&id).await?;
    info!(%id, "listing removed");
    println!("Imóvel {id} removido");
    Ok(())
}

fn summary_line(listing: &Listing) -> String {
    let mut parts = vec![listing.titulo.clone()];
    if let Some(kind) = listing.tipo {
        parts.push(kind.label().to_string());
    }
    parts.push(price_label(listing.preco));
    if let Some(area) = area_label(listing.caracteristicas.area_m2) {
        parts.push(area);
    }
    if let Some(city) = listing.city() {
        parts.push(city.to_string());
    }
    format!("[{}] {}", listing.id, parts.join(" | "))
}

fn pager_line(current: u32, total_pages: u32) -> String {
    let slots = page_window(current, total_pages);
    if slots.is_empty() {
        return format!("{current}/{total_pages}");
    }
    slots
        .into_iter()
        .map(|slot| match slot {
            PageSlot::Page(page) if page == current => format!("[{page}]"),
            PageSlot::Page(page) => page.to_string(),
            PageSlot::Gap => "…".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
