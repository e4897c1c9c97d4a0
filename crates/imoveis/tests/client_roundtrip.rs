use std::collections::HashMap;
use std::sync::Arc;

use axum::{extract::Query, routing::get, Json, Router};
use chrono::{Duration, Utc};
use imoveis::admin::{AdminAuthenticator, AdminCredentials};
use imoveis::catalog::{
    catalog_router, CatalogService, CatalogState, InMemoryListingRepository, Listing,
    ListingDraft, ListingId, PropertyKind,
};
use imoveis::client::{ImoveisClient, ListParams, TokenStore};
use serde_json::{json, Value};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server runs");
    });
    format!("http://{addr}/")
}

async fn spawn_api() -> String {
    spawn_api_with(InMemoryListingRepository::new()).await
}

async fn spawn_api_with(repository: InMemoryListingRepository) -> String {
    let service = Arc::new(CatalogService::new(Arc::new(repository)));
    let credentials =
        AdminCredentials::new("admin@imoveis.test", "senha-segura").expect("hash password");
    let auth = Arc::new(AdminAuthenticator::new(Some(credentials), Duration::hours(1)));
    serve(catalog_router(CatalogState::new(service, auth))).await
}

/// A legacy list endpoint holding `count` listings that never returns more
/// than `cap` per page; with `ignore_page` it always answers the first page.
async fn spawn_legacy_api(count: usize, cap: usize, ignore_page: bool) -> String {
    let handler = move |Query(params): Query<HashMap<String, String>>| async move {
        let page: usize = params
            .get("page")
            .and_then(|raw| raw.parse().ok())
            .filter(|_| !ignore_page)
            .unwrap_or(1);
        let items: Vec<Value> = (1..=count)
            .skip((page - 1) * cap)
            .take(cap)
            .map(|n| json!({ "_id": n.to_string(), "titulo": format!("Imóvel {n}") }))
            .collect();
        Json(json!({ "items": items, "total": count }))
    };
    serve(Router::new().route("/api/imoveis", get(handler))).await
}

fn draft(titulo: &str, preco: f64) -> ListingDraft {
    let mut draft = ListingDraft {
        titulo: titulo.to_string(),
        preco,
        tipo: Some(PropertyKind::Apartamento),
        ..ListingDraft::default()
    };
    draft.endereco.cidade = Some("Franca".to_string());
    draft
}

#[tokio::test]
async fn fetch_all_walks_every_page() {
    let now = Utc::now();
    let listings = (1..=5)
        .map(|n| {
            let titulo = format!("Apartamento {n}");
            Listing::from_draft(ListingId(n.to_string()), draft(&titulo, 100_000.0), now)
        })
        .collect();
    let base = spawn_api_with(InMemoryListingRepository::with_listings(listings)).await;

    let client = ImoveisClient::new(&base).expect("client");
    let mut ids: Vec<String> = client
        .fetch_all(2)
        .await
        .expect("fetch all")
        .into_iter()
        .map(|listing| listing.id.0)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn fetch_all_keeps_paging_when_the_server_caps_the_limit() {
    let base = spawn_legacy_api(7, 3, false).await;
    let client = ImoveisClient::new(&base).expect("client");

    let listings = client.fetch_all(1000).await.expect("fetch all");
    let ids: Vec<&str> = listings.iter().map(|listing| listing.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6", "7"]);
}

#[tokio::test]
async fn fetch_all_stops_when_pages_repeat() {
    let base = spawn_legacy_api(7, 3, true).await;
    let client = ImoveisClient::new(&base).expect("client");

    let listings = client.fetch_all(1000).await.expect("fetch all");
    let ids: Vec<&str> = listings.iter().map(|listing| listing.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn client_drives_the_admin_lifecycle() {
    let base = spawn_api().await;
    let anonymous = ImoveisClient::new(&base).expect("client");
    assert_eq!(anonymous.ping().await.expect("healthz"), "ok");

    let denied = anonymous
        .create(&draft("Sem sessão", 1.0))
        .await
        .expect_err("anonymous create is rejected");
    assert_eq!(denied.status(), Some(401));

    let reply = anonymous
        .admin_login("admin@imoveis.test", "senha-segura")
        .await
        .expect("login");
    assert!(reply.expires_at.is_some());

    let dir = tempfile::tempdir().expect("tempdir");
    let store = TokenStore::new(dir.path().join("session.json"));
    store.save(&reply.token).expect("save token");
    let admin = ImoveisClient::new(&base)
        .expect("client")
        .with_token(store.load().expect("load token"));

    let created = admin
        .create(&draft("Apartamento 2 quartos", 320_000.0))
        .await
        .expect("create");
    admin
        .create(&draft("Cobertura duplex", 1_200_000.0))
        .await
        .expect("create second");

    let fetched = anonymous.get(&created.id).await.expect("get");
    assert_eq!(fetched.titulo, "Apartamento 2 quartos");

    let updated = admin
        .update(&created.id, &draft("Apartamento reformado", 340_000.0))
        .await
        .expect("update");
    assert_eq!(updated.preco, 340_000.0);
    assert_eq!(updated.created_at, created.created_at);

    let page = anonymous
        .list(&ListParams {
            sort: Some("price-desc".to_string()),
            ..ListParams::page(1, 10)
        })
        .await
        .expect("list");
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].titulo, "Cobertura duplex");

    let found = anonymous
        .list(&ListParams {
            busca: Some("reformado".to_string()),
            ..ListParams::default()
        })
        .await
        .expect("search");
    assert_eq!(found.items.len(), 1);

    admin.remove(&created.id).await.expect("remove");
    let missing = anonymous
        .get(&created.id)
        .await
        .expect_err("removed listing is gone");
    assert_eq!(missing.status(), Some(404));

    admin.admin_logout().await.expect("logout");
    store.clear().expect("clear token");
    assert_eq!(store.load().expect("load after clear"), None);

    let revoked = admin
        .remove(&ListingId::from("qualquer"))
        .await
        .expect_err("token no longer valid");
    assert_eq!(revoked.status(), Some(401));
}
