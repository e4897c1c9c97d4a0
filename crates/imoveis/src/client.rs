//! HTTP client for the listing API, used by the CLI export/browse/admin
//! commands and by anything else that needs the remote catalog.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::catalog::{listing_from_value, Listing, ListingDraft, ListingId};
use crate::config::ClientConfig;
use crate::contact::encode_component;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{status} {reason}{}", body_suffix(.body))]
    Status {
        status: u16,
        reason: String,
        body: String,
    },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("token store I/O failed: {0}")]
    TokenStore(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(" – {body}")
    }
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Success bodies are JSON when they parse, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    fn into_json(self) -> Result<Value, ClientError> {
        match self {
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Text(text) => Err(ClientError::Decode(format!(
                "expected JSON, got {:?}",
                text.chars().take(80).collect::<String>()
            ))),
        }
    }
}

/// Optional filters for the list endpoint; absent values are left out of the
/// query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub busca: Option<String>,
    pub tipo: Option<String>,
    pub finalidade: Option<String>,
    pub cidade: Option<String>,
    pub sort: Option<String>,
}

impl ListParams {
    pub fn page(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        let texts = [
            ("q", &self.busca),
            ("tipo", &self.tipo),
            ("finalidade", &self.finalidade),
            ("cidade", &self.cidade),
            ("sort", &self.sort),
        ];
        for (key, value) in texts {
            if let Some(value) = value {
                pairs.push((key, value.clone()));
            }
        }
        pairs
    }
}

/// A page of listings as reported by whichever API version answered.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    pub items: Vec<Listing>,
    pub total: usize,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Entries that could not be read as listings.
    pub skipped: usize,
}

/// Session returned by the login endpoint. Older backends only send the token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginReply {
    pub token: String,
    #[serde(default, rename = "expiresAt")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Reads a list response: a bare array, `{items, total}` or `{data, total}`.
/// The total falls back to the number of entries.
pub fn parse_listing_page(body: Value) -> Result<ListingPage, ClientError> {
    let (entries, total, page, limit) = match body {
        Value::Array(entries) => (entries, None, None, None),
        Value::Object(mut map) => {
            let entries = match map.remove("items").or_else(|| map.remove("data")) {
                Some(Value::Array(entries)) => entries,
                _ => {
                    return Err(ClientError::Decode(
                        "list response has neither items nor data".to_string(),
                    ))
                }
            };
            let number = |key: &str| map.get(key).and_then(Value::as_u64);
            let total = number("total").and_then(|n| usize::try_from(n).ok());
            let page = number("page").and_then(|n| u32::try_from(n).ok());
            let limit = number("limit").and_then(|n| u32::try_from(n).ok());
            (entries, total, page, limit)
        }
        other => {
            return Err(ClientError::Decode(format!(
                "list response must be an array or object, got {other}"
            )))
        }
    };

    let count = entries.len();
    let mut items = Vec::with_capacity(count);
    let mut skipped = 0;
    for (index, entry) in entries.iter().enumerate() {
        match listing_from_value(entry) {
            Ok(listing) => items.push(listing),
            Err(err) => {
                skipped += 1;
                warn!(index, error = %err, "skipping unreadable listing");
            }
        }
    }

    Ok(ListingPage {
        items,
        total: total.unwrap_or(count),
        page,
        limit,
        skipped,
    })
}

/// Client for `/api/imoveis` and the admin endpoints.
#[derive(Debug, Clone)]
pub struct ImoveisClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl ImoveisClient {
    pub fn new(base: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("imoveis/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base: base.trim().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(&config.api_base)
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|token| !token.trim().is_empty());
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Joins `path` to the base with exactly one slash.
    pub fn url(&self, path: &str, query: &[(&str, String)]) -> String {
        let path = path.trim_start_matches('/');
        let mut url = format!("{}/{}", self.base, path);
        if !query.is_empty() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())))
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }
        url
    }

    pub async fn ping(&self) -> Result<String, ClientError> {
        match self.send(Method::GET, "/healthz", &[], None).await? {
            ResponseBody::Text(text) => Ok(text),
            ResponseBody::Json(value) => Ok(value.to_string()),
        }
    }

    pub async fn list(&self, params: &ListParams) -> Result<ListingPage, ClientError> {
        let body = self
            .send(Method::GET, "/api/imoveis", &params.pairs(), None)
            .await?;
        parse_listing_page(body.into_json()?)
    }

    /// Downloads the whole catalog `page_size` listings at a time.
    ///
    /// Paging continues until every listing the server reports in `total`
    /// was received or a page comes back empty. Ids seen on an earlier page
    /// are dropped, and a page with nothing new ends the walk, so servers
    /// that cap `limit` or ignore `page` still yield each listing once.
    pub async fn fetch_all(&self, page_size: u32) -> Result<Vec<Listing>, ClientError> {
        let mut listings: Vec<Listing> = Vec::new();
        let mut seen: HashSet<ListingId> = HashSet::new();
        let mut unreadable = 0;
        let mut page = 1;
        loop {
            let batch = self.list(&ListParams::page(page, page_size)).await?;
            if batch.items.is_empty() && batch.skipped == 0 {
                break;
            }
            unreadable += batch.skipped;

            let before = listings.len();
            for listing in batch.items {
                if seen.insert(listing.id.clone()) {
                    listings.push(listing);
                }
            }
            if listings.len() == before && batch.skipped == 0 {
                warn!(page, "page repeated earlier listings; stopping");
                break;
            }
            if listings.len() + unreadable >= batch.total {
                break;
            }
            page += 1;
        }
        debug!(count = listings.len(), unreadable, pages = page, "catalog downloaded");
        Ok(listings)
    }

    pub async fn get(&self, id: &ListingId) -> Result<Listing, ClientError> {
        let body = self.send(Method::GET, &listing_path(id), &[], None).await?;
        read_listing(body)
    }

    pub async fn create(&self, draft: &ListingDraft) -> Result<Listing, ClientError> {
        let payload = serde_json::to_value(draft)?;
        let body = self
            .send(Method::POST, "/api/imoveis", &[], Some(&payload))
            .await?;
        read_listing(body)
    }

    pub async fn update(
        &self,
        id: &ListingId,
        draft: &ListingDraft,
    ) -> Result<Listing, ClientError> {
        let payload = serde_json::to_value(draft)?;
        let body = self
            .send(Method::PUT, &listing_path(id), &[], Some(&payload))
            .await?;
        read_listing(body)
    }

    pub async fn remove(&self, id: &ListingId) -> Result<(), ClientError> {
        self.send(Method::DELETE, &listing_path(id), &[], None).await?;
        Ok(())
    }

    pub async fn admin_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginReply, ClientError> {
        let payload = json!({ "email": email, "password": password });
        let body = self
            .send(Method::POST, "/api/admin/login", &[], Some(&payload))
            .await?;
        serde_json::from_value(body.into_json()?)
            .map_err(|err| ClientError::Decode(format!("login response: {err}")))
    }

    pub async fn admin_logout(&self) -> Result<(), ClientError> {
        self.send(Method::POST, "/api/admin/logout", &[], None).await?;
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        payload: Option<&Value>,
    ) -> Result<ResponseBody, ClientError> {
        let url = self.url(path, query);
        debug!(%method, %url, "api request");

        let mut request = self.http.request(method, &url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body: text,
            });
        }

        Ok(match serde_json::from_str(&text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(text),
        })
    }
}

fn listing_path(id: &ListingId) -> String {
    format!("/api/imoveis/{}", encode_component(id.as_str()))
}

fn read_listing(body: ResponseBody) -> Result<Listing, ClientError> {
    listing_from_value(&body.into_json()?).map_err(|err| ClientError::Decode(err.to_string()))
}

/// Local file holding the admin token between CLI runs.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

const PRIMARY_KEY: &str = "admin_token";
const LEGACY_KEY: &str = "token";

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Prefers `admin_token`, then `token`; blank values count as absent.
    pub fn load(&self) -> Result<Option<String>, ClientError> {
        let entries = self.read()?;
        let token = [PRIMARY_KEY, LEGACY_KEY]
            .iter()
            .filter_map(|key| entries.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|token| !token.is_empty())
            .map(str::to_string);
        Ok(token)
    }

    pub fn save(&self, token: &str) -> Result<(), ClientError> {
        let mut entries = self.read()?;
        entries.insert(PRIMARY_KEY.to_string(), Value::String(token.to_string()));
        self.write(&entries)
    }

    /// Forgets both keys; the file is removed once nothing else is in it.
    pub fn clear(&self) -> Result<(), ClientError> {
        let mut entries = self.read()?;
        entries.remove(PRIMARY_KEY);
        entries.remove(LEGACY_KEY);
        if entries.is_empty() {
            match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            }
        } else {
            self.write(&entries)
        }
    }

    fn read(&self) -> Result<Map<String, Value>, ClientError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(ClientError::Decode(format!(
                "{} must hold a JSON object",
                self.path.display()
            ))),
        }
    }

    fn write(&self, entries: &Map<String, Value>) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(entries)?)?;
        Ok(())
    }
}
