//! Moving the catalog between backends: reading a legacy backup with the
//! defaults the admin panel expects, and summarising an export.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::catalog::normalize::RecordMeta;
use crate::catalog::repository::listing_entries;
use crate::catalog::{draft_from_value, Listing, ListingId, PropertyKind, Purpose};

pub const BACKUP_FILE: &str = "backup-imoveis.json";
pub const MIGRATED_TITLE: &str = "Imóvel sem título";
pub const MIGRATED_CITY: &str = "Não informada";
pub const MIGRATED_STATE: &str = "SP";

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("could not read backup: {0}")]
    Io(#[from] std::io::Error),
    #[error("backup is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("backup must be a JSON array or an object with a data array")]
    NotAList,
}

/// Why a backup entry was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFailure {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub imported: usize,
    pub failed: usize,
    pub listings: Vec<Listing>,
    pub failures: Vec<MigrationFailure>,
}

impl MigrationReport {
    fn fail(&mut self, index: usize, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(index, reason = %reason, "backup entry not migrated");
        self.failed += 1;
        self.failures.push(MigrationFailure { index, reason });
    }
}

/// Reads legacy backups. Missing fields get the defaults below; records
/// without an id get a fresh one.
#[derive(Debug, Clone)]
pub struct LegacyImporter {
    now: DateTime<Utc>,
}

impl Default for LegacyImporter {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl LegacyImporter {
    /// `now` stamps records that carry no creation date.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<MigrationReport, MigrationError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader(reader: impl Read) -> Result<MigrationReport, MigrationError> {
        let document: Value = serde_json::from_reader(reader)?;
        Self::default().import(document)
    }

    pub fn import(&self, document: Value) -> Result<MigrationReport, MigrationError> {
        let entries = listing_entries(document).ok_or(MigrationError::NotAList)?;
        let mut report = MigrationReport::default();
        let mut seen: HashSet<ListingId> = HashSet::new();

        for (index, entry) in entries.iter().enumerate() {
            match self.convert(entry) {
                Ok(listing) if !seen.insert(listing.id.clone()) => {
                    report.fail(index, format!("duplicate id {}", listing.id));
                }
                Ok(listing) => {
                    report.imported += 1;
                    report.listings.push(listing);
                }
                Err(reason) => report.fail(index, reason),
            }
        }

        info!(
            imported = report.imported,
            failed = report.failed,
            "backup read"
        );
        Ok(report)
    }

    fn convert(&self, entry: &Value) -> Result<Listing, String> {
        let object = entry
            .as_object()
            .ok_or_else(|| "entry is not a JSON object".to_string())?;
        let mut draft = draft_from_value(entry).map_err(|err| err.to_string())?;

        if draft.titulo.trim().is_empty() {
            draft.titulo = MIGRATED_TITLE.to_string();
        }
        draft.tipo = draft.tipo.or(Some(PropertyKind::Casa));
        draft.finalidade = draft.finalidade.or(Some(Purpose::Venda));
        if draft.endereco.cidade.is_none() {
            draft.endereco.cidade = Some(MIGRATED_CITY.to_string());
        }
        if draft.endereco.estado.is_none() {
            draft.endereco.estado = Some(MIGRATED_STATE.to_string());
        }
        draft.validate().map_err(|err| err.to_string())?;

        let meta = RecordMeta::read(object);
        let created_at = meta.created_at.unwrap_or(self.now);
        let id = meta.id.unwrap_or_else(ListingId::generate);
        let mut listing = Listing::from_draft(id, draft, created_at);
        listing.updated_at = meta.updated_at.unwrap_or(created_at);
        Ok(listing)
    }
}

/// Writes `listings` as the pretty-printed array backups use.
pub fn write_backup(path: impl AsRef<Path>, listings: &[Listing]) -> Result<(), MigrationError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(listings)?)?;
    Ok(())
}

/// Totals printed after an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub total: usize,
    pub tipos: Vec<String>,
    pub cidades: Vec<String>,
}

impl ExportSummary {
    pub fn from_listings(listings: &[Listing]) -> Self {
        let mut tipos: Vec<String> = Vec::new();
        let mut cidades: Vec<String> = Vec::new();
        for listing in listings {
            if let Some(kind) = listing.tipo {
                push_distinct(&mut tipos, kind.code());
            }
            if let Some(city) = listing.city() {
                push_distinct(&mut cidades, city);
            }
        }
        Self {
            total: listings.len(),
            tipos,
            cidades,
        }
    }
}

fn push_distinct(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|existing| existing == value) {
        values.push(value.to_string());
    }
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total de imóveis: {}", self.total)?;
        writeln!(f, "Tipos: {}", self.tipos.join(", "))?;
        write!(f, "Cidades: {}", self.cidades.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ListingStatus;
    use chrono::TimeZone;
    use serde_json::json;

    fn importer() -> LegacyImporter {
        LegacyImporter::new(Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap())
    }

    #[test]
    fn fills_defaults_for_sparse_records() {
        let report = importer()
            .import(json!([{ "preco": "350000" }]))
            .expect("import");
        assert_eq!((report.imported, report.failed), (1, 0));

        let listing = &report.listings[0];
        assert_eq!(listing.titulo, "Imóvel sem título");
        assert_eq!(listing.tipo, Some(PropertyKind::Casa));
        assert_eq!(listing.finalidade, Some(Purpose::Venda));
        assert_eq!(listing.status, ListingStatus::Disponivel);
        assert_eq!(listing.city(), Some("Não informada"));
        assert_eq!(listing.endereco.estado.as_deref(), Some("SP"));
        assert!(listing.tags.is_empty());
        assert_eq!(listing.preco, 350_000.0);
        assert_eq!(listing.created_at, Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap());
        assert_eq!(listing.id.as_str().len(), 36);
    }

    #[test]
    fn keeps_what_the_record_already_says() {
        let report = importer()
            .import(json!({ "data": [{
                "_id": { "$oid": "64b7f0c2e1" },
                "titulo": "Apartamento no Centro",
                "tipo": "APARTAMENTO",
                "finalidade": "ALUGUEL",
                "endereco": { "cidade": "Franca", "estado": "MG" },
                "caracteristicas": { "quartos": "2", "area_m2": 70 },
                "imagens": [{ "url": "https://img/1.jpg" }, "https://img/2.jpg"],
                "createdAt": "2023-05-01T10:00:00Z"
            }]}))
            .expect("import");

        let listing = &report.listings[0];
        assert_eq!(listing.id.as_str(), "64b7f0c2e1");
        assert_eq!(listing.tipo, Some(PropertyKind::Apartamento));
        assert_eq!(listing.finalidade, Some(Purpose::Aluguel));
        assert_eq!(listing.endereco.estado.as_deref(), Some("MG"));
        assert_eq!(listing.caracteristicas.quartos, Some(2));
        assert_eq!(listing.imagens.len(), 2);
        assert_eq!(listing.created_at.to_rfc3339(), "2023-05-01T10:00:00+00:00");
        assert_eq!(listing.updated_at, listing.created_at);
    }

    #[test]
    fn counts_failures_without_aborting() {
        let report = importer()
            .import(json!([
                { "id": "1", "titulo": "Casa" },
                "texto solto",
                { "id": "1", "titulo": "Repetida" },
                { "id": "2", "titulo": "Preço negativo", "preco": -10 },
                { "id": "3", "titulo": "Sobrado" }
            ]))
            .expect("import");

        assert_eq!(report.imported, 2);
        assert_eq!(report.failed, 3);
        let indexes: Vec<usize> = report.failures.iter().map(|f| f.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
    }

    #[test]
    fn rejects_documents_without_a_list() {
        assert!(matches!(
            importer().import(json!({ "imoveis": [] })),
            Err(MigrationError::NotAList)
        ));
        assert!(matches!(
            LegacyImporter::from_reader("not json".as_bytes()),
            Err(MigrationError::Json(_))
        ));
    }

    #[test]
    fn reads_and_writes_backup_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(BACKUP_FILE);
        let report = importer()
            .import(json!([{ "id": "a", "titulo": "Casa", "cidade": "Franca" }]))
            .expect("import");
        write_backup(&path, &report.listings).expect("write");

        let reread = LegacyImporter::from_path(&path).expect("read back");
        assert_eq!(reread.listings, report.listings);
    }

    #[test]
    fn export_summary_lists_distinct_kinds_and_cities() {
        let report = importer()
            .import(json!([
                { "id": "1", "tipo": "CASA", "cidade": "Franca" },
                { "id": "2", "tipo": "TERRENO", "cidade": "Franca" },
                { "id": "3", "tipo": "CASA", "cidade": "Ribeirão Preto" }
            ]))
            .expect("import");
        let summary = ExportSummary::from_listings(&report.listings);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.tipos, vec!["CASA", "TERRENO"]);
        assert_eq!(summary.cidades, vec!["Franca", "Ribeirão Preto"]);
        assert_eq!(
            summary.to_string(),
            "Total de imóveis: 3\nTipos: CASA, TERRENO\nCidades: Franca, Ribeirão Preto"
        );
    }
}
