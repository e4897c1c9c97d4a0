use imoveis::catalog::{
    InMemoryListingRepository, JsonFileListingRepository, Listing, ListingId, ListingRepository,
    RepositoryError,
};
use imoveis::config::CatalogConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Listing storage picked at startup from `IMOVEIS_DATA_PATH`.
#[derive(Debug)]
pub(crate) enum CatalogStore {
    Memory(InMemoryListingRepository),
    File(JsonFileListingRepository),
}

impl CatalogStore {
    pub(crate) fn open(config: &CatalogConfig) -> Result<Self, RepositoryError> {
        match &config.data_path {
            Some(path) => Ok(Self::File(JsonFileListingRepository::open(path)?)),
            None => Ok(Self::Memory(InMemoryListingRepository::new())),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Memory(_) => "memory".to_string(),
            Self::File(repository) => repository.path().display().to_string(),
        }
    }
}

impl ListingRepository for CatalogStore {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError> {
        match self {
            Self::Memory(repository) => repository.insert(listing),
            Self::File(repository) => repository.insert(listing),
        }
    }

    fn update(&self, listing: Listing) -> Result<(), RepositoryError> {
        match self {
            Self::Memory(repository) => repository.update(listing),
            Self::File(repository) => repository.update(listing),
        }
    }

    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        match self {
            Self::Memory(repository) => repository.fetch(id),
            Self::File(repository) => repository.fetch(id),
        }
    }

    fn delete(&self, id: &ListingId) -> Result<Listing, RepositoryError> {
        match self {
            Self::Memory(repository) => repository.delete(id),
            Self::File(repository) => repository.delete(id),
        }
    }

    fn all(&self) -> Result<Vec<Listing>, RepositoryError> {
        match self {
            Self::Memory(repository) => repository.all(),
            Self::File(repository) => repository.all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imoveis::catalog::ListingDraft;

    #[test]
    fn store_follows_the_configured_data_path() {
        let memory = CatalogStore::open(&CatalogConfig::default()).expect("memory store");
        assert_eq!(memory.describe(), "memory");

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("imoveis.json");
        let config = CatalogConfig {
            data_path: Some(path.clone()),
        };
        let store = CatalogStore::open(&config).expect("file store");
        let draft = ListingDraft {
            titulo: "Casa".to_string(),
            ..ListingDraft::default()
        };
        store
            .insert(Listing::from_draft(
                ListingId::from("1"),
                draft,
                chrono::Utc::now(),
            ))
            .expect("insert");
        assert!(path.exists());
        assert_eq!(store.all().expect("all").len(), 1);
    }
}
