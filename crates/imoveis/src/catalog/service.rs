use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{Listing, ListingDraft, ListingId, ValidationError};
use super::pagination::{Page, PageRequest};
use super::query::{CatalogFacets, CatalogQuery};
use super::repository::{ListingRepository, RepositoryError};

/// Catalog operations shared by the HTTP routes and the CLI.
pub struct CatalogService<R> {
    repository: Arc<R>,
}

impl<R> CatalogService<R>
where
    R: ListingRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn list(
        &self,
        query: &CatalogQuery,
        request: PageRequest,
    ) -> Result<Page<Listing>, CatalogServiceError> {
        let listings = self.repository.all()?;
        let matches = query.apply(&listings);
        Ok(Page::slice(matches, request).map(Listing::clone))
    }

    pub fn get(&self, id: &ListingId) -> Result<Listing, CatalogServiceError> {
        let listing = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(listing)
    }

    pub fn create(&self, draft: ListingDraft) -> Result<Listing, CatalogServiceError> {
        draft.validate()?;
        let listing = Listing::from_draft(ListingId::generate(), draft, Utc::now());
        let stored = self.repository.insert(listing)?;
        info!(id = %stored.id, titulo = %stored.titulo, "listing created");
        Ok(stored)
    }

    /// Replaces every editable field; id and `createdAt` are kept.
    pub fn update(
        &self,
        id: &ListingId,
        draft: ListingDraft,
    ) -> Result<Listing, CatalogServiceError> {
        draft.validate()?;
        let mut listing = self.get(id)?;
        listing.apply(draft, Utc::now());
        self.repository.update(listing.clone())?;
        info!(id = %listing.id, "listing updated");
        Ok(listing)
    }

    pub fn delete(&self, id: &ListingId) -> Result<(), CatalogServiceError> {
        let removed = self.repository.delete(id)?;
        info!(id = %removed.id, "listing deleted");
        Ok(())
    }

    pub fn facets(&self) -> Result<CatalogFacets, CatalogServiceError> {
        let listings = self.repository.all()?;
        Ok(CatalogFacets::from_listings(&listings))
    }

    /// Full catalog in insertion order, for exports.
    pub fn export(&self) -> Result<Vec<Listing>, CatalogServiceError> {
        Ok(self.repository.all()?)
    }

    /// Stores already-normalized listings, skipping ids that exist.
    pub fn import(&self, listings: Vec<Listing>) -> Result<ImportOutcome, CatalogServiceError> {
        let mut outcome = ImportOutcome::default();
        for listing in listings {
            match self.repository.insert(listing) {
                Ok(_) => outcome.inserted += 1,
                Err(RepositoryError::Conflict) => outcome.skipped += 1,
                Err(other) => return Err(other.into()),
            }
        }
        info!(
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            "listings imported"
        );
        Ok(outcome)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub inserted: usize,
    pub skipped: usize,
}

/// Error raised by the catalog service.
#[derive(Debug, thiserror::Error)]
pub enum CatalogServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
