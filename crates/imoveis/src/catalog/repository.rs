use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, warn};

use super::domain::{Listing, ListingId};
use super::normalize::listing_from_value;

/// Storage abstraction so the service module can be exercised in isolation.
pub trait ListingRepository: Send + Sync {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError>;
    fn update(&self, listing: Listing) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError>;
    fn delete(&self, id: &ListingId) -> Result<Listing, RepositoryError>;
    /// Every listing, in insertion order.
    fn all(&self) -> Result<Vec<Listing>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("listing already exists")]
    Conflict,
    #[error("listing not found")]
    NotFound,
    #[error("listing store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("listing store is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

fn lock(listings: &Mutex<Vec<Listing>>) -> Result<MutexGuard<'_, Vec<Listing>>, RepositoryError> {
    listings
        .lock()
        .map_err(|_| RepositoryError::Unavailable("listing store lock poisoned".to_string()))
}

fn position(listings: &[Listing], id: &ListingId) -> Option<usize> {
    listings.iter().position(|listing| &listing.id == id)
}

fn insert_into(listings: &mut Vec<Listing>, listing: Listing) -> Result<Listing, RepositoryError> {
    if position(listings, &listing.id).is_some() {
        return Err(RepositoryError::Conflict);
    }
    listings.push(listing.clone());
    Ok(listing)
}

fn replace_in(listings: &mut [Listing], listing: Listing) -> Result<(), RepositoryError> {
    let index = position(listings, &listing.id).ok_or(RepositoryError::NotFound)?;
    listings[index] = listing;
    Ok(())
}

fn remove_from(listings: &mut Vec<Listing>, id: &ListingId) -> Result<Listing, RepositoryError> {
    let index = position(listings, id).ok_or(RepositoryError::NotFound)?;
    Ok(listings.remove(index))
}

/// Process-local store; contents vanish on restart.
#[derive(Debug, Default)]
pub struct InMemoryListingRepository {
    listings: Mutex<Vec<Listing>>,
}

impl InMemoryListingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listings(listings: Vec<Listing>) -> Self {
        Self {
            listings: Mutex::new(listings),
        }
    }
}

impl ListingRepository for InMemoryListingRepository {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError> {
        insert_into(&mut *lock(&self.listings)?, listing)
    }

    fn update(&self, listing: Listing) -> Result<(), RepositoryError> {
        replace_in(&mut *lock(&self.listings)?, listing)
    }

    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        let listings = lock(&self.listings)?;
        Ok(position(&listings, id).map(|index| listings[index].clone()))
    }

    fn delete(&self, id: &ListingId) -> Result<Listing, RepositoryError> {
        remove_from(&mut *lock(&self.listings)?, id)
    }

    fn all(&self) -> Result<Vec<Listing>, RepositoryError> {
        Ok(lock(&self.listings)?.clone())
    }
}

/// Keeps the catalog in a JSON file, rewriting it after every change.
///
/// The file holds the same array `export` produces, so a backup can be
/// served directly. Entries in older shapes are normalized on load and
/// written back in the current shape on the next mutation.
#[derive(Debug)]
pub struct JsonFileListingRepository {
    path: PathBuf,
    listings: Mutex<Vec<Listing>>,
}

impl JsonFileListingRepository {
    /// Opens `path`, treating a missing file as an empty catalog.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let listings = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => parse_listings(&raw, &path)?,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), count = listings.len(), "listing store opened");

        Ok(Self {
            path,
            listings: Mutex::new(listings),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Vec<Listing>) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut guard = lock(&self.listings)?;
        let mut next = guard.clone();
        let outcome = change(&mut next)?;
        persist(&self.path, &next)?;
        *guard = next;
        Ok(outcome)
    }
}

impl ListingRepository for JsonFileListingRepository {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError> {
        self.mutate(|listings| insert_into(listings, listing))
    }

    fn update(&self, listing: Listing) -> Result<(), RepositoryError> {
        self.mutate(|listings| replace_in(listings, listing))
    }

    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        let listings = lock(&self.listings)?;
        Ok(position(&listings, id).map(|index| listings[index].clone()))
    }

    fn delete(&self, id: &ListingId) -> Result<Listing, RepositoryError> {
        self.mutate(|listings| remove_from(listings, id))
    }

    fn all(&self) -> Result<Vec<Listing>, RepositoryError> {
        Ok(lock(&self.listings)?.clone())
    }
}

/// Accepts a bare array or a `{"data": [...]}` envelope.
pub(crate) fn listing_entries(document: Value) -> Option<Vec<Value>> {
    match document {
        Value::Array(entries) => Some(entries),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(entries)) => Some(entries),
            _ => None,
        },
        _ => None,
    }
}

fn parse_listings(raw: &str, path: &Path) -> Result<Vec<Listing>, RepositoryError> {
    let document: Value = serde_json::from_str(raw)?;
    let entries = listing_entries(document).ok_or_else(|| {
        RepositoryError::Unavailable(format!(
            "{} does not contain a listing array",
            path.display()
        ))
    })?;

    let mut listings: Vec<Listing> = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match listing_from_value(entry) {
            Ok(listing) if position(&listings, &listing.id).is_some() => {
                warn!(index, id = %listing.id, "duplicate listing id skipped");
            }
            Ok(listing) => listings.push(listing),
            Err(err) => warn!(index, error = %err, "listing entry skipped"),
        }
    }
    Ok(listings)
}

fn persist(path: &Path, listings: &[Listing]) -> Result<(), RepositoryError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_vec_pretty(listings)?;
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);
    fs::write(&staging, body)?;
    fs::rename(&staging, path)?;
    Ok(())
}
