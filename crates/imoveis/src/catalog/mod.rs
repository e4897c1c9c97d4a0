//! Listing catalog: typed records, the normalization boundary for loose JSON,
//! search and pagination, storage and the REST routes.

pub mod domain;
pub mod format;
pub mod normalize;
pub mod pagination;
pub mod query;
pub mod repository;
pub mod router;
pub mod service;
mod text;

pub use domain::{
    tag_catalog, tag_info, Address, Features, Listing, ListingDraft, ListingId, ListingImage,
    ListingStatus, PropertyKind, Purpose, TagInfo, ValidationError,
};
pub use normalize::{draft_from_value, listing_from_value, NormalizeError};
pub use pagination::{page_window, Page, PageRequest, PageSlot};
pub use query::{CatalogFacets, CatalogParams, CatalogQuery, Filter, SortOrder};
pub use repository::{
    InMemoryListingRepository, JsonFileListingRepository, ListingRepository, RepositoryError,
};
pub use router::{catalog_router, CatalogState};
pub use service::{CatalogService, CatalogServiceError, ImportOutcome};
