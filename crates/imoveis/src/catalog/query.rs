use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::domain::{Listing, ListingStatus, PropertyKind, Purpose};
use super::normalize::coerce_number;
use super::pagination::PageRequest;
use super::text::{fold, non_blank, tag_code};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "recent")]
    Recent,
    #[serde(rename = "price-asc")]
    PriceAsc,
    #[serde(rename = "price-desc")]
    PriceDesc,
    #[serde(rename = "area")]
    AreaDesc,
}

impl SortOrder {
    pub const fn ordered() -> [Self; 4] {
        [Self::Recent, Self::PriceAsc, Self::PriceDesc, Self::AreaDesc]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Recent => "recent",
            Self::PriceAsc => "price-asc",
            Self::PriceDesc => "price-desc",
            Self::AreaDesc => "area",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Recent => "Mais Recentes",
            Self::PriceAsc => "Menor Preço",
            Self::PriceDesc => "Maior Preço",
            Self::AreaDesc => "Maior Área",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "recent" | "recentes" => Some(Self::Recent),
            "price-asc" | "preco-asc" => Some(Self::PriceAsc),
            "price-desc" | "preco-desc" => Some(Self::PriceDesc),
            "area" | "area-desc" => Some(Self::AreaDesc),
            _ => None,
        }
    }

    fn sort(self, listings: &mut [&Listing]) {
        match self {
            Self::Recent => listings.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            Self::PriceAsc => listings.sort_by(|a, b| a.preco.total_cmp(&b.preco)),
            Self::PriceDesc => listings.sort_by(|a, b| b.preco.total_cmp(&a.preco)),
            Self::AreaDesc => {
                listings.sort_by(|a, b| b.area_or_zero().total_cmp(&a.area_or_zero()))
            }
        }
    }
}

/// Equality filter over an enum field. A value that could not be parsed
/// matches nothing rather than being silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter<T> {
    #[default]
    Any,
    Is(T),
    Unmatched,
}

impl<T: Copy> Filter<T> {
    fn from_text(raw: Option<&str>, parse: impl Fn(&str) -> Option<T>) -> Self {
        match raw.and_then(non_blank) {
            None => Self::Any,
            Some(text) => parse(&text).map(Self::Is).unwrap_or(Self::Unmatched),
        }
    }

    fn admits(&self, value: Option<T>, same: impl Fn(T, T) -> bool) -> bool {
        match self {
            Self::Any => true,
            Self::Is(wanted) => value.map(|actual| same(*wanted, actual)).unwrap_or(false),
            Self::Unmatched => false,
        }
    }
}

/// Search, filters and ordering applied over the catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogQuery {
    pub busca: Option<String>,
    pub tipo: Filter<PropertyKind>,
    pub finalidade: Filter<Purpose>,
    pub status: Filter<ListingStatus>,
    pub cidade: Option<String>,
    pub preco_min: Option<f64>,
    pub preco_max: Option<f64>,
    pub area_min: Option<f64>,
    pub area_max: Option<f64>,
    pub quartos_min: Option<u32>,
    pub tags: Vec<String>,
    pub sort: SortOrder,
}

impl CatalogQuery {
    pub fn search(term: &str) -> Self {
        Self {
            busca: non_blank(term),
            ..Self::default()
        }
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn is_filtered(&self) -> bool {
        let unfiltered = Self {
            sort: self.sort,
            ..Self::default()
        };
        *self != unfiltered
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        self.matches_search(listing)
            && self.tipo.admits(listing.tipo, |a, b| a == b)
            && self.finalidade.admits(listing.finalidade, purpose_covers)
            && self.status.admits(Some(listing.status), |a, b| a == b)
            && self.matches_city(listing)
            && self.preco_min.map_or(true, |min| listing.preco >= min)
            && self.preco_max.map_or(true, |max| listing.preco <= max)
            && self.area_min.map_or(true, |min| listing.area_or_zero() >= min)
            && self.area_max.map_or(true, |max| listing.area_or_zero() <= max)
            && self
                .quartos_min
                .map_or(true, |min| listing.bedrooms_or_zero() >= min)
            && self.tags.iter().all(|tag| listing.has_tag(tag))
    }

    /// Matching listings in display order.
    pub fn apply<'a>(&self, listings: &'a [Listing]) -> Vec<&'a Listing> {
        let mut matches: Vec<&Listing> = listings
            .iter()
            .filter(|listing| self.matches(listing))
            .collect();
        self.sort.sort(&mut matches);
        matches
    }

    fn matches_search(&self, listing: &Listing) -> bool {
        let Some(term) = self.busca.as_deref() else {
            return true;
        };
        let needle = fold(term);
        let haystacks = [
            Some(listing.titulo.as_str()),
            listing.tipo.map(PropertyKind::label),
            listing.endereco.cidade.as_deref(),
            listing.endereco.bairro.as_deref(),
        ];
        haystacks
            .into_iter()
            .flatten()
            .any(|field| fold(field).contains(&needle))
    }

    fn matches_city(&self, listing: &Listing) -> bool {
        match self.cidade.as_deref() {
            None => true,
            Some(wanted) => listing
                .city()
                .map(|city| fold(city) == fold(wanted))
                .unwrap_or(false),
        }
    }
}

/// A listing for sale and rent shows up under either purpose.
fn purpose_covers(wanted: Purpose, actual: Purpose) -> bool {
    wanted == actual || actual == Purpose::VendaAluguel
}

/// Query-string shape of the list endpoint. Everything arrives as text so
/// blank inputs (`precoMin=`) are ignored instead of rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogParams {
    pub q: Option<String>,
    pub busca: Option<String>,
    pub tipo: Option<String>,
    pub finalidade: Option<String>,
    pub cidade: Option<String>,
    pub preco_min: Option<String>,
    pub preco_max: Option<String>,
    pub area_min: Option<String>,
    pub area_max: Option<String>,
    pub quartos: Option<String>,
    pub tags: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl CatalogParams {
    pub fn query(&self) -> CatalogQuery {
        let number = |raw: &Option<String>| {
            raw.as_ref()
                .and_then(|text| coerce_number(&Value::String(text.clone())))
        };

        CatalogQuery {
            busca: self
                .q
                .as_deref()
                .and_then(non_blank)
                .or_else(|| self.busca.as_deref().and_then(non_blank)),
            tipo: Filter::from_text(self.tipo.as_deref(), PropertyKind::detect),
            finalidade: Filter::from_text(self.finalidade.as_deref(), Purpose::detect),
            status: Filter::from_text(self.status.as_deref(), ListingStatus::parse),
            cidade: self.cidade.as_deref().and_then(non_blank),
            preco_min: number(&self.preco_min),
            preco_max: number(&self.preco_max),
            area_min: number(&self.area_min),
            area_max: number(&self.area_max),
            quartos_min: number(&self.quartos)
                .filter(|n| *n >= 0.0)
                .map(|n| n.trunc() as u32),
            tags: self
                .tags
                .as_deref()
                .map(|joined| {
                    joined
                        .split(',')
                        .filter_map(non_blank)
                        .map(|tag| tag_code(&tag))
                        .collect()
                })
                .unwrap_or_default(),
            sort: self
                .sort
                .as_deref()
                .and_then(SortOrder::parse)
                .unwrap_or_default(),
        }
    }

    pub fn page_request(&self) -> PageRequest {
        let parse = |raw: &Option<String>| raw.as_deref().and_then(|text| text.trim().parse().ok());
        PageRequest::new(parse(&self.page), parse(&self.limit))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Filter options derived from the current catalog.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CatalogFacets {
    pub tipos: Vec<FacetOption>,
    pub cidades: Vec<String>,
    pub preco_min: Option<f64>,
    pub preco_max: Option<f64>,
}

impl CatalogFacets {
    pub fn from_listings<'a, I>(listings: I) -> Self
    where
        I: IntoIterator<Item = &'a Listing>,
    {
        let mut kinds = BTreeSet::new();
        let mut cities: BTreeMap<String, String> = BTreeMap::new();
        let mut preco_min: Option<f64> = None;
        let mut preco_max: Option<f64> = None;

        for listing in listings {
            if let Some(kind) = listing.tipo {
                kinds.insert(kind);
            }
            if let Some(city) = listing.city() {
                cities
                    .entry(fold(city))
                    .or_insert_with(|| city.trim().to_string());
            }
            if listing.preco > 0.0 {
                preco_min = Some(preco_min.map_or(listing.preco, |min| min.min(listing.preco)));
                preco_max = Some(preco_max.map_or(listing.preco, |max| max.max(listing.preco)));
            }
        }

        let mut kinds: Vec<PropertyKind> = kinds.into_iter().collect();
        kinds.sort_by_cached_key(|kind| fold(kind.label()));

        Self {
            tipos: kinds
                .into_iter()
                .map(|kind| FacetOption {
                    value: kind.code(),
                    label: kind.label(),
                })
                .collect(),
            cidades: cities.into_values().collect(),
            preco_min,
            preco_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::domain::{ListingDraft, ListingId};
    use crate::catalog::normalize::listing_from_value;
    use chrono::{Duration, TimeZone, Utc};

    fn listing(id: &str, titulo: &str, preco: f64, area: Option<f64>, days_ago: i64) -> Listing {
        let base = Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap();
        let mut draft = ListingDraft {
            titulo: titulo.to_string(),
            preco,
            ..ListingDraft::default()
        };
        draft.caracteristicas.area_m2 = area;
        Listing::from_draft(ListingId::from(id), draft, base - Duration::days(days_ago))
    }

    fn catalog() -> Vec<Listing> {
        let mut casa = listing("1", "Casa Moderna com Piscina", 850_000.0, Some(280.0), 3);
        casa.tipo = Some(PropertyKind::Casa);
        casa.finalidade = Some(Purpose::Venda);
        casa.endereco.cidade = Some("São Paulo".to_string());
        casa.endereco.bairro = Some("Vila Madalena".to_string());
        casa.caracteristicas.quartos = Some(4);
        casa.tags = vec!["PISCINA".to_string(), "DESTAQUE".to_string()];

        let mut apto = listing("2", "Apartamento Alto Padrão Centro", 1_200_000.0, Some(120.0), 1);
        apto.tipo = Some(PropertyKind::Apartamento);
        apto.finalidade = Some(Purpose::VendaAluguel);
        apto.endereco.cidade = Some("sao paulo".to_string());
        apto.caracteristicas.quartos = Some(3);

        let mut chacara = listing("3", "Chácara em Franca", 0.0, None, 10);
        chacara.tipo = Some(PropertyKind::Chacara);
        chacara.finalidade = Some(Purpose::Aluguel);
        chacara.endereco.cidade = Some("Franca".to_string());
        chacara.status = ListingStatus::Reservado;

        vec![casa, apto, chacara]
    }

    fn ids(listings: &[&Listing]) -> Vec<String> {
        listings.iter().map(|listing| listing.id.0.clone()).collect()
    }

    #[test]
    fn default_query_returns_newest_first() {
        let listings = catalog();
        let result = CatalogQuery::default().apply(&listings);
        assert_eq!(ids(&result), vec!["2", "1", "3"]);
    }

    #[test]
    fn search_ignores_case_and_accents_across_fields() {
        let listings = catalog();
        assert_eq!(ids(&CatalogQuery::search("PISCINA").apply(&listings)), vec!["1"]);
        assert_eq!(ids(&CatalogQuery::search("madalena").apply(&listings)), vec!["1"]);
        assert_eq!(ids(&CatalogQuery::search("chacara").apply(&listings)), vec!["3"]);
        assert_eq!(
            ids(&CatalogQuery::search("São Paulo").apply(&listings)),
            vec!["2", "1"]
        );
        assert!(CatalogQuery::search("cobertura").apply(&listings).is_empty());
        assert!(!CatalogQuery::search("   ").is_filtered());
    }

    #[test]
    fn bounds_are_inclusive_and_missing_values_count_as_zero() {
        let listings = catalog();
        let query = CatalogQuery {
            preco_max: Some(850_000.0),
            ..CatalogQuery::default()
        };
        assert_eq!(ids(&query.apply(&listings)), vec!["1", "3"]);

        let query = CatalogQuery {
            area_min: Some(120.0),
            area_max: Some(280.0),
            ..CatalogQuery::default()
        };
        assert_eq!(ids(&query.apply(&listings)), vec!["2", "1"]);

        let query = CatalogQuery {
            quartos_min: Some(4),
            ..CatalogQuery::default()
        };
        assert_eq!(ids(&query.apply(&listings)), vec!["1"]);
    }

    #[test]
    fn enum_filters_and_tags_are_conjunctive() {
        let listings = catalog();
        let params = CatalogParams {
            finalidade: Some("venda".to_string()),
            cidade: Some("SAO PAULO".to_string()),
            ..CatalogParams::default()
        };
        assert_eq!(ids(&params.query().apply(&listings)), vec!["2", "1"]);

        let params = CatalogParams {
            finalidade: Some("aluguel".to_string()),
            ..CatalogParams::default()
        };
        assert_eq!(ids(&params.query().apply(&listings)), vec!["2", "3"]);

        let params = CatalogParams {
            tags: Some("piscina, destaque".to_string()),
            tipo: Some("casa".to_string()),
            ..CatalogParams::default()
        };
        assert_eq!(ids(&params.query().apply(&listings)), vec!["1"]);

        let params = CatalogParams {
            status: Some("reservado".to_string()),
            ..CatalogParams::default()
        };
        assert_eq!(ids(&params.query().apply(&listings)), vec!["3"]);
    }

    #[test]
    fn tag_filter_matches_codes_built_from_free_text() {
        let payload = serde_json::json!({
            "id": "9",
            "titulo": "Casa com quintal",
            "tags": ["pet friendly", "Piscina"],
        });
        let tagged = listing_from_value(&payload).expect("listing");
        assert_eq!(tagged.tags, vec!["PET_FRIENDLY", "PISCINA"]);

        let listings = vec![tagged];
        let params = CatalogParams {
            tags: Some("pet friendly,piscina".to_string()),
            ..CatalogParams::default()
        };
        let query = params.query();
        assert_eq!(query.tags, vec!["PET_FRIENDLY", "PISCINA"]);
        assert_eq!(ids(&query.apply(&listings)), vec!["9"]);
        assert!(listings[0].has_tag("pet  friendly"));
    }

    #[test]
    fn unknown_enum_text_matches_nothing() {
        let listings = catalog();
        let params = CatalogParams {
            tipo: Some("galpão".to_string()),
            ..CatalogParams::default()
        };
        let query = params.query();
        assert_eq!(query.tipo, Filter::Unmatched);
        assert!(query.apply(&listings).is_empty());
    }

    #[test]
    fn sorts_are_stable_and_follow_requested_order() {
        let mut listings = catalog();
        listings.push(listing("4", "Sala comercial", 850_000.0, Some(40.0), 5));

        let by_price = CatalogQuery::default().with_sort(SortOrder::PriceAsc);
        assert_eq!(ids(&by_price.apply(&listings)), vec!["3", "1", "4", "2"]);

        let by_price_desc = CatalogQuery::default().with_sort(SortOrder::PriceDesc);
        assert_eq!(ids(&by_price_desc.apply(&listings)), vec!["2", "1", "4", "3"]);

        let by_area = CatalogQuery::default().with_sort(SortOrder::AreaDesc);
        assert_eq!(ids(&by_area.apply(&listings)), vec!["1", "2", "4", "3"]);
    }

    #[test]
    fn params_ignore_blank_values_and_parse_numbers() {
        let params = CatalogParams {
            q: Some("  ".to_string()),
            busca: Some("casa".to_string()),
            preco_min: Some("".to_string()),
            preco_max: Some("1.000.000".to_string()),
            quartos: Some("2".to_string()),
            sort: Some("price-desc".to_string()),
            page: Some("3".to_string()),
            limit: Some("abc".to_string()),
            ..CatalogParams::default()
        };
        let query = params.query();
        assert_eq!(query.busca.as_deref(), Some("casa"));
        assert_eq!(query.preco_min, None);
        assert_eq!(query.preco_max, Some(1_000_000.0));
        assert_eq!(query.quartos_min, Some(2));
        assert_eq!(query.sort, SortOrder::PriceDesc);

        let page = params.page_request();
        assert_eq!(page.page, 3);
        assert_eq!(page.limit, PageRequest::DEFAULT_LIMIT);
    }

    #[test]
    fn facets_deduplicate_cities_and_track_price_range() {
        let listings = catalog();
        let facets = CatalogFacets::from_listings(&listings);
        let kinds: Vec<&str> = facets.tipos.iter().map(|option| option.value).collect();
        assert_eq!(kinds, vec!["APARTAMENTO", "CASA", "CHACARA"]);
        assert_eq!(facets.cidades, vec!["Franca".to_string(), "São Paulo".to_string()]);
        assert_eq!(facets.preco_min, Some(850_000.0));
        assert_eq!(facets.preco_max, Some(1_200_000.0));
    }

    #[test]
    fn sort_order_round_trips_through_codes() {
        for order in SortOrder::ordered() {
            assert_eq!(SortOrder::parse(order.code()), Some(order));
        }
        assert_eq!(SortOrder::parse("aleatorio"), None);
    }
}
