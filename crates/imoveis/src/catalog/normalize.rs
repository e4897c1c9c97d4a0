//! One boundary for the listing shapes the API has produced over time: flat
//! or nested address/feature fields, prices as numbers or Brazilian-formatted
//! strings, images as plain URLs or `{url, legenda}` objects.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::domain::{
    Address, Features, Listing, ListingDraft, ListingId, ListingImage, ListingStatus,
    PropertyKind, Purpose,
};
use super::text::{non_blank, tag_code};

pub const DEFAULT_TITLE: &str = "Imóvel";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("listing payload must be a JSON object")]
    NotAnObject,
    #[error("listing payload has no id (_id, id, uuid or slug)")]
    MissingId,
}

/// Numbers, or strings such as "250000", "1,5", "R$ 250.000,50", "1.500".
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|n| n.is_finite()),
        Value::String(raw) => parse_decimal(raw),
        _ => None,
    }
}

/// Counts (bedrooms, parking spots) truncate like `parseInt`.
pub fn coerce_count(value: &Value) -> Option<u32> {
    coerce_number(value)
        .filter(|n| *n >= 0.0)
        .map(|n| n.trunc() as u32)
}

fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = if cleaned.contains(',') && cleaned.contains('.') {
        cleaned.replace('.', "").replace(',', ".")
    } else if cleaned.contains(',') {
        cleaned.replace(',', ".")
    } else if is_thousands_grouped(&cleaned) {
        cleaned.replace('.', "")
    } else {
        cleaned
    };

    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn is_thousands_grouped(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    let mut groups = digits.split('.');
    let Some(head) = groups.next() else {
        return false;
    };
    let head_ok = (1..=3).contains(&head.len()) && head.chars().all(|c| c.is_ascii_digit());
    let mut tail_count = 0;
    for group in groups {
        if group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        tail_count += 1;
    }
    head_ok && tail_count > 0
}

/// Image search results pasted from Google point at `/imgres?imgurl=…`;
/// the real image is the `imgurl` parameter.
pub fn unwrap_google_imgres(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(parsed) = url::Url::parse(trimmed) {
        let is_google = parsed
            .host_str()
            .map(|host| host.contains("google."))
            .unwrap_or(false);
        if is_google && parsed.path().contains("/imgres") {
            if let Some((_, target)) = parsed.query_pairs().find(|(key, _)| key == "imgurl") {
                if !target.trim().is_empty() {
                    return target.trim().to_string();
                }
            }
        }
    }
    trimmed.to_string()
}

pub fn draft_from_value(value: &Value) -> Result<ListingDraft, NormalizeError> {
    let object = value.as_object().ok_or(NormalizeError::NotAnObject)?;

    let titulo = first_text(object, &["titulo", "nome", "title", "name"]).unwrap_or_default();
    let descricao = first_text(object, &["descricao", "description"]).unwrap_or_default();
    let preco = first_value(object, &["preco", "valor", "price"])
        .and_then(coerce_number)
        .unwrap_or(0.0);

    let kind_text = first_text(object, &["tipo", "categoria"]);
    let tipo = kind_text.as_deref().and_then(PropertyKind::detect);
    let finalidade = first_text(object, &["finalidade"])
        .as_deref()
        .and_then(Purpose::detect)
        .or_else(|| kind_text.as_deref().and_then(Purpose::detect));
    let status = first_text(object, &["status"])
        .as_deref()
        .and_then(ListingStatus::parse)
        .unwrap_or_default();

    Ok(ListingDraft {
        titulo,
        descricao,
        preco,
        tipo,
        finalidade,
        status,
        endereco: address(object),
        caracteristicas: features(object),
        imagens: images(object),
        tags: tags(object),
    })
}

/// Reads a stored or remote listing. Missing timestamps fall back to the epoch
/// so undated legacy records sort after dated ones.
pub fn listing_from_value(value: &Value) -> Result<Listing, NormalizeError> {
    let object = value.as_object().ok_or(NormalizeError::NotAnObject)?;
    let meta = RecordMeta::read(object);
    let id = meta.id.ok_or(NormalizeError::MissingId)?;
    let mut draft = draft_from_value(value)?;
    if draft.titulo.trim().is_empty() {
        draft.titulo = DEFAULT_TITLE.to_string();
    }

    let created_at = meta.created_at.unwrap_or_default();
    let mut listing = Listing::from_draft(id, draft, created_at);
    listing.updated_at = meta.updated_at.unwrap_or(created_at);
    Ok(listing)
}

/// Identity and timestamps carried by a stored record, when present.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RecordMeta {
    pub(crate) id: Option<ListingId>,
    pub(crate) created_at: Option<DateTime<Utc>>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl RecordMeta {
    pub(crate) fn read(object: &Map<String, Value>) -> Self {
        Self {
            id: listing_id(object),
            created_at: timestamp(object, &["createdAt", "created_at"]),
            updated_at: timestamp(object, &["updatedAt", "updated_at"]),
        }
    }
}

fn listing_id(object: &Map<String, Value>) -> Option<ListingId> {
    ["_id", "id", "uuid", "slug"]
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| match value {
            Value::String(raw) => non_blank(raw),
            Value::Number(number) => Some(number.to_string()),
            // Mongo extended JSON exports wrap ObjectIds as {"$oid": "..."}.
            Value::Object(inner) => inner.get("$oid").and_then(Value::as_str).and_then(non_blank),
            _ => None,
        })
        .map(ListingId)
}

fn first_value<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !is_absent(value))
}

fn first_text(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(text)
}

fn nested<'a>(object: &'a Map<String, Value>, parent: &str) -> Option<&'a Map<String, Value>> {
    object.get(parent).and_then(Value::as_object)
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(raw) => raw.trim().is_empty(),
        _ => false,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => non_blank(raw),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Nested field first, then the flat fallbacks.
fn nested_or_flat<'a>(
    object: &'a Map<String, Value>,
    parent: &str,
    nested_keys: &[&str],
    flat_keys: &[&str],
) -> Option<&'a Value> {
    nested(object, parent)
        .and_then(|inner| first_value(inner, nested_keys))
        .or_else(|| first_value(object, flat_keys))
}

fn address(object: &Map<String, Value>) -> Address {
    let field = |nested_keys: &[&str], flat_keys: &[&str]| {
        nested_or_flat(object, "endereco", nested_keys, flat_keys).and_then(text)
    };

    Address {
        cidade: field(&["cidade"], &["cidade", "localidade"]),
        estado: field(&["estado", "uf"], &["estado", "uf"]),
        bairro: field(&["bairro"], &["bairro"]),
        logradouro: field(&["logradouro", "rua"], &["logradouro", "rua"]),
        numero: field(&["numero"], &["numero"]),
        cep: field(&["cep"], &["cep"]),
    }
}

fn features(object: &Map<String, Value>) -> Features {
    let count = |nested_keys: &[&str], flat_keys: &[&str]| {
        nested_or_flat(object, "caracteristicas", nested_keys, flat_keys).and_then(coerce_count)
    };

    Features {
        quartos: count(&["quartos"], &["quartos"]),
        banheiros: count(&["banheiros"], &["banheiros"]),
        garagem: count(&["garagem", "vagas"], &["vagas", "garagem"]),
        area_m2: nested_or_flat(
            object,
            "caracteristicas",
            &["area_m2", "area"],
            &["area", "areaUtil", "m2", "area_m2"],
        )
        .and_then(coerce_number),
    }
}

fn images(object: &Map<String, Value>) -> Vec<ListingImage> {
    let entries = ["imagens", "fotos", "images"]
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(Value::as_array);

    let images: Vec<ListingImage> = match entries {
        Some(entries) => entries.iter().filter_map(image).collect(),
        None => first_text(object, &["imagem", "image"])
            .map(|url| ListingImage {
                url: unwrap_google_imgres(&url),
                legenda: String::new(),
            })
            .into_iter()
            .collect(),
    };

    images
        .into_iter()
        .filter(|image| !image.url.is_empty())
        .collect()
}

fn image(value: &Value) -> Option<ListingImage> {
    match value {
        Value::String(raw) => Some(ListingImage {
            url: unwrap_google_imgres(raw),
            legenda: String::new(),
        }),
        Value::Object(inner) => {
            let url = first_text(inner, &["url", "src"])?;
            Some(ListingImage {
                url: unwrap_google_imgres(&url),
                legenda: first_text(inner, &["legenda", "alt", "caption"]).unwrap_or_default(),
            })
        }
        _ => None,
    }
}

fn tags(object: &Map<String, Value>) -> Vec<String> {
    let raw: Vec<String> = match object.get("tags") {
        Some(Value::Array(entries)) => entries.iter().filter_map(text).collect(),
        Some(Value::String(joined)) => joined.split(',').filter_map(non_blank).collect(),
        _ => Vec::new(),
    };

    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw {
        let code = tag_code(&tag);
        if !tags.contains(&code) {
            tags.push(code);
        }
    }
    tags
}

fn timestamp(object: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    first_text(object, keys).and_then(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc))
    })
}
