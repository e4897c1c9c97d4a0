use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::text::{fold, tag_code};

/// Identifier of a listing. Legacy records carry Mongo ObjectIds or numeric
/// strings; new listings get a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub String);

impl ListingId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListingId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyKind {
    Casa,
    Apartamento,
    Terreno,
    Comercial,
    Rural,
    Sobrado,
    Kitnet,
    Chacara,
}

impl PropertyKind {
    pub const fn ordered() -> [Self; 8] {
        [
            Self::Casa,
            Self::Apartamento,
            Self::Terreno,
            Self::Comercial,
            Self::Rural,
            Self::Sobrado,
            Self::Kitnet,
            Self::Chacara,
        ]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Casa => "CASA",
            Self::Apartamento => "APARTAMENTO",
            Self::Terreno => "TERRENO",
            Self::Comercial => "COMERCIAL",
            Self::Rural => "RURAL",
            Self::Sobrado => "SOBRADO",
            Self::Kitnet => "KITNET",
            Self::Chacara => "CHACARA",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Casa => "Casa",
            Self::Apartamento => "Apartamento",
            Self::Terreno => "Terreno",
            Self::Comercial => "Comercial",
            Self::Rural => "Rural",
            Self::Sobrado => "Sobrado",
            Self::Kitnet => "Kitnet",
            Self::Chacara => "Chácara",
        }
    }

    /// Exact match on code or label, ignoring case and accents.
    pub fn parse(value: &str) -> Option<Self> {
        let folded = fold(value).replace(' ', "_");
        Self::ordered()
            .into_iter()
            .find(|kind| fold(kind.code()) == folded || fold(kind.label()) == folded)
    }

    /// Like [`PropertyKind::parse`], but also finds a kind mentioned inside
    /// free text such as "Apartamento - Venda".
    pub fn detect(value: &str) -> Option<Self> {
        Self::parse(value).or_else(|| {
            fold(value)
                .split(|c: char| !c.is_alphanumeric())
                .filter(|word| !word.is_empty())
                .find_map(Self::parse)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Purpose {
    Venda,
    Aluguel,
    VendaAluguel,
}

impl Purpose {
    pub const fn ordered() -> [Self; 3] {
        [Self::Venda, Self::Aluguel, Self::VendaAluguel]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Venda => "VENDA",
            Self::Aluguel => "ALUGUEL",
            Self::VendaAluguel => "VENDA_ALUGUEL",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Venda => "Venda",
            Self::Aluguel => "Aluguel",
            Self::VendaAluguel => "Venda/Aluguel",
        }
    }

    /// Recognises codes, labels and free text mentioning sale and/or rent.
    pub fn detect(value: &str) -> Option<Self> {
        let folded = fold(value);
        let sale = folded.contains("venda");
        let rent = folded.contains("aluguel") || folded.contains("locacao");
        match (sale, rent) {
            (true, true) => Some(Self::VendaAluguel),
            (true, false) => Some(Self::Venda),
            (false, true) => Some(Self::Aluguel),
            (false, false) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    #[default]
    Disponivel,
    Vendido,
    Alugado,
    Reservado,
}

impl ListingStatus {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Disponivel,
            Self::Vendido,
            Self::Alugado,
            Self::Reservado,
        ]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Disponivel => "DISPONIVEL",
            Self::Vendido => "VENDIDO",
            Self::Alugado => "ALUGADO",
            Self::Reservado => "RESERVADO",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Disponivel => "Disponível",
            Self::Vendido => "Vendido",
            Self::Alugado => "Alugado",
            Self::Reservado => "Reservado",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let folded = fold(value);
        Self::ordered()
            .into_iter()
            .find(|status| fold(status.code()) == folded || fold(status.label()) == folded)
    }
}

static KNOWN_TAGS: [(&str, &str, &str); 18] = [
    ("DESTAQUE", "Destaque", "⭐"),
    ("LANCAMENTO", "Lançamento", "🆕"),
    ("OPORTUNIDADE", "Oportunidade", "💰"),
    ("ACEITA_FINANCIAMENTO", "Aceita Financiamento", "🏦"),
    ("ACEITA_PERMUTA", "Aceita Permuta", "🔄"),
    ("PRONTO_MORAR", "Pronto p/ Morar", "✅"),
    ("NA_PLANTA", "Na Planta", "📐"),
    ("MOBILIADO", "Mobiliado", "🛋️"),
    ("PISCINA", "Piscina", "🏊"),
    ("AREA_GOURMET", "Área Gourmet", "🍖"),
    ("QUINTAL", "Quintal", "🌳"),
    ("GARAGEM_COBERTA", "Garagem Coberta", "🚗"),
    ("PROXIMO_METRO", "Próximo ao Metrô", "🚇"),
    ("CONDOMINIO_FECHADO", "Condomínio Fechado", "🏢"),
    ("VISTA_MAR", "Vista para o Mar", "🌊"),
    ("VISTA_MONTANHA", "Vista Montanha", "⛰️"),
    ("PET_FRIENDLY", "Pet Friendly", "🐾"),
    ("ENERGIA_SOLAR", "Energia Solar", "☀️"),
];

const FALLBACK_TAG_ICON: &str = "🏠";

/// Display metadata for a listing tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagInfo {
    pub value: String,
    pub label: String,
    pub icon: &'static str,
    pub known: bool,
}

pub fn tag_catalog() -> Vec<TagInfo> {
    KNOWN_TAGS
        .iter()
        .map(|(value, label, icon)| TagInfo {
            value: value.to_string(),
            label: label.to_string(),
            icon: *icon,
            known: true,
        })
        .collect()
}

/// Known tags resolve to their label and icon; anything else is shown as-is.
pub fn tag_info(value: &str) -> TagInfo {
    KNOWN_TAGS
        .iter()
        .find(|(code, _, _)| *code == value)
        .map(|(code, label, icon)| TagInfo {
            value: code.to_string(),
            label: label.to_string(),
            icon: *icon,
            known: true,
        })
        .unwrap_or_else(|| TagInfo {
            value: value.to_string(),
            label: value.to_string(),
            icon: FALLBACK_TAG_ICON,
            known: false,
        })
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estado: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bairro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logradouro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numero: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cep: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Features {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quartos: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banheiros: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub garagem: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_m2: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub legenda: String,
}

/// Editable part of a listing, as submitted by the admin panel or recovered
/// from a legacy payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListingDraft {
    pub titulo: String,
    #[serde(default)]
    pub descricao: String,
    #[serde(default)]
    pub preco: f64,
    #[serde(default)]
    pub tipo: Option<PropertyKind>,
    #[serde(default)]
    pub finalidade: Option<Purpose>,
    #[serde(default)]
    pub status: ListingStatus,
    #[serde(default)]
    pub endereco: Address,
    #[serde(default)]
    pub caracteristicas: Features,
    #[serde(default)]
    pub imagens: Vec<ListingImage>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ListingDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.titulo.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if !self.preco.is_finite() || self.preco < 0.0 {
            return Err(ValidationError::InvalidPrice);
        }
        if let Some(area) = self.caracteristicas.area_m2 {
            if !area.is_finite() || area < 0.0 {
                return Err(ValidationError::InvalidArea);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("titulo é obrigatório")]
    MissingTitle,
    #[error("preco deve ser um número maior ou igual a zero")]
    InvalidPrice,
    #[error("area_m2 deve ser um número maior ou igual a zero")]
    InvalidArea,
}

/// A published property listing (imóvel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub titulo: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub descricao: String,
    pub preco: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo: Option<PropertyKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalidade: Option<Purpose>,
    #[serde(default)]
    pub status: ListingStatus,
    #[serde(default)]
    pub endereco: Address,
    #[serde(default)]
    pub caracteristicas: Features,
    #[serde(default)]
    pub imagens: Vec<ListingImage>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn from_draft(id: ListingId, draft: ListingDraft, now: DateTime<Utc>) -> Self {
        let mut listing = Self {
            id,
            titulo: String::new(),
            descricao: String::new(),
            preco: 0.0,
            tipo: None,
            finalidade: None,
            status: ListingStatus::default(),
            endereco: Address::default(),
            caracteristicas: Features::default(),
            imagens: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        listing.apply(draft, now);
        listing
    }

    /// Replaces every editable field, keeping id and creation time.
    pub fn apply(&mut self, draft: ListingDraft, now: DateTime<Utc>) {
        self.titulo = draft.titulo.trim().to_string();
        self.descricao = draft.descricao;
        self.preco = draft.preco;
        self.tipo = draft.tipo;
        self.finalidade = draft.finalidade;
        self.status = draft.status;
        self.endereco = draft.endereco;
        self.caracteristicas = draft.caracteristicas;
        self.imagens = draft.imagens;
        self.tags = draft.tags;
        self.updated_at = now;
    }

    pub fn city(&self) -> Option<&str> {
        self.endereco.cidade.as_deref()
    }

    /// Area used for filtering and sorting; unknown area counts as zero.
    pub fn area_or_zero(&self) -> f64 {
        self.caracteristicas.area_m2.unwrap_or(0.0)
    }

    pub fn bedrooms_or_zero(&self) -> u32 {
        self.caracteristicas.quartos.unwrap_or(0)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag_code(tag);
        self.tags.iter().any(|own| tag_code(own) == wanted)
    }
}
