//! WhatsApp deep links, share links and the contact form.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MESSAGE: &str = "Olá! Gostaria de mais informações sobre os imóveis disponíveis.";
const SHARE_FALLBACK_DESCRIPTION: &str = "Confira este imóvel incrível!";

/// Percent-encoding matching `encodeURIComponent`, which leaves
/// `! ' ( ) *` alone on top of the RFC 3986 unreserved set.
pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}

/// `https://wa.me/<digits>?text=<message>`; punctuation in the number is dropped.
pub fn whatsapp_link(number: &str, message: &str) -> String {
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    format!("https://wa.me/{digits}?text={}", encode_component(message))
}

pub fn inquiry_message(titulo: &str) -> String {
    format!("Olá! Tenho interesse no imóvel \"{titulo}\". Gostaria de mais informações.")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareLinks {
    pub whatsapp: String,
    pub facebook: String,
}

pub fn share_links(title: &str, description: Option<&str>, url: &str) -> ShareLinks {
    let description = description
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(SHARE_FALLBACK_DESCRIPTION);
    let text = format!("{title}\n\n{description}\n\n{url}");
    ShareLinks {
        whatsapp: format!("https://wa.me/?text={}", encode_component(&text)),
        facebook: format!(
            "https://www.facebook.com/sharer/sharer.php?u={}",
            encode_component(url)
        ),
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\S+@\S+\.\S+").expect("static email pattern compiles"))
}

/// Visitor message sent from a listing page or the contact section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    pub nome: String,
    pub email: String,
    pub telefone: String,
    /// Left out of a submission, the message is the general inquiry.
    #[serde(default = "general_message")]
    pub mensagem: String,
}

fn general_message() -> String {
    DEFAULT_MESSAGE.to_string()
}

impl ContactForm {
    /// Blank form with the inquiry about `titulo` already typed in.
    pub fn for_listing(titulo: &str) -> Self {
        Self {
            mensagem: inquiry_message(titulo),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = BTreeMap::new();
        if self.nome.trim().is_empty() {
            errors.insert("nome", "Nome é obrigatório");
        }
        if self.email.trim().is_empty() {
            errors.insert("email", "Email é obrigatório");
        } else if !email_pattern().is_match(&self.email) {
            errors.insert("email", "Email inválido");
        }
        if self.telefone.trim().is_empty() {
            errors.insert("telefone", "Telefone é obrigatório");
        }
        if self.mensagem.trim().is_empty() {
            errors.insert("mensagem", "Mensagem é obrigatória");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FieldErrors(errors))
        }
    }

    pub fn whatsapp_message(&self) -> String {
        format!(
            "{}\n\nNome: {}\nEmail: {}\nTelefone: {}",
            self.mensagem.trim(),
            self.nome.trim(),
            self.email.trim(),
            self.telefone.trim()
        )
    }
}

/// Field name to message, in the form's language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(pub BTreeMap<&'static str, &'static str>);

impl FieldErrors {
    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.0.get(field).copied()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self
            .0
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        f.write_str(&joined.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_like_encode_uri_component() {
        assert_eq!(encode_component("Olá! (teste)*"), "Ol%C3%A1!%20(teste)*");
        assert_eq!(encode_component("a&b=c/d"), "a%26b%3Dc%2Fd");
    }

    #[test]
    fn whatsapp_link_keeps_only_digits() {
        assert_eq!(
            whatsapp_link("+55 (16) 99752-7532", "Oi"),
            "https://wa.me/5516997527532?text=Oi"
        );
    }

    #[test]
    fn inquiry_mentions_the_listing() {
        let link = whatsapp_link("5516997527532", &inquiry_message("Casa Azul"));
        assert!(link.starts_with("https://wa.me/5516997527532?text=Ol%C3%A1!%20Tenho"));
        assert!(link.contains("%22Casa%20Azul%22"));
    }

    #[test]
    fn share_links_fall_back_to_default_description() {
        let links = share_links("Casa", None, "https://site/imoveis/1");
        assert_eq!(
            links.whatsapp,
            "https://wa.me/?text=Casa%0A%0AConfira%20este%20im%C3%B3vel%20incr%C3%ADvel!%0A%0Ahttps%3A%2F%2Fsite%2Fimoveis%2F1"
        );
        assert_eq!(
            links.facebook,
            "https://www.facebook.com/sharer/sharer.php?u=https%3A%2F%2Fsite%2Fimoveis%2F1"
        );
    }

    #[test]
    fn validation_reports_every_field() {
        let errors = ContactForm::default().validate().expect_err("blank form");
        assert_eq!(errors.get("nome"), Some("Nome é obrigatório"));
        assert_eq!(errors.get("email"), Some("Email é obrigatório"));
        assert_eq!(errors.get("telefone"), Some("Telefone é obrigatório"));
        assert_eq!(errors.get("mensagem"), Some("Mensagem é obrigatória"));

        let form = ContactForm {
            email: "sem-arroba".to_string(),
            ..ContactForm::for_listing("Casa")
        };
        let errors = form.validate().expect_err("bad email");
        assert_eq!(errors.get("email"), Some("Email inválido"));
        assert_eq!(errors.get("mensagem"), None);
    }

    #[test]
    fn omitted_message_defaults_to_the_general_inquiry() {
        let form: ContactForm = serde_json::from_value(serde_json::json!({
            "nome": "Ana",
            "email": "ana@exemplo.com",
            "telefone": "16 99999-0000"
        }))
        .expect("form");
        form.validate().expect("valid form");
        assert!(form.whatsapp_message().starts_with(DEFAULT_MESSAGE));

        let blank: ContactForm =
            serde_json::from_value(serde_json::json!({ "mensagem": "  " })).expect("form");
        let errors = blank.validate().expect_err("blank message");
        assert_eq!(errors.get("mensagem"), Some("Mensagem é obrigatória"));
    }

    #[test]
    fn message_carries_sender_details() {
        let form = ContactForm {
            nome: "Ana".to_string(),
            email: "ana@exemplo.com".to_string(),
            telefone: "(16) 99999-0000".to_string(),
            mensagem: "Quero visitar".to_string(),
        };
        form.validate().expect("valid form");
        assert_eq!(
            form.whatsapp_message(),
            "Quero visitar\n\nNome: Ana\nEmail: ana@exemplo.com\nTelefone: (16) 99999-0000"
        );
    }
}
