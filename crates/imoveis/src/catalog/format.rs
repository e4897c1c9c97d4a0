//! Brazilian Portuguese labels for prices and areas.

pub const PRICE_UNAVAILABLE: &str = "Preço não informado";

/// `R$ 1.250.000,5`: dot thousands, comma decimals, at most three fraction
/// digits with trailing zeros dropped.
pub fn format_brl(value: f64) -> String {
    format!("R$ {}", format_decimal(value))
}

pub fn price_label(preco: f64) -> String {
    if preco == 0.0 || !preco.is_finite() {
        PRICE_UNAVAILABLE.to_string()
    } else {
        format_brl(preco)
    }
}

/// `None` when the area is unknown or zero.
pub fn area_label(area: Option<f64>) -> Option<String> {
    area.filter(|area| area.is_finite() && *area > 0.0)
        .map(|area| format!("{area} m²"))
}

/// Price per square metre, rounded to whole reais.
pub fn price_per_m2_label(preco: f64, area: Option<f64>) -> Option<String> {
    let area = area.filter(|area| area.is_finite() && *area > 0.0)?;
    if preco <= 0.0 || !preco.is_finite() {
        return None;
    }
    Some(format!("R$ {}/m²", (preco / area).round()))
}

fn format_decimal(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let rendered = format!("{:.3}", value.abs());
    let (whole, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && (whole != "0" || !fraction.is_empty()) {
        "-"
    } else {
        ""
    };
    if fraction.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped},{fraction}")
    }
}
