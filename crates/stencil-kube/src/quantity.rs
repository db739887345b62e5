//! Kubernetes resource quantities (`500m`, `128Mi`, `1.5`, `2e3`)

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::fmt;

static QUANTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+))(?:[eE]([+-]?[0-9]+)|(Ki|Mi|Gi|Ti|Pi|Ei|n|u|m|k|M|G|T|P|E))?$")
        .expect("quantity regex is valid")
});

/// A parsed quantity, kept with its original spelling
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    raw: String,
    value: f64,
}

impl Quantity {
    /// Parse the canonical string form
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = QUANTITY_RE.captures(raw.trim())?;
        let number: f64 = caps.get(1)?.as_str().parse().ok()?;

        let scale = if let Some(exp) = caps.get(2) {
            10f64.powi(exp.as_str().parse().ok()?)
        } else {
            caps.get(3).map(|s| suffix_scale(s.as_str())).unwrap_or(1.0)
        };

        Some(Self {
            raw: raw.trim().to_string(),
            value: number * scale,
        })
    }

    /// Parse a YAML value; bare numbers are valid quantities
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) => Self::parse(s),
            JsonValue::Number(n) => Self::parse(&n.to_string()),
            _ => None,
        }
    }

    /// Value in base units (cores, bytes)
    pub fn as_f64(&self) -> f64 {
        self.value
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn suffix_scale(suffix: &str) -> f64 {
    match suffix {
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024f64,
        "Mi" => 1024f64.powi(2),
        "Gi" => 1024f64.powi(3),
        "Ti" => 1024f64.powi(4),
        "Pi" => 1024f64.powi(5),
        "Ei" => 1024f64.powi(6),
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu() {
        assert_eq!(Quantity::parse("500m").unwrap().as_f64(), 0.5);
        assert_eq!(Quantity::parse("2").unwrap().as_f64(), 2.0);
        assert_eq!(Quantity::parse("0.25").unwrap().as_f64(), 0.25);
    }

    #[test]
    fn test_parse_memory() {
        assert_eq!(Quantity::parse("128Mi").unwrap().as_f64(), 134_217_728.0);
        assert_eq!(Quantity::parse("1G").unwrap().as_f64(), 1e9);
        assert_eq!(Quantity::parse("2e3").unwrap().as_f64(), 2000.0);
    }

    #[test]
    fn test_compare_mixed_units() {
        let request = Quantity::parse("1Gi").unwrap();
        let limit = Quantity::parse("1000Mi").unwrap();
        assert!(request.as_f64() > limit.as_f64());
    }

    #[test]
    fn test_reject_garbage() {
        assert!(Quantity::parse("lots").is_none());
        assert!(Quantity::parse("12 Mi").is_none());
        assert!(Quantity::parse("5mi").is_none());
        assert!(Quantity::parse("").is_none());
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            Quantity::from_json(&serde_json::json!(1)).unwrap().as_f64(),
            1.0
        );
        assert_eq!(
            Quantity::from_json(&serde_json::json!("100m")).unwrap().to_string(),
            "100m"
        );
        assert!(Quantity::from_json(&serde_json::json!(true)).is_none());
    }
}
