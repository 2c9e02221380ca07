use serde::{Deserialize, Serialize};

/// How numeric value labels are printed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ValueFormat {
    Plain {
        #[serde(default)]
        decimals: usize,
    },
    /// Fractions shown as percentages: `0.125` becomes `12.5%`.
    Percent {
        #[serde(default)]
        decimals: usize,
    },
    Currency {
        #[serde(default = "default_symbol")]
        symbol: String,
        #[serde(default = "default_currency_decimals")]
        decimals: usize,
    },
    /// Thousands, millions and billions as `K`, `M` and `B`.
    Compact {
        #[serde(default = "default_compact_decimals")]
        decimals: usize,
    },
}

fn default_symbol() -> String {
    "$".to_string()
}

fn default_currency_decimals() -> usize {
    2
}

fn default_compact_decimals() -> usize {
    1
}

impl Default for ValueFormat {
    fn default() -> Self {
        ValueFormat::Plain { decimals: 1 }
    }
}

impl ValueFormat {
    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() {
            return String::new();
        }
        match self {
            ValueFormat::Plain { decimals } => format!("{value:.decimals$}"),
            ValueFormat::Percent { decimals } => format!("{:.decimals$}%", value * 100.0),
            ValueFormat::Currency { symbol, decimals } => {
                let sign = if value < 0.0 { "-" } else { "" };
                format!("{sign}{symbol}{}", group_thousands(value.abs(), *decimals))
            }
            ValueFormat::Compact { decimals } => {
                let abs = value.abs();
                let (scaled, suffix) = if abs >= 1e9 {
                    (value / 1e9, "B")
                } else if abs >= 1e6 {
                    (value / 1e6, "M")
                } else if abs >= 1e3 {
                    (value / 1e3, "K")
                } else {
                    (value, "")
                };
                format!("{}{suffix}", trim_zeros(format!("{scaled:.decimals$}")))
            }
        }
    }
}

fn group_thousands(value: f64, decimals: usize) -> String {
    let fixed = format!("{value:.decimals$}");
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };
    let digits: Vec<char> = int_part.chars().collect();
    let mut out = String::with_capacity(fixed.len() + digits.len() / 3);
    for (idx, ch) in digits.iter().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(*ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

fn trim_zeros(text: String) -> String {
    if !text.contains('.') {
        return text;
    }
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_percent() {
        assert_eq!(ValueFormat::Plain { decimals: 2 }.format(3.14159), "3.14");
        assert_eq!(ValueFormat::Percent { decimals: 1 }.format(0.125), "12.5%");
    }

    #[test]
    fn currency_groups_thousands() {
        let f = ValueFormat::Currency {
            symbol: "$".to_string(),
            decimals: 2,
        };
        assert_eq!(f.format(1234567.891), "$1,234,567.89");
        assert_eq!(f.format(-950.0), "-$950.00");
        assert_eq!(f.format(100.0), "$100.00");
    }

    #[test]
    fn compact_suffixes() {
        let f = ValueFormat::Compact { decimals: 1 };
        assert_eq!(f.format(1500.0), "1.5K");
        assert_eq!(f.format(2_000_000.0), "2M");
        assert_eq!(f.format(3_260_000_000.0), "3.3B");
        assert_eq!(f.format(950.0), "950");
    }

    #[test]
    fn deserializes_tagged() {
        let f: ValueFormat = serde_json::from_str(r#"{"kind": "currency", "symbol": "€"}"#).unwrap();
        assert_eq!(
            f,
            ValueFormat::Currency {
                symbol: "€".to_string(),
                decimals: 2
            }
        );
    }
}
