// src/common/lenient.rs

//! Deserializadores tolerantes para payloads que vêm de fontes pouco rígidas
//! (o front e, principalmente, os argumentos gerados pela LLM). Números chegam
//! como string, strings chegam como número, e `null` aparece em qualquer lugar.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Qualquer escalar vira texto aparado; vazio e `null` viram `None`.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| scalar_to_string(&v)))
}

/// Igual a `opt_string`, mas devolve "" quando ausente.
pub fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_string(deserializer)?.unwrap_or_default())
}

/// Inteiro vindo como número (inclusive 10.0) ou como texto ("10").
pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f.trunc() as i64),
        _ => None,
    })
}

/// Booleano "truthy": true, "true", 1, "1", "sim".
pub fn opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "" => None,
            "true" | "1" | "sim" | "yes" => Some(true),
            _ => Some(false),
        },
        _ => None,
    })
}

pub fn scalar_to_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "opt_string")]
        text: Option<String>,
        #[serde(default, deserialize_with = "opt_i64")]
        number: Option<i64>,
        #[serde(default, deserialize_with = "opt_bool")]
        flag: Option<bool>,
    }

    #[test]
    fn accepts_mixed_scalar_shapes() {
        let p: Probe = serde_json::from_value(json!({"text": 42, "number": "7", "flag": "true"})).unwrap();
        assert_eq!(p.text.as_deref(), Some("42"));
        assert_eq!(p.number, Some(7));
        assert_eq!(p.flag, Some(true));

        let p: Probe = serde_json::from_value(json!({"text": "  ", "number": 3.9, "flag": null})).unwrap();
        assert_eq!(p.text, None);
        assert_eq!(p.number, Some(3));
        assert_eq!(p.flag, None);

        let p: Probe = serde_json::from_value(json!({})).unwrap();
        assert!(p.text.is_none() && p.number.is_none() && p.flag.is_none());
    }
}
