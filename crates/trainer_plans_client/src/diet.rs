//! Value types shared by the diet detector, normalizer and recalculator.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Written to the variance field when the target or the total is zero.
pub const VARIANCE_NOT_COMPUTED: &str = "N/A";

pub(crate) const DAY_LABEL_KEY: &str = "dia";
pub(crate) const OPTION_LABEL_KEY: &str = "opcion";
pub(crate) const SUMMARY_TYPE_KEY: &str = "tipo";
pub(crate) const SUMMARY_TYPE_VALUE: &str = "Resumen";
pub(crate) const OPTION_MEALS_KEY: &str = "recetasSeleccionadas";
pub(crate) const TOTAL_KEY: &str = "kcalTotal";
pub(crate) const TARGET_KEY: &str = "kcalObjetivo";
pub(crate) const VARIANCE_KEY: &str = "desviacion";

static SLOT_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:comida|meal)_?(\d+)$").expect("slot key pattern is valid")
});

/// One meal inside a day or option.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct MealSlot {
    #[serde(rename = "nombre", alias = "name", default, deserialize_with = "deserialize_text")]
    pub name: String,
    #[serde(
        rename = "ingredientes",
        alias = "ingredients",
        default,
        deserialize_with = "deserialize_text"
    )]
    pub ingredients: String,
    #[serde(rename = "kcals", alias = "calories", default, deserialize_with = "deserialize_kcal")]
    pub kcals: u32,
    /// Comma separated food-group tags.
    #[serde(
        rename = "grupos",
        alias = "food_groups",
        default,
        deserialize_with = "deserialize_text"
    )]
    pub food_groups: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MealSlot {
    pub fn food_group_tags(&self) -> Vec<&str> {
        self.food_groups
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Aggregate metadata attached to option-format plans. Never a selectable entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct SummaryRecord {
    #[serde(
        rename = "histograma",
        default,
        deserialize_with = "deserialize_kept",
        skip_serializing_if = "Option::is_none"
    )]
    pub histogram: Option<Value>,
    #[serde(
        rename = "rangosOptimos",
        default,
        deserialize_with = "deserialize_kept",
        skip_serializing_if = "Option::is_none"
    )]
    pub optimal_ranges: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub(crate) fn is_summary(obj: &Map<String, Value>) -> bool {
    obj.get(SUMMARY_TYPE_KEY).and_then(Value::as_str) == Some(SUMMARY_TYPE_VALUE)
}

/// Numeric position of a meal slot key, e.g. `comida3` -> 3.
pub(crate) fn slot_position(key: &str) -> Option<u32> {
    SLOT_KEY
        .captures(key)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub(crate) fn is_slot_key(key: &str) -> bool {
    SLOT_KEY.is_match(key)
}

/// Mirrors the truthiness check the form layer applied before rendering a slot.
pub(crate) fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Coerce a calorie value to a non-negative integer.
///
/// Numbers are truncated, numeric strings are parsed (a trailing unit such as
/// `"384 kcal"` is ignored) and anything else becomes 0.
pub fn coerce_kcal(value: &Value) -> u32 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_leading_number(s),
        _ => 0.0,
    };
    if raw.is_finite() && raw > 0.0 {
        raw.trunc().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

fn parse_leading_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        return v;
    }
    let prefix: String = trimmed
        .chars()
        .enumerate()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && *c == '-'))
        .map(|(_, c)| c)
        .collect();
    prefix.parse().unwrap_or(0.0)
}

/// Render a scalar as display text; `null` becomes the empty string.
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_text(&value))
}

/// Like `Option<Value>`, but an explicit `null` stays `Some(Null)` so it is
/// written back.
fn deserialize_kept<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

pub(crate) fn deserialize_kcal<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_kcal(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerce_kcal_handles_inputs() {
        assert_eq!(coerce_kcal(&json!(384)), 384);
        assert_eq!(coerce_kcal(&json!(384.9)), 384);
        assert_eq!(coerce_kcal(&json!("407")), 407);
        assert_eq!(coerce_kcal(&json!(" 250 kcal")), 250);
        assert_eq!(coerce_kcal(&json!("abc")), 0);
        assert_eq!(coerce_kcal(&json!(-20)), 0);
        assert_eq!(coerce_kcal(&json!("-5")), 0);
        assert_eq!(coerce_kcal(&Value::Null), 0);
        assert_eq!(coerce_kcal(&json!({"x": 1})), 0);
    }

    #[test]
    fn meal_slot_reads_spanish_and_english_keys() {
        let es: MealSlot = serde_json::from_value(json!({
            "nombre": "Avena", "ingredientes": "avena, leche", "kcals": "320", "grupos": "cereales, lacteos"
        }))
        .expect("spanish slot");
        assert_eq!(es.kcals, 320);
        assert_eq!(es.food_group_tags(), vec!["cereales", "lacteos"]);

        let en: MealSlot = serde_json::from_value(json!({
            "name": "Oats", "ingredients": "oats", "calories": 300, "food_groups": "grains"
        }))
        .expect("english slot");
        assert_eq!(en.name, "Oats");
        assert_eq!(en.kcals, 300);
    }

    #[test]
    fn meal_slot_keeps_unknown_keys() {
        let slot: MealSlot = serde_json::from_value(json!({
            "nombre": "Pollo", "kcals": 500, "idReceta": 12
        }))
        .expect("slot");
        assert_eq!(slot.extra.get("idReceta"), Some(&json!(12)));
        let back = serde_json::to_value(&slot).expect("serialize");
        assert_eq!(back.get("idReceta"), Some(&json!(12)));
        assert_eq!(back.get("kcals"), Some(&json!(500)));
    }

    #[test]
    fn slot_keys_are_recognised() {
        assert_eq!(slot_position("comida1"), Some(1));
        assert_eq!(slot_position("meal_12"), Some(12));
        assert_eq!(slot_position("Comida3"), Some(3));
        assert!(!is_slot_key("kcalTotal"));
        assert!(!is_slot_key("comida"));
    }

    #[test]
    fn presence_follows_truthiness() {
        assert!(!is_present(&Value::Null));
        assert!(!is_present(&json!("")));
        assert!(!is_present(&json!(false)));
        assert!(!is_present(&json!(0)));
        assert!(is_present(&json!({})));
    }
}
