//! Classify a stored diet document into one of the known shapes.
//!
//! Stored documents come in two incompatible layouts: the current daily layout
//! (one entry per calendar day, carrying `dia`) and the legacy option layout
//! (alternative full-day menus carrying `opcion`, plus at most one summary
//! record marked `tipo == "Resumen"`). Detection is pure; the same input always
//! yields the same result.

use serde_json::{Map, Value};

use crate::diet::{self, DAY_LABEL_KEY, OPTION_LABEL_KEY, SummaryRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanShape {
    Daily,
    Options,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlanDocument {
    /// No plan data. A valid terminal state, not an error.
    Empty,
    Plan {
        shape: PlanShape,
        entries: Vec<Map<String, Value>>,
        summary: Option<SummaryRecord>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub document: PlanDocument,
    /// Set when the stored value was a string that failed to decode and an
    /// empty plan was substituted.
    pub warning: Option<String>,
}

impl Detection {
    fn empty() -> Self {
        Self {
            document: PlanDocument::Empty,
            warning: None,
        }
    }

    fn unreadable(message: String) -> Self {
        Self {
            document: PlanDocument::Empty,
            warning: Some(message),
        }
    }
}

pub fn detect_diet(raw: &Value) -> Detection {
    match raw {
        Value::String(text) if text.trim().is_empty() => Detection::empty(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed) => detect_diet(&parsed),
            Err(e) => {
                tracing::warn!(error = %e, "stored diet document is not valid JSON");
                Detection::unreadable(format!("stored diet could not be read: {e}"))
            }
        },
        Value::Array(items) => detect_sequence(items),
        Value::Object(_) => detect_sequence(std::slice::from_ref(raw)),
        _ => Detection::empty(),
    }
}

fn detect_sequence(items: &[Value]) -> Detection {
    let mut entries = Vec::new();
    let mut summary = None;
    for item in items {
        let Some(obj) = item.as_object() else {
            tracing::debug!("skipping non-object element in diet document");
            continue;
        };
        if diet::is_summary(obj) {
            if summary.is_some() {
                tracing::warn!("diet document carries more than one summary record; keeping the first");
                continue;
            }
            match serde_json::from_value::<SummaryRecord>(item.clone()) {
                Ok(s) => summary = Some(s),
                Err(e) => tracing::warn!(error = %e, "unreadable summary record dropped"),
            }
            continue;
        }
        entries.push(obj.clone());
    }

    let shape = match entries.first() {
        Some(first) if first.contains_key(DAY_LABEL_KEY) => PlanShape::Daily,
        Some(first) if first.contains_key(OPTION_LABEL_KEY) => PlanShape::Options,
        // A lone summary only ever accompanies option-format plans.
        None if summary.is_some() => PlanShape::Options,
        None => return Detection::empty(),
        Some(_) => {
            tracing::warn!("diet entries carry neither a day nor an option label");
            return Detection::empty();
        }
    };

    Detection {
        document: PlanDocument::Plan {
            shape,
            entries,
            summary,
        },
        warning: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shape_of(d: &Detection) -> Option<PlanShape> {
        match &d.document {
            PlanDocument::Plan { shape, .. } => Some(*shape),
            PlanDocument::Empty => None,
        }
    }

    #[test]
    fn daily_sequence_is_detected() {
        let d = detect_diet(&json!([{"dia": "Lunes"}, {"dia": "Martes"}]));
        assert_eq!(shape_of(&d), Some(PlanShape::Daily));
        assert!(d.warning.is_none());
    }

    #[test]
    fn option_sequence_segregates_summary() {
        let d = detect_diet(&json!([
            {"tipo": "Resumen", "histograma": {"1800-2000": 3}},
            {"opcion": 1, "recetasSeleccionadas": {}},
            {"opcion": 2, "recetasSeleccionadas": {}}
        ]));
        let PlanDocument::Plan { shape, entries, summary } = d.document else {
            panic!("expected plan");
        };
        assert_eq!(shape, PlanShape::Options);
        assert_eq!(entries.len(), 2);
        assert!(summary.is_some());
    }

    #[test]
    fn single_object_is_wrapped() {
        let d = detect_diet(&json!({"dia": "Lunes"}));
        let PlanDocument::Plan { entries, .. } = d.document else {
            panic!("expected plan");
        };
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn json_string_is_decoded() {
        let d = detect_diet(&json!("[{\"opcion\": \"A\"}]"));
        assert_eq!(shape_of(&d), Some(PlanShape::Options));
    }

    #[test]
    fn unparsable_string_yields_empty_with_warning() {
        let d = detect_diet(&json!("{not json"));
        assert_eq!(d.document, PlanDocument::Empty);
        assert!(d.warning.is_some());
    }

    #[test]
    fn null_and_blank_are_empty_without_warning() {
        for raw in [Value::Null, json!(""), json!([]), json!(42)] {
            let d = detect_diet(&raw);
            assert_eq!(d.document, PlanDocument::Empty);
            assert!(d.warning.is_none());
        }
    }

    #[test]
    fn detection_is_deterministic() {
        let raw = json!([{"opcion": 1}, {"tipo": "Resumen"}]);
        assert_eq!(detect_diet(&raw), detect_diet(&raw));
    }
}
