//! Workout documents: reading the day list and replacing one exercise.
//!
//! The generation webhook wraps the routine in an `output` value, itself
//! sometimes wrapped in a one-element array or JSON-encoded as a string. The
//! day list is read from the `dias` key when present. Older documents have no
//! such key; for those the first non-empty array inside `output` is taken.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::PlanError;
use crate::diet::{deserialize_text, value_to_text};

/// Key holding the day list in current documents.
pub const DAY_LIST_KEY: &str = "dias";
const OUTPUT_KEY: &str = "output";

static DAY_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:nombre_?)?(?:d[ií]a|day)(?:\b|_)").expect("day label pattern is valid")
});

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Exercise {
    #[serde(rename = "ejercicio", alias = "name", default, deserialize_with = "deserialize_text")]
    pub name: String,
    #[serde(
        rename = "series_previas",
        alias = "prior_series",
        default,
        deserialize_with = "deserialize_text"
    )]
    pub prior_series: String,
    #[serde(rename = "descanso", alias = "rest", default, deserialize_with = "deserialize_text")]
    pub rest: String,
    #[serde(rename = "anotaciones", alias = "notes", default, deserialize_with = "deserialize_text")]
    pub notes: String,
    #[serde(
        rename = "primera_serie",
        alias = "first_set",
        default,
        deserialize_with = "deserialize_text"
    )]
    pub first_set: String,
    #[serde(
        rename = "segunda_serie",
        alias = "second_set",
        default,
        deserialize_with = "deserialize_text"
    )]
    pub second_set: String,
    #[serde(
        rename = "tercera_serie",
        alias = "third_set",
        default,
        deserialize_with = "deserialize_text"
    )]
    pub third_set: String,
    /// Reps in reserve.
    #[serde(rename = "rir", default, deserialize_with = "deserialize_text")]
    pub rir: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DayWorkout {
    pub day_name: String,
    pub exercises: Vec<Exercise>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct WorkoutView {
    pub days: Vec<DayWorkout>,
    /// Set when the stored document could not be decoded.
    pub warning: Option<String>,
}

/// Read a stored workout document. Unreadable documents give an empty view
/// with a warning rather than an error.
pub fn normalize_workout(raw: &Value) -> WorkoutView {
    let doc = match decode_document(raw) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(error = %e, "stored workout document is not valid JSON");
            return WorkoutView {
                days: Vec::new(),
                warning: Some(e.to_string()),
            };
        }
    };
    let Some(days) = day_list_pointer(&doc)
        .and_then(|p| doc.pointer(&p))
        .and_then(Value::as_array)
    else {
        return WorkoutView::default();
    };
    WorkoutView {
        days: days.iter().enumerate().map(|(i, d)| read_day(i, d)).collect(),
        warning: None,
    }
}

/// Replace the exercise at `[day_index][exercise_index]`, leaving everything
/// else untouched. Returns the updated document in decoded form.
pub fn replace_exercise(
    raw: &Value,
    day_index: usize,
    exercise_index: usize,
    exercise: &Exercise,
) -> Result<Value, PlanError> {
    let mut doc = decode_document(raw)?;
    let pointer = day_list_pointer(&doc)
        .ok_or_else(|| PlanError::NotFound("workout document has no day list".into()))?;
    let replacement = serde_json::to_value(exercise)?;

    let days = doc
        .pointer_mut(&pointer)
        .and_then(Value::as_array_mut)
        .ok_or_else(|| PlanError::NotFound("workout document has no day list".into()))?;
    let day_count = days.len();
    let day = days.get_mut(day_index).ok_or_else(|| {
        PlanError::NotFound(format!("day {day_index} out of range ({day_count} days)"))
    })?;
    let exercises = exercises_mut(day)
        .ok_or_else(|| PlanError::NotFound(format!("day {day_index} has no exercise list")))?;
    let exercise_count = exercises.len();
    let slot = exercises.get_mut(exercise_index).ok_or_else(|| {
        PlanError::NotFound(format!(
            "exercise {exercise_index} out of range ({exercise_count} exercises)"
        ))
    })?;
    *slot = replacement;
    tracing::debug!(day_index, exercise_index, "exercise replaced");
    Ok(doc)
}

/// Decode string-encoded layers so the document can be navigated.
fn decode_document(raw: &Value) -> Result<Value, PlanError> {
    let mut doc = match raw {
        Value::String(text) if text.trim().is_empty() => Value::Null,
        Value::String(text) => {
            serde_json::from_str(text).map_err(|e| PlanError::Parse(e.to_string()))?
        }
        other => other.clone(),
    };
    let output = match &mut doc {
        Value::Array(items) => items
            .first_mut()
            .and_then(Value::as_object_mut)
            .and_then(|o| o.get_mut(OUTPUT_KEY)),
        Value::Object(map) => map.get_mut(OUTPUT_KEY),
        _ => None,
    };
    if let Some(output) = output
        && let Some(text) = output.as_str()
    {
        let decoded = serde_json::from_str(text).map_err(|e| PlanError::Parse(e.to_string()))?;
        *output = decoded;
    }
    Ok(doc)
}

/// JSON pointer to the day list inside a decoded document.
fn day_list_pointer(doc: &Value) -> Option<String> {
    let (base, output) = match doc {
        Value::Array(items) => match items.first().and_then(|f| f.get(OUTPUT_KEY)) {
            Some(output) => (format!("/0/{OUTPUT_KEY}"), output),
            None => (String::new(), doc),
        },
        Value::Object(map) => match map.get(OUTPUT_KEY) {
            Some(output) => (format!("/{OUTPUT_KEY}"), output),
            None => (String::new(), doc),
        },
        _ => return None,
    };
    match output {
        Value::Array(_) => Some(base),
        Value::Object(map) => {
            if map
                .get(DAY_LIST_KEY)
                .and_then(Value::as_array)
                .is_some_and(|days| !days.is_empty())
            {
                return Some(format!("{base}/{DAY_LIST_KEY}"));
            }
            let mut candidates = map
                .iter()
                .filter(|(_, v)| v.as_array().is_some_and(|a| !a.is_empty()));
            let (key, _) = candidates.next()?;
            if candidates.next().is_some() {
                tracing::warn!(key = %key, "several array keys could hold the day list; using the first");
            }
            Some(format!("{base}/{}", escape_pointer(key)))
        }
        _ => None,
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn exercise_key(day: &Map<String, Value>) -> Option<&String> {
    day.iter().find(|(_, v)| v.is_array()).map(|(k, _)| k)
}

fn exercises_mut(day: &mut Value) -> Option<&mut Vec<Value>> {
    match day {
        Value::Array(items) => Some(items),
        Value::Object(map) => {
            let key = exercise_key(map)?.clone();
            map.get_mut(&key).and_then(Value::as_array_mut)
        }
        _ => None,
    }
}

fn read_day(index: usize, value: &Value) -> DayWorkout {
    let fallback = || format!("Día {}", index + 1);
    let (day_name, exercises) = match value {
        Value::Array(items) => (fallback(), items.as_slice()),
        Value::Object(map) => {
            let list_key = exercise_key(map);
            let named = map
                .iter()
                .find(|(k, v)| v.is_string() && DAY_LABEL.is_match(k))
                .map(|(_, v)| value_to_text(v));
            let name = named
                .or_else(|| list_key.filter(|k| DAY_LABEL.is_match(k)).cloned())
                .unwrap_or_else(fallback);
            let items = list_key
                .and_then(|k| map.get(k))
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            (name, items)
        }
        _ => (fallback(), &[][..]),
    };
    DayWorkout {
        day_name,
        exercises: exercises.iter().map(read_exercise).collect(),
    }
}

fn read_exercise(value: &Value) -> Exercise {
    if value.is_object()
        && let Ok(exercise) = serde_json::from_value::<Exercise>(value.clone())
    {
        return exercise;
    }
    // keep positions aligned with the stored array
    Exercise {
        name: value_to_text(value),
        ..Exercise::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    fn squat() -> Value {
        json!({
            "ejercicio": "Sentadilla", "series_previas": "2x10", "descanso": "90s",
            "anotaciones": "", "primera_serie": "8x80", "segunda_serie": "8x80",
            "tercera_serie": "6x85", "rir": 2
        })
    }

    fn legacy_doc() -> Value {
        json!([{ "output": {
            "rutina": [
                {"dia": "Lunes - Pierna", "ejercicios": [squat(), {"ejercicio": "Prensa"}]},
                {"Día 2 - Empuje": [{"ejercicio": "Press banca"}]}
            ],
            "notas": []
        }}])
    }

    #[test]
    fn legacy_document_uses_first_array_key() {
        let view = normalize_workout(&legacy_doc());
        assert_eq!(view.days.len(), 2);
        assert_eq!(view.days[0].day_name, "Lunes - Pierna");
        assert_eq!(view.days[0].exercises[0].rir, "2");
        assert_eq!(view.days[1].day_name, "Día 2 - Empuje");
        assert_eq!(view.days[1].exercises[0].name, "Press banca");
    }

    #[test]
    fn explicit_day_list_key_wins() {
        let doc = json!({"output": {
            "calentamiento": [{"ejercicio": "Movilidad"}],
            "dias": [{"dia": "Martes", "ejercicios": [squat()]}]
        }});
        let view = normalize_workout(&doc);
        assert_eq!(view.days.len(), 1);
        assert_eq!(view.days[0].day_name, "Martes");
    }

    #[test]
    fn empty_day_list_key_falls_back_to_filled_array() {
        let doc = json!({"output": {
            "dias": [],
            "rutina": [{"dia": "Jueves", "ejercicios": [squat()]}]
        }});
        let view = normalize_workout(&doc);
        assert_eq!(view.days.len(), 1);
        assert_eq!(view.days[0].day_name, "Jueves");

        let updated = replace_exercise(&doc, 0, 0, &Exercise::default()).expect("replace");
        assert_eq!(updated["output"]["dias"], json!([]));
        assert_eq!(updated["output"]["rutina"][0]["ejercicios"][0]["ejercicio"], json!(""));
    }

    #[test]
    fn string_encoded_output_is_decoded() {
        let inner = json!([{"dia": "Viernes", "ejercicios": [squat()]}]).to_string();
        let doc = json!({"output": inner});
        let view = normalize_workout(&doc);
        assert_eq!(view.days[0].day_name, "Viernes");
        assert!(view.warning.is_none());
    }

    #[test]
    fn unreadable_document_gives_warning() {
        let view = normalize_workout(&json!("{broken"));
        assert!(view.days.is_empty());
        assert!(view.warning.is_some());
    }

    #[test]
    fn unnamed_day_gets_positional_name() {
        let doc = json!({"output": [[{"ejercicio": "Remo"}]]});
        let view = normalize_workout(&doc);
        assert_eq!(view.days[0].day_name, "Día 1");
        assert_eq!(view.days[0].exercises[0].name, "Remo");
    }

    #[test]
    fn replace_exercise_touches_only_target() {
        let doc = legacy_doc();
        let new = Exercise {
            name: "Zancadas".into(),
            rir: "1".into(),
            ..Exercise::default()
        };
        let updated = replace_exercise(&doc, 0, 1, &new).expect("replace");
        assert_eq!(
            updated.pointer("/0/output/rutina/0/ejercicios/1/ejercicio"),
            Some(&json!("Zancadas"))
        );
        assert_eq!(
            updated.pointer("/0/output/rutina/0/ejercicios/0"),
            doc.pointer("/0/output/rutina/0/ejercicios/0")
        );
        assert_eq!(
            updated.pointer("/0/output/rutina/1"),
            doc.pointer("/0/output/rutina/1")
        );
    }

    #[test]
    fn replace_out_of_range_is_not_found() {
        let doc = legacy_doc();
        let ex = Exercise::default();
        assert_eq!(
            replace_exercise(&doc, 5, 0, &ex).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            replace_exercise(&doc, 1, 3, &ex).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn replace_without_day_list_is_not_found() {
        let doc = json!({"output": {"mensaje": "sin rutina", "vacio": []}});
        let err = replace_exercise(&doc, 0, 0, &Exercise::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
