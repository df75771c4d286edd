//! Flatten a detected diet document into one canonical list of entries.
//!
//! Daily entries keep their meal slots as flat `comidaN` keys; option entries
//! nest them under `recetasSeleccionadas`. That difference stops here: every
//! [`PlanEntry`] exposes the same fields, and [`NormalizedPlan::to_document`]
//! writes each entry back in the layout it was read from.

use serde_json::{Map, Value};

use crate::detect::{Detection, PlanDocument, PlanShape, detect_diet};
use crate::diet::{
    self, DAY_LABEL_KEY, MealSlot, OPTION_LABEL_KEY, OPTION_MEALS_KEY, SummaryRecord, TARGET_KEY,
    TOTAL_KEY, VARIANCE_KEY,
};
use crate::recalc::format_variance;

#[derive(Clone, Debug, PartialEq)]
pub struct MealEntry {
    /// Slot key as stored, e.g. `comida2`.
    pub key: String,
    pub slot: MealSlot,
    /// Set once the slot has been replaced; only edited slots are re-serialized.
    edited: bool,
}

/// A day (daily format) or an alternative menu (option format).
#[derive(Clone, Debug, PartialEq)]
pub struct PlanEntry {
    pub label: String,
    /// Present slots only, ordered by slot position.
    pub meals: Vec<MealEntry>,
    pub total_kcal: u32,
    pub target_kcal: u32,
    pub variance: String,
    /// The entry as stored. Written back verbatim unless the entry was edited.
    original: Map<String, Value>,
    recomputed: bool,
}

impl PlanEntry {
    pub fn meal(&self, key: &str) -> Option<&MealSlot> {
        self.meals.iter().find(|m| m.key == key).map(|m| &m.slot)
    }

    /// Swap in a new slot value. Returns `false` when `key` is not a present slot.
    pub(crate) fn replace_meal(&mut self, key: &str, slot: MealSlot) -> bool {
        match self.meals.iter_mut().find(|m| m.key == key) {
            Some(meal) => {
                meal.slot = slot;
                meal.edited = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn mark_recomputed(&mut self) {
        self.recomputed = true;
    }

    /// Sum of the calories of every present slot.
    pub fn meals_kcal(&self) -> u32 {
        self.meals
            .iter()
            .fold(0u32, |acc, m| acc.saturating_add(m.slot.kcals))
    }

    fn from_object(shape: PlanShape, index: usize, obj: &Map<String, Value>) -> Self {
        let label_key = match shape {
            PlanShape::Daily => DAY_LABEL_KEY,
            PlanShape::Options => OPTION_LABEL_KEY,
        };
        let label = obj
            .get(label_key)
            .map(diet::value_to_text)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| (index + 1).to_string());

        let mut meals = Vec::new();
        match shape {
            PlanShape::Daily => {
                for (key, value) in obj.iter().filter(|(k, _)| diet::is_slot_key(k)) {
                    collect_slot(key, value, &mut meals);
                }
            }
            PlanShape::Options => match obj.get(OPTION_MEALS_KEY) {
                Some(Value::Object(container)) => {
                    for (key, value) in container {
                        collect_slot(key, value, &mut meals);
                    }
                }
                Some(_) => {
                    tracing::warn!(label = %label, "option meals are not a mapping; ignored");
                }
                None => {}
            },
        }
        meals.sort_by(|a, b| slot_order(&a.key).cmp(&slot_order(&b.key)));

        let computed: u32 = meals
            .iter()
            .fold(0u32, |acc, m| acc.saturating_add(m.slot.kcals));
        let total_kcal = obj.get(TOTAL_KEY).map(diet::coerce_kcal).unwrap_or(computed);
        let target_kcal = obj.get(TARGET_KEY).map(diet::coerce_kcal).unwrap_or(0);
        let variance = obj
            .get(VARIANCE_KEY)
            .map(diet::value_to_text)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format_variance(total_kcal, target_kcal));

        Self {
            label,
            meals,
            total_kcal,
            target_kcal,
            variance,
            original: obj.clone(),
            recomputed: false,
        }
    }

    fn to_object(&self, shape: PlanShape) -> Result<Map<String, Value>, serde_json::Error> {
        let mut obj = self.original.clone();
        if !self.recomputed {
            return Ok(obj);
        }
        for meal in self.meals.iter().filter(|m| m.edited) {
            let value = serde_json::to_value(&meal.slot)?;
            match shape {
                PlanShape::Daily => {
                    obj.insert(meal.key.clone(), value);
                }
                PlanShape::Options => {
                    if let Some(Value::Object(slots)) = obj.get_mut(OPTION_MEALS_KEY) {
                        slots.insert(meal.key.clone(), value);
                    }
                }
            }
        }
        obj.insert(TOTAL_KEY.to_string(), self.total_kcal.into());
        obj.insert(VARIANCE_KEY.to_string(), self.variance.clone().into());
        Ok(obj)
    }
}

/// Falsy, non-object and unreadable slots are not shown; they stay in the
/// stored entry untouched.
fn collect_slot(key: &str, value: &Value, meals: &mut Vec<MealEntry>) {
    if !diet::is_present(value) || !value.is_object() {
        return;
    }
    match serde_json::from_value::<MealSlot>(value.clone()) {
        Ok(slot) => meals.push(MealEntry {
            key: key.to_string(),
            slot,
            edited: false,
        }),
        Err(e) => {
            tracing::warn!(slot = key, error = %e, "unreadable meal slot skipped");
        }
    }
}

fn slot_order(key: &str) -> (u32, &str) {
    (diet::slot_position(key).unwrap_or(u32::MAX), key)
}

/// The canonical in-memory form of a diet plan.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct NormalizedPlan {
    shape: Option<PlanShape>,
    pub entries: Vec<PlanEntry>,
    pub summary: Option<SummaryRecord>,
}

impl NormalizedPlan {
    pub fn from_document(document: &PlanDocument) -> Self {
        match document {
            PlanDocument::Empty => Self::default(),
            PlanDocument::Plan {
                shape,
                entries,
                summary,
            } => Self {
                shape: Some(*shape),
                entries: entries
                    .iter()
                    .enumerate()
                    .map(|(i, obj)| PlanEntry::from_object(*shape, i, obj))
                    .collect(),
                summary: summary.clone(),
            },
        }
    }

    /// Detect and normalize in one step. The second value carries the
    /// detection warning, if any.
    pub fn from_raw(raw: &Value) -> (Self, Option<String>) {
        let Detection { document, warning } = detect_diet(raw);
        (Self::from_document(&document), warning)
    }

    /// `None` for an empty plan.
    pub fn shape(&self) -> Option<PlanShape> {
        self.shape
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    pub fn entry(&self, label: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.label == label)
    }

    pub(crate) fn entry_index(&self, label: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.label == label)
    }

    pub(crate) fn entry_at_mut(&mut self, index: usize) -> Option<&mut PlanEntry> {
        self.entries.get_mut(index)
    }

    /// Which entry to show. Keeps `previous` when it still exists, otherwise
    /// falls back to the first entry.
    pub fn select<'a>(&'a self, previous: Option<&str>) -> Option<&'a str> {
        if let Some(prev) = previous
            && let Some(entry) = self.entry(prev)
        {
            return Some(entry.label.as_str());
        }
        self.entries.first().map(|e| e.label.as_str())
    }

    /// Serialize back to the stored layout. An empty plan becomes `[]`.
    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        let Some(shape) = self.shape else {
            return Ok(Value::Array(Vec::new()));
        };
        let mut items = Vec::with_capacity(self.entries.len() + 1);
        for entry in &self.entries {
            items.push(Value::Object(entry.to_object(shape)?));
        }
        if let Some(summary) = &self.summary {
            let mut value = serde_json::to_value(summary)?;
            if let Some(obj) = value.as_object_mut() {
                obj.insert(
                    diet::SUMMARY_TYPE_KEY.to_string(),
                    diet::SUMMARY_TYPE_VALUE.into(),
                );
            }
            items.push(value);
        }
        Ok(Value::Array(items))
    }
}
