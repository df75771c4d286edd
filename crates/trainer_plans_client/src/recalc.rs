//! Single-meal edits and recomputation of the derived day fields.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::PlanError;
use crate::diet::{MealSlot, VARIANCE_NOT_COMPUTED, coerce_kcal};
use crate::normalize::{NormalizedPlan, PlanEntry};

/// Replacement content for one meal slot, as collected by the edit form.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MealEdit {
    pub name: String,
    pub ingredients: String,
    /// Raw calorie input. Coerced to a non-negative integer; anything
    /// non-numeric becomes 0.
    pub kcals: Value,
    /// Comma separated food-group tags.
    pub food_groups: String,
}

impl MealEdit {
    pub fn new(
        name: impl Into<String>,
        ingredients: impl Into<String>,
        kcals: impl Into<Value>,
        food_groups: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ingredients: ingredients.into(),
            kcals: kcals.into(),
            food_groups: food_groups.into(),
        }
    }

    fn into_slot(self) -> MealSlot {
        MealSlot {
            name: self.name,
            ingredients: self.ingredients,
            kcals: coerce_kcal(&self.kcals),
            food_groups: self.food_groups,
            extra: Map::new(),
        }
    }
}

/// `"{percent}% ({delta} kcal)"` where percent is rounded to one decimal.
///
/// Returns [`VARIANCE_NOT_COMPUTED`] when either side is zero.
pub fn format_variance(total: u32, target: u32) -> String {
    if total == 0 || target == 0 {
        return VARIANCE_NOT_COMPUTED.to_string();
    }
    let delta = i64::from(total) - i64::from(target);
    let percent = (delta as f64 / f64::from(target) * 100.0 * 10.0).round() / 10.0;
    // avoid printing "-0.0"
    let percent = if percent == 0.0 { 0.0 } else { percent };
    format!("{percent:.1}% ({delta} kcal)")
}

/// Recompute the total from the slots present now, then the variance.
pub fn recompute_totals(entry: &mut PlanEntry) {
    entry.mark_recomputed();
    entry.total_kcal = entry.meals_kcal();
    entry.variance = format_variance(entry.total_kcal, entry.target_kcal);
}

impl NormalizedPlan {
    /// Replace one meal slot and recompute its entry's derived fields.
    ///
    /// Returns a new plan; `self` is never modified, so a `NotFound` leaves the
    /// caller holding the untouched original.
    pub fn apply_meal_edit(
        &self,
        label: &str,
        slot_key: &str,
        edit: MealEdit,
    ) -> Result<NormalizedPlan, PlanError> {
        let index = self
            .entry_index(label)
            .ok_or_else(|| PlanError::NotFound(format!("no day or option labelled {label}")))?;
        if self.entries[index].meal(slot_key).is_none() {
            return Err(PlanError::NotFound(format!(
                "no meal {slot_key} in {label}"
            )));
        }

        let mut updated = self.clone();
        let entry = updated
            .entry_at_mut(index)
            .ok_or_else(|| PlanError::NotFound(format!("no day or option labelled {label}")))?;
        entry.replace_meal(slot_key, edit.into_slot());
        recompute_totals(entry);
        tracing::debug!(
            label,
            slot = slot_key,
            total = entry.total_kcal,
            variance = %entry.variance,
            "meal edited"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    fn monday() -> NormalizedPlan {
        let raw = json!([
            {
                "dia": "Lunes",
                "comida1": {"nombre": "Avena", "ingredientes": "avena", "kcals": 384, "grupos": "cereales"},
                "comida2": {"nombre": "Arroz", "ingredientes": "arroz", "kcals": 407, "grupos": "cereales"},
                "kcalObjetivo": 800
            },
            {
                "dia": "Martes",
                "comida1": {"nombre": "Huevos", "ingredientes": "huevo", "kcals": 300, "grupos": "proteinas"},
                "kcalObjetivo": 800
            }
        ]);
        NormalizedPlan::from_raw(&raw).0
    }

    #[test]
    fn variance_matches_reference_values() {
        assert_eq!(format_variance(2706, 2877), "-5.9% (-171 kcal)");
        assert_eq!(format_variance(807, 800), "0.9% (7 kcal)");
        assert_eq!(format_variance(800, 800), "0.0% (0 kcal)");
    }

    #[test]
    fn variance_sentinel_on_zero() {
        assert_eq!(format_variance(500, 0), VARIANCE_NOT_COMPUTED);
        assert_eq!(format_variance(0, 800), VARIANCE_NOT_COMPUTED);
    }

    #[test]
    fn edit_recomputes_total_and_variance() {
        let plan = monday();
        let edited = plan
            .apply_meal_edit("Lunes", "comida1", MealEdit::new("Avena", "avena, miel", 400, "cereales"))
            .expect("edit");
        let lunes = edited.entry("Lunes").expect("lunes");
        assert_eq!(lunes.total_kcal, 807);
        assert_eq!(lunes.variance, "0.9% (7 kcal)");
        assert_eq!(lunes.meal("comida1").expect("slot").ingredients, "avena, miel");
    }

    #[test]
    fn edit_leaves_other_slots_and_days_alone() {
        let plan = monday();
        let edited = plan
            .apply_meal_edit("Lunes", "comida1", MealEdit::new("X", "", 10, ""))
            .expect("edit");
        assert_eq!(
            edited.entry("Lunes").unwrap().meal("comida2"),
            plan.entry("Lunes").unwrap().meal("comida2")
        );
        assert_eq!(edited.entry("Martes"), plan.entry("Martes"));
    }

    #[test]
    fn non_numeric_calories_become_zero() {
        let plan = monday();
        let edited = plan
            .apply_meal_edit("Lunes", "comida2", MealEdit::new("Arroz", "arroz", "abc", "cereales"))
            .expect("edit");
        let lunes = edited.entry("Lunes").unwrap();
        assert_eq!(lunes.meal("comida2").unwrap().kcals, 0);
        assert_eq!(lunes.total_kcal, 384);
    }

    #[test]
    fn zeroing_every_slot_reports_sentinel() {
        let plan = monday();
        let edited = plan
            .apply_meal_edit("Martes", "comida1", MealEdit::new("Nada", "", 0, ""))
            .expect("edit");
        let martes = edited.entry("Martes").unwrap();
        assert_eq!(martes.total_kcal, 0);
        assert_eq!(martes.variance, VARIANCE_NOT_COMPUTED);
    }

    #[test]
    fn unknown_label_is_not_found_and_changes_nothing() {
        let plan = monday();
        let snapshot = plan.clone();
        let err = plan
            .apply_meal_edit("Domingo", "comida1", MealEdit::new("X", "", 1, ""))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(plan, snapshot);
    }

    #[test]
    fn unknown_slot_is_not_found() {
        let err = monday()
            .apply_meal_edit("Lunes", "comida9", MealEdit::new("X", "", 1, ""))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
