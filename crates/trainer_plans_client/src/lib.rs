//! Diet and workout plan handling for the trainer plans service.
//!
//! The crate covers three concerns:
//! - reading stored plan documents in any of their historical shapes
//!   ([`detect`], [`normalize`], [`workout`]),
//! - editing a single meal or exercise and recomputing derived totals
//!   ([`recalc`], [`workout::replace_exercise`]),
//! - talking to the external data service and the plan-generation webhook
//!   ([`PlanStore`], [`http_client`], [`generator`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub mod config;
pub mod detect;
pub mod diet;
pub mod generator;
pub mod http_client;
pub mod normalize;
pub mod recalc;
pub mod workout;

pub use detect::{Detection, PlanDocument, PlanShape, detect_diet};
pub use diet::{MealSlot, SummaryRecord, VARIANCE_NOT_COMPUTED};
pub use normalize::{MealEntry, NormalizedPlan, PlanEntry};
pub use recalc::{MealEdit, format_variance};
pub use workout::{DayWorkout, Exercise, WorkoutView};

/// Error classes surfaced to callers, independent of the transport detail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ParseFailure,
    ValidationFailure,
    RemoteFailure,
    Config,
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("could not parse plan document: {0}")]
    Parse(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("remote service returned {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

impl PlanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlanError::NotFound(_) => ErrorKind::NotFound,
            PlanError::Parse(_) | PlanError::Serialization(_) => ErrorKind::ParseFailure,
            PlanError::Validation(_) => ErrorKind::ValidationFailure,
            PlanError::Remote { .. } | PlanError::Http(_) => ErrorKind::RemoteFailure,
            PlanError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn from_status(status: u16, body: String) -> Self {
        match status {
            404 => PlanError::NotFound(body),
            400 | 422 => PlanError::Validation(body),
            _ => PlanError::Remote { status, body },
        }
    }
}

/// Which kind of plan a record holds. Each kind lives in its own table.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Diet,
    Workout,
}

impl PlanKind {
    pub fn table(self) -> &'static str {
        match self {
            PlanKind::Diet => "diets",
            PlanKind::Workout => "workouts",
        }
    }

    /// Column holding the plan document itself.
    pub fn payload_column(self) -> &'static str {
        match self {
            PlanKind::Diet => "diet_data",
            PlanKind::Workout => "workout_data",
        }
    }

    /// Form fields the generation webhook cannot work without.
    pub fn required_form_fields(self) -> &'static [&'static str] {
        match self {
            PlanKind::Diet => &["objetivo", "kcalObjetivo", "comidasPorDia"],
            PlanKind::Workout => &["objetivo", "nivel", "diasPorSemana"],
        }
    }
}

impl std::fmt::Display for PlanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanKind::Diet => f.write_str("diet"),
            PlanKind::Workout => f.write_str("workout"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClientRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub trainer_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub form_data: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, PartialEq, JsonSchema)]
pub struct NewClient {
    pub trainer_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    pub form_data: serde_json::Value,
}

impl NewClient {
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.trainer_id.trim().is_empty() {
            return Err(PlanError::Validation("trainer_id is required".into()));
        }
        if self.name.trim().is_empty() {
            return Err(PlanError::Validation("client name is required".into()));
        }
        Ok(())
    }
}

/// A stored diet or workout row. `payload` is read from `diet_data` or
/// `workout_data` depending on the table it came from.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlanRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub client_id: Option<String>,
    #[serde(deserialize_with = "deserialize_id")]
    pub trainer_id: String,
    #[serde(default, alias = "diet_data", alias = "workout_data")]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub form_data: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewPlanRecord {
    pub client_id: Option<String>,
    pub trainer_id: String,
    pub payload: serde_json::Value,
    pub form_data: serde_json::Value,
}

impl NewPlanRecord {
    /// Row body for an insert into `kind`'s table.
    pub fn to_row(&self, kind: PlanKind) -> serde_json::Value {
        let mut row = serde_json::Map::new();
        row.insert(
            "client_id".into(),
            self.client_id
                .clone()
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
        );
        row.insert("trainer_id".into(), self.trainer_id.clone().into());
        row.insert(kind.payload_column().into(), self.payload.clone());
        row.insert("form_data".into(), self.form_data.clone());
        serde_json::Value::Object(row)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Open,
    Resolved,
    #[serde(other)]
    Unknown,
}

/// A client's request that the trainer revise one of their plans.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChangeRequest {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub client_id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub trainer_id: String,
    pub plan_kind: PlanKind,
    #[serde(deserialize_with = "deserialize_id")]
    pub plan_id: String,
    pub message: String,
    pub status: RequestStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, PartialEq, JsonSchema)]
pub struct NewChangeRequest {
    pub client_id: String,
    pub trainer_id: String,
    pub plan_kind: PlanKind,
    pub plan_id: String,
    pub message: String,
    pub status: RequestStatus,
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    deserialize_opt_id(deserializer)?.ok_or_else(|| D::Error::custom("missing id"))
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// The external data service: per-table insert/select/update/delete keyed by
/// primary id and the `client_id` / `trainer_id` foreign keys.
///
/// Writes are last-write-wins; there is no version check and no transaction
/// spanning more than one call.
#[async_trait]
pub trait PlanStore: Send + Sync + 'static {
    async fn list_clients(&self, trainer_id: &str) -> Result<Vec<ClientRecord>, PlanError>;
    async fn get_client(&self, client_id: &str) -> Result<ClientRecord, PlanError>;
    async fn create_client(&self, client: &NewClient) -> Result<ClientRecord, PlanError>;
    async fn update_client(
        &self,
        client_id: &str,
        fields: &serde_json::Value,
    ) -> Result<ClientRecord, PlanError>;
    async fn delete_client(&self, client_id: &str) -> Result<(), PlanError>;

    async fn list_plans(
        &self,
        kind: PlanKind,
        client_id: &str,
    ) -> Result<Vec<PlanRecord>, PlanError>;
    async fn get_plan(&self, kind: PlanKind, plan_id: &str) -> Result<PlanRecord, PlanError>;
    async fn insert_plan(
        &self,
        kind: PlanKind,
        plan: &NewPlanRecord,
    ) -> Result<PlanRecord, PlanError>;
    /// Whole-document replace of the plan payload column.
    async fn replace_plan_payload(
        &self,
        kind: PlanKind,
        plan_id: &str,
        payload: &serde_json::Value,
    ) -> Result<PlanRecord, PlanError>;
    async fn delete_plan(&self, kind: PlanKind, plan_id: &str) -> Result<(), PlanError>;

    async fn create_change_request(
        &self,
        request: &NewChangeRequest,
    ) -> Result<ChangeRequest, PlanError>;
    async fn list_change_requests(
        &self,
        trainer_id: &str,
    ) -> Result<Vec<ChangeRequest>, PlanError>;
    async fn resolve_change_request(&self, request_id: &str) -> Result<ChangeRequest, PlanError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plan_record_reads_diet_data_column() {
        let row = json!({"id": 7, "client_id": "c1", "trainer_id": "t1", "diet_data": [{"dia": "Lunes"}]});
        let rec: PlanRecord = serde_json::from_value(row).expect("deserialize diet row");
        assert_eq!(rec.id, "7");
        assert_eq!(rec.client_id.as_deref(), Some("c1"));
        assert!(rec.payload.is_array());
    }

    #[test]
    fn plan_record_accepts_null_client() {
        let row = json!({"id": "w1", "client_id": null, "trainer_id": "t1", "workout_data": {"output": []}});
        let rec: PlanRecord = serde_json::from_value(row).expect("deserialize workout row");
        assert!(rec.client_id.is_none());
        assert!(rec.payload.get("output").is_some());
    }

    #[test]
    fn id_of_invalid_type_errors() {
        let row = json!({"id": {"nested": true}, "trainer_id": "t1", "name": "x"});
        let res: Result<ClientRecord, _> = serde_json::from_value(row);
        assert!(res.is_err());
    }

    #[test]
    fn new_plan_row_uses_kind_column() {
        let plan = NewPlanRecord {
            client_id: None,
            trainer_id: "t1".into(),
            payload: json!([]),
            form_data: json!({}),
        };
        let row = plan.to_row(PlanKind::Workout);
        assert!(row.get("workout_data").is_some());
        assert!(row.get("diet_data").is_none());
        assert_eq!(row.get("client_id"), Some(&serde_json::Value::Null));
    }

    #[test]
    fn status_codes_map_to_kinds() {
        assert_eq!(PlanError::from_status(404, String::new()).kind(), ErrorKind::NotFound);
        assert_eq!(
            PlanError::from_status(422, String::new()).kind(),
            ErrorKind::ValidationFailure
        );
        assert_eq!(
            PlanError::from_status(500, String::new()).kind(),
            ErrorKind::RemoteFailure
        );
    }

    #[test]
    fn unknown_request_status_maps_to_unknown() {
        let s: RequestStatus = serde_json::from_value(json!("archived")).expect("status");
        assert_eq!(s, RequestStatus::Unknown);
    }
}
