//! Client for the external plan-generation webhooks.
//!
//! The webhook receives the trainer's form parameters and answers with a plan
//! document. Its answer is returned undecoded: it may be an array, a wrapped
//! object or a JSON string, and the detectors deal with all of those.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::{PlanError, PlanKind};

/// Parameters collected by the generation form, stored as `form_data`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct GenerationRequest {
    pub client_id: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl GenerationRequest {
    pub fn new(client_id: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            client_id: client_id.into(),
            params,
        }
    }

    /// Check the fields the webhook needs before any remote call is made.
    pub fn validate(&self, kind: PlanKind) -> Result<(), PlanError> {
        if self.client_id.trim().is_empty() {
            return Err(PlanError::Validation("client_id is required".into()));
        }
        let missing: Vec<&str> = kind
            .required_form_fields()
            .iter()
            .copied()
            .filter(|field| match self.params.get(*field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .collect();
        if !missing.is_empty() {
            return Err(PlanError::Validation(format!(
                "missing {kind} form fields: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// Request body: the form parameters plus `client_id`.
    pub fn to_payload(&self) -> Value {
        let mut body = self.params.clone();
        body.insert("client_id".into(), self.client_id.clone().into());
        Value::Object(body)
    }
}

#[async_trait]
pub trait PlanGenerator: Send + Sync + 'static {
    async fn generate(
        &self,
        kind: PlanKind,
        request: &GenerationRequest,
    ) -> Result<Value, PlanError>;
}

#[derive(Clone, Debug)]
pub struct WebhookPlanGenerator {
    diet_url: Option<String>,
    workout_url: Option<String>,
    client: reqwest::Client,
}

impl WebhookPlanGenerator {
    pub fn new(diet_url: Option<String>, workout_url: Option<String>) -> Self {
        Self {
            diet_url,
            workout_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.diet_webhook_url.clone(),
            config.workout_webhook_url.clone(),
        )
    }

    fn url_for(&self, kind: PlanKind) -> Result<&str, PlanError> {
        let url = match kind {
            PlanKind::Diet => self.diet_url.as_deref(),
            PlanKind::Workout => self.workout_url.as_deref(),
        };
        url.ok_or_else(|| PlanError::Config(format!("no {kind} generation webhook configured")))
    }
}

#[async_trait]
impl PlanGenerator for WebhookPlanGenerator {
    async fn generate(
        &self,
        kind: PlanKind,
        request: &GenerationRequest,
    ) -> Result<Value, PlanError> {
        request.validate(kind)?;
        let url = self.url_for(kind)?;
        tracing::debug!(%kind, client_id = %request.client_id, "calling generation webhook");
        let resp = self
            .client
            .post(url)
            .json(&request.to_payload())
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            let body_snippet: String = text.chars().take(256).collect();
            return Err(PlanError::Remote {
                status: status.as_u16(),
                body: body_snippet,
            });
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn validate_reports_missing_fields() {
        let req = GenerationRequest::new("c1", params(json!({"objetivo": "perder grasa", "kcalObjetivo": ""})));
        let err = req.validate(PlanKind::Diet).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
        let msg = err.to_string();
        assert!(msg.contains("kcalObjetivo"));
        assert!(msg.contains("comidasPorDia"));
    }

    #[test]
    fn validate_requires_client() {
        let req = GenerationRequest::new(" ", params(json!({"objetivo": "x", "nivel": "x", "diasPorSemana": 3})));
        assert!(req.validate(PlanKind::Workout).is_err());
    }

    #[test]
    fn payload_carries_client_id() {
        let req = GenerationRequest::new("c9", params(json!({"objetivo": "fuerza"})));
        let body = req.to_payload();
        assert_eq!(body.get("client_id"), Some(&json!("c9")));
        assert_eq!(body.get("objetivo"), Some(&json!("fuerza")));
    }

    #[test]
    fn missing_webhook_is_config_error() {
        let generator = WebhookPlanGenerator::new(None, None);
        assert_eq!(
            generator.url_for(PlanKind::Diet).unwrap_err().kind(),
            ErrorKind::Config
        );
    }
}
