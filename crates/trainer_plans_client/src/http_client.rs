//! HTTP client for the external data service.
//!
//! This module provides a reqwest-based implementation of the [`PlanStore`](crate::PlanStore)
//! trait against a PostgREST-style API: one path per table under `/rest/v1`,
//! `column=eq.value` filters, and `Prefer: return=representation` on writes.
//! Calls are never retried; a failure is returned to the caller as is.

use crate::config::Config;
use crate::{
    ChangeRequest, ClientRecord, NewChangeRequest, NewClient, NewPlanRecord, PlanError, PlanKind,
    PlanRecord, PlanStore, RequestStatus,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

const CLIENTS: &str = "clients";
const CHANGE_REQUESTS: &str = "change_requests";

#[derive(Clone, Debug)]
pub struct RestPlanStore {
    base_url: String,
    api_key: SecretString,
    access_token: Option<SecretString>,
    client: reqwest::Client,
}

impl RestPlanStore {
    /// Create a new store client.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the data service
    /// * `api_key` - Project key sent in the `apikey` header
    /// * `access_token` - Signed-in user's token; the api key is used as bearer when absent
    pub fn new(base_url: &str, api_key: SecretString, access_token: Option<SecretString>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            access_token,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.data_url,
            config.api_key.clone(),
            config.access_token.clone(),
        )
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let bearer = self
            .access_token
            .as_ref()
            .unwrap_or(&self.api_key)
            .expose_secret()
            .to_string();
        builder
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(bearer)
    }

    fn select(&self, table: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.get(self.table_url(table)))
            .query(&[("select", "*")])
    }

    fn insert(&self, table: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
    }

    fn update(&self, table: &str, id: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.patch(self.table_url(table)))
            .query(&[("id", eq(id))])
            .header("Prefer", "return=representation")
    }

    fn delete(&self, table: &str, id: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.delete(self.table_url(table)))
            .query(&[("id", eq(id))])
    }

    /// Execute a request and expect a JSON response.
    async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PlanError> {
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(self.error_from_response(resp).await);
        }
        // Read as text first so a shape mismatch reports the body.
        let text = resp.text().await?;
        serde_json::from_str::<T>(&text).map_err(|e| {
            let body_snippet: String = text.chars().take(512).collect();
            PlanError::Parse(format!("decoding response: {e} - body: {body_snippet}"))
        })
    }

    /// Execute a request with no expected response body.
    async fn execute_empty(&self, request: reqwest::RequestBuilder) -> Result<(), PlanError> {
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(self.error_from_response(resp).await);
        }
        Ok(())
    }

    /// Execute a request returning rows and keep exactly the first one.
    async fn execute_single<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, PlanError> {
        let rows: Vec<T> = self.execute_json(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| PlanError::NotFound(what.to_string()))
    }

    /// Extract error information from a failed response.
    async fn error_from_response(&self, resp: reqwest::Response) -> PlanError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let body_snippet: String = body.chars().take(256).collect();
        tracing::debug!(status, body = %body_snippet, "data service request failed");
        PlanError::from_status(status, body_snippet)
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl PlanStore for RestPlanStore {
    async fn list_clients(&self, trainer_id: &str) -> Result<Vec<ClientRecord>, PlanError> {
        tracing::debug!(table = CLIENTS, trainer_id, "listing clients");
        let req = self
            .select(CLIENTS)
            .query(&[("trainer_id", eq(trainer_id))])
            .query(&[("order", "created_at.desc")]);
        self.execute_json(req).await
    }

    async fn get_client(&self, client_id: &str) -> Result<ClientRecord, PlanError> {
        let req = self.select(CLIENTS).query(&[("id", eq(client_id))]);
        self.execute_single(req, &format!("client {client_id}"))
            .await
    }

    async fn create_client(&self, client: &NewClient) -> Result<ClientRecord, PlanError> {
        client.validate()?;
        tracing::debug!(table = CLIENTS, "inserting client");
        self.execute_single(self.insert(CLIENTS).json(client), "inserted client")
            .await
    }

    async fn update_client(
        &self,
        client_id: &str,
        fields: &serde_json::Value,
    ) -> Result<ClientRecord, PlanError> {
        self.execute_single(
            self.update(CLIENTS, client_id).json(fields),
            &format!("client {client_id}"),
        )
        .await
    }

    async fn delete_client(&self, client_id: &str) -> Result<(), PlanError> {
        self.execute_empty(self.delete(CLIENTS, client_id)).await
    }

    async fn list_plans(
        &self,
        kind: PlanKind,
        client_id: &str,
    ) -> Result<Vec<PlanRecord>, PlanError> {
        tracing::debug!(table = kind.table(), client_id, "listing plans");
        let req = self
            .select(kind.table())
            .query(&[("client_id", eq(client_id))])
            .query(&[("order", "created_at.desc")]);
        self.execute_json(req).await
    }

    async fn get_plan(&self, kind: PlanKind, plan_id: &str) -> Result<PlanRecord, PlanError> {
        let req = self.select(kind.table()).query(&[("id", eq(plan_id))]);
        self.execute_single(req, &format!("{kind} {plan_id}")).await
    }

    async fn insert_plan(
        &self,
        kind: PlanKind,
        plan: &NewPlanRecord,
    ) -> Result<PlanRecord, PlanError> {
        tracing::debug!(table = kind.table(), "inserting plan");
        self.execute_single(
            self.insert(kind.table()).json(&plan.to_row(kind)),
            &format!("inserted {kind}"),
        )
        .await
    }

    async fn replace_plan_payload(
        &self,
        kind: PlanKind,
        plan_id: &str,
        payload: &serde_json::Value,
    ) -> Result<PlanRecord, PlanError> {
        tracing::debug!(table = kind.table(), plan_id, "replacing plan document");
        let mut body = serde_json::Map::new();
        body.insert(kind.payload_column().to_string(), payload.clone());
        self.execute_single(
            self.update(kind.table(), plan_id).json(&body),
            &format!("{kind} {plan_id}"),
        )
        .await
    }

    async fn delete_plan(&self, kind: PlanKind, plan_id: &str) -> Result<(), PlanError> {
        self.execute_empty(self.delete(kind.table(), plan_id)).await
    }

    async fn create_change_request(
        &self,
        request: &NewChangeRequest,
    ) -> Result<ChangeRequest, PlanError> {
        if request.message.trim().is_empty() {
            return Err(PlanError::Validation("change request message is empty".into()));
        }
        self.execute_single(
            self.insert(CHANGE_REQUESTS).json(request),
            "inserted change request",
        )
        .await
    }

    async fn list_change_requests(
        &self,
        trainer_id: &str,
    ) -> Result<Vec<ChangeRequest>, PlanError> {
        let req = self
            .select(CHANGE_REQUESTS)
            .query(&[("trainer_id", eq(trainer_id))])
            .query(&[("order", "created_at.desc")]);
        self.execute_json(req).await
    }

    async fn resolve_change_request(&self, request_id: &str) -> Result<ChangeRequest, PlanError> {
        let body = serde_json::json!({ "status": RequestStatus::Resolved });
        self.execute_single(
            self.update(CHANGE_REQUESTS, request_id).json(&body),
            &format!("change request {request_id}"),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_trailing_slash() {
        let store = RestPlanStore::new(
            "http://localhost/",
            SecretString::new("anon".into()),
            None,
        );
        assert_eq!(store.table_url("diets"), "http://localhost/rest/v1/diets");
    }

    #[test]
    fn eq_filter_format() {
        assert_eq!(eq("42"), "eq.42");
    }
}
