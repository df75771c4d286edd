//! The signed-in user, resolved once at authentication and passed by
//! reference to every operation that needs it.

use secrecy::SecretString;
use trainer_plans_client::{ClientRecord, PlanRecord};

use crate::error::{AppError, AppResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Trainer { trainer_id: String },
    Client { client_id: String, trainer_id: String },
}

#[derive(Clone, Debug)]
pub struct SessionContext {
    user_id: String,
    role: Role,
    access_token: SecretString,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>, role: Role, access_token: SecretString) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            access_token,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// The trainer whose data this session operates on.
    pub fn trainer_id(&self) -> &str {
        match &self.role {
            Role::Trainer { trainer_id } | Role::Client { trainer_id, .. } => trainer_id.as_str(),
        }
    }

    pub fn is_trainer(&self) -> bool {
        matches!(self.role, Role::Trainer { .. })
    }

    pub fn require_trainer(&self) -> AppResult<&str> {
        match &self.role {
            Role::Trainer { trainer_id } => Ok(trainer_id.as_str()),
            Role::Client { .. } => Err(AppError::Forbidden(
                "only the trainer can change plans directly".into(),
            )),
        }
    }

    pub fn require_client(&self) -> AppResult<&str> {
        match &self.role {
            Role::Client { client_id, .. } => Ok(client_id.as_str()),
            Role::Trainer { .. } => Err(AppError::Forbidden(
                "change requests are filed by clients".into(),
            )),
        }
    }

    pub fn can_view_client(&self, client: &ClientRecord) -> bool {
        match &self.role {
            Role::Trainer { trainer_id } => client.trainer_id == *trainer_id,
            Role::Client { client_id, .. } => client.id == *client_id,
        }
    }

    pub fn can_view_plan(&self, plan: &PlanRecord) -> bool {
        match &self.role {
            Role::Trainer { trainer_id } => plan.trainer_id == *trainer_id,
            Role::Client { client_id, .. } => plan.client_id.as_deref() == Some(client_id.as_str()),
        }
    }

    pub fn can_edit_plan(&self, plan: &PlanRecord) -> bool {
        matches!(&self.role, Role::Trainer { trainer_id } if plan.trainer_id == *trainer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan(trainer: &str, client: Option<&str>) -> PlanRecord {
        PlanRecord {
            id: "p1".into(),
            client_id: client.map(str::to_string),
            trainer_id: trainer.into(),
            payload: json!([]),
            form_data: json!({}),
            created_at: None,
        }
    }

    fn trainer() -> SessionContext {
        SessionContext::new(
            "u1",
            Role::Trainer {
                trainer_id: "t1".into(),
            },
            SecretString::new("jwt".into()),
        )
    }

    fn client() -> SessionContext {
        SessionContext::new(
            "u2",
            Role::Client {
                client_id: "c1".into(),
                trainer_id: "t1".into(),
            },
            SecretString::new("jwt".into()),
        )
    }

    #[test]
    fn trainer_edits_own_plans_only() {
        let s = trainer();
        assert!(s.can_edit_plan(&plan("t1", Some("c1"))));
        assert!(!s.can_edit_plan(&plan("t2", Some("c1"))));
        assert!(s.require_trainer().is_ok());
        assert!(s.require_client().is_err());
    }

    #[test]
    fn client_views_but_never_edits() {
        let s = client();
        assert!(s.can_view_plan(&plan("t1", Some("c1"))));
        assert!(!s.can_view_plan(&plan("t1", Some("c2"))));
        assert!(!s.can_view_plan(&plan("t1", None)));
        assert!(!s.can_edit_plan(&plan("t1", Some("c1"))));
        assert_eq!(s.trainer_id(), "t1");
        assert_eq!(s.require_client().ok(), Some("c1"));
    }
}
