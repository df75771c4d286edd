use std::sync::Arc;

use serde_json::{Map, Value};
use trainer_plans_client::generator::{GenerationRequest, PlanGenerator};
use trainer_plans_client::workout::{self, Exercise, WorkoutView};
use trainer_plans_client::{
    ChangeRequest, ClientRecord, MealEdit, NewChangeRequest, NewClient, NewPlanRecord,
    NormalizedPlan, PlanError, PlanKind, PlanRecord, PlanStore, RequestStatus,
};

use crate::error::{AppError, AppResult};
use crate::session::SessionContext;
use crate::state::TrackedPlan;

/// A diet as shown to the user.
#[derive(Debug, Clone)]
pub struct LoadedDiet {
    pub record: PlanRecord,
    pub plan: TrackedPlan<NormalizedPlan>,
    /// User-visible notice when the stored document could not be read.
    pub notice: Option<String>,
}

/// A workout as shown to the user. The tracked value is the stored document;
/// [`LoadedWorkout::view`] renders it.
#[derive(Debug, Clone)]
pub struct LoadedWorkout {
    pub record: PlanRecord,
    pub document: TrackedPlan<Value>,
    pub notice: Option<String>,
}

impl LoadedWorkout {
    pub fn view(&self) -> WorkoutView {
        workout::normalize_workout(self.document.visible())
    }
}

/// Outcome of creating a client and their first diet. The two writes are
/// independent: a failed plan write does not undo the client.
#[derive(Debug)]
pub struct Onboarding {
    pub client: ClientRecord,
    pub diet: Option<PlanRecord>,
    pub diet_error: Option<AppError>,
}

#[derive(Clone)]
pub struct PlanService {
    store: Arc<dyn PlanStore>,
    generator: Arc<dyn PlanGenerator>,
}

impl PlanService {
    pub fn new(store: Arc<dyn PlanStore>, generator: Arc<dyn PlanGenerator>) -> Self {
        Self { store, generator }
    }

    async fn visible_plan(
        &self,
        session: &SessionContext,
        kind: PlanKind,
        plan_id: &str,
    ) -> AppResult<PlanRecord> {
        let record = self.store.get_plan(kind, plan_id).await?;
        if !session.can_view_plan(&record) {
            // same answer as a missing row, so ids of other users stay opaque
            return Err(PlanError::NotFound(format!("{kind} {plan_id}")).into());
        }
        Ok(record)
    }

    async fn visible_client(
        &self,
        session: &SessionContext,
        client_id: &str,
    ) -> AppResult<ClientRecord> {
        let client = self.store.get_client(client_id).await?;
        if !session.can_view_client(&client) {
            return Err(PlanError::NotFound(format!("client {client_id}")).into());
        }
        Ok(client)
    }

    fn ensure_editable(session: &SessionContext, record: &PlanRecord) -> AppResult<()> {
        session.require_trainer()?;
        if !session.can_edit_plan(record) {
            return Err(AppError::Forbidden(format!(
                "plan {} belongs to another trainer",
                record.id
            )));
        }
        Ok(())
    }

    pub async fn list_clients(&self, session: &SessionContext) -> AppResult<Vec<ClientRecord>> {
        let trainer_id = session.require_trainer()?;
        Ok(self.store.list_clients(trainer_id).await?)
    }

    pub async fn list_plans(
        &self,
        session: &SessionContext,
        kind: PlanKind,
        client_id: &str,
    ) -> AppResult<Vec<PlanRecord>> {
        self.visible_client(session, client_id).await?;
        Ok(self.store.list_plans(kind, client_id).await?)
    }

    pub async fn load_diet(&self, session: &SessionContext, diet_id: &str) -> AppResult<LoadedDiet> {
        let record = self.visible_plan(session, PlanKind::Diet, diet_id).await?;
        let (plan, warning) = NormalizedPlan::from_raw(&record.payload);
        if let Some(w) = &warning {
            tracing::warn!(diet_id, warning = %w, "showing unreadable diet as empty");
        }
        Ok(LoadedDiet {
            record,
            plan: TrackedPlan::new(plan),
            notice: warning.map(|w| format!("The stored diet could not be read and is shown empty ({w})")),
        })
    }

    /// Replace one meal, recompute its day and write the whole document back.
    ///
    /// The edited plan is visible while the write is in flight; if the write
    /// fails the previous plan is restored and the remote error returned.
    pub async fn edit_meal(
        &self,
        session: &SessionContext,
        diet: &mut LoadedDiet,
        label: &str,
        slot_key: &str,
        edit: MealEdit,
    ) -> AppResult<()> {
        Self::ensure_editable(session, &diet.record)?;
        let updated = diet.plan.visible().apply_meal_edit(label, slot_key, edit)?;
        let document = updated.to_document()?;
        diet.plan.begin(updated.clone())?;

        match self
            .store
            .replace_plan_payload(PlanKind::Diet, &diet.record.id, &document)
            .await
        {
            Ok(record) => {
                let confirmed = if record.payload.is_null() {
                    updated
                } else {
                    NormalizedPlan::from_raw(&record.payload).0
                };
                diet.plan.commit(confirmed);
                diet.record = record;
                tracing::info!(diet_id = %diet.record.id, label, slot = slot_key, "meal edit saved");
                Ok(())
            }
            Err(e) => {
                tracing::error!(diet_id = %diet.record.id, error = %e, "meal edit rolled back");
                diet.plan.fail(e.to_string());
                Err(e.into())
            }
        }
    }

    pub async fn load_workout(
        &self,
        session: &SessionContext,
        workout_id: &str,
    ) -> AppResult<LoadedWorkout> {
        let record = self
            .visible_plan(session, PlanKind::Workout, workout_id)
            .await?;
        let notice = workout::normalize_workout(&record.payload)
            .warning
            .map(|w| format!("The stored workout could not be read and is shown empty ({w})"));
        Ok(LoadedWorkout {
            document: TrackedPlan::new(record.payload.clone()),
            record,
            notice,
        })
    }

    pub async fn edit_exercise(
        &self,
        session: &SessionContext,
        loaded: &mut LoadedWorkout,
        day_index: usize,
        exercise_index: usize,
        exercise: &Exercise,
    ) -> AppResult<()> {
        Self::ensure_editable(session, &loaded.record)?;
        let updated = workout::replace_exercise(
            loaded.document.visible(),
            day_index,
            exercise_index,
            exercise,
        )?;
        loaded.document.begin(updated.clone())?;

        match self
            .store
            .replace_plan_payload(PlanKind::Workout, &loaded.record.id, &updated)
            .await
        {
            Ok(record) => {
                let confirmed = if record.payload.is_null() {
                    updated
                } else {
                    record.payload.clone()
                };
                loaded.document.commit(confirmed);
                loaded.record = record;
                tracing::info!(workout_id = %loaded.record.id, day_index, exercise_index, "exercise edit saved");
                Ok(())
            }
            Err(e) => {
                tracing::error!(workout_id = %loaded.record.id, error = %e, "exercise edit rolled back");
                loaded.document.fail(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Ask the generation webhook for a new plan and store it for the client.
    pub async fn generate_plan(
        &self,
        session: &SessionContext,
        kind: PlanKind,
        request: &GenerationRequest,
    ) -> AppResult<PlanRecord> {
        let trainer_id = session.require_trainer()?.to_string();
        request.validate(kind)?;
        self.visible_client(session, &request.client_id).await?;

        let document = self.generator.generate(kind, request).await?;
        let has_content = match kind {
            PlanKind::Diet => !NormalizedPlan::from_raw(&document).0.is_empty(),
            PlanKind::Workout => !workout::normalize_workout(&document).days.is_empty(),
        };
        if !has_content {
            return Err(AppError::Validation(format!(
                "the {kind} generator returned no usable plan"
            )));
        }

        let record = NewPlanRecord {
            client_id: Some(request.client_id.clone()),
            trainer_id,
            payload: document,
            form_data: serde_json::to_value(request)?,
        };
        let stored = self.store.insert_plan(kind, &record).await?;
        tracing::info!(%kind, plan_id = %stored.id, client_id = %request.client_id, "generated plan stored");
        Ok(stored)
    }

    /// Create a client and, when diet parameters are given, generate their
    /// first diet.
    pub async fn onboard_client(
        &self,
        session: &SessionContext,
        client: NewClient,
        diet_params: Option<Map<String, Value>>,
    ) -> AppResult<Onboarding> {
        let trainer_id = session.require_trainer()?;
        if client.trainer_id != trainer_id {
            return Err(AppError::Forbidden(
                "clients can only be created for the signed-in trainer".into(),
            ));
        }
        client.validate()?;
        let created = self.store.create_client(&client).await?;

        let Some(params) = diet_params else {
            return Ok(Onboarding {
                client: created,
                diet: None,
                diet_error: None,
            });
        };
        let request = GenerationRequest::new(created.id.clone(), params);
        match self.generate_plan(session, PlanKind::Diet, &request).await {
            Ok(diet) => Ok(Onboarding {
                client: created,
                diet: Some(diet),
                diet_error: None,
            }),
            Err(e) => {
                tracing::warn!(client_id = %created.id, error = %e, "client created but first diet was not saved");
                Ok(Onboarding {
                    client: created,
                    diet: None,
                    diet_error: Some(e),
                })
            }
        }
    }

    pub async fn delete_plan(
        &self,
        session: &SessionContext,
        kind: PlanKind,
        plan_id: &str,
    ) -> AppResult<()> {
        let record = self.visible_plan(session, kind, plan_id).await?;
        Self::ensure_editable(session, &record)?;
        self.store.delete_plan(kind, plan_id).await?;
        tracing::info!(%kind, plan_id, "plan deleted");
        Ok(())
    }

    /// File a client's request that the trainer revise one of their plans.
    pub async fn request_change(
        &self,
        session: &SessionContext,
        kind: PlanKind,
        plan_id: &str,
        message: &str,
    ) -> AppResult<ChangeRequest> {
        let client_id = session.require_client()?.to_string();
        if message.trim().is_empty() {
            return Err(AppError::Validation("describe the change you need".into()));
        }
        let plan = self.visible_plan(session, kind, plan_id).await?;
        let request = NewChangeRequest {
            client_id,
            trainer_id: plan.trainer_id,
            plan_kind: kind,
            plan_id: plan.id,
            message: message.trim().to_string(),
            status: RequestStatus::Open,
        };
        Ok(self.store.create_change_request(&request).await?)
    }

    /// Open change requests addressed to the signed-in trainer.
    pub async fn pending_requests(
        &self,
        session: &SessionContext,
    ) -> AppResult<Vec<ChangeRequest>> {
        let trainer_id = session.require_trainer()?;
        let all = self.store.list_change_requests(trainer_id).await?;
        Ok(all
            .into_iter()
            .filter(|r| r.status == RequestStatus::Open)
            .collect())
    }

    pub async fn resolve_request(
        &self,
        session: &SessionContext,
        request_id: &str,
    ) -> AppResult<ChangeRequest> {
        let trainer_id = session.require_trainer()?;
        let owned = self
            .store
            .list_change_requests(trainer_id)
            .await?
            .iter()
            .any(|r| r.id == request_id);
        if !owned {
            return Err(PlanError::NotFound(format!("change request {request_id}")).into());
        }
        Ok(self.store.resolve_change_request(request_id).await?)
    }
}
