use crate::PlanError;
use secrecy::SecretString;

#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the data service, e.g. `https://project.example.co`.
    pub data_url: String,
    pub api_key: SecretString,
    /// Signed-in user's token. Requests fall back to the api key when absent.
    pub access_token: Option<SecretString>,
    pub diet_webhook_url: Option<String>,
    pub workout_webhook_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, PlanError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function, so tests never touch the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, PlanError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut get = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        let data_url = get("TRAINER_PLANS_DATA_URL")
            .ok_or_else(|| PlanError::Config("TRAINER_PLANS_DATA_URL missing".into()))?;
        let api_key = get("TRAINER_PLANS_API_KEY")
            .ok_or_else(|| PlanError::Config("TRAINER_PLANS_API_KEY missing".into()))?;
        let access_token =
            get("TRAINER_PLANS_ACCESS_TOKEN").map(|t| SecretString::new(t.into()));
        Ok(Self {
            data_url,
            api_key: SecretString::new(api_key.into()),
            access_token,
            diet_webhook_url: get("TRAINER_PLANS_DIET_WEBHOOK_URL"),
            workout_webhook_url: get("TRAINER_PLANS_WORKOUT_WEBHOOK_URL"),
        })
    }
}
