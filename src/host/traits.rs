use crate::{
    error::Result,
    models::{Event, GenerationRequest},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The host's image-generation backend.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns `null`, a single descriptor, or an array of descriptors.
    async fn generate(
        &self,
        request: &GenerationRequest,
        user: Option<&UserRecord>,
    ) -> Result<serde_json::Value>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user_by_id(&self, id: &str) -> Result<Option<UserRecord>>;
}

/// The host's UI event transport.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: Event) -> Result<()>;
}

/// Host-wide default step count read by generators that ignore `steps`.
pub trait StepsSetting: Send + Sync {
    fn image_steps(&self) -> Result<u32>;
    fn set_image_steps(&self, steps: u32) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}
