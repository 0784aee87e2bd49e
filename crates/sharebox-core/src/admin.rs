//! Administrator operations on users and files.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::{ApiError, ApiGateway, RequestDescriptor};
use crate::models::{AdminUser, AdminUserUpdate, FileId, FileRecord};
use crate::validation;

#[derive(Serialize)]
struct SuperuserBody {
    is_superuser: bool,
}

#[derive(Debug, Deserialize)]
struct MessageReply {
    message: Option<String>,
}

#[derive(Clone)]
pub struct AdminApi {
    gateway: Arc<ApiGateway>,
}

impl AdminApi {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self { gateway }
    }

    pub async fn list_users(&self) -> Result<Vec<AdminUser>, ApiError> {
        self.gateway.get_json("admin/users/").await
    }

    pub async fn get_user(&self, user_id: i64) -> Result<AdminUser, ApiError> {
        self.gateway
            .get_json(&format!("admin/users/{}/", user_id))
            .await
    }

    pub async fn update_user(
        &self,
        user_id: i64,
        update: &AdminUserUpdate,
    ) -> Result<AdminUser, ApiError> {
        if let Some(ref email) = update.email {
            validation::email(email)?;
        }
        let descriptor = RequestDescriptor::patch(format!("admin/users/{}/", user_id)).json(update)?;
        self.gateway.send_json(descriptor).await
    }

    pub async fn delete_user(&self, user_id: i64) -> Result<(), ApiError> {
        self.gateway
            .send_discard(RequestDescriptor::delete(format!("admin/users/{}/", user_id)))
            .await
    }

    /// Grant or revoke superuser rights.
    pub async fn make_superuser(&self, user_id: i64, grant: bool) -> Result<String, ApiError> {
        let descriptor = RequestDescriptor::patch(format!("admin/users/{}/make-superuser/", user_id))
            .json(&SuperuserBody { is_superuser: grant })?;
        let reply: MessageReply = self.gateway.send_json(descriptor).await?;
        Ok(reply
            .message
            .unwrap_or_else(|| "Superuser status updated".to_string()))
    }

    pub async fn list_files(&self) -> Result<Vec<FileRecord>, ApiError> {
        self.gateway.get_json("admin/files/").await
    }

    pub async fn delete_file(&self, file_id: &FileId) -> Result<(), ApiError> {
        validation::path_segment("File id", file_id.as_str())?;
        self.gateway
            .send_discard(RequestDescriptor::delete(format!("admin/files/{}/", file_id)))
            .await
    }
}
