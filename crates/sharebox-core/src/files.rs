//! File, share-link and email actions.
//!
//! Every call goes through the gateway, which attaches the bearer credential
//! and recovers from expired tokens. Nothing here touches the session.

use std::sync::Arc;

use reqwest::{header, Response};
use serde::Deserialize;
use tracing::debug;

use crate::api::{ApiError, ApiGateway, FormField, RequestDescriptor};
use crate::models::{
    parse_content_disposition, DownloadedFile, EmailRequest, FileId, FileRecord,
    PublicShareLink, PublicShareRequest, ShareLink, ShareRequest, SharedFileEntry, UploadRequest,
};
use crate::validation;

/// Filename used when the server sends no `Content-Disposition`.
const FALLBACK_FILENAME: &str = "download";

#[derive(Debug, Deserialize)]
struct EmailReply {
    success: Option<String>,
}

/// File operations for the signed-in user.
/// Clone is cheap - the gateway is shared.
#[derive(Clone)]
pub struct FilesApi {
    gateway: Arc<ApiGateway>,
}

impl FilesApi {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self { gateway }
    }

    pub async fn my_files(&self) -> Result<Vec<FileRecord>, ApiError> {
        self.gateway.get_json("files/my-files/").await
    }

    pub async fn shared_with_me(&self) -> Result<Vec<SharedFileEntry>, ApiError> {
        self.gateway.get_json("files/shared-with-me/").await
    }

    pub async fn upload(&self, upload: &UploadRequest) -> Result<FileRecord, ApiError> {
        validation::require("File name", &upload.name)?;
        validation::require("Upload file name", &upload.file_name)?;

        let fields = vec![
            FormField::file(
                "file",
                upload.file_name.clone(),
                upload.content_type.clone(),
                upload.data.clone(),
            ),
            FormField::text("name", upload.name.clone()),
            FormField::text("description", upload.description.clone()),
        ];

        debug!(name = %upload.name, bytes = upload.data.len(), "Uploading file");
        let descriptor = RequestDescriptor::post("files/upload/").multipart(fields);
        self.gateway.send_json(descriptor).await
    }

    /// Download a file as an attachment.
    pub async fn download(&self, file_id: &FileId) -> Result<DownloadedFile, ApiError> {
        validation::path_segment("File id", file_id.as_str())?;
        let path = format!("files/download/{}/", file_id);
        let response = self.gateway.request(RequestDescriptor::get(path)).await?;
        Self::into_file(response).await
    }

    /// Fetch a file for inline viewing.
    pub async fn view(&self, file_id: &FileId) -> Result<DownloadedFile, ApiError> {
        validation::path_segment("File id", file_id.as_str())?;
        let path = format!("files/view/{}/", file_id);
        let response = self.gateway.request(RequestDescriptor::get(path)).await?;
        Self::into_file(response).await
    }

    /// Share a file with another user. The server emails the recipient.
    pub async fn share(&self, request: &ShareRequest) -> Result<ShareLink, ApiError> {
        validation::path_segment("File id", request.file_id.as_str())?;
        validation::expires_in(request.expires_in)?;
        match request.shared_with.as_deref() {
            Some(email) => validation::email(email)?,
            None if !request.public => {
                return Err(ApiError::Validation(
                    "A recipient email is required for a private share".to_string(),
                ))
            }
            None => {}
        }

        let descriptor = RequestDescriptor::post("files/share/").json(request)?;
        self.gateway.send_json(descriptor).await
    }

    /// Create a passphrase-protected public link, or get the live one back.
    pub async fn share_public(
        &self,
        request: &PublicShareRequest,
    ) -> Result<PublicShareLink, ApiError> {
        validation::path_segment("File id", request.file_id.as_str())?;
        validation::expires_in(request.expires_in)?;

        let descriptor = RequestDescriptor::post("files/share/public/").json(request)?;
        self.gateway.send_json(descriptor).await
    }

    pub async fn public_share_details(
        &self,
        file_id: &FileId,
    ) -> Result<PublicShareLink, ApiError> {
        validation::require("File id", file_id.as_str())?;
        let descriptor = RequestDescriptor::get("files/shared/public/details/")
            .query("file_id", file_id.as_str());
        self.gateway.send_json(descriptor).await
    }

    /// Open a private share addressed to the signed-in user.
    pub async fn access_shared(&self, shared_link: &str) -> Result<DownloadedFile, ApiError> {
        validation::path_segment("Share link", shared_link)?;
        let path = format!("files/shared/{}/", shared_link);
        let response = self.gateway.request(RequestDescriptor::get(path)).await?;
        Self::into_file(response).await
    }

    /// Open a public share. No session is needed or used.
    pub async fn access_public_shared(
        &self,
        shared_link: &str,
        passphrase: &str,
    ) -> Result<DownloadedFile, ApiError> {
        validation::path_segment("Share link", shared_link)?;
        validation::path_segment("Passphrase", passphrase)?;
        let path = format!("files/shared/public/{}/{}/", shared_link, passphrase);
        let response = self
            .gateway
            .request(RequestDescriptor::get(path).anonymous())
            .await?;
        Self::into_file(response).await
    }

    pub async fn send_email(&self, email: &EmailRequest) -> Result<String, ApiError> {
        if email.to.is_empty() {
            return Err(ApiError::Validation("At least one recipient is required".to_string()));
        }
        for recipient in &email.to {
            validation::email(recipient)?;
        }
        validation::require("Subject", &email.subject)?;
        validation::require("Message", &email.message)?;

        let descriptor = RequestDescriptor::post("files/send-email/").json(email)?;
        let reply: EmailReply = self.gateway.send_json(descriptor).await?;
        Ok(reply.success.unwrap_or_else(|| "Email sent".to_string()))
    }

    async fn into_file(response: Response) -> Result<DownloadedFile, ApiError> {
        let headers = response.headers();
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let (inline, filename) = headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(parse_content_disposition)
            .unwrap_or((false, None));

        let data = response.bytes().await?;
        Ok(DownloadedFile {
            filename: filename.unwrap_or_else(|| FALLBACK_FILENAME.to_string()),
            content_type,
            inline,
            data,
        })
    }
}
