//! Data models for sharebox API payloads.
//!
//! - `UserProfile`, `AdminUser`: account records
//! - `FileRecord`, `SharedFileEntry`: file listings
//! - `ShareRequest`, `ShareLink`, `PublicShareLink`: share-link management
//! - `UploadRequest`, `DownloadedFile`: file transfer

pub mod file;
pub mod user;

pub use file::{
    parse_content_disposition, DownloadedFile, EmailRequest, FileId, FileRecord,
    PublicShareLink, PublicShareRequest, ShareLink, ShareRequest, ShareType, SharedFileEntry,
    UploadRequest,
};
pub use user::{AdminUser, AdminUserUpdate, RegisterRequest, UserProfile, UserRole, UserUpdate};
