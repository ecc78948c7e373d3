//! `ragworks-core`: domain types for the background indexing subsystem.
//!
//! This crate contains **pure domain** types (no infrastructure concerns): identifiers,
//! documents and their indexed chunks, folders, bots and tenants.

pub mod bot;
pub mod chunk;
pub mod document;
pub mod entity;
pub mod error;
pub mod folder;
pub mod id;
pub mod tenant;

pub use bot::{Bot, SearchMethod};
pub use chunk::{ChunkHeader, DocumentChunk};
pub use document::{Document, DocumentStatus};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use folder::{DocumentFolder, FolderPath};
pub use id::{BotId, DocumentFolderId, DocumentId, TenantId};
pub use tenant::{SearchTarget, Tenant};
