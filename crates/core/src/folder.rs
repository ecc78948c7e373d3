//! Folder hierarchy of a bot's documents.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::{BotId, DocumentFolderId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFolder {
    pub id: DocumentFolderId,
    pub bot_id: BotId,
    pub name: String,
    /// `None` for top-level folders.
    pub parent_id: Option<DocumentFolderId>,
}

impl DocumentFolder {
    pub fn new(bot_id: BotId, name: impl Into<String>, parent_id: Option<DocumentFolderId>) -> Self {
        Self {
            id: DocumentFolderId::new(),
            bot_id,
            name: name.into(),
            parent_id,
        }
    }
}

impl Entity for DocumentFolder {
    type Id = DocumentFolderId;

    fn id(&self) -> DocumentFolderId {
        self.id
    }
}

/// Slash-delimited folder path, always starting and ending with `/`.
///
/// The root path is `/`; a document in `contracts/2024` lives under `/contracts/2024/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderPath(String);

impl FolderPath {
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Build a path from an ancestor chain ordered root first.
    ///
    /// Each folder must be the parent of the next one.
    pub fn from_ancestors(ancestors: &[DocumentFolder]) -> DomainResult<Self> {
        let mut path = String::from("/");
        let mut expected_parent: Option<DocumentFolderId> = None;

        for folder in ancestors {
            if folder.parent_id != expected_parent {
                return Err(DomainError::invariant(format!(
                    "folder {} is not a child of {:?}",
                    folder.id, expected_parent
                )));
            }
            path.push_str(&folder.name);
            path.push('/');
            expected_parent = Some(folder.id);
        }

        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for FolderPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
