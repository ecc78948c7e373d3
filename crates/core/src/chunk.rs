//! Index-side projection of a document: independently searchable chunks.
//!
//! Chunks are created by the (external) chunking step and then mutated here:
//! the indexing pipeline attaches vectors, and the synchronizers patch location fields
//! when a document or one of its folders is renamed or moved.
//!
//! Invariant: `is_vectorized == true` implies the vectors required by the bot's
//! `SearchMethod` are present. Every mutator below preserves it.

use serde::{Deserialize, Serialize};

use crate::bot::SearchMethod;
use crate::folder::FolderPath;
use crate::id::{BotId, DocumentFolderId, DocumentId};

/// First line of chunk content for methods that embed the document location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHeader(String);

impl ChunkHeader {
    pub fn new(folder_path: &FolderPath, file_name: &str) -> Self {
        Self(format!("{folder_path}{file_name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub bot_id: BotId,
    pub document_id: DocumentId,
    #[serde(default)]
    pub document_folder_id: Option<DocumentFolderId>,
    pub content: String,
    pub blob_path: String,
    pub file_name: String,
    pub page_number: u32,
    pub is_vectorized: bool,
    #[serde(default)]
    pub content_vector: Option<Vec<f32>>,
    #[serde(default)]
    pub title_vector: Option<Vec<f32>>,
}

impl DocumentChunk {
    /// Text after the location header (or the whole content when there is none).
    pub fn body(&self, method: SearchMethod) -> &str {
        if method.embeds_path_in_content() {
            match self.content.split_once('\n') {
                Some((_, body)) => body,
                None => "",
            }
        } else {
            &self.content
        }
    }

    /// Whether the vectors needed by `method` are attached.
    pub fn has_required_vectors(&self, method: SearchMethod) -> bool {
        if !method.requires_embeddings() {
            return true;
        }
        self.content_vector.is_some() && (!method.requires_title_vector() || self.title_vector.is_some())
    }

    /// Attach freshly generated vectors and flag the chunk as vectorized.
    pub fn set_vectors(&mut self, content_vector: Vec<f32>, title_vector: Option<Vec<f32>>) {
        self.content_vector = Some(content_vector);
        self.title_vector = title_vector;
        self.is_vectorized = true;
    }

    /// Drop vectors so the pipeline picks the chunk up again.
    pub fn invalidate_vectors(&mut self) {
        self.content_vector = None;
        self.title_vector = None;
        self.is_vectorized = false;
    }

    /// Drop the title vector only; the content vector still matches the content.
    pub fn invalidate_title_vector(&mut self) {
        self.title_vector = None;
        self.is_vectorized = false;
    }

    /// Point the chunk at a new location. Returns `false` when nothing changed.
    pub fn relocate(
        &mut self,
        method: SearchMethod,
        header: &ChunkHeader,
        blob_path: &str,
        file_name: &str,
        folder_id: Option<DocumentFolderId>,
    ) -> bool {
        let content = if method.embeds_path_in_content() {
            format!("{}\n{}", header.as_str(), self.body(method))
        } else {
            self.content.clone()
        };

        let changed = content != self.content
            || self.blob_path != blob_path
            || self.file_name != file_name
            || self.document_folder_id != folder_id;

        if changed {
            self.content = content;
            self.blob_path = blob_path.to_string();
            self.file_name = file_name.to_string();
            self.document_folder_id = folder_id;
        }
        changed
    }

    /// Re-shape content written for `from` so it matches the layout `to` expects.
    ///
    /// The body is kept; the location header is added or dropped. Returns `false` when the
    /// content already has the right shape.
    pub fn reformat(&mut self, from: SearchMethod, to: SearchMethod, header: &ChunkHeader) -> bool {
        let body = self.body(from);
        let content = if to.embeds_path_in_content() {
            format!("{}\n{}", header.as_str(), body)
        } else {
            body.to_string()
        };

        if content == self.content {
            return false;
        }
        self.content = content;
        true
    }
}
