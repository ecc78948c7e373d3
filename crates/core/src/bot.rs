//! Bots and their search configuration.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::DomainError;
use crate::id::{BotId, TenantId};

/// Retrieval strategy configured on a bot.
///
/// The method decides which vectors a chunk needs before it counts as vectorized, and
/// whether chunk content embeds the document path.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    /// Keyword-only search. No vectors.
    Bm25,
    Vector,
    Hybrid,
    /// Hybrid search with semantic reranking. The title vector is redundant here.
    SemanticHybrid,
    /// Legacy method whose chunk content does not carry the document path.
    Ursa,
    UrsaSemantic,
}

impl SearchMethod {
    pub const ALL: [SearchMethod; 6] = [
        SearchMethod::Bm25,
        SearchMethod::Vector,
        SearchMethod::Hybrid,
        SearchMethod::SemanticHybrid,
        SearchMethod::Ursa,
        SearchMethod::UrsaSemantic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::Bm25 => "bm25",
            SearchMethod::Vector => "vector",
            SearchMethod::Hybrid => "hybrid",
            SearchMethod::SemanticHybrid => "semantic_hybrid",
            SearchMethod::Ursa => "ursa",
            SearchMethod::UrsaSemantic => "ursa_semantic",
        }
    }

    /// Whether chunks indexed for this method need a content vector at all.
    pub fn requires_embeddings(&self) -> bool {
        !matches!(self, SearchMethod::Bm25)
    }

    /// Whether a title vector is required in addition to the content vector.
    pub fn requires_title_vector(&self) -> bool {
        self.requires_embeddings() && !matches!(self, SearchMethod::SemanticHybrid)
    }

    /// Whether chunk content starts with a `{folder_path}{file_name}` header line.
    pub fn embeds_path_in_content(&self) -> bool {
        !matches!(self, SearchMethod::Ursa)
    }
}

impl core::fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| DomainError::unknown_variant("search method", s))
    }
}

/// A chat bot owning documents and a search configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bot {
    pub id: BotId,
    pub tenant_id: TenantId,
    pub name: String,
    pub search_method: SearchMethod,
}

impl Bot {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, search_method: SearchMethod) -> Self {
        Self {
            id: BotId::new(),
            tenant_id,
            name: name.into(),
            search_method,
        }
    }
}

impl Entity for Bot {
    type Id = BotId;

    fn id(&self) -> BotId {
        self.id
    }
}
