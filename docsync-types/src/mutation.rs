//! Mutation kinds and payloads.
//!
//! Each variant carries exactly the data its operation needs, so the executor
//! dispatches on the variant instead of sniffing payload shapes for ids.

use crate::ids::document_id;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which operation a mutation performs. Fixed at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
    BulkCreate,
    BulkUpdate,
    BulkDelete,
}

impl OperationKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::BulkCreate => "bulkCreate",
            OperationKind::BulkUpdate => "bulkUpdate",
            OperationKind::BulkDelete => "bulkDelete",
        }
    }

    #[must_use]
    pub const fn is_bulk(&self) -> bool {
        matches!(
            self,
            OperationKind::BulkCreate | OperationKind::BulkUpdate | OperationKind::BulkDelete
        )
    }

    /// Update and delete kinds address existing entities and need ids.
    #[must_use]
    pub const fn requires_id(&self) -> bool {
        matches!(
            self,
            OperationKind::Update
                | OperationKind::Delete
                | OperationKind::BulkUpdate
                | OperationKind::BulkDelete
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A partial update addressed to one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPatch {
    pub id: String,
    pub patch: Value,
}

impl EntityPatch {
    pub fn new(id: impl Into<String>, patch: Value) -> Self {
        Self {
            id: id.into(),
            patch,
        }
    }
}

/// A mutation request together with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data", rename_all = "camelCase")]
pub enum Mutation {
    /// Create one entity from a full document (without id).
    Create(Value),
    /// Merge `patch` into the entity `id`.
    Update { id: String, patch: Value },
    /// Delete the entity `id`.
    Delete { id: String },
    BulkCreate(Vec<Value>),
    BulkUpdate(Vec<EntityPatch>),
    BulkDelete(Vec<String>),
}

impl Mutation {
    pub fn update(id: impl Into<String>, patch: Value) -> Self {
        Mutation::Update {
            id: id.into(),
            patch,
        }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Mutation::Delete { id: id.into() }
    }

    /// Builds an update from a document carrying its own id.
    ///
    /// The id fields are removed from the patch so the merge never rewrites
    /// the entity's identity.
    pub fn update_from_payload(payload: Value) -> Result<Self> {
        let id = document_id(&payload).ok_or(Error::MissingId {
            kind: OperationKind::Update,
        })?;
        let mut patch = payload;
        if let Some(obj) = patch.as_object_mut() {
            obj.remove("_id");
            obj.remove("id");
        }
        Ok(Mutation::Update { id, patch })
    }

    /// Builds a delete from a document carrying its own id.
    pub fn delete_from_payload(payload: &Value) -> Result<Self> {
        let id = document_id(payload).ok_or(Error::MissingId {
            kind: OperationKind::Delete,
        })?;
        Ok(Mutation::Delete { id })
    }

    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Mutation::Create(_) => OperationKind::Create,
            Mutation::Update { .. } => OperationKind::Update,
            Mutation::Delete { .. } => OperationKind::Delete,
            Mutation::BulkCreate(_) => OperationKind::BulkCreate,
            Mutation::BulkUpdate(_) => OperationKind::BulkUpdate,
            Mutation::BulkDelete(_) => OperationKind::BulkDelete,
        }
    }

    /// Ids of the existing entities this mutation addresses.
    #[must_use]
    pub fn affected_ids(&self) -> Vec<&str> {
        match self {
            Mutation::Create(_) | Mutation::BulkCreate(_) => Vec::new(),
            Mutation::Update { id, .. } | Mutation::Delete { id } => vec![id.as_str()],
            Mutation::BulkUpdate(patches) => patches.iter().map(|p| p.id.as_str()).collect(),
            Mutation::BulkDelete(ids) => ids.iter().map(String::as_str).collect(),
        }
    }

    /// The single addressed id of an update or delete.
    #[must_use]
    pub fn primary_id(&self) -> Option<&str> {
        match self {
            Mutation::Update { id, .. } | Mutation::Delete { id } => Some(id.as_str()),
            _ => None,
        }
    }

    /// Refuses update/delete mutations whose ids are missing or blank.
    ///
    /// An empty bulk update/delete is also refused: it names no scope at all.
    pub fn check_ids(&self) -> Result<()> {
        let kind = self.kind();
        if !kind.requires_id() {
            return Ok(());
        }
        let ids = self.affected_ids();
        if ids.is_empty() || ids.iter().any(|id| id.trim().is_empty()) {
            return Err(Error::MissingId { kind });
        }
        Ok(())
    }
}
