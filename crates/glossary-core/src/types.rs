use crate::{GlossaryError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A glossary term as declared in the input batch.
///
/// `id` and `parent_id` are input-local identifiers; they never leave the process.
/// The remote service only ever sees a [`TermPayload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub definition: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stakeholders: Vec<Stakeholder>,
}

impl TermRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parent_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id,
            definition: String::new(),
            description: None,
            stakeholders: Vec::new(),
        }
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = definition.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_stakeholders(mut self, stakeholders: Vec<Stakeholder>) -> Self {
        self.stakeholders = stakeholders;
        self
    }
}

/// A principal associated with a term. The object id is never nil.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawStakeholder")]
pub struct Stakeholder {
    #[serde(rename = "objectId")]
    object_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    upn: Option<String>,
}

#[derive(Deserialize)]
struct RawStakeholder {
    #[serde(rename = "objectId")]
    object_id: Uuid,
    #[serde(default)]
    upn: Option<String>,
}

impl TryFrom<RawStakeholder> for Stakeholder {
    type Error = GlossaryError;

    fn try_from(raw: RawStakeholder) -> Result<Self> {
        Stakeholder::new(raw.object_id, raw.upn)
    }
}

impl Stakeholder {
    pub fn new(object_id: Uuid, upn: Option<String>) -> Result<Self> {
        if object_id.is_nil() {
            return Err(GlossaryError::InvalidStakeholder(
                "objectId is empty".to_string(),
            ));
        }
        Ok(Self { object_id, upn })
    }

    pub fn object_id(&self) -> Uuid {
        self.object_id
    }

    pub fn upn(&self) -> Option<&str> {
        self.upn.as_deref()
    }
}

/// A term as it currently exists in the remote catalog. `id` doubles as its location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTerm {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl RemoteTerm {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parent_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id,
        }
    }

    pub fn location(&self) -> &str {
        &self.id
    }
}

/// Body sent on create and update. Updates replace the whole term with this payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermPayload {
    pub name: String,
    pub definition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Remote location of the parent term.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub stakeholders: Vec<Stakeholder>,
}

impl TermPayload {
    pub fn from_record(record: &TermRecord, parent_location: Option<String>) -> Self {
        Self {
            name: record.name.clone(),
            definition: record.definition.clone(),
            description: record.description.clone(),
            parent_id: parent_location,
            stakeholders: record.stakeholders.clone(),
        }
    }
}
