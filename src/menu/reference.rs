//! View references and their exclusivity check
//!
//! Inside the crate a node's reference is the tagged [`ViewReference`], so a
//! node can never point at two things. The field bag [`ReferenceFields`] is the
//! shape callers send and the shape rows are stored in; it is turned into a
//! `ViewReference` only through [`validate_reference`].

use serde::{Deserialize, Serialize};

use crate::error::{MenuError, Result};

/// The single piece of content a node links to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "kebab-case")]
pub enum ViewReference {
    #[default]
    None,
    Group(String),
    Post(String),
    SavedView(String),
    Member(String),
    ChatTopic(String),
    Track(String),
    FundingRound(String),
}

impl ViewReference {
    pub fn is_none(&self) -> bool {
        matches!(self, ViewReference::None)
    }
}

/// One optional field per reference type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReferenceFields {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub saved_view_id: Option<String>,
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub chat_topic_id: Option<String>,
    #[serde(default)]
    pub track_id: Option<String>,
    #[serde(default)]
    pub funding_round_id: Option<String>,
}

impl ReferenceFields {
    pub fn is_empty(&self) -> bool {
        self.set_fields().is_empty()
    }

    /// Names of the fields that carry a value
    pub fn set_fields(&self) -> Vec<&'static str> {
        [
            ("group_id", &self.group_id),
            ("post_id", &self.post_id),
            ("saved_view_id", &self.saved_view_id),
            ("member_id", &self.member_id),
            ("chat_topic_id", &self.chat_topic_id),
            ("track_id", &self.track_id),
            ("funding_round_id", &self.funding_round_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_some())
        .map(|(name, _)| name)
        .collect()
    }
}

impl From<&ViewReference> for ReferenceFields {
    fn from(reference: &ViewReference) -> Self {
        let mut fields = ReferenceFields::default();
        match reference.clone() {
            ViewReference::None => {}
            ViewReference::Group(id) => fields.group_id = Some(id),
            ViewReference::Post(id) => fields.post_id = Some(id),
            ViewReference::SavedView(id) => fields.saved_view_id = Some(id),
            ViewReference::Member(id) => fields.member_id = Some(id),
            ViewReference::ChatTopic(id) => fields.chat_topic_id = Some(id),
            ViewReference::Track(id) => fields.track_id = Some(id),
            ViewReference::FundingRound(id) => fields.funding_round_id = Some(id),
        }
        fields
    }
}

/// Build the candidate reference for an update.
///
/// A patch that sets any reference field replaces the stored reference
/// entirely; a patch that sets none keeps it.
pub fn merge_reference_update(current: &ViewReference, patch: &ReferenceFields) -> ReferenceFields {
    if patch.is_empty() {
        ReferenceFields::from(current)
    } else {
        patch.clone()
    }
}

/// Accept a field bag with at most one value set
pub fn validate_reference(candidate: &ReferenceFields) -> Result<ViewReference> {
    let set = candidate.set_fields();
    if set.len() > 1 {
        return Err(MenuError::InvalidReference {
            fields: set.into_iter().map(str::to_string).collect(),
        });
    }

    let fields = candidate.clone();
    let reference = if let Some(id) = fields.group_id {
        ViewReference::Group(id)
    } else if let Some(id) = fields.post_id {
        ViewReference::Post(id)
    } else if let Some(id) = fields.saved_view_id {
        ViewReference::SavedView(id)
    } else if let Some(id) = fields.member_id {
        ViewReference::Member(id)
    } else if let Some(id) = fields.chat_topic_id {
        ViewReference::ChatTopic(id)
    } else if let Some(id) = fields.track_id {
        ViewReference::Track(id)
    } else if let Some(id) = fields.funding_round_id {
        ViewReference::FundingRound(id)
    } else {
        ViewReference::None
    };

    Ok(reference)
}
