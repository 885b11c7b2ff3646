//! Menu node types

use serde::{Deserialize, Serialize};

use super::reference::{ReferenceFields, ViewReference};

/// Closed set of node kinds.
///
/// The first six are the root system nodes every group menu carries; the
/// content categories live under `auto-view`; the rest are user-created links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Home,
    Chats,
    AutoView,
    Members,
    Setup,
    CustomViews,
    #[default]
    Container,
    Chat,
    CustomView,
    Group,
    Post,
    Member,
    Track,
    FundingRound,
    AskAndOffer,
    Events,
    Projects,
    Groups,
    Decisions,
    Map,
}

impl NodeKind {
    pub const ALL: [NodeKind; 20] = [
        NodeKind::Home,
        NodeKind::Chats,
        NodeKind::AutoView,
        NodeKind::Members,
        NodeKind::Setup,
        NodeKind::CustomViews,
        NodeKind::Container,
        NodeKind::Chat,
        NodeKind::CustomView,
        NodeKind::Group,
        NodeKind::Post,
        NodeKind::Member,
        NodeKind::Track,
        NodeKind::FundingRound,
        NodeKind::AskAndOffer,
        NodeKind::Events,
        NodeKind::Projects,
        NodeKind::Groups,
        NodeKind::Decisions,
        NodeKind::Map,
    ];

    /// Tag stored in the `kind` column
    pub fn tag(self) -> &'static str {
        match self {
            NodeKind::Home => "home",
            NodeKind::Chats => "chats",
            NodeKind::AutoView => "auto-view",
            NodeKind::Members => "members",
            NodeKind::Setup => "setup",
            NodeKind::CustomViews => "custom-views",
            NodeKind::Container => "container",
            NodeKind::Chat => "chat",
            NodeKind::CustomView => "custom-view",
            NodeKind::Group => "group",
            NodeKind::Post => "post",
            NodeKind::Member => "member",
            NodeKind::Track => "track",
            NodeKind::FundingRound => "funding-round",
            NodeKind::AskAndOffer => "ask-and-offer",
            NodeKind::Events => "events",
            NodeKind::Projects => "projects",
            NodeKind::Groups => "groups",
            NodeKind::Decisions => "decisions",
            NodeKind::Map => "map",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Content categories surfaced under the auto-view container, in menu order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentCategory {
    AskAndOffer,
    Events,
    Projects,
    Groups,
    Decisions,
    Map,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 6] = [
        ContentCategory::AskAndOffer,
        ContentCategory::Events,
        ContentCategory::Projects,
        ContentCategory::Groups,
        ContentCategory::Decisions,
        ContentCategory::Map,
    ];

    pub fn kind(self) -> NodeKind {
        match self {
            ContentCategory::AskAndOffer => NodeKind::AskAndOffer,
            ContentCategory::Events => NodeKind::Events,
            ContentCategory::Projects => NodeKind::Projects,
            ContentCategory::Groups => NodeKind::Groups,
            ContentCategory::Decisions => NodeKind::Decisions,
            ContentCategory::Map => NodeKind::Map,
        }
    }

    /// Category a post of the given type belongs to, if any
    pub fn from_post_type(post_type: &str) -> Option<Self> {
        match post_type {
            "request" | "offer" => Some(ContentCategory::AskAndOffer),
            "event" => Some(ContentCategory::Events),
            "project" => Some(ContentCategory::Projects),
            "proposal" => Some(ContentCategory::Decisions),
            _ => None,
        }
    }
}

/// Who sees a node in the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    #[default]
    All,
    Admin,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::All => "all",
            Visibility::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(Visibility::All),
            "admin" => Some(Visibility::Admin),
            _ => None,
        }
    }
}

/// A record in a group's menu forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuNode {
    pub id: String,
    pub group_id: String,
    pub parent_id: Option<String>,
    /// `None` means the node exists but is not placed in the visible menu
    pub position: Option<u32>,
    pub kind: NodeKind,
    pub view_reference: ViewReference,
    pub is_system_node: bool,
    /// Set once an administrator moves or detaches the node
    #[serde(default)]
    pub placed_by_admin: bool,
    pub title: Option<String>,
    pub icon: Option<String>,
    pub visibility: Visibility,
    pub created_at: String,
    pub updated_at: String,
}

impl MenuNode {
    pub fn is_home(&self) -> bool {
        self.kind == NodeKind::Home
    }

    pub fn is_ordered(&self) -> bool {
        self.position.is_some()
    }
}

/// Where a node goes in its target scope
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum Placement {
    /// After the last ordered sibling
    Append,
    /// Created but not shown in the menu
    #[default]
    Unordered,
    /// At the current position of `sibling_id`, pushing it and later siblings down
    Before { sibling_id: String },
}

/// Input for creating a node
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateMenuNodeInput {
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub reference: ReferenceFields,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    /// Only the platform (group setup, bootstrap) sets this
    #[serde(skip)]
    pub is_system_node: bool,
}

/// Patch for a node's content. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMenuNodeInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub reference: ReferenceFields,
    /// Reposition as part of the same update
    #[serde(default)]
    pub reorder: Option<ReorderRequest>,
}

/// Target of a reorder.
///
/// `insert_before_id` selects the sibling's scope; otherwise `parent_id`
/// selects the scope (`None` is the root). Without a sibling the node is
/// appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReorderRequest {
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub insert_before_id: Option<String>,
    #[serde(default)]
    pub append_to_end: bool,
}

impl ReorderRequest {
    pub fn append_to(parent_id: Option<&str>) -> Self {
        Self {
            parent_id: parent_id.map(str::to_string),
            insert_before_id: None,
            append_to_end: true,
        }
    }

    pub fn before(sibling_id: &str) -> Self {
        Self {
            parent_id: None,
            insert_before_id: Some(sibling_id.to_string()),
            append_to_end: false,
        }
    }
}

/// Result of a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub success: bool,
}
