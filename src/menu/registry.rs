//! Kind registry
//!
//! Built once per process. Maps stored kind tags back to [`NodeKind`] and
//! carries the per-kind facts the rest of the crate needs: how a node is
//! displayed and which kinds a node may hold as children.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;

use super::node::{MenuNode, NodeKind};
use super::reference::ViewReference;
use crate::error::{MenuError, Result};

/// How a client should present a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayType {
    Home,
    Container,
    View,
    Chat,
    CustomView,
    Group,
    Post,
    Member,
    Track,
    FundingRound,
}

/// Which children a kind accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildPolicy {
    /// Any kind except `home`
    Any,
    Only(NodeKind),
    None,
}

#[derive(Debug, Clone, Copy)]
pub struct KindInfo {
    pub kind: NodeKind,
    pub display: DisplayType,
    pub children: ChildPolicy,
}

pub struct KindRegistry {
    by_tag: HashMap<&'static str, KindInfo>,
}

static REGISTRY: LazyLock<KindRegistry> = LazyLock::new(KindRegistry::build);

/// The process-wide registry
pub fn registry() -> &'static KindRegistry {
    &REGISTRY
}

impl KindRegistry {
    fn build() -> Self {
        let by_tag = NodeKind::ALL
            .iter()
            .map(|&kind| {
                let (display, children) = match kind {
                    NodeKind::Home => (DisplayType::Home, ChildPolicy::Any),
                    NodeKind::Chats => (DisplayType::Container, ChildPolicy::Only(NodeKind::Chat)),
                    NodeKind::CustomViews => {
                        (DisplayType::Container, ChildPolicy::Only(NodeKind::CustomView))
                    }
                    NodeKind::AutoView | NodeKind::Container => {
                        (DisplayType::Container, ChildPolicy::Any)
                    }
                    NodeKind::Chat => (DisplayType::Chat, ChildPolicy::None),
                    NodeKind::CustomView => (DisplayType::CustomView, ChildPolicy::None),
                    NodeKind::Group => (DisplayType::Group, ChildPolicy::None),
                    NodeKind::Post => (DisplayType::Post, ChildPolicy::None),
                    NodeKind::Member => (DisplayType::Member, ChildPolicy::None),
                    NodeKind::Track => (DisplayType::Track, ChildPolicy::None),
                    NodeKind::FundingRound => (DisplayType::FundingRound, ChildPolicy::None),
                    NodeKind::Members
                    | NodeKind::Setup
                    | NodeKind::AskAndOffer
                    | NodeKind::Events
                    | NodeKind::Projects
                    | NodeKind::Groups
                    | NodeKind::Decisions
                    | NodeKind::Map => (DisplayType::View, ChildPolicy::None),
                };
                (kind.tag(), KindInfo { kind, display, children })
            })
            .collect();

        Self { by_tag }
    }

    /// Resolve a stored tag
    pub fn resolve(&self, tag: &str) -> Result<&KindInfo> {
        self.by_tag
            .get(tag)
            .ok_or_else(|| MenuError::Internal(format!("Unknown node kind '{}'", tag)))
    }

    pub fn info(&self, kind: NodeKind) -> &KindInfo {
        // every NodeKind is registered in build()
        &self.by_tag[kind.tag()]
    }

    /// Display type of a node: its reference decides, then its kind
    pub fn display_type(&self, node: &MenuNode) -> DisplayType {
        match &node.view_reference {
            ViewReference::None => self.info(node.kind).display,
            ViewReference::Group(_) => DisplayType::Group,
            ViewReference::Post(_) => DisplayType::Post,
            ViewReference::SavedView(_) => DisplayType::CustomView,
            ViewReference::Member(_) => DisplayType::Member,
            ViewReference::ChatTopic(_) => DisplayType::Chat,
            ViewReference::Track(_) => DisplayType::Track,
            ViewReference::FundingRound(_) => DisplayType::FundingRound,
        }
    }

    /// Whether `parent` may hold a node of kind `child`
    pub fn accepts_child(&self, parent: NodeKind, child: NodeKind) -> bool {
        if child == NodeKind::Home {
            return false;
        }
        match self.info(parent).children {
            ChildPolicy::Any => true,
            ChildPolicy::Only(kind) => kind == child,
            ChildPolicy::None => false,
        }
    }
}
