//! One-shot menu bootstrap
//!
//! Builds a complete, ordered menu for a group that has content but no menu
//! yet. Every node goes in through [`OrderingEngine::create`], so the result
//! obeys the same rules as a menu assembled by hand.

use serde::Serialize;
use tracing::{debug, info};

use crate::db::legacy_content::LegacyContent;
use crate::db::menu_nodes;
use crate::error::{MenuError, Result};
use crate::menu::{ContentCategory, CreateMenuNodeInput, MenuNode, NodeKind, Placement, ReferenceFields};
use crate::ordering::OrderingEngine;

/// Root system nodes in menu order
pub const ROOT_KINDS: [NodeKind; 6] = [
    NodeKind::Home,
    NodeKind::Chats,
    NodeKind::AutoView,
    NodeKind::Members,
    NodeKind::Setup,
    NodeKind::CustomViews,
];

/// What a bootstrap created
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BootstrapReport {
    pub group_id: String,
    pub root_nodes: Vec<MenuNode>,
    pub pinned_chats: usize,
    pub unpinned_chats: usize,
    pub categories: Vec<ContentCategory>,
    pub custom_views: usize,
}

impl BootstrapReport {
    pub fn total_nodes(&self) -> usize {
        self.root_nodes.len()
            + self.pinned_chats
            + self.unpinned_chats
            + self.categories.len()
            + self.custom_views
    }
}

/// Build the menu of `group_id` from its existing content.
///
/// Fails with `AlreadyBootstrapped` when the group has any menu node.
pub fn bootstrap(
    engine: &mut OrderingEngine<'_>,
    content: &dyn LegacyContent,
    group_id: &str,
) -> Result<BootstrapReport> {
    if menu_nodes::count_group_nodes(engine.conn(), group_id)? > 0 {
        return Err(MenuError::AlreadyBootstrapped(group_id.to_string()));
    }

    let mut root_nodes = Vec::with_capacity(ROOT_KINDS.len());
    for kind in ROOT_KINDS {
        let node = engine.create(
            group_id,
            CreateMenuNodeInput {
                kind,
                placement: Placement::Append,
                is_system_node: true,
                ..Default::default()
            },
        )?;
        root_nodes.push(node);
    }
    let chats_id = root_nodes[1].id.clone();
    let auto_view_id = root_nodes[2].id.clone();
    let custom_views_id = root_nodes[5].id.clone();

    let mut pinned_chats = 0;
    let mut unpinned_chats = 0;
    for topic in content.topics(group_id)? {
        let placement = if topic.is_pinned() {
            pinned_chats += 1;
            Placement::Append
        } else {
            unpinned_chats += 1;
            Placement::Unordered
        };
        engine.create(
            group_id,
            CreateMenuNodeInput {
                kind: NodeKind::Chat,
                parent_id: Some(chats_id.clone()),
                reference: ReferenceFields {
                    chat_topic_id: Some(topic.topic_id),
                    ..Default::default()
                },
                placement,
                title: Some(topic.name),
                ..Default::default()
            },
        )?;
    }
    debug!(group = %group_id, pinned_chats, unpinned_chats, "Bootstrapped chats");

    let mut categories = Vec::new();
    for category in ContentCategory::ALL {
        if !content.has_category(group_id, category)? {
            continue;
        }
        engine.create(
            group_id,
            CreateMenuNodeInput {
                kind: category.kind(),
                parent_id: Some(auto_view_id.clone()),
                placement: Placement::Append,
                is_system_node: true,
                ..Default::default()
            },
        )?;
        categories.push(category);
    }

    let saved_views = content.saved_views(group_id)?;
    let custom_views = saved_views.len();
    for view in saved_views {
        engine.create(
            group_id,
            CreateMenuNodeInput {
                kind: NodeKind::CustomView,
                parent_id: Some(custom_views_id.clone()),
                reference: ReferenceFields {
                    saved_view_id: Some(view.id),
                    ..Default::default()
                },
                placement: Placement::Append,
                title: Some(view.name),
                ..Default::default()
            },
        )?;
    }

    let report = BootstrapReport {
        group_id: group_id.to_string(),
        root_nodes,
        pinned_chats,
        unpinned_chats,
        categories,
        custom_views,
    };
    info!(group = %group_id, nodes = report.total_nodes(), "Bootstrapped group menu");
    Ok(report)
}
