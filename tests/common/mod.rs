//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use group_menu::db::legacy_content::{self, LegacyImport};
use group_menu::services::StaticPermissionGate;
use group_menu::{EventBus, MenuDb, MenuNode, MenuService, NodeKind};

pub const GROUP: &str = "g1";
pub const ADMIN: &str = "alice";

/// A group with a chat topic, an offer, an event and a saved view
pub fn garden_import() -> LegacyImport {
    serde_json::from_value(serde_json::json!({
        "groups": [{ "id": GROUP, "name": "Garden" }],
        "topics": [
            { "group_id": GROUP, "topic_id": "general", "name": "general", "visibility": 2 },
            { "group_id": GROUP, "topic_id": "seeds", "name": "seeds", "visibility": 1 }
        ],
        "posts": [
            { "group_id": GROUP, "post_id": "p1", "post_type": "offer" },
            { "group_id": GROUP, "post_id": "p2", "post_type": "event", "has_location": true }
        ],
        "saved_views": [
            { "id": "v1", "group_id": GROUP, "name": "Open tasks", "sort_order": 1 }
        ]
    }))
    .unwrap()
}

pub fn seeded_db() -> Arc<MenuDb> {
    let db = Arc::new(MenuDb::open_in_memory().unwrap());
    db.with_tx(|tx| legacy_content::import_legacy(tx, &garden_import()))
        .unwrap();
    db
}

/// Service where only `ADMIN` administers `GROUP`
pub fn admin_service() -> MenuService {
    let gate = StaticPermissionGate::deny_all().with_admin(ADMIN, GROUP);
    MenuService::new(seeded_db(), Arc::new(gate), Arc::new(EventBus::new()))
}

/// Admin service with the group's menu already bootstrapped
pub fn bootstrapped_service() -> MenuService {
    let svc = admin_service();
    svc.bootstrap_menu(ADMIN, GROUP).unwrap();
    svc
}

pub fn root_node(svc: &MenuService, kind: NodeKind) -> MenuNode {
    svc.list_nodes(GROUP)
        .unwrap()
        .into_iter()
        .find(|n| n.kind == kind && n.parent_id.is_none())
        .unwrap_or_else(|| panic!("no root {} node", kind))
}

/// Root scope as (kind, position), ordered nodes first
pub fn root_layout(svc: &MenuService) -> Vec<(NodeKind, Option<u32>)> {
    svc.list_nodes(GROUP)
        .unwrap()
        .into_iter()
        .filter(|n| n.parent_id.is_none())
        .map(|n| (n.kind, n.position))
        .collect()
}

/// Assert contiguity in every scope and home at root position 1
pub fn assert_menu_invariants(svc: &MenuService, group_id: &str) {
    let nodes = svc.list_nodes(group_id).unwrap();

    let mut scopes: BTreeMap<Option<String>, Vec<u32>> = BTreeMap::new();
    for node in &nodes {
        if let Some(position) = node.position {
            scopes.entry(node.parent_id.clone()).or_default().push(position);
        }
    }
    for (parent, mut positions) in scopes {
        positions.sort_unstable();
        let expected: Vec<u32> = (1..=positions.len() as u32).collect();
        assert_eq!(positions, expected, "scope {:?} is not contiguous", parent);
    }

    let homes: Vec<_> = nodes.iter().filter(|n| n.is_home()).collect();
    assert!(homes.len() <= 1, "more than one home node");
    if let Some(home) = homes.first() {
        assert_eq!(home.parent_id, None);
        assert_eq!(home.position, Some(1));
    }
}
