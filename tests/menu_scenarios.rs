//! End-to-end menu operations through MenuService

mod common;

use std::sync::Arc;

use common::*;
use group_menu::services::StaticPermissionGate;
use group_menu::{
    ContentCategory, CreateMenuNodeInput, EventBus, MenuError, MenuEvent, MenuService, NodeKind, Placement,
    ReferenceFields, ReorderRequest, UpdateMenuNodeInput, ViewReference,
};

fn create(svc: &MenuService, kind: NodeKind, parent: Option<&str>, placement: Placement) -> group_menu::MenuNode {
    svc.create_menu_node(
        ADMIN,
        GROUP,
        CreateMenuNodeInput {
            kind,
            parent_id: parent.map(str::to_string),
            placement,
            ..Default::default()
        },
    )
    .unwrap()
}

/// Setup moved in front of chats
fn setup_second(svc: &MenuService) {
    let chats = root_node(svc, NodeKind::Chats);
    let setup = root_node(svc, NodeKind::Setup);
    svc.reorder_menu_node(ADMIN, &setup.id, ReorderRequest::before(&chats.id))
        .unwrap();
}

#[test]
fn test_move_before_earlier_sibling() {
    let svc = bootstrapped_service();
    setup_second(&svc);

    assert_eq!(
        root_layout(&svc),
        vec![
            (NodeKind::Home, Some(1)),
            (NodeKind::Setup, Some(2)),
            (NodeKind::Chats, Some(3)),
            (NodeKind::AutoView, Some(4)),
            (NodeKind::Members, Some(5)),
            (NodeKind::CustomViews, Some(6)),
        ]
    );
    assert_menu_invariants(&svc, GROUP);
}

#[test]
fn test_remove_compacts_scope() {
    let svc = bootstrapped_service();
    setup_second(&svc);
    let map = create(&svc, NodeKind::Map, None, Placement::Append);
    assert_eq!(map.position, Some(7));

    let setup = root_node(&svc, NodeKind::Setup);
    svc.remove_menu_node_from_menu(ADMIN, &setup.id).unwrap();

    assert_eq!(
        root_layout(&svc),
        vec![
            (NodeKind::Home, Some(1)),
            (NodeKind::Chats, Some(2)),
            (NodeKind::AutoView, Some(3)),
            (NodeKind::Members, Some(4)),
            (NodeKind::CustomViews, Some(5)),
            (NodeKind::Map, Some(6)),
            (NodeKind::Setup, None),
        ]
    );
    let setup = svc.get_node(&setup.id).unwrap().unwrap();
    assert_eq!(setup.parent_id, None);
    assert_menu_invariants(&svc, GROUP);
}

#[test]
fn test_reorder_without_placement_appends() {
    let svc = bootstrapped_service();
    let loose = create(&svc, NodeKind::Container, None, Placement::Unordered);
    assert_eq!(loose.position, None);

    svc.reorder_menu_node(ADMIN, &loose.id, ReorderRequest::default())
        .unwrap();
    assert_eq!(svc.get_node(&loose.id).unwrap().unwrap().position, Some(7));
}

#[test]
fn test_reparent_under_empty_parent() {
    let svc = bootstrapped_service();
    let auto_view = root_node(&svc, NodeKind::AutoView);
    // bootstrap put ask-and-offer, events and map here
    let leaf = create(&svc, NodeKind::Container, Some(&auto_view.id), Placement::Append);
    assert_eq!(leaf.position, Some(4));
    let empty = create(&svc, NodeKind::Container, None, Placement::Append);

    let events = svc
        .list_nodes(GROUP)
        .unwrap()
        .into_iter()
        .find(|n| n.kind == NodeKind::Events)
        .unwrap();
    svc.reorder_menu_node(ADMIN, &events.id, ReorderRequest::append_to(Some(&empty.id)))
        .unwrap();

    let moved = svc.get_node(&events.id).unwrap().unwrap();
    assert_eq!(moved.parent_id.as_deref(), Some(empty.id.as_str()));
    assert_eq!(moved.position, Some(1));

    let tree = svc.menu_tree(GROUP).unwrap();
    let auto_entry = tree.roots.iter().find(|e| e.node.id == auto_view.id).unwrap();
    let kinds: Vec<_> = auto_entry
        .children
        .iter()
        .map(|e| (e.node.kind, e.node.position))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (NodeKind::AskAndOffer, Some(1)),
            (NodeKind::Map, Some(2)),
            (NodeKind::Container, Some(3)),
        ]
    );
    assert_menu_invariants(&svc, GROUP);
}

#[test]
fn test_home_keeps_first_place() {
    let svc = bootstrapped_service();
    let home = root_node(&svc, NodeKind::Home);
    let members = root_node(&svc, NodeKind::Members);

    let err = svc
        .reorder_menu_node(ADMIN, &members.id, ReorderRequest::before(&home.id))
        .unwrap_err();
    assert!(matches!(err, MenuError::InvariantViolation(_)));

    let err = svc
        .create_menu_node(
            ADMIN,
            GROUP,
            CreateMenuNodeInput {
                placement: Placement::Before { sibling_id: home.id.clone() },
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, MenuError::InvariantViolation(_)));

    let err = svc.remove_menu_node_from_menu(ADMIN, &home.id).unwrap_err();
    assert!(matches!(err, MenuError::InvariantViolation(_)));

    let err = svc
        .create_menu_node(ADMIN, GROUP, CreateMenuNodeInput { kind: NodeKind::Home, ..Default::default() })
        .unwrap_err();
    assert!(matches!(err, MenuError::InvariantViolation(_)));

    assert_menu_invariants(&svc, GROUP);
}

#[test]
fn test_reference_exclusivity() {
    let svc = bootstrapped_service();
    let err = svc
        .create_menu_node(
            ADMIN,
            GROUP,
            CreateMenuNodeInput {
                kind: NodeKind::Post,
                reference: ReferenceFields {
                    post_id: Some("p1".into()),
                    track_id: Some("t1".into()),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, MenuError::InvalidReference { ref fields } if fields.len() == 2));

    let node = svc
        .create_menu_node(
            ADMIN,
            GROUP,
            CreateMenuNodeInput {
                kind: NodeKind::Post,
                reference: ReferenceFields { post_id: Some("p1".into()), ..Default::default() },
                ..Default::default()
            },
        )
        .unwrap();

    let err = svc
        .update_menu_node(
            ADMIN,
            &node.id,
            UpdateMenuNodeInput {
                title: Some("ignored".into()),
                reference: ReferenceFields {
                    member_id: Some("m1".into()),
                    group_id: Some("g2".into()),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, MenuError::InvalidReference { .. }));
    assert_eq!(svc.get_node(&node.id).unwrap().unwrap(), node);

    let switched = svc
        .update_menu_node(
            ADMIN,
            &node.id,
            UpdateMenuNodeInput {
                reference: ReferenceFields { chat_topic_id: Some("general".into()), ..Default::default() },
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(switched.view_reference, ViewReference::ChatTopic("general".into()));
}

#[test]
fn test_detach_is_idempotent() {
    let svc = bootstrapped_service();
    let members = root_node(&svc, NodeKind::Members);

    svc.remove_menu_node_from_menu(ADMIN, &members.id).unwrap();
    let once = svc.list_nodes(GROUP).unwrap();
    svc.remove_menu_node_from_menu(ADMIN, &members.id).unwrap();
    let twice = svc.list_nodes(GROUP).unwrap();

    assert_eq!(once, twice);
    assert_menu_invariants(&svc, GROUP);
}

#[test]
fn test_platform_hooks_respect_admin_placement() {
    let svc = bootstrapped_service();
    let count = |kind: NodeKind| {
        svc.list_nodes(GROUP)
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == kind)
            .count()
    };
    let find = |kind: NodeKind| {
        svc.list_nodes(GROUP)
            .unwrap()
            .into_iter()
            .find(|n| n.kind == kind)
            .unwrap()
    };

    // events moved to the root stays there, no second events node appears
    let events = find(NodeKind::Events);
    svc.reorder_menu_node(ADMIN, &events.id, ReorderRequest::append_to(None))
        .unwrap();
    assert!(svc.surface_category(GROUP, ContentCategory::Events).unwrap().is_none());
    assert_eq!(count(NodeKind::Events), 1);
    assert_eq!(find(NodeKind::Events).parent_id, None);

    // a detached map stays detached
    let map = find(NodeKind::Map);
    svc.remove_menu_node_from_menu(ADMIN, &map.id).unwrap();
    assert!(svc.surface_category(GROUP, ContentCategory::Map).unwrap().is_none());
    assert_eq!(find(NodeKind::Map).position, None);

    // categories never shown before still surface
    let projects = svc
        .surface_category(GROUP, ContentCategory::Projects)
        .unwrap()
        .unwrap();
    assert_eq!(projects.position, Some(2));

    // bootstrap already linked v1
    assert!(svc.surface_saved_view(GROUP, "v1").unwrap().is_none());
    assert_eq!(count(NodeKind::CustomView), 1);
    assert_menu_invariants(&svc, GROUP);
}

#[test]
fn test_system_nodes_cannot_be_deleted() {
    let db = seeded_db();
    let svc = MenuService::new(db, Arc::new(StaticPermissionGate::allow_all()), Arc::new(EventBus::new()));
    svc.bootstrap_menu("anyone", GROUP).unwrap();

    for node in svc.list_nodes(GROUP).unwrap().into_iter().filter(|n| n.is_system_node) {
        let err = svc.delete_menu_node("anyone", &node.id).unwrap_err();
        assert!(matches!(err, MenuError::SystemNodeProtected(_)), "{} was deletable", node.kind);
    }
}

#[test]
fn test_delete_moves_children_up() {
    let svc = bootstrapped_service();
    let folder = create(&svc, NodeKind::Container, None, Placement::Append);
    let inner = create(&svc, NodeKind::Container, Some(&folder.id), Placement::Append);
    let tail = create(&svc, NodeKind::Container, None, Placement::Append);

    let result = svc.delete_menu_node(ADMIN, &folder.id).unwrap();
    assert!(result.success);
    assert!(svc.get_node(&folder.id).unwrap().is_none());

    let inner = svc.get_node(&inner.id).unwrap().unwrap();
    assert_eq!(inner.parent_id, None);
    assert_eq!(inner.position, Some(7));
    assert_eq!(svc.get_node(&tail.id).unwrap().unwrap().position, Some(8));
    assert_menu_invariants(&svc, GROUP);
}

#[test]
fn test_permission_gate_runs_first() {
    let svc = bootstrapped_service();
    let before = svc.list_nodes(GROUP).unwrap();
    let members = root_node(&svc, NodeKind::Members);

    let denied = |err: MenuError| matches!(err, MenuError::PermissionDenied { .. });
    assert!(denied(
        svc.create_menu_node("bob", GROUP, CreateMenuNodeInput::default()).unwrap_err()
    ));
    assert!(denied(
        svc.reorder_menu_node("bob", &members.id, ReorderRequest::default()).unwrap_err()
    ));
    assert!(denied(svc.remove_menu_node_from_menu("bob", &members.id).unwrap_err()));
    assert!(denied(svc.delete_menu_node("bob", &members.id).unwrap_err()));
    assert!(denied(
        svc.update_menu_node("bob", &members.id, UpdateMenuNodeInput::default()).unwrap_err()
    ));
    assert!(denied(
        svc.set_home_reference("bob", GROUP, ViewReference::Post("p1".into())).unwrap_err()
    ));
    assert!(denied(svc.bootstrap_menu("bob", GROUP).unwrap_err()));

    assert_eq!(svc.list_nodes(GROUP).unwrap(), before);
}

#[test]
fn test_cycle_and_scope_errors() {
    let svc = bootstrapped_service();
    let outer = create(&svc, NodeKind::Container, None, Placement::Append);
    let inner = create(&svc, NodeKind::Container, Some(&outer.id), Placement::Append);

    let err = svc
        .reorder_menu_node(ADMIN, &outer.id, ReorderRequest::append_to(Some(&inner.id)))
        .unwrap_err();
    assert!(matches!(err, MenuError::CycleDetected(_)));

    let err = svc
        .reorder_menu_node(ADMIN, &outer.id, ReorderRequest::append_to(Some("missing")))
        .unwrap_err();
    assert!(matches!(err, MenuError::ScopeNotFound(_)));

    let chats = root_node(&svc, NodeKind::Chats);
    let err = svc
        .reorder_menu_node(
            ADMIN,
            &outer.id,
            ReorderRequest {
                parent_id: Some(chats.id.clone()),
                insert_before_id: Some(root_node(&svc, NodeKind::Setup).id),
                append_to_end: false,
            },
        )
        .unwrap_err();
    assert!(matches!(err, MenuError::InvalidInput(_)));
}

#[test]
fn test_home_reference() {
    let svc = bootstrapped_service();
    let home = svc
        .set_home_reference(ADMIN, GROUP, ViewReference::SavedView("v1".into()))
        .unwrap();
    assert_eq!(home.view_reference, ViewReference::SavedView("v1".into()));
    assert_eq!(home.position, Some(1));

    let err = svc.set_home_reference(ADMIN, GROUP, ViewReference::None).unwrap_err();
    assert!(matches!(err, MenuError::InvalidReference { .. }));
}

#[tokio::test]
async fn test_events_follow_commits() {
    let events = Arc::new(EventBus::new());
    let mut receiver = events.subscribe();
    let gate = StaticPermissionGate::deny_all().with_admin(ADMIN, GROUP);
    let svc = MenuService::new(seeded_db(), Arc::new(gate), events.clone());

    svc.bootstrap_menu(ADMIN, GROUP).unwrap();
    assert!(svc.bootstrap_menu(ADMIN, GROUP).is_err());
    let members = root_node(&svc, NodeKind::Members);
    svc.remove_menu_node_from_menu(ADMIN, &members.id).unwrap();

    match receiver.recv().await.unwrap() {
        MenuEvent::MenuBootstrapped { group_id, node_count } => {
            assert_eq!(group_id, GROUP);
            assert_eq!(node_count, 6 + 2 + 3 + 1);
        }
        other => panic!("unexpected event {:?}", other),
    }
    // the failed second bootstrap emitted nothing
    assert!(matches!(
        receiver.recv().await.unwrap(),
        MenuEvent::NodeRemovedFromMenu { ref id, .. } if *id == members.id
    ));
}
