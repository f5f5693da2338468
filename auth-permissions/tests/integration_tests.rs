//! Integration tests for role masks + ownership
//!
//! These tests walk through the permission scenarios of the platform:
//! 1. Owner removes their own packet
//! 2. Registered stranger is refused with NotOwner
//! 3. Reduced role mask (save|find) cannot update
//! 4. Inactive owner is refused before anything else
//! 5. Administrator bypasses ownership but not activation
//! 6. Find-all returns only the caller's entities
//! 7. Field CRUD is gated on the packet's fields_management
//! 8. Broken ownership chains surface as integrity errors

use auth_permissions::*;
use error_common::{CodedError, ErrorCategory};
use std::sync::Arc;

// Helper to create test context with the built-in policy seeded
fn create_test_context() -> Arc<PermissionContext> {
    PermissionContext::bootstrap(&PermissionsConfig::default()).unwrap()
}

fn registered_user(context: &PermissionContext, id: u64) -> Principal {
    let mut principal = Principal::new(id);
    context.catalog.activate_principal(&mut principal).unwrap();
    principal
}

struct Tree {
    project: Arc<Project>,
    device: Arc<Device>,
    packet: Arc<Packet>,
}

fn tree_owned_by(owner: &Principal, base: u64) -> Tree {
    let project = Arc::new(Project::new(base, "smart-farm", owner.id));
    let device = Arc::new(Device::new(base + 1, "weather-station", &project));
    let packet = Arc::new(Packet::new(base + 2, "readings", &device));
    Tree {
        project,
        device,
        packet,
    }
}

#[test]
fn test_example_1_owner_removes_packet() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let tree = tree_owned_by(&u, 100);

    let decision = context
        .engine
        .authorize(
            &u,
            &ResourceType::packet(),
            &CrudAction::Remove.name(),
            Some(&Entity::Packet(tree.packet)),
        )
        .unwrap();
    assert_eq!(decision, Decision::Allow, "U owns P1 and holds mask 63");

    println!("✅ Example 1 PASSED: Owner may remove their packet");
}

#[test]
fn test_example_2_stranger_is_not_owner() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let v = registered_user(&context, 2);
    let tree = tree_owned_by(&u, 100);
    let packet = Entity::Packet(tree.packet);

    for action in CrudAction::ALL {
        let decision = context
            .engine
            .authorize(&v, &ResourceType::packet(), &action.name(), Some(&packet))
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::NotOwner));
    }

    // Without a target V still holds the coarse permission
    let decision = context
        .engine
        .authorize(&v, &ResourceType::packet(), &CrudAction::FindAll.name(), None)
        .unwrap();
    assert!(decision.is_allowed());

    println!("✅ Example 2 PASSED: Stranger is refused with NotOwner");
}

#[test]
fn test_example_3_reduced_mask_cannot_update() {
    let context = create_test_context();
    let writers = RoleName::new("packet-writers");
    context
        .catalog
        .create_role(&writers, "may only save and read packets")
        .unwrap();
    let mask = context
        .catalog
        .grant(
            &writers,
            &ResourceType::packet(),
            &[CrudAction::Save.name(), CrudAction::Find.name()],
        )
        .unwrap();
    assert_eq!(mask, 9);

    let principal = Principal::new(5).active().with_role(&writers);
    let tree = tree_owned_by(&principal, 200);
    let packet = Entity::Packet(tree.packet);

    let update = context
        .engine
        .authorize(&principal, &ResourceType::packet(), &CrudAction::Update.name(), Some(&packet))
        .unwrap();
    assert_eq!(update, Decision::Deny(DenyReason::MissingPermission));

    let find = context
        .engine
        .authorize(&principal, &ResourceType::packet(), &CrudAction::Find.name(), Some(&packet))
        .unwrap();
    assert_eq!(find, Decision::Allow);

    println!("✅ Example 3 PASSED: Mask 9 denies update with MissingPermission");
}

#[test]
fn test_example_4_inactive_owner_refused() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let tree = tree_owned_by(&u, 100);
    let deactivated = u.inactive();

    let decision = context
        .engine
        .authorize(
            &deactivated,
            &ResourceType::project(),
            &CrudAction::Find.name(),
            Some(&Entity::Project(tree.project)),
        )
        .unwrap();
    assert_eq!(decision, Decision::Deny(DenyReason::Inactive));
    assert_eq!(
        DenyReason::Inactive.code(),
        error_common::codes::authorization::ACCOUNT_INACTIVE
    );
    assert!(context.engine.allowed_actions(&deactivated, &ResourceType::project()).is_empty());

    println!("✅ Example 4 PASSED: Inactive owner refused");
}

#[test]
fn test_example_5_admin_bypasses_ownership() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let admin = Principal::admin(99);
    let tree = tree_owned_by(&u, 100);

    for entity in [
        Entity::Project(tree.project.clone()),
        Entity::Device(tree.device.clone()),
        Entity::Packet(tree.packet.clone()),
    ] {
        let decision = context
            .engine
            .authorize(&admin, &entity.resource_type(), &CrudAction::Remove.name(), Some(&entity))
            .unwrap();
        assert!(decision.is_allowed());
    }
    assert!(context.engine.authorize_administration(&admin).unwrap().is_allowed());

    let dormant_admin = Principal::admin(98).inactive();
    let decision = context
        .engine
        .authorize(&dormant_admin, &ResourceType::device(), &CrudAction::Find.name(), None)
        .unwrap();
    assert_eq!(decision, Decision::Deny(DenyReason::Inactive));

    println!("✅ Example 5 PASSED: Admin bypasses ownership, not activation");
}

#[test]
fn test_example_6_find_all_returns_own_entities() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let v = registered_user(&context, 2);
    let mine = tree_owned_by(&u, 100);
    let theirs = tree_owned_by(&v, 200);
    let devices = vec![
        Entity::Device(mine.device.clone()),
        Entity::Device(theirs.device.clone()),
    ];

    let visible = context
        .engine
        .filter_visible(&u, &ResourceType::device(), devices.clone())
        .unwrap();
    assert_eq!(visible, vec![Entity::Device(mine.device)]);

    let everything = context
        .engine
        .filter_visible(&Principal::admin(9), &ResourceType::device(), devices.clone())
        .unwrap();
    assert_eq!(everything.len(), 2);

    let nothing = context
        .engine
        .filter_visible(&u.clone().inactive(), &ResourceType::device(), devices)
        .unwrap();
    assert!(nothing.is_empty());

    println!("✅ Example 6 PASSED: Find-all filtered by owner");
}

#[test]
fn test_example_7_field_management_via_packet() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let v = registered_user(&context, 2);
    let tree = tree_owned_by(&u, 100);
    let parent = Field::new(110, "position", &tree.packet);
    let inner = Arc::new(Field::new(111, "latitude", &tree.packet).inner(parent.id));

    for action in CrudAction::ALL {
        assert_eq!(
            context
                .engine
                .authorize_field_management(&u, &action.name(), &inner)
                .unwrap(),
            Decision::Allow
        );
    }
    assert_eq!(
        context
            .engine
            .authorize_field_management(&v, &CrudAction::Remove.name(), &inner)
            .unwrap(),
        Decision::Deny(DenyReason::NotOwner)
    );

    // Dropping fields_management from the default role closes field CRUD
    let role = context.catalog.default_role_name().clone();
    context
        .catalog
        .revoke(
            &role,
            &ResourceType::packet(),
            &[ActionName::new(action_names::FIELDS_MANAGEMENT)],
        )
        .unwrap();
    assert_eq!(
        context
            .engine
            .authorize_field_management(&u, &CrudAction::Save.name(), &inner)
            .unwrap(),
        Decision::Deny(DenyReason::MissingPermission)
    );

    println!("✅ Example 7 PASSED: Field CRUD gated on packet fields_management");
}

#[test]
fn test_example_8_detached_chain_is_integrity_error() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let orphan = Arc::new(Device {
        id: 301,
        name: "unassigned-gateway".to_string(),
        project: None,
    });
    let packet = Entity::from(Packet::new(302, "heartbeat", &orphan));

    for principal in [u, Principal::admin(99)] {
        let err = context
            .engine
            .authorize(&principal, &ResourceType::packet(), &CrudAction::Find.name(), Some(&packet))
            .unwrap_err();
        assert!(matches!(err, PermissionError::DetachedEntity { .. }));
        assert_eq!(err.category(), ErrorCategory::Integrity);
        assert!(err.is_server_fault());
    }

    println!("✅ Example 8 PASSED: Detached entity surfaced distinctly");
}

#[test]
fn test_batch_authorize_keeps_each_outcome() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let tree = tree_owned_by(&u, 100);

    let requests = vec![
        AuthorizationRequest::new(ResourceType::packet(), CrudAction::Update.name())
            .on(Entity::Packet(tree.packet.clone())),
        AuthorizationRequest::new(ResourceType::permission(), CrudAction::Find.name()),
        AuthorizationRequest::new(ResourceType::packet(), ActionName::new("teleport")),
    ];

    let results = context.engine.batch_authorize(&u, &requests);
    assert_eq!(results.len(), 3);
    assert!(matches!(results.first(), Some(Ok(Decision::Allow))));
    assert!(matches!(
        results.get(1),
        Some(Ok(Decision::Deny(DenyReason::MissingPermission)))
    ));
    assert!(matches!(
        results.get(2),
        Some(Err(PermissionError::UnknownAction { .. }))
    ));
}

#[test]
fn test_save_of_new_entity_resolves_through_parent() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let v = registered_user(&context, 2);
    let tree = tree_owned_by(&u, 100);
    let draft = Entity::from(Packet::new(999, "draft", &tree.device));

    let owner = context
        .engine
        .authorize(&u, &ResourceType::packet(), &CrudAction::Save.name(), Some(&draft))
        .unwrap();
    let stranger = context
        .engine
        .authorize(&v, &ResourceType::packet(), &CrudAction::Save.name(), Some(&draft))
        .unwrap();

    assert_eq!(owner, Decision::Allow);
    assert_eq!(stranger, Decision::Deny(DenyReason::NotOwner));
}
