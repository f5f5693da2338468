//! Cascade authorization against the in-memory store and a mocked store

use async_trait::async_trait;
use auth_permissions::*;
use mockall::mock;
use std::sync::Arc;

mock! {
    pub Store {}

    #[async_trait]
    impl EntityStore for Store {
        async fn load_entity(&self, resource_type: &ResourceType, id: EntityId) -> Result<Entity>;
        async fn load_children(&self, entity: &Entity) -> Result<Vec<Entity>>;
    }
}

fn create_test_context() -> Arc<PermissionContext> {
    PermissionContext::bootstrap(&PermissionsConfig::default()).unwrap()
}

fn registered_user(context: &PermissionContext, id: u64) -> Principal {
    let mut principal = Principal::new(id);
    context.catalog.activate_principal(&mut principal).unwrap();
    principal
}

/// Pr → D → P1 → {F1, F2}, with F3 nested under F1
fn populate(store: &InMemoryEntityStore, owner: PrincipalId) -> Entity {
    let project = Arc::new(Project::new(1, "Pr", owner));
    let device = Arc::new(Device::new(2, "D", &project));
    let packet = Arc::new(Packet::new(3, "P1", &device));
    store.save_project(&project);
    store.save_device(&device).unwrap();
    store.save_packet(&packet).unwrap();
    store.save_field(&Field::new(4, "F1", &packet)).unwrap();
    store.save_field(&Field::new(5, "F2", &packet)).unwrap();
    store.save_field(&Field::new(6, "F3", &packet).inner(4)).unwrap();
    Entity::Project(project)
}

fn refs(plan: &CascadePlan) -> Vec<String> {
    plan.nodes.iter().map(ToString::to_string).collect()
}

#[test]
fn test_cascade_delete_owner_and_stranger() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let v = registered_user(&context, 2);

    let project = Arc::new(Project::new(1, "Pr", u.id));
    let device = Arc::new(Device::new(2, "D", &project));
    let packet = Arc::new(Packet::new(3, "P1", &device));
    let root = Entity::Project(Arc::clone(&project));
    let children = vec![
        Entity::Device(Arc::clone(&device)),
        Entity::Packet(Arc::clone(&packet)),
        Entity::from(Field::new(4, "F1", &packet)),
        Entity::from(Field::new(5, "F2", &packet)),
    ];
    let remove = CrudAction::Remove.name();

    let allowed = context
        .cascade
        .authorize_cascade(&u, &remove, &root, children.clone())
        .unwrap();
    let plan = allowed.plan().unwrap();
    assert_eq!(
        refs(plan),
        vec!["Project#1", "Device#2", "Packet#3", "Field#4", "Field#5"]
    );

    let denied = context
        .cascade
        .authorize_cascade(&v, &remove, &root, children)
        .unwrap();
    assert_eq!(
        denied,
        CascadeDecision::Deny(CascadeDenial {
            node: EntityRef::new(ResourceType::project(), 1),
            reason: DenyReason::NotOwner,
        })
    );

    println!("✅ Cascade delete allowed for owner, denied at root for stranger");
}

#[tokio::test]
async fn test_subtree_is_breadth_first_and_removal_follows_plan() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let store = InMemoryEntityStore::new();
    let root = populate(&store, u.id);
    let remove = CrudAction::Remove.name();

    let decision = context
        .cascade
        .authorize_subtree(&store, &u, &remove, &root)
        .await
        .unwrap();
    let plan = decision.plan().unwrap().clone();
    assert_eq!(
        refs(&plan),
        vec![
            "Project#1", "Device#2", "Packet#3", "Field#4", "Field#5", "Field#6"
        ]
    );

    assert_eq!(store.apply_removal(&plan), 6);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_denied_subtree_leaves_store_untouched() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let store = InMemoryEntityStore::new();
    let root = populate(&store, u.id);

    // Field removal revoked: the pass fails at the first field
    context
        .catalog
        .revoke(
            context.catalog.default_role_name(),
            &ResourceType::field(),
            &[CrudAction::Remove.name()],
        )
        .unwrap();

    let decision = context
        .cascade
        .authorize_subtree(&store, &u, &CrudAction::Remove.name(), &root)
        .await
        .unwrap();
    assert_eq!(
        decision.denial().map(|d| (d.node.to_string(), d.reason)),
        Some(("Field#4".to_string(), DenyReason::MissingPermission))
    );
    assert_eq!(store.len(), 6);
}

#[tokio::test]
async fn test_denied_root_never_loads_children() {
    let context = create_test_context();
    let v = registered_user(&context, 2);
    let root = Entity::from(Project::new(1, "Pr", PrincipalId(1)));

    let mut store = MockStore::new();
    store.expect_load_children().times(0);
    store.expect_load_entity().times(0);

    let decision = context
        .cascade
        .authorize_subtree(&store, &v, &CrudAction::Remove.name(), &root)
        .await
        .unwrap();
    assert!(!decision.is_allowed());
}

#[tokio::test]
async fn test_children_loaded_once_per_allowed_node() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let project = Arc::new(Project::new(1, "Pr", u.id));
    let device = Entity::from(Device::new(2, "D", &project));
    let root = Entity::Project(project);

    let mut store = MockStore::new();
    let children = vec![device];
    store
        .expect_load_children()
        .withf(|entity| entity.resource_type() == ResourceType::project())
        .times(1)
        .returning(move |_| Ok(children.clone()));
    store
        .expect_load_children()
        .withf(|entity| entity.resource_type() == ResourceType::device())
        .times(1)
        .returning(|_| Ok(Vec::new()));

    let decision = context
        .cascade
        .authorize_subtree(&store, &u, &CrudAction::Remove.name(), &root)
        .await
        .unwrap();
    assert_eq!(decision.plan().map(CascadePlan::len), Some(2));
}

#[tokio::test]
async fn test_reparenting_rejected_at_write_boundary() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let store = InMemoryEntityStore::new();
    populate(&store, u.id);

    let elsewhere = Arc::new(Project::new(50, "other", u.id));
    store.save_project(&elsewhere);
    let err = store
        .save_device(&Device::new(2, "D", &elsewhere))
        .unwrap_err();
    assert!(matches!(err, PermissionError::Reparenting { from: Some(1), to: Some(50), .. }));

    // The device still resolves to its original project
    let device = store.load_entity(&ResourceType::device(), 2).await.unwrap();
    let chain = context.engine.resolver().ownership_chain(&device).unwrap();
    assert_eq!(chain.last(), Some(&EntityRef::new(ResourceType::project(), 1)));
}

#[test]
fn test_detached_descendant_aborts_cascade() {
    let context = create_test_context();
    let u = registered_user(&context, 1);
    let root = Entity::from(Project::new(1, "Pr", u.id));
    let detached = Entity::from(Device {
        id: 8,
        name: "detached".to_string(),
        project: None,
    });

    let err = context
        .cascade
        .authorize_cascade(&u, &CrudAction::Remove.name(), &root, vec![detached])
        .unwrap_err();
    assert!(matches!(
        err,
        PermissionError::DetachedEntity { missing: "project", .. }
    ));
}
