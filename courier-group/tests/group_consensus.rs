//! End-to-end group scenarios: one client's view of a group, driven
//! through the manager surface with faked collaborators.

use std::sync::Arc;
use std::time::Duration;

use courier_archive::Archivist;
use courier_checker::EntityChecker;
use courier_core::{
    AccountStore, CheckerConfig, Document, DocumentType, EntityId, Messenger, SignatureVerifier,
    Signer,
};
use courier_group::{GroupAdminManager, GroupDelegate, GroupEmitter, GroupManager};
use courier_test_utils::{
    bulletin_fixture, fake_signature, key_for_name, manual_clock, memory_store, user_fixture,
    ClockHandle, FakeSigner, FakeVerifier, MemoryAccountStore, RecordingMessenger, SentEvent,
};

struct Harness {
    manager: GroupManager,
    admin: GroupAdminManager,
    delegate: Arc<GroupDelegate>,
    store: Arc<MemoryAccountStore>,
    messenger: Arc<RecordingMessenger>,
    clock: ClockHandle,
}

/// A full client stack with `local` as the current user.
fn harness(local: &str) -> Harness {
    let (clock, handle) = manual_clock();
    let store = memory_store();
    let messenger = Arc::new(RecordingMessenger::new());
    let checker = Arc::new(EntityChecker::new(
        CheckerConfig::default(),
        Arc::clone(&store) as Arc<dyn AccountStore>,
        Arc::clone(&messenger) as Arc<dyn Messenger>,
        clock,
    ));
    let archivist = Arc::new(Archivist::new(
        Arc::clone(&store) as Arc<dyn AccountStore>,
        Arc::new(FakeVerifier) as Arc<dyn SignatureVerifier>,
        checker,
    ));
    let delegate = Arc::new(GroupDelegate::new(archivist));
    let emitter = Arc::new(GroupEmitter::new(
        Arc::clone(&delegate),
        Arc::clone(&messenger) as Arc<dyn Messenger>,
    ));
    let signer = Arc::new(FakeSigner) as Arc<dyn Signer>;
    let manager = GroupManager::new(
        Arc::clone(&delegate),
        Arc::clone(&emitter),
        Arc::clone(&signer),
    );
    let admin = GroupAdminManager::new(Arc::clone(&delegate), emitter, signer);

    let (me, meta) = user_fixture(local);
    store.save_meta(&meta, &me).unwrap();
    store.add_local_user(me);

    Harness {
        manager,
        admin,
        delegate,
        store,
        messenger,
        clock: handle,
    }
}

/// Install the shared "club" fixture into the harness store: founder,
/// alice and bob with trusted metas, the founder-signed bulletin, and
/// the member list.
fn seed_club(h: &Harness) -> (EntityId, Vec<EntityId>) {
    let (group, members, bulletin) = bulletin_fixture("club", &["founder", "alice", "bob"]);
    for name in ["founder", "alice", "bob"] {
        let (id, meta) = user_fixture(name);
        h.store.save_meta(&meta, &id).unwrap();
    }
    h.store.save_document(&bulletin).unwrap();
    h.store.save_members(&members, &group).unwrap();
    (group, members)
}

fn uid(name: &str) -> EntityId {
    user_fixture(name).0
}

#[test]
fn test_create_group_end_to_end() {
    let h = harness("founder");
    let alice = uid("alice");
    let bob = uid("bob");

    let group = h
        .manager
        .create_group(&[alice.clone(), bob.clone()])
        .expect("group created");
    assert!(group.is_group());

    let members = h.delegate.members(&group);
    assert_eq!(members.len(), 3);
    assert_eq!(members[0], uid("founder"), "creator heads the list");
    assert!(members.contains(&alice) && members.contains(&bob));

    assert!(h.delegate.is_founder(&uid("founder"), &group));
    assert!(h.delegate.is_owner(&uid("founder"), &group));
    assert!(
        h.delegate.bulletin(&group).is_some(),
        "initial bulletin admitted"
    );

    let broadcasts = h
        .messenger
        .sent_of(|e| matches!(e, SentEvent::Broadcast(_, to) if to.len() == 3));
    assert_eq!(broadcasts, 1, "bulletin pushed to all members");
}

#[test]
fn test_create_group_requires_two_members() {
    let h = harness("founder");
    assert!(h.manager.create_group(&[uid("alice")]).is_none());
    assert!(h.manager.create_group(&[]).is_none());
}

#[test]
fn test_member_invites_new_peer() {
    let h = harness("alice");
    let (group, _) = seed_club(&h);
    let carol = uid("carol");

    h.clock.advance(Duration::from_secs(5));
    assert!(h.manager.invite_group_members(&[carol.clone()], &group));
    let members = h.delegate.members(&group);
    assert_eq!(members.len(), 4);
    assert!(members.contains(&carol));

    // inviting an existing member hits nobody
    h.clock.advance(Duration::from_secs(5));
    assert!(!h.manager.invite_group_members(&[uid("bob")], &group));
}

#[test]
fn test_outsider_cannot_invite() {
    let h = harness("mallory");
    let (group, members) = seed_club(&h);

    assert!(!h.manager.invite_group_members(&[uid("carol")], &group));
    assert_eq!(h.delegate.members(&group), members, "membership untouched");
}

#[test]
fn test_stale_history_time_blocks_second_update() {
    let h = harness("alice");
    let (group, _) = seed_club(&h);

    h.clock.advance(Duration::from_secs(5));
    assert!(h.manager.invite_group_members(&[uid("carol")], &group));

    // the clock has not moved, so the next update is not strictly newer
    assert!(!h.manager.invite_group_members(&[uid("dave")], &group));

    h.clock.advance(Duration::from_secs(1));
    assert!(h.manager.invite_group_members(&[uid("dave")], &group));
}

#[test]
fn test_owner_expels_plain_member() {
    let h = harness("founder");
    let (group, _) = seed_club(&h);

    h.clock.advance(Duration::from_secs(5));
    assert!(h.manager.expel_group_members(&[uid("bob")], &group));
    let members = h.delegate.members(&group);
    assert_eq!(members.len(), 2);
    assert!(!members.contains(&uid("bob")));

    // expelling someone who is not a member hits nobody
    h.clock.advance(Duration::from_secs(5));
    assert!(!h.manager.expel_group_members(&[uid("carol")], &group));
}

#[test]
fn test_expel_refuses_authority_targets() {
    let h = harness("founder");
    let (group, _) = seed_club(&h);
    h.store
        .save_administrators(&[uid("alice")], &group)
        .unwrap();

    h.clock.advance(Duration::from_secs(5));
    assert!(
        !h.manager.expel_group_members(&[uid("alice")], &group),
        "administrators cannot be expelled"
    );
    assert!(
        !h.manager.expel_group_members(&[uid("founder")], &group),
        "the owner cannot be expelled"
    );
    assert_eq!(h.delegate.members(&group).len(), 3);
}

#[test]
fn test_admin_resets_members_owner_kept_at_head() {
    let h = harness("alice");
    let (group, _) = seed_club(&h);
    h.store
        .save_administrators(&[uid("alice")], &group)
        .unwrap();

    h.clock.advance(Duration::from_secs(5));
    assert!(h
        .manager
        .reset_group_members(&[uid("alice"), uid("carol")], &group));
    let members = h.delegate.members(&group);
    assert_eq!(members[0], uid("founder"), "owner always heads the list");
    assert_eq!(members.len(), 3);
    assert!(members.contains(&uid("carol")));
    assert!(!members.contains(&uid("bob")));
}

#[test]
fn test_plain_member_cannot_reset() {
    let h = harness("bob");
    let (group, members) = seed_club(&h);

    h.clock.advance(Duration::from_secs(5));
    assert!(!h.manager.reset_group_members(&[uid("bob")], &group));
    assert_eq!(h.delegate.members(&group), members);
}

#[test]
fn test_member_quits_locally() {
    let h = harness("bob");
    let (group, _) = seed_club(&h);

    assert!(h.manager.quit_group(&group));
    assert!(!h.delegate.is_member(&uid("bob"), &group));

    // already gone
    assert!(!h.manager.quit_group(&group));
}

#[test]
fn test_owner_and_admin_cannot_quit() {
    let h = harness("founder");
    let (group, _) = seed_club(&h);
    assert!(!h.manager.quit_group(&group), "owner must hand off first");

    let h2 = harness("alice");
    let (group2, _) = seed_club(&h2);
    h2.store
        .save_administrators(&[uid("alice")], &group2)
        .unwrap();
    assert!(!h2.manager.quit_group(&group2));
    assert!(h2.delegate.is_member(&uid("alice"), &group2));
}

#[test]
fn test_owner_appoints_administrators() {
    let h = harness("founder");
    let (group, _) = seed_club(&h);

    h.clock.advance(Duration::from_secs(5));
    assert!(h.admin.update_administrators(&[uid("alice")], &group));

    assert_eq!(h.delegate.administrators(&group), vec![uid("alice")]);
    let bulletin = h.delegate.bulletin(&group).expect("new bulletin accepted");
    assert_eq!(bulletin.administrators(), vec![uid("alice")]);
    assert_eq!(bulletin.name(), Some("club"), "old properties carried over");

    let broadcasts = h
        .messenger
        .sent_of(|e| matches!(e, SentEvent::Broadcast(doc, _) if !doc.administrators().is_empty()));
    assert_eq!(broadcasts, 1);
}

#[test]
fn test_failed_update_claims_no_history_time() {
    let h = harness("founder");
    let (group, _) = seed_club(&h);

    // rewind to the seeded bulletin's signing time: the new bulletin is
    // not strictly newer, so the archive rejects it after the authority
    // checks pass
    h.clock.set(h.clock.at(100));
    assert!(!h.admin.update_administrators(&[uid("alice")], &group));
    assert!(h.delegate.administrators(&group).is_empty());
    assert_eq!(
        h.delegate.checker().last_history_time(&group),
        None,
        "failure must leave no history-time claim behind"
    );

    // nothing was claimed, so the identical request goes through once
    // the staleness is resolved
    h.clock.advance(Duration::from_secs(60));
    assert!(h.admin.update_administrators(&[uid("alice")], &group));
    assert_eq!(
        h.delegate.checker().last_history_time(&group),
        Some(h.clock.at(160))
    );
}

#[test]
fn test_non_owner_cannot_appoint_administrators() {
    let h = harness("alice");
    let (group, _) = seed_club(&h);

    h.clock.advance(Duration::from_secs(5));
    assert!(!h.admin.update_administrators(&[uid("bob")], &group));
    assert!(h.delegate.administrators(&group).is_empty());
}

#[test]
fn test_administrators_must_be_members() {
    let h = harness("founder");
    let (group, _) = seed_club(&h);

    h.clock.advance(Duration::from_secs(5));
    assert!(
        !h.admin.update_administrators(&[uid("carol")], &group),
        "outsider cannot be appointed"
    );
    assert!(
        !h.admin.update_administrators(&[uid("founder")], &group),
        "the owner is already above the administrators"
    );
}

#[test]
fn test_forged_ownership_grab_rejected() {
    let h = harness("founder");
    let (group, _) = seed_club(&h);
    let mallory = uid("mallory");

    // a stranger fabricates a bulletin naming itself owner, newer than
    // anything accepted so far
    h.clock.advance(Duration::from_secs(60));
    let mut forged = Document::new(group.clone(), DocumentType::Bulletin, h.clock.now());
    forged.set_property("name", serde_json::json!("club"));
    forged.set_property("owner", serde_json::json!(mallory.to_string()));
    forged.signature = fake_signature(&key_for_name("mallory"), &forged.signable_data());

    assert!(!h.delegate.save_document(&forged));
    assert!(
        h.delegate.is_owner(&uid("founder"), &group),
        "authority unchanged"
    );
}

#[test]
fn test_legitimate_newer_bulletin_accepted() {
    let h = harness("founder");
    let (group, _) = seed_club(&h);

    h.clock.advance(Duration::from_secs(60));
    let mut update = Document::new(group.clone(), DocumentType::Bulletin, h.clock.now());
    update.set_property("name", serde_json::json!("renamed club"));
    update.set_property("founder", serde_json::json!(uid("founder").to_string()));
    update.set_property("owner", serde_json::json!(uid("founder").to_string()));
    update.signature = fake_signature(&key_for_name("founder"), &update.signable_data());

    assert!(h.delegate.save_document(&update));
    assert_eq!(
        h.delegate.bulletin(&group).and_then(|b| b.name().map(String::from)),
        Some("renamed club".to_string())
    );
}
