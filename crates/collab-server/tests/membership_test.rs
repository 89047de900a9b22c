mod helpers;

use collab_server::error::AppError;
use collab_server::store::MembershipStore;
use collab_shared::WorkspaceRole;
use helpers::Harness;

#[tokio::test]
async fn change_role_requires_admin_tier() {
    let h = Harness::new();
    let u1 = h.user("u1@x.com").await;
    let u2 = h.user("u2@x.com").await;
    let u3 = h.user("u3@x.com").await;
    let ws = h.team(&u1).await;
    h.join(&u1, &ws, &u2, WorkspaceRole::Member).await;
    h.join(&u1, &ws, &u3, WorkspaceRole::Member).await;

    let err = h
        .members
        .change_role(u2.id, ws.id, u3.id, WorkspaceRole::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(h.role_of(&ws, &u3).await, Some(WorkspaceRole::Member));

    h.members
        .change_role(u1.id, ws.id, u3.id, WorkspaceRole::Admin)
        .await
        .unwrap();
    assert_eq!(h.role_of(&ws, &u3).await, Some(WorkspaceRole::Admin));
}

#[tokio::test]
async fn admin_cannot_demote_another_admin() {
    let h = Harness::new();
    let owner = h.user("owner@x.com").await;
    let a1 = h.user("a1@x.com").await;
    let a2 = h.user("a2@x.com").await;
    let ws = h.team(&owner).await;
    h.join(&owner, &ws, &a1, WorkspaceRole::Admin).await;
    h.join(&owner, &ws, &a2, WorkspaceRole::Admin).await;

    let err = h
        .members
        .change_role(a1.id, ws.id, a2.id, WorkspaceRole::Member)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn change_role_cannot_grant_or_touch_owner() {
    let h = Harness::new();
    let owner = h.user("owner@x.com").await;
    let admin = h.user("admin@x.com").await;
    let ws = h.team(&owner).await;
    h.join(&owner, &ws, &admin, WorkspaceRole::Admin).await;

    let err = h
        .members
        .change_role(owner.id, ws.id, admin.id, WorkspaceRole::Owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = h
        .members
        .change_role(admin.id, ws.id, owner.id, WorkspaceRole::Member)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn change_role_of_non_member_is_not_found() {
    let h = Harness::new();
    let owner = h.user("owner@x.com").await;
    let stranger = h.user("stranger@x.com").await;
    let ws = h.team(&owner).await;

    let err = h
        .members
        .change_role(owner.id, ws.id, stranger.id, WorkspaceRole::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn remove_member_follows_hierarchy() {
    let h = Harness::new();
    let owner = h.user("owner@x.com").await;
    let admin = h.user("admin@x.com").await;
    let other_admin = h.user("admin2@x.com").await;
    let member = h.user("member@x.com").await;
    let ws = h.team(&owner).await;
    h.join(&owner, &ws, &admin, WorkspaceRole::Admin).await;
    h.join(&owner, &ws, &other_admin, WorkspaceRole::Admin).await;
    h.join(&owner, &ws, &member, WorkspaceRole::Member).await;

    let err = h
        .members
        .remove_member(admin.id, ws.id, other_admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = h
        .members
        .remove_member(member.id, ws.id, admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    h.members
        .remove_member(admin.id, ws.id, member.id)
        .await
        .unwrap();
    assert_eq!(h.role_of(&ws, &member).await, None);

    h.members
        .remove_member(owner.id, ws.id, other_admin.id)
        .await
        .unwrap();
    assert_eq!(h.role_of(&ws, &other_admin).await, None);
}

#[tokio::test]
async fn remove_self_goes_through_leave() {
    let h = Harness::new();
    let owner = h.user("owner@x.com").await;
    let admin = h.user("admin@x.com").await;
    let ws = h.team(&owner).await;
    h.join(&owner, &ws, &admin, WorkspaceRole::Admin).await;

    let err = h
        .members
        .remove_member(admin.id, ws.id, admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    h.members.leave(admin.id, ws.id).await.unwrap();
    assert_eq!(h.role_of(&ws, &admin).await, None);
}

#[tokio::test]
async fn remove_missing_member_is_not_found() {
    let h = Harness::new();
    let owner = h.user("owner@x.com").await;
    let stranger = h.user("stranger@x.com").await;
    let ws = h.team(&owner).await;

    let err = h
        .members
        .remove_member(owner.id, ws.id, stranger.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn transfer_swaps_roles_and_owner_pointer() {
    let h = Harness::new();
    let owner = h.user("owner@x.com").await;
    let bob = h.user("bob@x.com").await;
    let ws = h.team(&owner).await;
    h.join(&owner, &ws, &bob, WorkspaceRole::Member).await;
    h.clock.advance(chrono::Duration::minutes(10));

    h.members
        .transfer_ownership(owner.id, ws.id, bob.id)
        .await
        .unwrap();

    let workspace = h.store.get_workspace(ws.id).await.unwrap().unwrap();
    assert_eq!(workspace.owner_id, bob.id);
    assert_eq!(workspace.updated_at, h.now());
    assert_eq!(h.role_of(&ws, &owner).await, Some(WorkspaceRole::Admin));
    assert_eq!(h.role_of(&ws, &bob).await, Some(WorkspaceRole::Owner));

    let owners = h
        .members
        .list_members(bob.id, ws.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.role == WorkspaceRole::Owner)
        .count();
    assert_eq!(owners, 1);
}

#[tokio::test]
async fn transfer_requires_owner_and_existing_target() {
    let h = Harness::new();
    let owner = h.user("owner@x.com").await;
    let admin = h.user("admin@x.com").await;
    let stranger = h.user("stranger@x.com").await;
    let ws = h.team(&owner).await;
    h.join(&owner, &ws, &admin, WorkspaceRole::Admin).await;

    let err = h
        .members
        .transfer_ownership(admin.id, ws.id, admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = h
        .members
        .transfer_ownership(owner.id, ws.id, stranger.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // Nothing changed on either failure.
    let workspace = h.store.get_workspace(ws.id).await.unwrap().unwrap();
    assert_eq!(workspace.owner_id, owner.id);
    assert_eq!(h.role_of(&ws, &owner).await, Some(WorkspaceRole::Owner));
    assert_eq!(h.role_of(&ws, &admin).await, Some(WorkspaceRole::Admin));
}

#[tokio::test]
async fn owner_leaves_only_after_transfer() {
    let h = Harness::new();
    let u1 = h.user("u1@x.com").await;
    let u2 = h.user("u2@x.com").await;
    let ws = h.team(&u1).await;
    h.join(&u1, &ws, &u2, WorkspaceRole::Member).await;

    let err = h.members.leave(u1.id, ws.id).await.unwrap_err();
    match err {
        AppError::Forbidden(reason) => assert_eq!(reason, "owner cannot leave"),
        other => panic!("expected Forbidden, got {other:?}"),
    }

    h.members
        .transfer_ownership(u1.id, ws.id, u2.id)
        .await
        .unwrap();
    h.members.leave(u1.id, ws.id).await.unwrap();

    assert_eq!(h.role_of(&ws, &u1).await, None);
    assert_eq!(h.role_of(&ws, &u2).await, Some(WorkspaceRole::Owner));
}

#[tokio::test]
async fn leave_without_membership_is_not_found() {
    let h = Harness::new();
    let owner = h.user("owner@x.com").await;
    let stranger = h.user("stranger@x.com").await;
    let ws = h.team(&owner).await;

    let err = h.members.leave(stranger.id, ws.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn list_members_requires_membership() {
    let h = Harness::new();
    let owner = h.user("owner@x.com").await;
    let stranger = h.user("stranger@x.com").await;
    let ws = h.team(&owner).await;

    let err = h
        .members
        .list_members(stranger.id, ws.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let members = h.members.list_members(owner.id, ws.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].role, WorkspaceRole::Owner);
}
