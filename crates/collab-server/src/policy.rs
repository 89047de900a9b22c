//! Role policy for workspace operations.
//!
//! Every authorization decision in the crate goes through these predicates.
//! They are pure: no I/O, no hidden state, total over all role combinations.

use collab_shared::WorkspaceRole;

pub fn can_invite(actor: WorkspaceRole) -> bool {
    actor.can_admin()
}

pub fn can_revoke_invite(actor: WorkspaceRole) -> bool {
    can_invite(actor)
}

/// Self-removal is never a removal; it goes through `leave`.
pub fn can_remove_member(actor: WorkspaceRole, target: WorkspaceRole, is_self: bool) -> bool {
    !is_self && actor.outranks(target)
}

/// The owner role is neither granted nor taken here; ownership moves only
/// through transfer.
pub fn can_change_role(
    actor: WorkspaceRole,
    target: WorkspaceRole,
    new_role: WorkspaceRole,
) -> bool {
    new_role != WorkspaceRole::Owner && actor.can_admin() && actor.outranks(target)
}

pub fn can_transfer_ownership(actor: WorkspaceRole) -> bool {
    actor.is_owner()
}

pub fn can_update_workspace(actor: WorkspaceRole) -> bool {
    actor.can_admin()
}

pub fn can_delete_workspace(actor: WorkspaceRole) -> bool {
    actor.is_owner()
}

pub fn can_leave_workspace(actor: WorkspaceRole) -> bool {
    !actor.is_owner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use WorkspaceRole::{Admin, Member, Owner};

    #[test]
    fn invite_requires_admin_tier() {
        assert!(can_invite(Owner));
        assert!(can_invite(Admin));
        assert!(!can_invite(Member));
        for role in WorkspaceRole::ALL {
            assert_eq!(can_revoke_invite(role), can_invite(role));
        }
    }

    #[test]
    fn delete_workspace_only_for_owner() {
        for role in WorkspaceRole::ALL {
            assert_eq!(can_delete_workspace(role), role == Owner);
        }
    }

    #[test]
    fn transfer_only_for_owner() {
        for role in WorkspaceRole::ALL {
            assert_eq!(can_transfer_ownership(role), role == Owner);
        }
    }

    #[test]
    fn update_allowed_for_owner_and_admin() {
        assert!(can_update_workspace(Owner));
        assert!(can_update_workspace(Admin));
        assert!(!can_update_workspace(Member));
    }

    #[test]
    fn remove_self_is_always_denied() {
        for actor in WorkspaceRole::ALL {
            for target in WorkspaceRole::ALL {
                assert!(!can_remove_member(actor, target, true));
            }
        }
    }

    #[test]
    fn remove_follows_hierarchy() {
        assert!(can_remove_member(Owner, Admin, false));
        assert!(can_remove_member(Owner, Member, false));
        assert!(!can_remove_member(Owner, Owner, false));

        assert!(can_remove_member(Admin, Member, false));
        assert!(!can_remove_member(Admin, Admin, false));
        assert!(!can_remove_member(Admin, Owner, false));

        for target in WorkspaceRole::ALL {
            assert!(!can_remove_member(Member, target, false));
        }
    }

    #[test]
    fn owner_role_is_untouchable_through_change_role() {
        for actor in WorkspaceRole::ALL {
            for target in WorkspaceRole::ALL {
                assert!(!can_change_role(actor, target, Owner));
            }
            for new_role in WorkspaceRole::ALL {
                assert!(!can_change_role(actor, Owner, new_role));
            }
        }
    }

    #[test]
    fn change_role_matrix() {
        assert!(can_change_role(Owner, Member, Admin));
        assert!(can_change_role(Owner, Admin, Member));

        assert!(can_change_role(Admin, Member, Admin));
        assert!(!can_change_role(Admin, Admin, Member));

        assert!(!can_change_role(Member, Member, Admin));
        assert!(!can_change_role(Member, Admin, Member));
    }

    #[test]
    fn owner_cannot_leave() {
        assert!(!can_leave_workspace(Owner));
        assert!(can_leave_workspace(Admin));
        assert!(can_leave_workspace(Member));
    }
}
