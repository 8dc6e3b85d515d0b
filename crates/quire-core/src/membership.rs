//! Journal membership and role transitions.
//!
//! Transitions are computed as narrow [`JournalFieldOp`]s against the latest
//! remote copy of the journal, so concurrent membership changes by other
//! members are never overwritten. Every transition keeps at least one owner
//! or admin in a journal that still has members.

use std::sync::Arc;

use crate::models::{Journal, Role};
use crate::remote::{JournalFieldOp, RemoteStore};
use crate::store::LocalState;
use crate::util::now_millis;
use crate::{Error, Result};

/// What happened to a journal after a member left
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The journal lives on with the remaining members
    Left(Journal),
    /// The last member left and the journal was deleted
    JournalDeleted,
}

fn require_member(journal: &Journal, member_id: &str) -> Result<Role> {
    journal.role_of(member_id).ok_or_else(|| {
        Error::NotFound(format!("{member_id} is not a member of journal {}", journal.id))
    })
}

fn require_privileged(journal: &Journal, caller_id: &str) -> Result<Role> {
    match journal.role_of(caller_id) {
        Some(role) if role.is_privileged() => Ok(role),
        _ => Err(Error::permission(format!(
            "{caller_id} must be an owner or admin of journal {}",
            journal.id
        ))),
    }
}

/// Whether anyone other than `member_id` holds an owner or admin role
fn has_other_privileged(journal: &Journal, member_id: &str) -> bool {
    journal
        .roles
        .iter()
        .any(|(id, role)| id != member_id && role.is_privileged())
}

/// Ops for `caller_id` setting the role of `member_id` to `new_role`.
///
/// Promotion to admin and demotion to member need an owner or admin caller.
/// Granting `Owner` transfers ownership: only the current owner may do it,
/// and the previous owner becomes an admin.
pub fn plan_change_role(
    journal: &Journal,
    caller_id: &str,
    member_id: &str,
    new_role: Role,
) -> Result<Vec<JournalFieldOp>> {
    let caller_role = require_privileged(journal, caller_id)?;
    let current = require_member(journal, member_id)?;
    if current == new_role {
        return Ok(Vec::new());
    }

    let mut ops = Vec::new();
    match (current, new_role) {
        (Role::Owner, _) => {
            return Err(Error::permission(
                "the owner cannot be demoted; transfer ownership instead",
            ));
        }
        (_, Role::Owner) => {
            if caller_role != Role::Owner {
                return Err(Error::permission("only the owner can transfer ownership"));
            }
            ops.push(JournalFieldOp::SetRole {
                member_id: caller_id.to_string(),
                role: Role::Admin,
            });
        }
        (Role::Admin, Role::Member) => {
            if !has_other_privileged(journal, member_id) {
                return Err(Error::permission(
                    "a journal needs at least one owner or admin",
                ));
            }
        }
        _ => {}
    }

    ops.push(JournalFieldOp::SetRole {
        member_id: member_id.to_string(),
        role: new_role,
    });
    ops.push(JournalFieldOp::Touch {
        updated_at: now_millis(),
    });
    Ok(ops)
}

/// Ops for `caller_id` removing `member_id` from the journal
pub fn plan_kick(journal: &Journal, caller_id: &str, member_id: &str) -> Result<Vec<JournalFieldOp>> {
    require_privileged(journal, caller_id)?;
    let role = require_member(journal, member_id)?;
    if caller_id == member_id {
        return Err(Error::permission("members leave a journal, they cannot kick themselves"));
    }
    if role == Role::Owner {
        return Err(Error::permission("the owner cannot be kicked"));
    }

    Ok(vec![
        JournalFieldOp::RemoveMember {
            member_id: member_id.to_string(),
        },
        JournalFieldOp::RemoveRole {
            member_id: member_id.to_string(),
        },
        JournalFieldOp::Touch {
            updated_at: now_millis(),
        },
    ])
}

/// Ops for `member_id` leaving, or `None` when nobody would remain and the
/// journal has to be deleted instead.
///
/// A departing owner hands ownership to the next member in join order. If
/// the departing member was the last owner or admin, the next member is
/// promoted to admin.
pub fn plan_leave(journal: &Journal, member_id: &str) -> Result<Option<Vec<JournalFieldOp>>> {
    let role = require_member(journal, member_id)?;
    let Some(successor) = journal
        .members
        .iter()
        .find(|id| id.as_str() != member_id && journal.is_member(id))
    else {
        return Ok(None);
    };

    let mut ops = vec![
        JournalFieldOp::RemoveMember {
            member_id: member_id.to_string(),
        },
        JournalFieldOp::RemoveRole {
            member_id: member_id.to_string(),
        },
    ];
    if role == Role::Owner {
        ops.push(JournalFieldOp::SetRole {
            member_id: successor.clone(),
            role: Role::Owner,
        });
    } else if !has_other_privileged(journal, member_id) {
        ops.push(JournalFieldOp::SetRole {
            member_id: successor.clone(),
            role: Role::Admin,
        });
    }
    ops.push(JournalFieldOp::Touch {
        updated_at: now_millis(),
    });
    Ok(Some(ops))
}

fn applied(journal: &Journal, ops: &[JournalFieldOp]) -> Journal {
    let mut next = journal.clone();
    for op in ops {
        op.apply(&mut next);
    }
    next
}

/// Runs membership transitions against the remote, then mirrors the result
/// into local state.
///
/// Unlike entry mutations these are not optimistic: a role change that the
/// remote rejects must never be shown as applied.
pub struct MembershipService<R: RemoteStore> {
    state: Arc<LocalState>,
    remote: Arc<R>,
}

impl<R: RemoteStore> MembershipService<R> {
    pub const fn new(state: Arc<LocalState>, remote: Arc<R>) -> Self {
        Self { state, remote }
    }

    async fn latest(&self, journal_id: &str) -> Result<Journal> {
        self.remote
            .fetch_journal(journal_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("journal {journal_id}")))
    }

    async fn commit(&self, journal: &Journal, ops: Vec<JournalFieldOp>) -> Result<Journal> {
        if ops.is_empty() {
            self.state.put_journal(journal.clone());
            return Ok(journal.clone());
        }
        let next = applied(journal, &ops);
        self.remote.update_journal(&journal.id, ops).await?;
        self.state.put_journal(next.clone());
        Ok(next)
    }

    /// Set the role of `member_id` on behalf of `caller_id`
    pub async fn change_role(
        &self,
        journal_id: &str,
        caller_id: &str,
        member_id: &str,
        new_role: Role,
    ) -> Result<Journal> {
        let journal = self.latest(journal_id).await?;
        let ops = plan_change_role(&journal, caller_id, member_id, new_role)?;
        let next = self.commit(&journal, ops).await?;
        tracing::info!(journal_id, member_id, role = %new_role, "Changed member role");
        Ok(next)
    }

    /// Remove `member_id` on behalf of `caller_id`
    pub async fn kick(&self, journal_id: &str, caller_id: &str, member_id: &str) -> Result<Journal> {
        let journal = self.latest(journal_id).await?;
        let ops = plan_kick(&journal, caller_id, member_id)?;
        let next = self.commit(&journal, ops).await?;
        tracing::info!(journal_id, member_id, "Removed member");
        Ok(next)
    }

    /// `member_id` leaves the journal. The journal disappears from local
    /// state either way since the leaver no longer belongs to it.
    pub async fn leave(&self, journal_id: &str, member_id: &str) -> Result<LeaveOutcome> {
        let journal = self.latest(journal_id).await?;
        let outcome = match plan_leave(&journal, member_id)? {
            Some(ops) => {
                let next = applied(&journal, &ops);
                self.remote.update_journal(journal_id, ops).await?;
                tracing::info!(journal_id, member_id, owner = ?next.owner(), "Member left journal");
                LeaveOutcome::Left(next)
            }
            None => {
                self.remote.delete_journal(journal_id).await?;
                tracing::info!(journal_id, "Last member left; journal deleted");
                LeaveOutcome::JournalDeleted
            }
        };
        self.state.remove_journal(journal_id);
        Ok(outcome)
    }
}
