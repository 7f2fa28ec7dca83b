//! Role- and ownership-based authorization.
//!
//! Two policy implementations behind one trait, selected by the
//! caller's role — keeping the member allow-list and ownership rules in
//! one centrally testable place instead of inline conditionals at every
//! call site. Per request the flow is
//! `Unauthenticated → Authenticated → {Authorized, Forbidden}`; a
//! rejection is terminal and never transient.

use muster_core::{
  Error, Result,
  identity::{Principal, Role},
  person::PatchField,
};
use uuid::Uuid;

/// The only record fields a member-role caller may update.
pub const MEMBER_WRITABLE_FIELDS: [PatchField; 2] =
  [PatchField::Subjects, PatchField::ClassGroup];

/// Map the absent-caller case onto the taxonomy before any policy runs.
pub fn require_authenticated(caller: Option<&Principal>) -> Result<&Principal> {
  caller.ok_or(Error::Unauthenticated)
}

/// Roster-wide operations (anything beyond a single owned record).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterAction {
  List,
  Search,
  Stats,
  Create,
  Delete,
  BulkUpdate,
  MarkAttendance,
  RegisterIdentity,
}

impl RosterAction {
  fn describe(&self) -> &'static str {
    match self {
      Self::List => "list records",
      Self::Search => "search records",
      Self::Stats => "read roster statistics",
      Self::Create => "create records",
      Self::Delete => "delete records",
      Self::BulkUpdate => "bulk-update records",
      Self::MarkAttendance => "mark attendance",
      Self::RegisterIdentity => "register identities",
    }
  }
}

/// One authorization policy per role.
pub trait AccessPolicy: Send + Sync {
  /// May the caller read the record with this id?
  fn authorize_read(&self, principal: &Principal, id: Uuid) -> Result<()>;

  /// May the caller update these fields of the record with this id?
  fn authorize_update(
    &self,
    principal: &Principal,
    id: Uuid,
    fields: &[PatchField],
  ) -> Result<()>;

  /// May the caller perform a roster-wide action?
  fn authorize_roster(
    &self,
    principal: &Principal,
    action: RosterAction,
  ) -> Result<()>;
}

/// Select the policy for a role.
pub fn policy_for(role: Role) -> &'static dyn AccessPolicy {
  match role {
    Role::Admin => &AdminPolicy,
    Role::Member => &MemberPolicy,
  }
}

// ─── Admin ───────────────────────────────────────────────────────────────────

/// Unrestricted read/write across all records, including destructive
/// and bulk operations.
pub struct AdminPolicy;

impl AccessPolicy for AdminPolicy {
  fn authorize_read(&self, _principal: &Principal, _id: Uuid) -> Result<()> {
    Ok(())
  }

  fn authorize_update(
    &self,
    _principal: &Principal,
    _id: Uuid,
    _fields: &[PatchField],
  ) -> Result<()> {
    Ok(())
  }

  fn authorize_roster(
    &self,
    _principal: &Principal,
    _action: RosterAction,
  ) -> Result<()> {
    Ok(())
  }
}

// ─── Member ──────────────────────────────────────────────────────────────────

/// Access limited to the single record named by the caller's
/// back-reference; updates limited to [`MEMBER_WRITABLE_FIELDS`].
pub struct MemberPolicy;

impl AccessPolicy for MemberPolicy {
  fn authorize_read(&self, principal: &Principal, id: Uuid) -> Result<()> {
    match principal.person_ref {
      Some(own) if own == id => Ok(()),
      _ => Err(Error::Forbidden(
        "members may only access their own record".into(),
      )),
    }
  }

  fn authorize_update(
    &self,
    principal: &Principal,
    id: Uuid,
    fields: &[PatchField],
  ) -> Result<()> {
    self.authorize_read(principal, id)?;

    let rejected: Vec<&str> = fields
      .iter()
      .copied()
      .filter(|f| !MEMBER_WRITABLE_FIELDS.contains(f))
      .map(|f| f.name())
      .collect();

    if !rejected.is_empty() {
      let allowed: Vec<&str> =
        MEMBER_WRITABLE_FIELDS.iter().map(|f| f.name()).collect();
      return Err(Error::Forbidden(format!(
        "members may only update {}; rejected: {}",
        allowed.join(", "),
        rejected.join(", ")
      )));
    }
    Ok(())
  }

  fn authorize_roster(
    &self,
    _principal: &Principal,
    action: RosterAction,
  ) -> Result<()> {
    Err(Error::Forbidden(format!(
      "admin role required to {}",
      action.describe()
    )))
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn member_with(person_ref: Option<Uuid>) -> Principal {
    Principal {
      identity_id: Uuid::new_v4(),
      email: "member@example.com".into(),
      role: Role::Member,
      person_ref,
    }
  }

  fn admin() -> Principal {
    Principal {
      identity_id: Uuid::new_v4(),
      email: "admin@example.com".into(),
      role: Role::Admin,
      person_ref: None,
    }
  }

  #[test]
  fn missing_caller_is_unauthenticated() {
    assert!(matches!(
      require_authenticated(None),
      Err(Error::Unauthenticated)
    ));
  }

  #[test]
  fn admin_passes_everything() {
    let p = admin();
    let policy = policy_for(Role::Admin);
    let id = Uuid::new_v4();
    assert!(policy.authorize_read(&p, id).is_ok());
    assert!(
      policy
        .authorize_update(&p, id, &[PatchField::Email, PatchField::Salary])
        .is_ok()
    );
    assert!(policy.authorize_roster(&p, RosterAction::Delete).is_ok());
  }

  #[test]
  fn member_owns_exactly_one_record() {
    let own = Uuid::new_v4();
    let p = member_with(Some(own));
    let policy = policy_for(Role::Member);

    assert!(policy.authorize_read(&p, own).is_ok());
    assert!(matches!(
      policy.authorize_read(&p, Uuid::new_v4()),
      Err(Error::Forbidden(_))
    ));
  }

  #[test]
  fn member_without_back_reference_is_denied_everywhere() {
    let p = member_with(None);
    let policy = policy_for(Role::Member);
    assert!(matches!(
      policy.authorize_read(&p, Uuid::new_v4()),
      Err(Error::Forbidden(_))
    ));
  }

  #[test]
  fn member_update_allow_list_is_enforced() {
    let own = Uuid::new_v4();
    let p = member_with(Some(own));
    let policy = policy_for(Role::Member);

    assert!(
      policy
        .authorize_update(&p, own, &[
          PatchField::Subjects,
          PatchField::ClassGroup
        ])
        .is_ok()
    );

    let err = policy
      .authorize_update(&p, own, &[PatchField::Subjects, PatchField::Salary])
      .unwrap_err();
    match err {
      Error::Forbidden(msg) => {
        // The rejection names the allowed fields.
        assert!(msg.contains("subjects"), "message: {msg}");
        assert!(msg.contains("class_group"), "message: {msg}");
        assert!(msg.contains("salary"), "message: {msg}");
      }
      other => panic!("expected Forbidden, got {other:?}"),
    }
  }

  #[test]
  fn member_roster_actions_are_denied() {
    let p = member_with(Some(Uuid::new_v4()));
    let policy = policy_for(Role::Member);
    for action in [
      RosterAction::List,
      RosterAction::Search,
      RosterAction::Stats,
      RosterAction::Create,
      RosterAction::Delete,
      RosterAction::BulkUpdate,
      RosterAction::MarkAttendance,
      RosterAction::RegisterIdentity,
    ] {
      assert!(matches!(
        policy.authorize_roster(&p, action),
        Err(Error::Forbidden(_))
      ));
    }
  }
}
