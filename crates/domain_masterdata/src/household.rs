//! Household aggregate
//!
//! A household groups persons of one tenant into a family unit. Members
//! are weak references (person ids), never owned objects; Person and
//! Household are independent aggregates. Every member must belong to the
//! household's tenant; the service layer resolves the person within the
//! tenant before membership is added, and the storage layer backs this
//! with a foreign key.
//!
//! A household may only be deleted while it has no current members;
//! deleting a non-empty household is a policy violation surfaced as a
//! conflict.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{HouseholdId, PersonId, TenantId};
use serde::{Deserialize, Serialize};

use crate::error::MasterdataError;

/// Role of a member within a household
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HouseholdRole {
    /// The head of household (policyholder); at most one per household
    Primary,
    /// Spouse or partner of the primary member
    Partner,
    /// Child member
    Child,
    /// Any other co-insured member
    Other,
}

impl HouseholdRole {
    /// Lowercase storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            HouseholdRole::Primary => "primary",
            HouseholdRole::Partner => "partner",
            HouseholdRole::Child => "child",
            HouseholdRole::Other => "other",
        }
    }
}

impl std::str::FromStr for HouseholdRole {
    type Err = MasterdataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(HouseholdRole::Primary),
            "partner" => Ok(HouseholdRole::Partner),
            "child" => Ok(HouseholdRole::Child),
            "other" => Ok(HouseholdRole::Other),
            other => Err(MasterdataError::validation(
                "HouseholdMember",
                "role",
                format!("unknown role '{other}'"),
            )),
        }
    }
}

/// Membership of a person in a household
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdMember {
    /// The person this membership refers to
    pub person_id: PersonId,
    /// Role within the household
    pub role: HouseholdRole,
    /// First day of membership
    pub joined_on: NaiveDate,
    /// Last day of membership, None while current
    pub left_on: Option<NaiveDate>,
}

impl HouseholdMember {
    pub fn new(person_id: PersonId, role: HouseholdRole, joined_on: NaiveDate) -> Self {
        Self {
            person_id,
            role,
            joined_on,
            left_on: None,
        }
    }

    /// True while the membership has no end date
    pub fn is_current(&self) -> bool {
        self.left_on.is_none()
    }
}

/// A household grouping persons under one tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    /// Unique household identifier
    pub id: HouseholdId,
    /// Owning tenant, immutable once set
    pub tenant_id: TenantId,
    /// Display name of the household
    pub name: String,
    /// The head of household, if one has been designated
    pub head_person_id: Option<PersonId>,
    /// All memberships, current and ended
    pub members: Vec<HouseholdMember>,
    /// When this record was created
    pub created_at: DateTime<Utc>,
    /// When this record was last updated
    pub updated_at: DateTime<Utc>,
}

impl Household {
    /// Creates a new household with a generated id
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the name is blank.
    pub fn new(tenant_id: TenantId, name: impl Into<String>) -> Result<Self, MasterdataError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MasterdataError::validation(
                "Household",
                "name",
                "must not be blank",
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: HouseholdId::new_v7(),
            tenant_id,
            name,
            head_person_id: None,
            members: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns all current (not ended) memberships
    pub fn current_members(&self) -> Vec<&HouseholdMember> {
        self.members.iter().filter(|m| m.is_current()).collect()
    }

    /// True while the household has no current members
    pub fn is_empty(&self) -> bool {
        self.members.iter().all(|m| !m.is_current())
    }

    /// True if a current member holds the Primary role
    pub fn has_primary(&self) -> bool {
        self.head_person_id.is_some()
    }

    /// Counts current child members
    pub fn child_count(&self) -> usize {
        self.current_members()
            .iter()
            .filter(|m| m.role == HouseholdRole::Child)
            .count()
    }

    /// Adds a person as a member
    ///
    /// A Primary member becomes the head of household.
    ///
    /// # Errors
    ///
    /// Returns a `Conflict` error if the person is already a current
    /// member, or if a second Primary member is added.
    pub fn add_member(
        &mut self,
        person_id: PersonId,
        role: HouseholdRole,
        joined_on: NaiveDate,
    ) -> Result<(), MasterdataError> {
        if self
            .current_members()
            .iter()
            .any(|m| m.person_id == person_id)
        {
            return Err(MasterdataError::conflict("Household", "member", person_id));
        }
        if role == HouseholdRole::Primary && self.has_primary() {
            return Err(MasterdataError::conflict(
                "Household",
                "head_person_id",
                person_id,
            ));
        }
        if role == HouseholdRole::Primary {
            self.head_person_id = Some(person_id);
        }
        self.members
            .push(HouseholdMember::new(person_id, role, joined_on));
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Ends a person's membership as of `left_on`
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if the person is not a current member.
    pub fn remove_member(
        &mut self,
        person_id: PersonId,
        left_on: NaiveDate,
    ) -> Result<(), MasterdataError> {
        let member = self
            .members
            .iter_mut()
            .find(|m| m.person_id == person_id && m.is_current())
            .ok_or_else(|| MasterdataError::not_found("HouseholdMember", person_id))?;
        member.left_on = Some(left_on);
        if self.head_person_id == Some(person_id) {
            self.head_person_id = None;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}
