//! Mutation plan and consolidated view

use super::ReconcileError;
use idrec_common::db::{ContactId, ContactRecord, NewContact};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One record change, applied by the store in plan order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    /// Store a new contact (primary or secondary)
    Insert(NewContact),

    /// Turn a younger primary into a secondary of the surviving primary
    Demote {
        id: ContactId,
        linked_id: ContactId,
        updated_at: DateTime<Utc>,
    },

    /// Re-point a secondary whose primary was demoted
    Relink {
        id: ContactId,
        linked_id: ContactId,
        updated_at: DateTime<Utc>,
    },
}

/// Everything an identify call decided
///
/// `group` holds the existing records of the merged group as they will
/// look once the mutations are applied. When the plan creates a new person
/// the group is empty and the primary is the pending insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    primary_id: Option<ContactId>,
    mutations: Vec<Mutation>,
    group: Vec<ContactRecord>,
}

impl ReconciliationPlan {
    pub(super) fn new_person(contact: NewContact) -> Self {
        Self {
            primary_id: None,
            mutations: vec![Mutation::Insert(contact)],
            group: Vec::new(),
        }
    }

    pub(super) fn existing(
        primary_id: ContactId,
        mutations: Vec<Mutation>,
        group: Vec<ContactRecord>,
    ) -> Self {
        Self {
            primary_id: Some(primary_id),
            mutations,
            group,
        }
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Surviving primary, `None` if the primary is the pending insert
    pub fn primary_id(&self) -> Option<ContactId> {
        self.primary_id
    }

    /// Existing group members, post-mutation
    pub fn group(&self) -> &[ContactRecord] {
        &self.group
    }

    /// The contact this plan inserts, if any
    pub fn insert(&self) -> Option<&NewContact> {
        self.mutations.iter().find_map(|m| match m {
            Mutation::Insert(contact) => Some(contact),
            _ => None,
        })
    }

    /// True for a new person with no prior records
    pub fn creates_person(&self) -> bool {
        self.primary_id.is_none()
    }

    /// Number of primaries folded into the surviving group
    pub fn demotions(&self) -> usize {
        self.mutations
            .iter()
            .filter(|m| matches!(m, Mutation::Demote { .. }))
            .count()
    }

    /// Nothing to write: the request only repeated known information
    pub fn is_noop(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Build the response view once the store has assigned ids
    ///
    /// `inserted` is the persisted form of [`Self::insert`] and must be
    /// supplied exactly when the plan inserts.
    pub fn consolidate(
        &self,
        inserted: Option<&ContactRecord>,
    ) -> Result<ConsolidatedContact, ReconcileError> {
        match (self.insert().is_some(), inserted.is_some()) {
            (true, false) => {
                return Err(ReconcileError::InvariantViolation(
                    "Planned contact was not persisted".to_string(),
                ))
            }
            (false, true) => {
                return Err(ReconcileError::InvariantViolation(
                    "Persisted contact does not belong to this plan".to_string(),
                ))
            }
            _ => {}
        }

        let mut members: Vec<&ContactRecord> = self.group.iter().chain(inserted).collect();

        let primary_id = self
            .primary_id
            .or_else(|| inserted.map(|r| r.id))
            .ok_or_else(|| {
                ReconcileError::InvariantViolation("Plan has no primary contact".to_string())
            })?;

        // Primary first, then oldest first
        members.sort_by(|a, b| {
            (a.id != primary_id)
                .cmp(&(b.id != primary_id))
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });

        let emails = distinct(members.iter().filter_map(|r| r.email.as_deref()));
        let phone_numbers = distinct(members.iter().filter_map(|r| r.phone_number.as_deref()));

        let mut secondary_contact_ids: Vec<ContactId> = members
            .iter()
            .filter(|r| !r.is_primary())
            .map(|r| r.id)
            .collect();
        secondary_contact_ids.sort_unstable();

        Ok(ConsolidatedContact {
            primary_contact_id: primary_id,
            emails,
            phone_numbers,
            secondary_contact_ids,
        })
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(str::to_owned)
        .collect()
}

/// Consolidated view of one person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedContact {
    pub primary_contact_id: ContactId,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub secondary_contact_ids: Vec<ContactId>,
}
