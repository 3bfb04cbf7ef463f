//! Identity reconciliation engine
//!
//! Decides whether an incoming (email, phone) pair belongs to a known
//! person, a new person, or bridges two previously separate people. The
//! engine is pure: the caller loads candidate records, calls [`reconcile`]
//! and applies the returned [`ReconciliationPlan`] in one transaction.
//!
//! # Rules
//!
//! - Matching is exact string equality on email or phone; an absent value
//!   never matches.
//! - Soft-deleted records take no part in matching or grouping.
//! - The oldest primary (ties: lowest id) of all touched groups survives.
//!   Every other primary is demoted and its secondaries are re-pointed.
//! - Information not yet known to the merged group is stored as a new
//!   secondary holding only the novel fields.

mod plan;

pub use plan::{ConsolidatedContact, Mutation, ReconciliationPlan};

use chrono::{DateTime, Utc};
use idrec_common::db::{ContactId, ContactRecord, LinkPrecedence, NewContact};
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// Reconciliation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// The query carries nothing to match on
    #[error("Validation error: {0}")]
    Validation(String),

    /// Stored groups break the one-primary-per-group rule
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Incoming identify request
///
/// Blank values (empty or whitespace-only) are treated as absent; anything
/// else is kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifyQuery {
    email: Option<String>,
    phone: Option<String>,
}

impl IdentifyQuery {
    pub fn new(email: Option<String>, phone: Option<String>) -> Self {
        Self {
            email: email.filter(|v| !v.trim().is_empty()),
            phone: phone.filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    /// At least one identifying field must be present
    pub fn validate(&self) -> Result<(), ReconcileError> {
        if self.email.is_none() && self.phone.is_none() {
            return Err(ReconcileError::Validation(
                "Either email or phone must be provided".to_string(),
            ));
        }
        Ok(())
    }

    fn matches(&self, record: &ContactRecord) -> bool {
        let email_hit = matches!(
            (self.email(), record.email.as_deref()),
            (Some(q), Some(r)) if q == r
        );
        let phone_hit = matches!(
            (self.phone(), record.phone_number.as_deref()),
            (Some(q), Some(r)) if q == r
        );
        email_hit || phone_hit
    }
}

/// Direct group roots of `records`: own id for primaries, link for secondaries
///
/// The store uses this to load every member of the touched groups before
/// calling [`reconcile`].
pub fn group_roots<'a, I>(records: I) -> BTreeSet<ContactId>
where
    I: IntoIterator<Item = &'a ContactRecord>,
{
    records
        .into_iter()
        .filter(|r| r.is_active())
        .filter_map(ContactRecord::group_root)
        .collect()
}

/// Compute the mutations and consolidated view for `query`
///
/// `candidates` must contain every active member of every group any
/// matching record belongs to. `now` stamps inserted and updated records.
pub fn reconcile(
    query: &IdentifyQuery,
    candidates: &[ContactRecord],
    now: DateTime<Utc>,
) -> Result<ReconciliationPlan, ReconcileError> {
    query.validate()?;

    let active: Vec<&ContactRecord> = candidates.iter().filter(|r| r.is_active()).collect();
    let by_id: HashMap<ContactId, &ContactRecord> = active.iter().map(|r| (r.id, *r)).collect();

    let seeds: Vec<&ContactRecord> = active.iter().copied().filter(|r| query.matches(r)).collect();
    if seeds.is_empty() {
        let contact = NewContact::primary(query.email.clone(), query.phone.clone(), now);
        return Ok(ReconciliationPlan::new_person(contact));
    }

    let roots: BTreeSet<ContactId> = seeds
        .iter()
        .filter_map(|r| resolve_root(r, &by_id))
        .collect();

    let mut group: Vec<ContactRecord> = active
        .iter()
        .filter(|r| resolve_root(r, &by_id).is_some_and(|root| roots.contains(&root)))
        .map(|r| (*r).clone())
        .collect();
    group.sort_by_key(|r| r.id);

    let primary_id = group
        .iter()
        .filter(|r| r.is_primary())
        .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
        .map(|r| r.id)
        .ok_or_else(|| {
            ReconcileError::InvariantViolation(format!(
                "No primary contact among groups {:?}",
                roots
            ))
        })?;

    let mut mutations = Vec::new();

    let novel_email = query
        .email()
        .filter(|email| !group.iter().any(|r| r.email.as_deref() == Some(*email)));
    let novel_phone = query
        .phone()
        .filter(|phone| !group.iter().any(|r| r.phone_number.as_deref() == Some(*phone)));

    if novel_email.is_some() || novel_phone.is_some() {
        mutations.push(Mutation::Insert(NewContact::secondary(
            novel_email.map(str::to_owned),
            novel_phone.map(str::to_owned),
            primary_id,
            now,
        )));
    }

    for record in group.iter_mut().filter(|r| r.id != primary_id) {
        let mutation = if record.is_primary() {
            Mutation::Demote {
                id: record.id,
                linked_id: primary_id,
                updated_at: now,
            }
        } else if record.linked_id != Some(primary_id) {
            Mutation::Relink {
                id: record.id,
                linked_id: primary_id,
                updated_at: now,
            }
        } else {
            continue;
        };

        record.link_precedence = LinkPrecedence::Secondary;
        record.linked_id = Some(primary_id);
        record.updated_at = now;
        mutations.push(mutation);
    }

    Ok(ReconciliationPlan::existing(primary_id, mutations, group))
}

/// Follow links from `record` up to its primary
///
/// A link to a record outside the candidate set resolves to that id so a
/// missing primary is reported rather than silently splitting the group.
/// Cycles resolve to `None`.
fn resolve_root(
    record: &ContactRecord,
    by_id: &HashMap<ContactId, &ContactRecord>,
) -> Option<ContactId> {
    let mut current = record;
    let mut seen = HashSet::new();

    loop {
        if !seen.insert(current.id) {
            return None;
        }
        let root = current.group_root()?;
        if root == current.id {
            return Some(root);
        }
        match by_id.get(&root) {
            Some(&next) => current = next,
            None => return Some(root),
        }
    }
}
