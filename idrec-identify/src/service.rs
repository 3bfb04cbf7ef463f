//! Identify cycle
//!
//! One identify call is: load candidates, reconcile, apply the plan. The
//! whole cycle runs in a single SQLite transaction, and calls are
//! serialized by a process-wide gate so two concurrent requests can never
//! both decide to create a primary for the same person.

use crate::db::contacts;
use crate::reconcile::{self, ConsolidatedContact, IdentifyQuery, ReconcileError};
use idrec_common::db::{ContactId, ContactRecord};
use idrec_common::time;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Identify failures
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// The record store failed; the transaction was rolled back
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] idrec_common::Error),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::StoreUnavailable(idrec_common::Error::Database(err))
    }
}

/// Runs identify cycles against the contact store
#[derive(Clone)]
pub struct ContactService {
    db: SqlitePool,
    gate: Arc<Mutex<()>>,
}

impl ContactService {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Resolve `query` to a consolidated contact, persisting any changes
    pub async fn identify(&self, query: IdentifyQuery) -> Result<ConsolidatedContact, ServiceError> {
        query.validate()?;

        let _guard = self.gate.lock().await;
        let mut tx = self.db.begin().await?;

        let candidates = load_candidates(&mut tx, &query).await?;
        debug!("Loaded {} candidate contacts", candidates.len());

        let plan = reconcile::reconcile(&query, &candidates, time::now()).map_err(|e| {
            if let ReconcileError::InvariantViolation(msg) = &e {
                error!("Contact groups are inconsistent: {}", msg);
            }
            e
        })?;

        let inserted = contacts::apply_plan(&mut tx, &plan).await?;
        let contact = plan.consolidate(inserted.as_ref())?;

        tx.commit().await?;

        if plan.creates_person() {
            info!("Created primary contact {}", contact.primary_contact_id);
        } else if let Some(record) = &inserted {
            info!(
                "Added secondary contact {} to primary {}",
                record.id, contact.primary_contact_id
            );
        }
        if plan.demotions() > 0 {
            info!(
                "Merged {} group(s) into primary {}",
                plan.demotions(),
                contact.primary_contact_id
            );
        }

        Ok(contact)
    }
}

/// Seed matches plus every member of their groups
///
/// Group roots are expanded until no new root appears, so stale link
/// chains in stored data still reach the real primary.
async fn load_candidates(
    conn: &mut SqliteConnection,
    query: &IdentifyQuery,
) -> Result<Vec<ContactRecord>, ServiceError> {
    let seeds = contacts::find_active_by_email_or_phone(conn, query.email(), query.phone()).await?;
    if seeds.is_empty() {
        return Ok(seeds);
    }
    debug!("{} contacts match the query directly", seeds.len());

    let mut loaded: BTreeMap<ContactId, ContactRecord> =
        seeds.into_iter().map(|r| (r.id, r)).collect();
    let mut expanded: BTreeSet<ContactId> = BTreeSet::new();

    loop {
        let pending: BTreeSet<ContactId> = reconcile::group_roots(loaded.values())
            .difference(&expanded)
            .copied()
            .collect();
        if pending.is_empty() {
            break;
        }

        for record in contacts::find_group_members(conn, &pending).await? {
            loaded.entry(record.id).or_insert(record);
        }
        expanded.extend(pending);
    }

    Ok(loaded.into_values().collect())
}
