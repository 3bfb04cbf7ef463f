//! Contact record store
//!
//! All functions take a `&mut SqliteConnection` so the identify cycle can
//! run them inside a single transaction. Soft-deleted rows are never
//! returned.

use crate::reconcile::{Mutation, ReconciliationPlan};
use idrec_common::db::{ContactId, ContactRecord, LinkPrecedence, NewContact};
use idrec_common::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use std::collections::BTreeSet;
use tracing::debug;

const CONTACT_COLUMNS: &str =
    "id, phone_number, email, linked_id, link_precedence, created_at, updated_at, deleted_at";

fn contact_from_row(row: &SqliteRow) -> Result<ContactRecord> {
    let precedence: String = row.try_get("link_precedence")?;

    Ok(ContactRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        phone_number: row.try_get("phone_number")?,
        linked_id: row.try_get("linked_id")?,
        link_precedence: precedence.parse()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

/// Active contacts whose email or phone equals the given value
///
/// An absent value matches nothing (`col = NULL` is never true).
pub async fn find_active_by_email_or_phone(
    conn: &mut SqliteConnection,
    email: Option<&str>,
    phone: Option<&str>,
) -> Result<Vec<ContactRecord>> {
    let sql = format!(
        "SELECT {CONTACT_COLUMNS} FROM contacts
         WHERE deleted_at IS NULL AND (email = ? OR phone_number = ?)
         ORDER BY id"
    );

    let rows = sqlx::query(&sql)
        .bind(email)
        .bind(phone)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(contact_from_row).collect()
}

/// Active contacts that are one of `root_ids` or link to one of them
pub async fn find_group_members(
    conn: &mut SqliteConnection,
    root_ids: &BTreeSet<ContactId>,
) -> Result<Vec<ContactRecord>> {
    if root_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {CONTACT_COLUMNS} FROM contacts WHERE deleted_at IS NULL AND (id IN ("
    ));
    {
        let mut ids = builder.separated(", ");
        for id in root_ids {
            ids.push_bind(*id);
        }
    }
    builder.push(") OR linked_id IN (");
    {
        let mut ids = builder.separated(", ");
        for id in root_ids {
            ids.push_bind(*id);
        }
    }
    builder.push(")) ORDER BY id");

    let rows = builder.build().fetch_all(&mut *conn).await?;

    rows.iter().map(contact_from_row).collect()
}

/// Look up a single contact (soft-deleted included)
pub async fn find_by_id(conn: &mut SqliteConnection, id: ContactId) -> Result<Option<ContactRecord>> {
    let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?");

    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(contact_from_row).transpose()
}

/// Store a new contact and return it with its assigned id
pub async fn insert(conn: &mut SqliteConnection, contact: &NewContact) -> Result<ContactRecord> {
    let id = sqlx::query(
        r#"
        INSERT INTO contacts (
            phone_number, email, linked_id, link_precedence, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(contact.phone_number.as_deref())
    .bind(contact.email.as_deref())
    .bind(contact.linked_id)
    .bind(contact.link_precedence.as_str())
    .bind(contact.created_at)
    .bind(contact.updated_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(contact.clone().with_id(id))
}

/// Make `id` a secondary of `linked_id`
///
/// Used for both demoting a primary and re-pointing a secondary.
pub async fn update_link(
    conn: &mut SqliteConnection,
    id: ContactId,
    linked_id: ContactId,
    updated_at: DateTime<Utc>,
) -> Result<()> {
    let affected = sqlx::query(
        r#"
        UPDATE contacts
        SET link_precedence = ?, linked_id = ?, updated_at = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(LinkPrecedence::Secondary.as_str())
    .bind(linked_id)
    .bind(updated_at)
    .bind(id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(Error::Internal(format!(
            "Contact {} disappeared before it could be linked to {}",
            id, linked_id
        )));
    }

    Ok(())
}

/// Apply every mutation of `plan` in order
///
/// Returns the inserted contact, if the plan inserts one.
pub async fn apply_plan(
    conn: &mut SqliteConnection,
    plan: &ReconciliationPlan,
) -> Result<Option<ContactRecord>> {
    let mut inserted = None;

    for mutation in plan.mutations() {
        match mutation {
            Mutation::Insert(contact) => {
                let record = insert(conn, contact).await?;
                debug!(
                    "Inserted {} contact {}",
                    record.link_precedence, record.id
                );
                inserted = Some(record);
            }
            Mutation::Demote { id, linked_id, updated_at } => {
                update_link(conn, *id, *linked_id, *updated_at).await?;
                debug!("Demoted contact {} under primary {}", id, linked_id);
            }
            Mutation::Relink { id, linked_id, updated_at } => {
                update_link(conn, *id, *linked_id, *updated_at).await?;
                debug!("Relinked contact {} to primary {}", id, linked_id);
            }
        }
    }

    Ok(inserted)
}
