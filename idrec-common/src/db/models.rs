//! Contact record model
//!
//! A person is represented by one primary contact and zero or more
//! secondary contacts linked to it. Records are never deleted here;
//! `deleted_at` marks a soft-deleted row that is excluded from matching.

use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Contact identifier (SQLite rowid)
pub type ContactId = i64;

/// Whether a contact is the canonical record of its group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    Primary,
    Secondary,
}

impl LinkPrecedence {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkPrecedence::Primary => "primary",
            LinkPrecedence::Secondary => "secondary",
        }
    }
}

impl fmt::Display for LinkPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkPrecedence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(LinkPrecedence::Primary),
            "secondary" => Ok(LinkPrecedence::Secondary),
            other => Err(Error::CorruptRecord(format!(
                "Unknown link precedence: {}",
                other
            ))),
        }
    }
}

/// A stored contact row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub id: ContactId,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    /// Primary of the group; set only on secondary records
    pub linked_id: Option<ContactId>,
    pub link_precedence: LinkPrecedence,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ContactRecord {
    /// Build an active primary record
    pub fn primary(
        id: ContactId,
        email: Option<&str>,
        phone_number: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email: email.map(str::to_owned),
            phone_number: phone_number.map(str::to_owned),
            linked_id: None,
            link_precedence: LinkPrecedence::Primary,
            created_at,
            updated_at: created_at,
            deleted_at: None,
        }
    }

    /// Build an active secondary record linked to `linked_id`
    pub fn secondary(
        id: ContactId,
        email: Option<&str>,
        phone_number: Option<&str>,
        linked_id: ContactId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            linked_id: Some(linked_id),
            link_precedence: LinkPrecedence::Secondary,
            ..Self::primary(id, email, phone_number, created_at)
        }
    }

    pub fn is_primary(&self) -> bool {
        self.link_precedence == LinkPrecedence::Primary
    }

    /// Not soft-deleted
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Id of the record this one hangs off: itself if primary, else its link
    ///
    /// `None` for a secondary with no link (malformed data).
    pub fn group_root(&self) -> Option<ContactId> {
        match self.link_precedence {
            LinkPrecedence::Primary => Some(self.id),
            LinkPrecedence::Secondary => self.linked_id,
        }
    }
}

/// A contact that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub linked_id: Option<ContactId>,
    pub link_precedence: LinkPrecedence,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewContact {
    /// A brand-new person
    pub fn primary(
        email: Option<String>,
        phone_number: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            email,
            phone_number,
            linked_id: None,
            link_precedence: LinkPrecedence::Primary,
            created_at: now,
            updated_at: now,
        }
    }

    /// New information for the person whose primary is `linked_id`
    pub fn secondary(
        email: Option<String>,
        phone_number: Option<String>,
        linked_id: ContactId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            linked_id: Some(linked_id),
            link_precedence: LinkPrecedence::Secondary,
            ..Self::primary(email, phone_number, now)
        }
    }

    /// Attach the id assigned by the store
    pub fn with_id(self, id: ContactId) -> ContactRecord {
        ContactRecord {
            id,
            email: self.email,
            phone_number: self.phone_number,
            linked_id: self.linked_id,
            link_precedence: self.link_precedence,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: None,
        }
    }
}
