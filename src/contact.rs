//! In-memory contact intake store.
//!
//! Letter-writing and contact submissions land here and live until process
//! restart — the original deployment forwarded these to a CRM out of band,
//! so nothing is persisted locally.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An incoming contact submission.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactRequest {
    /// Minimal field validation; returns the offending field name.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("name");
        }
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err("email");
        }
        if self.message.trim().is_empty() {
            return Err("message");
        }
        Ok(())
    }
}

/// A stored contact with its assigned identifier.
#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub message: String,
    pub received_at: DateTime<Utc>,
}

/// Thread-safe in-memory contact list.
#[derive(Default)]
pub struct ContactStore {
    contacts: RwLock<Vec<Contact>>,
}

impl ContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a submission and return its assigned id.
    pub fn create(&self, request: ContactRequest) -> Uuid {
        let contact = Contact {
            id: Uuid::new_v4(),
            name: request.name,
            email: request.email,
            message: request.message,
            received_at: Utc::now(),
        };
        let id = contact.id;
        self.contacts.write().push(contact);
        id
    }

    pub fn len(&self) -> usize {
        self.contacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ContactRequest {
        ContactRequest {
            name: "Ada".to_string(),
            email: "ada@example.org".to_string(),
            message: "Please review the case.".to_string(),
        }
    }

    #[test]
    fn test_create_assigns_unique_ids() {
        let store = ContactStore::new();
        let a = store.create(request());
        let b = store.create(request());
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let mut r = request();
        r.name = "  ".to_string();
        assert_eq!(r.validate(), Err("name"));

        let mut r = request();
        r.email = "not-an-email".to_string();
        assert_eq!(r.validate(), Err("email"));

        let mut r = request();
        r.message = String::new();
        assert_eq!(r.validate(), Err("message"));

        assert!(request().validate().is_ok());
    }
}
