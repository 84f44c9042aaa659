use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::entity::{EntityMeta, TenantAwareEntity};

use super::tenant::EntityStatus;

/// A login of any role. All roles share the `users` table and are told apart
/// by the `user_type` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub meta: EntityMeta<i64>,
    pub username: String,
    pub display_name: Option<String>,
    pub email: String,
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed_login_attempts: i32,
    pub status: EntityStatus,
    #[serde(flatten)]
    pub kind: UserKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "user_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserKind {
    /// Support agent working inside the tenant's help desk
    Agent { agent_id: String, domain: String },
    /// End customer raising tickets
    Customer {
        customer_id: String,
        phone_number: Option<String>,
    },
    /// Anonymous visitor bound to a chat session
    Guest {
        session_id: String,
        expiry_time: DateTime<Utc>,
    },
    /// Operator account
    System { role: String },
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>, kind: UserKind) -> Self {
        Self {
            meta: EntityMeta::new(),
            username: username.into(),
            display_name: None,
            email: email.into(),
            last_login: None,
            failed_login_attempts: 0,
            status: EntityStatus::Active,
            kind,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.username.trim().is_empty() {
            return Err("username is required".to_string());
        }
        match self.email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err("Invalid email format".to_string()),
        }
    }
}

impl TenantAwareEntity for User {
    type Id = i64;

    const ENTITY: &'static str = "users";

    fn meta(&self) -> &EntityMeta<i64> {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta<i64> {
        &mut self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_role_into_discriminator_column() {
        let user = User::new(
            "ann",
            "ann@acme.test",
            UserKind::Agent {
                agent_id: "A-1".into(),
                domain: "acme.test".into(),
            },
        );
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["user_type"], "AGENT");
        assert_eq!(value["agent_id"], "A-1");
        assert!(value.get("id").is_none());
        assert!(value.get("tenant_id").is_none());
    }

    #[test]
    fn reads_single_table_row_with_foreign_role_columns() {
        let row = json!({
            "id": 3,
            "tenant_id": "acme",
            "created_at": "2024-05-01T10:00:00+00:00",
            "updated_at": "2024-05-01T10:00:00+00:00",
            "username": "bob",
            "display_name": null,
            "email": "bob@acme.test",
            "last_login": null,
            "failed_login_attempts": 0,
            "status": "ACTIVE",
            "user_type": "CUSTOMER",
            "customer_id": "C-9",
            "phone_number": null,
            "agent_id": null,
            "domain": null,
            "session_id": null,
            "expiry_time": null,
            "role": null
        });
        let user: User = serde_json::from_value(row).unwrap();
        assert_eq!(user.id(), Some(&3));
        assert_eq!(user.tenant_id(), Some("acme"));
        assert_eq!(
            user.kind,
            UserKind::Customer {
                customer_id: "C-9".into(),
                phone_number: None
            }
        );
    }

    #[test]
    fn validates_email() {
        let mut user = User::new("ann", "not-an-email", UserKind::System { role: "ops".into() });
        assert!(user.validate().is_err());
        user.email = "ann@acme.test".into();
        assert!(user.validate().is_ok());
    }
}
