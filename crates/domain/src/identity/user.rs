//! User aggregate with owned addresses and roles.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{AddressId, UserId};
use serde::{Deserialize, Serialize};

use super::Email;
use crate::error::ValidationErrors;

/// Maximum length of name-like text fields.
pub const MAX_NAME_LENGTH: usize = 100;

/// Authorization role held by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
    Carrier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
            Role::Carrier => "carrier",
        }
    }

    /// Parses the stored representation of a role.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Role::Customer),
            "admin" => Some(Role::Admin),
            "carrier" => Some(Role::Carrier),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address fields supplied by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressInput {
    /// Checks that every field is present and reasonably sized.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, value) in [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ] {
            check_text(&mut errors, field, value);
        }
        errors.into_result()
    }
}

/// A postal address owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// User aggregate root.
///
/// Fields are public for the persistence mapping; state changes go through
/// the methods below so the role and default-address invariants hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    /// Never empty.
    pub roles: BTreeSet<Role>,
    /// Ordered by creation; at most one is the default.
    pub addresses: Vec<Address>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new active user holding a single role.
    pub fn new(
        email: Email,
        password_hash: String,
        first_name: &str,
        last_name: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_text(&mut errors, "first_name", first_name);
        check_text(&mut errors, "last_name", last_name);
        errors.into_result()?;

        Ok(Self {
            id: UserId::new(),
            email,
            password_hash,
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            roles: BTreeSet::from([role]),
            addresses: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_carrier(&self) -> bool {
        self.has_role(Role::Carrier)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Returns the default address, if the user has any address.
    pub fn default_address(&self) -> Option<&Address> {
        self.addresses.iter().find(|a| a.is_default)
    }

    pub fn find_address(&self, id: AddressId) -> Option<&Address> {
        self.addresses.iter().find(|a| a.id == id)
    }

    /// Adds an address. The first address always becomes the default.
    pub fn add_address(
        &mut self,
        input: AddressInput,
        now: DateTime<Utc>,
    ) -> Result<AddressId, ValidationErrors> {
        input.validate()?;

        let make_default = input.is_default || self.addresses.is_empty();
        if make_default {
            for address in &mut self.addresses {
                address.is_default = false;
            }
        }

        let id = AddressId::new();
        self.addresses.push(Address {
            id,
            street: input.street.trim().to_string(),
            city: input.city.trim().to_string(),
            state: input.state.trim().to_string(),
            postal_code: input.postal_code.trim().to_string(),
            country: input.country.trim().to_string(),
            is_default: make_default,
            created_at: now,
        });
        self.updated_at = now;
        Ok(id)
    }

    /// Removes an address. Removing the default promotes the oldest remaining
    /// address. Returns false if the address does not belong to the user.
    pub fn remove_address(&mut self, id: AddressId, now: DateTime<Utc>) -> bool {
        let Some(pos) = self.addresses.iter().position(|a| a.id == id) else {
            return false;
        };
        let removed = self.addresses.remove(pos);
        if removed.is_default
            && let Some(first) = self.addresses.first_mut()
        {
            first.is_default = true;
        }
        self.updated_at = now;
        true
    }

    /// Makes an existing address the default.
    pub fn set_default_address(&mut self, id: AddressId, now: DateTime<Utc>) -> bool {
        if self.find_address(id).is_none() {
            return false;
        }
        for address in &mut self.addresses {
            address.is_default = address.id == id;
        }
        self.updated_at = now;
        true
    }

    /// Replaces the role set. An empty set is rejected.
    pub fn set_roles(
        &mut self,
        roles: BTreeSet<Role>,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationErrors> {
        if roles.is_empty() {
            return Err(ValidationErrors::single("roles", "at least one role is required"));
        }
        self.roles = roles;
        self.updated_at = now;
        Ok(())
    }

    /// Grants a role. Returns false if the user already held it.
    pub fn grant_role(&mut self, role: Role, now: DateTime<Utc>) -> bool {
        let added = self.roles.insert(role);
        if added {
            self.updated_at = now;
        }
        added
    }

    /// Revokes a role. Revoking the last remaining role is rejected.
    pub fn revoke_role(&mut self, role: Role, now: DateTime<Utc>) -> Result<bool, ValidationErrors> {
        if !self.roles.contains(&role) {
            return Ok(false);
        }
        if self.roles.len() == 1 {
            return Err(ValidationErrors::single("roles", "cannot revoke the last role"));
        }
        self.roles.remove(&role);
        self.updated_at = now;
        Ok(true)
    }

    /// Soft-deactivates the account. Deactivating twice is a no-op.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        if self.is_active {
            self.is_active = false;
            self.updated_at = now;
        }
    }
}

/// Records an error if `value` is blank or longer than [`MAX_NAME_LENGTH`].
pub(crate) fn check_text(errors: &mut ValidationErrors, field: &str, value: &str) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, "must not be empty");
    } else if trimmed.chars().count() > MAX_NAME_LENGTH {
        errors.add(field, format!("must be at most {MAX_NAME_LENGTH} characters"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new(
            Email::parse("jane@example.com").unwrap(),
            "hash".to_string(),
            "Jane",
            "Doe",
            Role::Customer,
            Utc::now(),
        )
        .unwrap()
    }

    fn address(street: &str, is_default: bool) -> AddressInput {
        AddressInput {
            street: street.to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62701".to_string(),
            country: "US".to_string(),
            is_default,
        }
    }

    #[test]
    fn new_user_is_active_with_single_role() {
        let user = user();
        assert!(user.is_active);
        assert!(user.has_role(Role::Customer));
        assert!(!user.is_admin());
        assert_eq!(user.full_name(), "Jane Doe");
    }

    #[test]
    fn new_user_rejects_blank_names() {
        let result = User::new(
            Email::parse("jane@example.com").unwrap(),
            "hash".to_string(),
            " ",
            "",
            Role::Customer,
            Utc::now(),
        );
        let errors = result.unwrap_err();
        assert!(errors.fields().contains_key("first_name"));
        assert!(errors.fields().contains_key("last_name"));
    }

    #[test]
    fn first_address_becomes_default() {
        let mut user = user();
        let id = user.add_address(address("1 Main St", false), Utc::now()).unwrap();
        assert_eq!(user.default_address().map(|a| a.id), Some(id));
    }

    #[test]
    fn new_default_address_clears_previous_default() {
        let mut user = user();
        let first = user.add_address(address("1 Main St", false), Utc::now()).unwrap();
        let second = user.add_address(address("2 Oak Ave", true), Utc::now()).unwrap();

        assert_eq!(user.default_address().map(|a| a.id), Some(second));
        assert!(!user.find_address(first).unwrap().is_default);
        assert_eq!(user.addresses.iter().filter(|a| a.is_default).count(), 1);
    }

    #[test]
    fn removing_default_promotes_oldest_remaining() {
        let mut user = user();
        let first = user.add_address(address("1 Main St", false), Utc::now()).unwrap();
        let second = user.add_address(address("2 Oak Ave", false), Utc::now()).unwrap();
        let third = user.add_address(address("3 Elm Rd", false), Utc::now()).unwrap();

        assert!(user.remove_address(first, Utc::now()));
        assert_eq!(user.default_address().map(|a| a.id), Some(second));
        assert!(user.find_address(third).is_some());
        assert!(!user.remove_address(first, Utc::now()));
    }

    #[test]
    fn invalid_address_is_rejected() {
        let mut user = user();
        let mut input = address("", false);
        input.country = String::new();
        let errors = user.add_address(input, Utc::now()).unwrap_err();
        assert!(errors.fields().contains_key("street"));
        assert!(errors.fields().contains_key("country"));
        assert!(user.addresses.is_empty());
    }

    #[test]
    fn roles_cannot_be_emptied() {
        let mut user = user();
        assert!(user.set_roles(BTreeSet::new(), Utc::now()).is_err());
        assert!(user.grant_role(Role::Admin, Utc::now()));
        assert!(!user.grant_role(Role::Admin, Utc::now()));
        assert!(user.is_admin());

        assert_eq!(user.revoke_role(Role::Customer, Utc::now()), Ok(true));
        assert_eq!(user.revoke_role(Role::Customer, Utc::now()), Ok(false));
        assert!(user.revoke_role(Role::Admin, Utc::now()).is_err());
        assert!(user.is_admin());
    }

    #[test]
    fn deactivate_is_idempotent() {
        let mut user = user();
        user.deactivate(Utc::now());
        let stamp = user.updated_at;
        user.deactivate(Utc::now());
        assert!(!user.is_active);
        assert_eq!(user.updated_at, stamp);
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let json = serde_json::to_value(user()).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
