//! Registration, authentication and account management.

use std::collections::BTreeSet;

use chrono::Utc;
use common::{AddressId, UserId};
use serde::Deserialize;

use super::access::{require_admin, require_self_or_admin};
use super::{
    Address, AddressInput, Email, Role, User, check_text, hash_password,
    password_policy_violation, verify_password,
};
use crate::error::{DomainError, Result, ValidationErrors};
use crate::pagination::{Page, PageRequest};
use crate::ports::UserRepository;

/// Sign-up data for a new account.
#[derive(Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Service for user accounts.
#[derive(Debug, Clone)]
pub struct IdentityService<S> {
    store: S,
}

impl<S: UserRepository> IdentityService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Registers a customer account.
    #[tracing::instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register_customer(&self, registration: Registration) -> Result<User> {
        self.register(registration, Role::Customer).await
    }

    /// Registers a carrier account.
    #[tracing::instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register_carrier(&self, registration: Registration) -> Result<User> {
        self.register(registration, Role::Carrier).await
    }

    async fn register(&self, registration: Registration, role: Role) -> Result<User> {
        let mut errors = ValidationErrors::new();
        let email = Email::parse(&registration.email);
        if let Err(e) = &email {
            errors.add("email", e.to_string());
        }
        if let Some(violation) = password_policy_violation(&registration.password) {
            errors.add("password", violation);
        }
        check_text(&mut errors, "first_name", &registration.first_name);
        check_text(&mut errors, "last_name", &registration.last_name);
        errors.into_result()?;
        let email = email.map_err(|e| DomainError::invalid("email", e.to_string()))?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(DomainError::Conflict("email is already registered".to_string()));
        }

        let password_hash = hash_password(&registration.password)?;
        let user = User::new(
            email,
            password_hash,
            &registration.first_name,
            &registration.last_name,
            role,
            Utc::now(),
        )?;
        self.store.insert_user(&user).await?;

        tracing::info!(user_id = %user.id, %role, "user registered");
        Ok(user)
    }

    /// Checks credentials and returns the account.
    ///
    /// Unknown email, wrong password, inactive account and missing role all
    /// produce [`DomainError::InvalidCredentials`].
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        required_role: Option<Role>,
    ) -> Result<User> {
        let user = match self.check_credentials(email, password, required_role).await? {
            Some(user) => user,
            None => {
                metrics::counter!("auth_logins_total", "outcome" => "failure").increment(1);
                tracing::warn!("login rejected");
                return Err(DomainError::InvalidCredentials);
            }
        };

        metrics::counter!("auth_logins_total", "outcome" => "success").increment(1);
        tracing::info!(user_id = %user.id, "login succeeded");
        Ok(user)
    }

    async fn check_credentials(
        &self,
        email: &str,
        password: &str,
        required_role: Option<Role>,
    ) -> Result<Option<User>> {
        let Ok(email) = Email::parse(email) else {
            return Ok(None);
        };
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            return Ok(None);
        };
        if !verify_password(password, &user.password_hash) || !user.is_active {
            return Ok(None);
        }
        if let Some(role) = required_role
            && !user.has_role(role)
        {
            return Ok(None);
        }
        Ok(Some(user))
    }

    /// Loads a user by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_user(&self, id: UserId) -> Result<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", id))
    }

    /// Loads a user on behalf of `requester` (themselves or an admin).
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn get_user_for(&self, requester: &User, id: UserId) -> Result<User> {
        require_self_or_admin(requester, id)?;
        self.get_user(id).await
    }

    /// Lists all users. Admin only.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn list_users(&self, requester: &User, page: PageRequest) -> Result<Page<User>> {
        require_admin(requester)?;
        Ok(self.store.list_users(page).await?)
    }

    /// Soft-deactivates an account.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn deactivate_user(&self, requester: &User, id: UserId) -> Result<()> {
        require_self_or_admin(requester, id)?;
        let mut user = self.get_user(id).await?;
        user.deactivate(Utc::now());
        self.store.save_user(&user).await?;
        tracing::info!(user_id = %id, "user deactivated");
        Ok(())
    }

    /// Adds an address to a user's address book.
    #[tracing::instrument(skip(self, requester, input), fields(requester = %requester.id))]
    pub async fn add_address(
        &self,
        requester: &User,
        user_id: UserId,
        input: AddressInput,
    ) -> Result<Address> {
        require_self_or_admin(requester, user_id)?;
        let mut user = self.get_user(user_id).await?;
        let address_id = user.add_address(input, Utc::now())?;
        self.store.save_user(&user).await?;
        user.find_address(address_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("address", address_id))
    }

    /// Removes an address from a user's address book.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn remove_address(
        &self,
        requester: &User,
        user_id: UserId,
        address_id: AddressId,
    ) -> Result<()> {
        require_self_or_admin(requester, user_id)?;
        let mut user = self.get_user(user_id).await?;
        if !user.remove_address(address_id, Utc::now()) {
            return Err(DomainError::not_found("address", address_id));
        }
        self.store.save_user(&user).await?;
        Ok(())
    }

    /// Replaces a user's roles. Admin only.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn set_roles(
        &self,
        requester: &User,
        id: UserId,
        roles: BTreeSet<Role>,
    ) -> Result<User> {
        require_admin(requester)?;
        let mut user = self.get_user(id).await?;
        user.set_roles(roles, Utc::now())?;
        self.store.save_user(&user).await?;
        tracing::info!(user_id = %id, roles = ?user.roles, "roles replaced");
        Ok(user)
    }

    /// Grants a role. Admin only.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn grant_role(&self, requester: &User, id: UserId, role: Role) -> Result<User> {
        require_admin(requester)?;
        let mut user = self.get_user(id).await?;
        if user.grant_role(role, Utc::now()) {
            self.store.save_user(&user).await?;
        }
        Ok(user)
    }

    /// Revokes a role. Admin only; the last role cannot be revoked.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn revoke_role(&self, requester: &User, id: UserId, role: Role) -> Result<User> {
        require_admin(requester)?;
        let mut user = self.get_user(id).await?;
        if user.revoke_role(role, Utc::now())? {
            self.store.save_user(&user).await?;
        }
        Ok(user)
    }

    /// Makes sure an admin account exists for `email`.
    ///
    /// An existing account is granted the admin role; its password is left
    /// unchanged. Otherwise a new admin account is created.
    #[tracing::instrument(skip(self, password))]
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<User> {
        let parsed = Email::parse(email).map_err(|e| DomainError::invalid("email", e.to_string()))?;
        if let Some(mut user) = self.store.find_user_by_email(&parsed).await? {
            if user.grant_role(Role::Admin, Utc::now()) {
                self.store.save_user(&user).await?;
                tracing::info!(user_id = %user.id, "admin role granted to existing user");
            }
            return Ok(user);
        }

        self.register(
            Registration {
                email: email.to_string(),
                password: password.to_string(),
                first_name: "Store".to_string(),
                last_name: "Admin".to_string(),
            },
            Role::Admin,
        )
        .await
    }
}
