//! Users, roles, addresses and authentication.

pub mod access;
mod email;
mod password;
mod service;
mod user;

pub use email::{Email, EmailError};
pub use password::{
    MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH, hash_password, password_policy_violation,
    verify_password,
};
pub use service::{IdentityService, Registration};
pub use user::{Address, AddressInput, MAX_NAME_LENGTH, Role, User};

pub(crate) use user::check_text;
