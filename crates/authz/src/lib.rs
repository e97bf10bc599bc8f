//! Authentication primitives: Argon2id password hashes, HS256 bearer tokens
//! and the axum extractors that guard protected routes.

pub mod guard;
pub mod password;
pub mod token;

use serde::{Deserialize, Serialize};

pub use guard::{AuthUser, RequireAdmin};
pub use password::{Argon2Scheme, PasswordError, PasswordScheme};
pub use token::{Claims, TokenError, TokenService};

/// Account role carried in tokens and stored on users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(anyhow::anyhow!("unknown role '{other}'")),
        }
    }
}
