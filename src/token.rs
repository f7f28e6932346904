//! Opaque authentication tokens.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Proof of a successful authentication.
///
/// Carries no claims: it is an identifier the caller may hand to whatever
/// session layer it runs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthenticationToken {
    id: String,
}

impl AuthenticationToken {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn into_inner(self) -> String {
        self.id
    }
}

impl std::fmt::Display for AuthenticationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Mint tokens on successful authentications.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self) -> AuthenticationToken;
}

/// Issues random UUID v4 tokens.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomTokenIssuer;

impl TokenIssuer for RandomTokenIssuer {
    fn issue(&self) -> AuthenticationToken {
        AuthenticationToken {
            id: Uuid::new_v4().to_string(),
        }
    }
}
