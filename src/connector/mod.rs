//! Authentication connectors.

mod directory;

pub use directory::DirectoryConnector;

use async_trait::async_trait;

use crate::credential::CredentialInput;
use crate::error::Result;
use crate::role::RoleIdentifier;
use crate::token::AuthenticationToken;

/// Contract every identity backend implements.
///
/// Calls are independent: implementations keep no per-call state between
/// invocations and must be safe to call concurrently.
#[async_trait]
pub trait AuthenticationConnector: Send + Sync {
    /// Verify `credential` and mint a token for it.
    ///
    /// Empty principals or credentials are refused before any I/O.
    async fn authenticate(&self, credential: &CredentialInput) -> Result<AuthenticationToken>;

    /// Resolve the role held by `principal`.
    async fn resolve_role(&self, principal: &str) -> Result<RoleIdentifier>;
}
