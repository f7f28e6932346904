//! Credentials presented by callers.

use validator::Validate;

/// A principal and its secret, as presented for one authentication.
///
/// Built per call and never stored by connectors. `Debug` output hides the
/// secret so the value can appear in logs and panics.
#[derive(Clone, PartialEq, Eq, Validate)]
pub struct CredentialInput {
    #[validate(length(min = 1))]
    principal: String,
    // Empty passwords turn a simple bind into an unauthenticated bind, which
    // most servers accept.
    #[validate(length(min = 1))]
    credential: String,
}

impl CredentialInput {
    /// Create a new [`CredentialInput`].
    pub fn new(principal: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            credential: credential.into(),
        }
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }
}

impl std::fmt::Debug for CredentialInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialInput")
            .field("principal", &self.principal)
            .field("credential", &"********")
            .finish()
    }
}

/// Principal whose role is being looked up.
#[derive(Debug, Validate)]
pub(crate) struct RoleQuery<'a> {
    #[validate(length(min = 1))]
    pub principal: &'a str,
}
