//! Pluggable authentication connectors.
//!
//! A connector verifies credentials against an identity store, hands out
//! an opaque token on success and resolves the role a principal holds. The
//! [`DirectoryConnector`] does both against an LDAP server: bind to
//! authenticate, group membership search to resolve roles.

#![forbid(unsafe_code)]

pub mod config;
pub mod connector;
pub mod credential;
pub mod directory;
pub mod error;
pub mod role;
pub mod token;

use std::path::PathBuf;

pub use config::{ConfigError, Configuration, DirectoryConfig};
pub use connector::{AuthenticationConnector, DirectoryConnector};
pub use credential::CredentialInput;
pub use directory::LdapDirectory;
pub use error::{ConnectorError, ErrorKind};
pub use role::RoleIdentifier;
pub use token::AuthenticationToken;

/// Read the configuration file and build an LDAP-backed connector from it.
pub fn initialize_connector(
    path: Option<PathBuf>,
) -> Result<DirectoryConnector<LdapDirectory>, ConfigError> {
    let config = Configuration::default()
        .path(path.unwrap_or_default())
        .read()?;

    tracing::info!(
        host = %config.directory.host,
        port = config.directory.port,
        base_dn = %config.directory.base_dn,
        "directory connector ready"
    );

    DirectoryConnector::ldap(config.directory)
}
