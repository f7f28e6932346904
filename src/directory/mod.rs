//! Directory server access.
//!
//! A [`DirectoryClient`] opens [`DirectorySession`]s; a session is bound,
//! queried, then closed by the connector that opened it. Sessions are never
//! shared between calls and may be moved to another task.

mod ldap;
#[cfg(test)]
pub(crate) mod mock;

pub use ldap::{LdapDirectory, LdapSession};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::DirectoryConfig;
use crate::role::GroupEntry;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// LDAP `invalidCredentials` result code.
pub(crate) const INVALID_CREDENTIALS: u32 = 49;

/// Errors reported by directory clients.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("cannot reach directory server")]
    Connect(#[source] BoxError),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("bind rejected with code {code}: {message}")]
    BindRejected { code: u32, message: String },

    #[error("search failed")]
    Search(#[source] BoxError),

    #[error("protocol error")]
    Protocol(#[source] BoxError),
}

impl DirectoryError {
    pub fn connect<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Connect(err.into())
    }

    pub fn search<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Search(err.into())
    }

    pub fn protocol<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Protocol(err.into())
    }
}

/// Who a session binds as.
#[derive(Clone, PartialEq, Eq)]
pub enum BindIdentity {
    Anonymous,
    Simple { dn: String, password: String },
}

impl std::fmt::Debug for BindIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindIdentity::Anonymous => f.write_str("Anonymous"),
            BindIdentity::Simple { dn, .. } => f
                .debug_struct("Simple")
                .field("dn", dn)
                .field("password", &"********")
                .finish(),
        }
    }
}

/// Everything one bind needs: the shared server settings plus the identity
/// of the current call.
///
/// Built fresh per call; the shared configuration is only read.
#[derive(Clone, Debug)]
pub struct BindDescriptor {
    directory: Arc<DirectoryConfig>,
    identity: BindIdentity,
}

impl BindDescriptor {
    pub fn new(directory: Arc<DirectoryConfig>, identity: BindIdentity) -> Self {
        Self {
            directory,
            identity,
        }
    }

    pub fn simple(
        directory: Arc<DirectoryConfig>,
        dn: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(
            directory,
            BindIdentity::Simple {
                dn: dn.into(),
                password: password.into(),
            },
        )
    }

    /// Connector's own identity: its service account, or anonymous.
    pub fn service(directory: Arc<DirectoryConfig>) -> Self {
        let identity = match &directory.service_account {
            Some(account) => BindIdentity::Simple {
                dn: account.bind_dn.clone(),
                password: account.password.clone(),
            },
            None => BindIdentity::Anonymous,
        };
        Self::new(directory, identity)
    }

    pub fn directory(&self) -> &DirectoryConfig {
        &self.directory
    }

    pub fn identity(&self) -> &BindIdentity {
        &self.identity
    }
}

/// Group membership search parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupQuery {
    /// Absolute DN the subtree search starts from.
    pub base: String,
    pub object_class: String,
    pub member_attribute: String,
    pub name_attribute: String,
}

impl From<&DirectoryConfig> for GroupQuery {
    fn from(config: &DirectoryConfig) -> Self {
        Self {
            base: config.groups_base(),
            object_class: config.group_object_class.clone(),
            member_attribute: config.member_attribute.clone(),
            name_attribute: config.name_attribute.clone(),
        }
    }
}

/// Opens sessions against a directory server.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    type Session: DirectorySession + 'static;

    /// Open an unbound session.
    async fn open(&self) -> Result<Self::Session, DirectoryError>;
}

/// A live connection, owned by a single call.
#[async_trait]
pub trait DirectorySession: Send {
    /// Authenticate the session. Anonymous identities need no bind.
    async fn bind(&mut self, descriptor: &BindDescriptor) -> Result<(), DirectoryError>;

    /// Subtree search for group entries.
    async fn search_groups(
        &mut self,
        query: &GroupQuery,
    ) -> Result<Vec<GroupEntry>, DirectoryError>;

    /// Release the connection.
    async fn close(self) -> Result<(), DirectoryError>;
}
