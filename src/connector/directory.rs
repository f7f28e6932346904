//! Connector backed by a directory server.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use validator::Validate;

use super::AuthenticationConnector;
use crate::config::{ConfigError, DirectoryConfig};
use crate::credential::{CredentialInput, RoleQuery};
use crate::directory::{
    BindDescriptor, DirectoryClient, DirectoryError, DirectorySession, GroupQuery,
    INVALID_CREDENTIALS, LdapDirectory,
};
use crate::error::{ConnectorError, ErrorKind, Result};
use crate::role::{GroupEntry, RoleIdentifier, select_group};
use crate::token::{AuthenticationToken, RandomTokenIssuer, TokenIssuer};

/// Authenticates by binding to a directory and resolves roles from group
/// membership.
///
/// Every call opens its own session on a dedicated task and closes it before
/// that task ends, whatever the outcome. The task keeps running if the
/// caller stops waiting, so a cancelled call still releases its session.
/// Callers' credentials only ever live in a [`BindDescriptor`] owned by the
/// call.
pub struct DirectoryConnector<C, I = RandomTokenIssuer> {
    config: Arc<DirectoryConfig>,
    query: Arc<GroupQuery>,
    client: Arc<C>,
    issuer: I,
}

impl DirectoryConnector<LdapDirectory> {
    /// Create a connector talking to an LDAP server.
    pub fn ldap(config: DirectoryConfig) -> std::result::Result<Self, ConfigError> {
        config.check()?;

        let config = Arc::new(config);
        let client = LdapDirectory::new(Arc::clone(&config));
        Ok(Self::new(config, client, RandomTokenIssuer))
    }
}

impl<C, I> DirectoryConnector<C, I>
where
    C: DirectoryClient + 'static,
    I: TokenIssuer,
{
    /// Create a new [`DirectoryConnector`].
    pub fn new(config: Arc<DirectoryConfig>, client: C, issuer: I) -> Self {
        Self {
            query: Arc::new(GroupQuery::from(config.as_ref())),
            config,
            client: Arc::new(client),
            issuer,
        }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    async fn bind_as(&self, credential: &CredentialInput) -> Result<AuthenticationToken> {
        credential.validate()?;

        let descriptor = BindDescriptor::simple(
            Arc::clone(&self.config),
            credential.principal(),
            credential.credential(),
        );
        let client = Arc::clone(&self.client);
        let after = self.config.timeout();

        joined(tokio::spawn(async move {
            let mut session = within(after, "connect", client.open()).await?;
            let bound = within(after, "bind", session.bind(&descriptor)).await;
            release(session, after).await;
            bound
        }))
        .await?;

        Ok(self.issuer.issue())
    }

    async fn lookup_role(&self, principal: &str) -> Result<RoleIdentifier> {
        RoleQuery { principal }.validate()?;

        let descriptor = BindDescriptor::service(Arc::clone(&self.config));
        let client = Arc::clone(&self.client);
        let query = Arc::clone(&self.query);
        let after = self.config.timeout();

        let groups = joined(tokio::spawn(async move {
            let mut session = within(after, "connect", client.open()).await?;
            let groups = search_groups(&mut session, &descriptor, &query, after).await;
            release(session, after).await;
            groups
        }))
        .await?;
        tracing::trace!(groups = groups.len(), "group search finished");

        match select_group(&groups, principal) {
            Some(group) => Ok(RoleIdentifier::new(&group.name, &self.config)),
            None => Err(ConnectorError::RoleNotFound {
                principal: principal.to_owned(),
            }),
        }
    }
}

/// Run one directory operation under `after`.
async fn within<T, F>(after: Duration, operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, DirectoryError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result.map_err(ConnectorError::from),
        Err(_) => Err(ConnectorError::Timeout { operation, after }),
    }
}

/// Close `session`. Failures are logged, never returned: the call outcome is
/// already decided.
async fn release<S: DirectorySession>(session: S, after: Duration) {
    match tokio::time::timeout(after, session.close()).await {
        Ok(Ok(())) => {},
        Ok(Err(err)) => {
            tracing::warn!(error = ?err, "cannot close directory connection")
        },
        Err(_) => tracing::warn!("closing directory connection timed out"),
    }
}

async fn search_groups<S: DirectorySession>(
    session: &mut S,
    descriptor: &BindDescriptor,
    query: &GroupQuery,
    after: Duration,
) -> Result<Vec<GroupEntry>> {
    within(after, "bind", async {
        session.bind(descriptor).await.map_err(service_bind_error)
    })
    .await?;
    within(after, "search", session.search_groups(query)).await
}

/// The connector's own identity being refused is a backend fault, not a
/// caller one.
fn service_bind_error(err: DirectoryError) -> DirectoryError {
    match err {
        DirectoryError::InvalidCredentials => DirectoryError::BindRejected {
            code: INVALID_CREDENTIALS,
            message: "service account credentials rejected".into(),
        },
        err => err,
    }
}

async fn joined<T>(task: JoinHandle<Result<T>>) -> Result<T> {
    task.await
        .map_err(|err| ConnectorError::Unavailable(DirectoryError::protocol(err)))?
}

#[async_trait]
impl<C, I> AuthenticationConnector for DirectoryConnector<C, I>
where
    C: DirectoryClient + 'static,
    I: TokenIssuer,
{
    async fn authenticate(&self, credential: &CredentialInput) -> Result<AuthenticationToken> {
        let start = Instant::now();
        let result = self.bind_as(credential).await;

        let outcome = match &result {
            Ok(_) => {
                tracing::debug!(principal = %credential.principal(), "principal authenticated");
                "success"
            },
            Err(err) => {
                report("authentication", credential.principal(), err);
                err.outcome()
            },
        };

        metrics::counter!("connector_authentications_total", "outcome" => outcome).increment(1);
        metrics::histogram!("connector_request_duration_seconds", "operation" => "authenticate")
            .record(start.elapsed().as_secs_f64());

        result
    }

    async fn resolve_role(&self, principal: &str) -> Result<RoleIdentifier> {
        let start = Instant::now();
        let result = self.lookup_role(principal).await;

        let outcome = match &result {
            Ok(role) => {
                tracing::debug!(%principal, %role, "role resolved");
                "success"
            },
            Err(err) => {
                report("role resolution", principal, err);
                err.outcome()
            },
        };

        metrics::counter!("connector_role_resolutions_total", "outcome" => outcome).increment(1);
        metrics::histogram!("connector_request_duration_seconds", "operation" => "resolve_role")
            .record(start.elapsed().as_secs_f64());

        result
    }
}

fn report(operation: &str, principal: &str, err: &ConnectorError) {
    match err.kind() {
        ErrorKind::BackendUnavailable if err.is_retryable() => {
            tracing::error!(%principal, error = ?err, "{operation} failed")
        },
        _ => tracing::info!(%principal, error = %err, "{operation} refused"),
    }
}
