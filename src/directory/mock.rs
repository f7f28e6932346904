//! In-memory directory recording every operation.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{BindDescriptor, BindIdentity, DirectoryClient, DirectoryError, DirectorySession, GroupQuery};
use crate::role::GroupEntry;

/// How binds are answered.
#[derive(Clone, Debug, Default)]
pub(crate) enum BindPolicy {
    #[default]
    AcceptAll,
    /// Every simple bind fails with invalid credentials.
    RejectAll,
    /// Every simple bind fails with a non-credential result code.
    Refuse,
    /// Accept only these `dn => password` pairs.
    Accounts(HashMap<String, String>),
}

#[derive(Debug, Default)]
pub(crate) struct MockSettings {
    pub policy: BindPolicy,
    pub groups: Vec<GroupEntry>,
    pub unreachable: bool,
    pub fail_search: bool,
    pub bind_delay: Option<Duration>,
    pub search_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct Inner {
    settings: MockSettings,
    opens: AtomicUsize,
    closes: AtomicUsize,
    searches: AtomicUsize,
    binds: Mutex<Vec<BindIdentity>>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct MockDirectory {
    inner: Arc<Inner>,
}

impl MockDirectory {
    pub fn new(settings: MockSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                ..Default::default()
            }),
        }
    }

    pub fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.inner.searches.load(Ordering::SeqCst)
    }

    pub fn binds(&self) -> Vec<BindIdentity> {
        self.inner.binds.lock().unwrap().clone()
    }
}

#[async_trait]
impl DirectoryClient for MockDirectory {
    type Session = MockSession;

    async fn open(&self) -> Result<MockSession, DirectoryError> {
        if self.inner.settings.unreachable {
            return Err(DirectoryError::connect(io::Error::from(
                io::ErrorKind::ConnectionRefused,
            )));
        }

        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            inner: Arc::clone(&self.inner),
        })
    }
}

pub(crate) struct MockSession {
    inner: Arc<Inner>,
}

#[async_trait]
impl DirectorySession for MockSession {
    async fn bind(&mut self, descriptor: &BindDescriptor) -> Result<(), DirectoryError> {
        if let Some(delay) = self.inner.settings.bind_delay {
            tokio::time::sleep(delay).await;
        }
        // Give concurrent calls a chance to interleave.
        tokio::task::yield_now().await;

        let identity = descriptor.identity().clone();
        self.inner.binds.lock().unwrap().push(identity.clone());

        let BindIdentity::Simple { dn, password } = identity else {
            return Ok(());
        };

        match &self.inner.settings.policy {
            BindPolicy::AcceptAll => Ok(()),
            BindPolicy::RejectAll => Err(DirectoryError::InvalidCredentials),
            BindPolicy::Refuse => Err(DirectoryError::BindRejected {
                code: 53,
                message: "unwilling to perform".into(),
            }),
            BindPolicy::Accounts(accounts) => match accounts.get(&dn) {
                Some(expected) if *expected == password => Ok(()),
                _ => Err(DirectoryError::InvalidCredentials),
            },
        }
    }

    async fn search_groups(
        &mut self,
        _query: &GroupQuery,
    ) -> Result<Vec<GroupEntry>, DirectoryError> {
        if let Some(delay) = self.inner.settings.search_delay {
            tokio::time::sleep(delay).await;
        }

        self.inner.searches.fetch_add(1, Ordering::SeqCst);
        if self.inner.settings.fail_search {
            return Err(DirectoryError::search("size limit exceeded"));
        }
        Ok(self.inner.settings.groups.clone())
    }

    async fn close(self) -> Result<(), DirectoryError> {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
