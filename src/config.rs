//! Configuration manager for connectors.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use validator::{Validate, ValidationErrors};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const REDACTED: &str = "********";

/// Errors raised while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file: {0}")]
    Read(#[from] io::Error),

    #[error("malformed configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid directory address: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationErrors),
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Related to the directory server.
    pub directory: DirectoryConfig,
    #[serde(skip)]
    path: PathBuf,
}

/// Supported bind mechanisms.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMechanism {
    /// Plain DN/password bind.
    #[default]
    Simple,
}

/// Directory server configuration.
///
/// Immutable once a connector is built from it; every call reads it through
/// a shared `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Hostname of the directory server.
    #[validate(length(min = 1))]
    pub host: String,
    pub port: u16,
    /// Naming context every entry lives under.
    #[validate(length(min = 1))]
    pub base_dn: String,
    pub auth_mechanism: AuthMechanism,
    /// Container, relative to `base_dn`, holding role groups.
    #[validate(length(min = 1))]
    pub groups_container: String,
    #[validate(length(min = 1))]
    pub group_object_class: String,
    #[validate(length(min = 1))]
    pub member_attribute: String,
    #[validate(length(min = 1))]
    pub name_attribute: String,
    /// Upper bound for every directory operation, in milliseconds.
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
    pub start_tls: bool,
    /// Identity used for group searches. Anonymous when missing.
    #[validate(nested)]
    pub service_account: Option<ServiceAccount>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 10389,
            base_dn: "o=ucsc,dc=lk".into(),
            auth_mechanism: AuthMechanism::Simple,
            groups_container: "ou=groups".into(),
            group_object_class: "groupOfUniqueNames".into(),
            member_attribute: "uniqueMember".into(),
            name_attribute: "cn".into(),
            timeout_ms: 10_000,
            start_tls: false,
            service_account: None,
        }
    }
}

/// Connector's own directory identity.
#[derive(Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ServiceAccount {
    #[validate(length(min = 1))]
    pub bind_dn: String,
    #[validate(length(min = 1))]
    pub password: String,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("bind_dn", &self.bind_dn)
            .field("password", &REDACTED)
            .finish()
    }
}

impl DirectoryConfig {
    /// Check every field and the resulting server address.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;
        self.url()?;
        Ok(())
    }

    /// Server address, e.g. `ldap://localhost:10389`.
    pub fn url(&self) -> Result<Url, url::ParseError> {
        if self.host.contains(':') && !self.host.starts_with('[') {
            Url::parse(&format!("ldap://[{}]:{}", self.host, self.port))
        } else {
            Url::parse(&format!("ldap://{}:{}", self.host, self.port))
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Absolute DN of the groups container.
    pub fn groups_base(&self) -> String {
        format!("{},{}", self.groups_container, self.base_dn)
    }

    /// Copy safe to print or log.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(account) = config.service_account.as_mut() {
            account.password = REDACTED.into();
        }
        config
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    ///
    /// A missing file yields the defaults; a malformed or invalid one is an
    /// error.
    pub fn read(self) -> Result<Self, ConfigError> {
        let file_path = if self.path.as_os_str().is_empty() {
            Path::new(DEFAULT_CONFIG_PATH)
        } else {
            self.path.as_path()
        };

        let config = match File::open(file_path) {
            Ok(file) => Self::from_reader(file)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %file_path.display(),
                    "configuration file not found, using defaults"
                );
                Self::default()
            },
            Err(err) => return Err(err.into()),
        };

        config.directory.check()?;
        Ok(config.path(file_path.to_path_buf()))
    }

    fn from_reader(reader: impl Read) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_reader(reader)?)
    }
}
