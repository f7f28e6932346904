//! LDAP support.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{
    Ldap, LdapConnAsync, LdapConnSettings, LdapResult, Scope, SearchEntry, SearchResult,
};

use super::{
    BindDescriptor, BindIdentity, DirectoryClient, DirectoryError, DirectorySession, GroupQuery,
    INVALID_CREDENTIALS,
};
use crate::config::{AuthMechanism, DirectoryConfig};
use crate::role::GroupEntry;

const NO_SUCH_OBJECT: u32 = 32;

/// Opens sessions against an LDAP server.
#[derive(Clone, Debug)]
pub struct LdapDirectory {
    config: Arc<DirectoryConfig>,
}

impl LdapDirectory {
    /// Create a new [`LdapDirectory`].
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DirectoryClient for LdapDirectory {
    type Session = LdapSession;

    async fn open(&self) -> Result<LdapSession, DirectoryError> {
        let url = self.config.url().map_err(DirectoryError::connect)?;
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.timeout())
            .set_starttls(self.config.start_tls);

        tracing::trace!(%url, "opening directory connection");
        let (handle, conn) = LdapConnAsync::with_settings(settings, url.as_str())
            .await
            .map_err(DirectoryError::connect)?;
        ldap3::drive!(handle);

        Ok(LdapSession {
            conn,
            timeout: self.config.timeout(),
        })
    }
}

/// One LDAP connection.
///
/// Dropping it without [`DirectorySession::close`] still ends the
/// connection once the driver task notices, but skips the unbind.
pub struct LdapSession {
    conn: Ldap,
    timeout: Duration,
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn bind(&mut self, descriptor: &BindDescriptor) -> Result<(), DirectoryError> {
        let BindIdentity::Simple { dn, password } = descriptor.identity() else {
            return Ok(());
        };

        let result = match descriptor.directory().auth_mechanism {
            AuthMechanism::Simple => {
                self.conn
                    .with_timeout(self.timeout)
                    .simple_bind(dn, password)
                    .await
            },
        }
        .map_err(DirectoryError::protocol)?;

        bind_outcome(result)
    }

    async fn search_groups(
        &mut self,
        query: &GroupQuery,
    ) -> Result<Vec<GroupEntry>, DirectoryError> {
        let filter = format!("(objectClass={})", escape_ldap(&query.object_class));
        let attrs = vec![
            query.member_attribute.as_str(),
            query.name_attribute.as_str(),
        ];

        let result = self
            .conn
            .with_timeout(self.timeout)
            .search(&query.base, Scope::Subtree, &filter, attrs)
            .await
            .map_err(DirectoryError::search)?;

        search_outcome(result, query)
    }

    async fn close(mut self) -> Result<(), DirectoryError> {
        self.conn.unbind().await.map_err(DirectoryError::protocol)
    }
}

/// Only result code 49 means the identity itself was refused.
fn bind_outcome(result: LdapResult) -> Result<(), DirectoryError> {
    match result.rc {
        0 => Ok(()),
        INVALID_CREDENTIALS => Err(DirectoryError::InvalidCredentials),
        code => Err(DirectoryError::BindRejected {
            code,
            message: result.text,
        }),
    }
}

/// A missing groups container holds no groups.
fn search_outcome(
    SearchResult(entries, result): SearchResult,
    query: &GroupQuery,
) -> Result<Vec<GroupEntry>, DirectoryError> {
    if result.rc == NO_SUCH_OBJECT {
        tracing::debug!(base = %query.base, "groups container does not exist");
        return Ok(Vec::new());
    }
    result.success().map_err(DirectoryError::search)?;

    Ok(entries
        .into_iter()
        .filter_map(|entry| group_from_entry(SearchEntry::construct(entry), query))
        .collect())
}

/// Servers are free to change attribute name case, e.g. `uniqueMember` is
/// often asked for as `uniquemember`.
fn attribute<'a>(entry: &'a SearchEntry, name: &str) -> Option<&'a Vec<String>> {
    entry
        .attrs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, values)| values)
}

fn group_from_entry(entry: SearchEntry, query: &GroupQuery) -> Option<GroupEntry> {
    let Some(name) = attribute(&entry, &query.name_attribute).and_then(|v| v.first()) else {
        tracing::debug!(dn = %entry.dn, "skipping group without name");
        return None;
    };

    let members = attribute(&entry, &query.member_attribute)
        .cloned()
        .unwrap_or_default();

    Some(GroupEntry {
        name: name.clone(),
        members,
        dn: entry.dn,
    })
}

fn escape_ldap(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '*' => out.push_str(r"\2a"),
            '(' => out.push_str(r"\28"),
            ')' => out.push_str(r"\29"),
            '\\' => out.push_str(r"\5c"),
            '\0' => out.push_str(r"\00"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry(dn: &str, attrs: &[(&str, &[&str])]) -> SearchEntry {
        SearchEntry {
            dn: dn.into(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect(),
            bin_attrs: HashMap::new(),
        }
    }

    fn ldap_result(rc: u32, text: &str) -> LdapResult {
        LdapResult {
            rc,
            matched: String::new(),
            text: text.into(),
            refs: Vec::new(),
            ctrls: Vec::new(),
        }
    }

    #[test]
    fn test_bind_outcome() {
        assert!(bind_outcome(ldap_result(0, "")).is_ok());
        assert!(matches!(
            bind_outcome(ldap_result(49, "invalid credentials")),
            Err(DirectoryError::InvalidCredentials)
        ));
        assert!(matches!(
            bind_outcome(ldap_result(53, "unwilling to perform")),
            Err(DirectoryError::BindRejected { code: 53, ref message }) if message == "unwilling to perform"
        ));
    }

    #[test]
    fn test_search_outcome() {
        let query = GroupQuery::from(&DirectoryConfig::default());

        let groups = search_outcome(SearchResult(Vec::new(), ldap_result(0, "")), &query).unwrap();
        assert!(groups.is_empty());

        let groups =
            search_outcome(SearchResult(Vec::new(), ldap_result(32, "no such object")), &query)
                .unwrap();
        assert!(groups.is_empty());

        assert!(matches!(
            search_outcome(SearchResult(Vec::new(), ldap_result(4, "size limit exceeded")), &query),
            Err(DirectoryError::Search(_))
        ));
        assert!(matches!(
            search_outcome(SearchResult(Vec::new(), ldap_result(50, "insufficient access")), &query),
            Err(DirectoryError::Search(_))
        ));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_ldap("groupOfUniqueNames"), "groupOfUniqueNames");
        assert_eq!(escape_ldap("*)(uid=*"), r"\2a\29\28uid=\2a");
        assert_eq!(escape_ldap("a\\b\0"), r"a\5cb\00");
    }

    #[test]
    fn test_group_from_entry() {
        let query = GroupQuery::from(&DirectoryConfig::default());
        let group = group_from_entry(
            entry(
                "cn=admins,ou=groups,o=ucsc,dc=lk",
                &[
                    ("cn", &["admins"][..]),
                    ("uniquemember", &["uid=alice,o=ucsc,dc=lk", "uid=bob,o=ucsc,dc=lk"][..]),
                ],
            ),
            &query,
        )
        .unwrap();

        assert_eq!(group.dn, "cn=admins,ou=groups,o=ucsc,dc=lk");
        assert_eq!(group.name, "admins");
        assert!(group.has_member("uid=bob,o=ucsc,dc=lk"));
    }

    #[test]
    fn test_group_without_members() {
        let query = GroupQuery::from(&DirectoryConfig::default());
        let group = group_from_entry(
            entry("cn=empty,ou=groups,o=ucsc,dc=lk", &[("CN", &["empty"][..])]),
            &query,
        )
        .unwrap();
        assert!(group.members.is_empty());
    }

    #[test]
    fn test_group_without_name() {
        let query = GroupQuery::from(&DirectoryConfig::default());
        let group = group_from_entry(
            entry(
                "cn=broken,ou=groups,o=ucsc,dc=lk",
                &[("uniqueMember", &["uid=alice,o=ucsc,dc=lk"][..])],
            ),
            &query,
        );
        assert!(group.is_none());
    }
}
