//! Role resolution from group membership.

use serde::Serialize;

use crate::config::DirectoryConfig;

/// A group entry as returned by a membership search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupEntry {
    /// Distinguished name of the group.
    pub dn: String,
    /// Common name, which becomes the role name.
    pub name: String,
    /// Member distinguished names.
    pub members: Vec<String>,
}

impl GroupEntry {
    pub fn new(
        dn: impl Into<String>,
        name: impl Into<String>,
        members: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            dn: dn.into(),
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact comparison, no DN normalization.
    pub fn has_member(&self, principal: &str) -> bool {
        self.members.iter().any(|member| member == principal)
    }
}

/// Fully qualified role, `cn=<name>,<groups container>,<base dn>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoleIdentifier(String);

impl RoleIdentifier {
    pub fn new(name: &str, config: &DirectoryConfig) -> Self {
        Self(format!("cn={},{}", escape_dn_value(name), config.groups_base()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoleIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Escape an attribute value for use inside a DN (RFC 4514, section 2.4).
fn escape_dn_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut out = String::with_capacity(value.len());

    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            },
            '#' if i == 0 => out.push_str("\\#"),
            ' ' if i == 0 || i == last => out.push_str("\\ "),
            '\0' => out.push_str("\\00"),
            c => out.push(c),
        }
    }
    out
}

/// Pick the group deciding `principal`'s role.
///
/// When several groups list the principal, the one with the smallest DN
/// wins, whatever order the server returned them in.
pub fn select_group<'a>(groups: &'a [GroupEntry], principal: &str) -> Option<&'a GroupEntry> {
    let mut matches = groups.iter().filter(|group| group.has_member(principal));
    let first = matches.next()?;
    let mut candidates = 1;

    let chosen = matches.fold(first, |chosen, group| {
        candidates += 1;
        if group.dn < chosen.dn { group } else { chosen }
    });

    if candidates > 1 {
        tracing::warn!(
            %principal,
            candidates,
            group = %chosen.dn,
            "principal belongs to several groups"
        );
    }

    Some(chosen)
}
