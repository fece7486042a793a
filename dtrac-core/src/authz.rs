//! Path-level authorization for repository browsing
//!
//! The repository layer consults an [`Authorizer`] before handing out nodes
//! and changesets, and renderers use the same object to redact paths.
//!
//! Providers:
//! - [`DefaultAuthorizer`]: allows everything
//! - [`DenyAllAuthorizer`]: denies everything
//! - [`AuthzFileAuthorizer`]: Subversion-style authz file bound to one user

use crate::error::{Result, VcError};
use crate::object::{normalize_path, parent_path};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Access level for repository paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessLevel {
    None,
    Read,
    Write,
}

/// Path permission filter
pub trait Authorizer: Send + Sync {
    /// Whether the current user may see `path`
    fn has_permission(&self, path: &str) -> bool;

    /// Fails with `PermissionDenied` exactly when `has_permission` is false
    fn assert_permission(&self, path: &str) -> Result<()> {
        if self.has_permission(path) {
            Ok(())
        } else {
            Err(VcError::PermissionDenied(path.to_string()))
        }
    }

    /// Whether the current user may see changeset `rev` at all
    fn has_permission_for_changeset(&self, _rev: u64) -> bool {
        true
    }
}

/// Allows every path and changeset
#[derive(Debug, Clone, Default)]
pub struct DefaultAuthorizer;

impl Authorizer for DefaultAuthorizer {
    fn has_permission(&self, _path: &str) -> bool {
        true
    }
}

/// Denies every path and changeset
#[derive(Debug, Clone, Default)]
pub struct DenyAllAuthorizer;

impl Authorizer for DenyAllAuthorizer {
    fn has_permission(&self, _path: &str) -> bool {
        false
    }

    fn has_permission_for_changeset(&self, _rev: u64) -> bool {
        false
    }
}

/// Who an access rule applies to
#[derive(Debug, Clone, PartialEq)]
enum Subject {
    User(String),
    Group(String),
    /// `*`
    Everyone,
    /// `$anonymous`
    Anonymous,
    /// `$authenticated`
    Authenticated,
}

#[derive(Debug, Clone)]
struct AccessRule {
    subject: Subject,
    level: AccessLevel,
}

/// Subversion-style authz file
///
/// ```text
/// [groups]
/// developers = alice, bob
///
/// [/]
/// * = r
///
/// [/private]
/// @developers = rw
/// * =
/// ```
///
/// The nearest section on the path (walking up to `/`) that has a rule
/// matching the user decides; within that section the most permissive
/// matching rule wins. Paths with no matching section are denied.
#[derive(Debug, Clone)]
pub struct AuthzFileAuthorizer {
    /// Section path -> rules
    rules: HashMap<String, Vec<AccessRule>>,
    /// Group name -> members
    groups: HashMap<String, HashSet<String>>,
    /// User the authorizer answers for; `None` is anonymous
    user: Option<String>,
}

impl AuthzFileAuthorizer {
    pub fn from_file<P: AsRef<Path>>(path: P, user: Option<&str>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            VcError::Config(format!(
                "Failed to read authz file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_content(&content, user)
    }

    pub fn from_content(content: &str, user: Option<&str>) -> Result<Self> {
        let mut rules: HashMap<String, Vec<AccessRule>> = HashMap::new();
        let mut groups: HashMap<String, HashSet<String>> = HashMap::new();
        let mut current_section: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current_section = Some(line[1..line.len() - 1].trim().to_string());
                continue;
            }

            let section = current_section
                .as_deref()
                .ok_or_else(|| VcError::Config(format!("Rule outside of a section: {}", line)))?;

            if section == "groups" {
                Self::parse_group(line, &mut groups)?;
            } else {
                // Repository-qualified sections (`[repo:/path]`) apply to every repository
                let path = section.rsplit(':').next().unwrap_or(section);
                let rule = Self::parse_access_rule(line)?;
                rules.entry(normalize_path(path)).or_default().push(rule);
            }
        }

        for rule in rules.values().flatten() {
            if let Subject::Group(name) = &rule.subject {
                if !groups.contains_key(name) {
                    return Err(VcError::Config(format!("Group not found: {}", name)));
                }
            }
        }

        Ok(Self {
            rules,
            groups,
            user: user.map(str::to_string),
        })
    }

    fn parse_group(line: &str, groups: &mut HashMap<String, HashSet<String>>) -> Result<()> {
        let (name, members) = line
            .split_once('=')
            .ok_or_else(|| VcError::Config(format!("Invalid group definition: {}", line)))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(VcError::Config("Group name cannot be empty".to_string()));
        }
        let members: HashSet<String> = members
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        groups.insert(name.to_string(), members);
        Ok(())
    }

    fn parse_access_rule(line: &str) -> Result<AccessRule> {
        let (who, access) = line
            .split_once('=')
            .ok_or_else(|| VcError::Config(format!("Invalid access rule: {}", line)))?;
        let who = who.trim();
        let subject = match who {
            "*" => Subject::Everyone,
            "$anonymous" => Subject::Anonymous,
            "$authenticated" => Subject::Authenticated,
            _ => match who.strip_prefix('@') {
                Some(group) => Subject::Group(group.to_string()),
                None => Subject::User(who.to_string()),
            },
        };
        let level = match access.trim().to_lowercase().as_str() {
            "" => AccessLevel::None,
            "r" => AccessLevel::Read,
            "rw" | "w" => AccessLevel::Write,
            other => return Err(VcError::Config(format!("Invalid access level: {}", other))),
        };
        Ok(AccessRule { subject, level })
    }

    fn matches(&self, subject: &Subject) -> bool {
        match subject {
            Subject::Everyone => true,
            Subject::Anonymous => self.user.is_none(),
            Subject::Authenticated => self.user.is_some(),
            Subject::User(name) => self.user.as_deref() == Some(name.as_str()),
            Subject::Group(group) => match &self.user {
                Some(user) => self
                    .groups
                    .get(group)
                    .map(|members| members.contains(user))
                    .unwrap_or(false),
                None => false,
            },
        }
    }

    /// Effective access level at `path`
    pub fn access_level(&self, path: &str) -> AccessLevel {
        let mut current = normalize_path(path);
        loop {
            if let Some(rules) = self.rules.get(&current) {
                let best = rules
                    .iter()
                    .filter(|r| self.matches(&r.subject))
                    .map(|r| r.level)
                    .max();
                if let Some(level) = best {
                    return level;
                }
            }
            if current == "/" {
                return AccessLevel::None;
            }
            current = parent_path(&current).to_string();
        }
    }
}

impl Authorizer for AuthzFileAuthorizer {
    fn has_permission(&self, path: &str) -> bool {
        self.access_level(path) >= AccessLevel::Read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHZ: &str = r#"
        [groups]
        admins = charlie
        developers = alice, bob

        [/]
        * = r

        [/private]
        @admins = rw
        * =

        [/trunk/src]
        @developers = rw
        bob = r

        [myrepo:/secret]
        $anonymous =
        $authenticated = r
    "#;

    #[test]
    fn test_default_authorizer_never_fails() {
        let authz = DefaultAuthorizer;
        assert!(authz.has_permission("/anything"));
        assert!(authz.assert_permission("/anything").is_ok());
        assert!(authz.has_permission_for_changeset(42));
    }

    #[test]
    fn test_assert_matches_has_permission() {
        let authz = AuthzFileAuthorizer::from_content(AUTHZ, None).unwrap();
        for path in ["/", "/private", "/private/x", "/trunk/src/a.c", "/secret"] {
            let allowed = authz.has_permission(path);
            let asserted = authz.assert_permission(path);
            assert_eq!(allowed, asserted.is_ok(), "{}", path);
            if !allowed {
                assert!(matches!(asserted, Err(VcError::PermissionDenied(_))));
            }
        }
    }

    #[test]
    fn test_anonymous_access() {
        let authz = AuthzFileAuthorizer::from_content(AUTHZ, None).unwrap();
        assert!(authz.has_permission("/"));
        assert!(authz.has_permission("/trunk/README"));
        assert!(!authz.has_permission("/private"));
        assert!(!authz.has_permission("/private/plans.txt"));
        assert!(!authz.has_permission("/secret"));
    }

    #[test]
    fn test_group_and_user_rules() {
        let charlie = AuthzFileAuthorizer::from_content(AUTHZ, Some("charlie")).unwrap();
        assert_eq!(charlie.access_level("/private/plans.txt"), AccessLevel::Write);
        assert!(charlie.has_permission("/secret"));

        let bob = AuthzFileAuthorizer::from_content(AUTHZ, Some("bob")).unwrap();
        // developers grants rw, the bob rule grants r; most permissive wins
        assert_eq!(bob.access_level("/trunk/src/main.c"), AccessLevel::Write);
        assert!(!bob.has_permission("/private"));
        assert_eq!(bob.access_level("/trunk"), AccessLevel::Read);
    }

    #[test]
    fn test_deny_all() {
        let authz = DenyAllAuthorizer;
        assert!(!authz.has_permission("/"));
        assert!(!authz.has_permission_for_changeset(1));
        assert!(authz.assert_permission("/").is_err());
    }

    #[test]
    fn test_unknown_group_rejected() {
        let err = AuthzFileAuthorizer::from_content("[/]\n@ghosts = r\n", None).unwrap_err();
        assert!(matches!(err, VcError::Config(_)));
    }

    #[test]
    fn test_invalid_level_rejected() {
        let err = AuthzFileAuthorizer::from_content("[/]\n* = x\n", None).unwrap_err();
        assert!(matches!(err, VcError::Config(_)));
    }
}
