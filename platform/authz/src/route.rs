use std::fmt;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::Role;

pub const DEFAULT_SIGN_IN_PATH: &str = "/sign-in";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("route pattern `{pattern}` is invalid: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("route policy document is malformed: {0}")]
    Document(#[from] serde_json::Error),
}

/// Path expression in the dialect used by the route access map: literal
/// segments, `:name` parameters, and `(.*)` / `*` wildcards.
#[derive(Clone)]
pub struct RoutePattern {
    source: String,
    regex: Regex,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, PolicyError> {
        let invalid = |reason: &str| PolicyError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };
        if !pattern.starts_with('/') {
            return Err(invalid("must start with `/`"));
        }

        let mut body = String::with_capacity(pattern.len() * 2);
        let mut rest = pattern;
        while let Some(ch) = rest.chars().next() {
            if let Some(after) = rest.strip_prefix("(.*)") {
                body.push_str(".*");
                rest = after;
                continue;
            }
            match ch {
                '*' => {
                    body.push_str(".*");
                    rest = &rest[1..];
                }
                ':' => {
                    let name_len = rest[1..]
                        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                        .unwrap_or(rest.len() - 1);
                    if name_len == 0 {
                        return Err(invalid("parameter without a name"));
                    }
                    body.push_str("[^/]+");
                    rest = &rest[1 + name_len..];
                }
                '(' | ')' => return Err(invalid("only `(.*)` groups are supported")),
                _ => {
                    body.push_str(&regex::escape(ch.encode_utf8(&mut [0; 4])));
                    rest = &rest[ch.len_utf8()..];
                }
            }
        }

        let anchored = format!("^{}/?$", body.trim_end_matches('/'));
        let regex = Regex::new(&anchored).map_err(|err| invalid(&err.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RoutePattern").field(&self.source).finish()
    }
}

#[derive(Clone, Debug)]
pub struct PolicyEntry {
    pub pattern: RoutePattern,
    pub roles: Vec<Role>,
}

impl PolicyEntry {
    pub fn new(pattern: &str, roles: &[Role]) -> Result<Self, PolicyError> {
        Ok(Self {
            pattern: RoutePattern::parse(pattern)?,
            roles: roles.to_vec(),
        })
    }

    pub fn allows(&self, role: Option<Role>) -> bool {
        role.is_some_and(|role| self.roles.contains(&role))
    }
}

/// Outcome of evaluating a request path against the policy table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    /// A pattern matched and the principal's role is listed.
    Allow,
    /// No pattern matched; unlisted paths are open.
    PassThrough,
    /// A pattern matched and the principal may not proceed.
    Redirect(String),
}

#[derive(Deserialize)]
struct RawEntry {
    pattern: String,
    roles: Vec<Role>,
}

/// Ordered `(pattern, allowed roles)` pairs. Built once at startup and
/// shared read-only between requests.
#[derive(Clone, Debug)]
pub struct PolicyTable {
    entries: Vec<PolicyEntry>,
    sign_in_path: String,
}

impl PolicyTable {
    pub fn new(entries: Vec<PolicyEntry>) -> Self {
        Self {
            entries,
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_string(),
        }
    }

    pub fn with_sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = path.into();
        self
    }

    /// Route access map of the school dashboards.
    pub fn school_default() -> Self {
        use Role::*;
        const ALL: &[Role] = &[Admin, Teacher, Student, Parent];
        let table: &[(&str, &[Role])] = &[
            ("/admin(.*)", &[Admin]),
            ("/student(.*)", &[Student]),
            ("/teacher(.*)", &[Teacher]),
            ("/parent(.*)", &[Parent]),
            ("/list/teachers", &[Admin, Teacher]),
            ("/list/students", &[Admin, Teacher]),
            ("/list/parents", &[Admin, Teacher]),
            ("/list/subjects", &[Admin]),
            ("/list/classes", &[Admin, Teacher]),
            ("/list/lessons", &[Admin, Teacher]),
            ("/list/exams", ALL),
            ("/list/assignments", ALL),
            ("/list/results", ALL),
            ("/list/attendance", ALL),
            ("/list/events", ALL),
            ("/list/announcements", ALL),
            ("/api/attendance(.*)", &[Admin, Teacher]),
            ("/api/students(.*)", &[Admin, Teacher]),
        ];
        let entries = table
            .iter()
            .map(|(pattern, roles)| {
                PolicyEntry::new(pattern, roles).expect("built-in route patterns are valid")
            })
            .collect();
        Self::new(entries)
    }

    /// Parse an ordered JSON array of `{"pattern", "roles"}` objects.
    pub fn from_json(document: &str) -> Result<Self, PolicyError> {
        let raw: Vec<RawEntry> = serde_json::from_str(document)?;
        let entries = raw
            .into_iter()
            .map(|entry| PolicyEntry::new(&entry.pattern, &entry.roles))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[PolicyEntry] {
        &self.entries
    }

    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    /// First entry whose pattern matches `path`. Later entries are never
    /// consulted once one matches.
    pub fn matching(&self, path: &str) -> Option<&PolicyEntry> {
        self.entries.iter().find(|entry| entry.pattern.matches(path))
    }

    pub fn evaluate(&self, path: &str, role: Option<Role>) -> RouteDecision {
        let Some(entry) = self.matching(path) else {
            return RouteDecision::PassThrough;
        };
        if entry.allows(role) {
            return RouteDecision::Allow;
        }
        let target = match role {
            Some(role) => role.landing_path().to_string(),
            None => self.sign_in_path.clone(),
        };
        RouteDecision::Redirect(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(p: &str) -> RoutePattern {
        RoutePattern::parse(p).unwrap()
    }

    #[test]
    fn wildcard_group_matches_prefix_and_suffixes() {
        let admin = pattern("/admin(.*)");
        assert!(admin.matches("/admin"));
        assert!(admin.matches("/admin/"));
        assert!(admin.matches("/admin/reports/2024"));
        assert!(!admin.matches("/list/admin"));
    }

    #[test]
    fn literal_pattern_is_anchored() {
        let lessons = pattern("/list/lessons");
        assert!(lessons.matches("/list/lessons"));
        assert!(lessons.matches("/list/lessons/"));
        assert!(!lessons.matches("/list/lessons/12"));
        assert!(!lessons.matches("/x/list/lessons"));
    }

    #[test]
    fn parameter_matches_one_segment() {
        let by_class = pattern("/api/students/by-class/:classId");
        assert!(by_class.matches("/api/students/by-class/7"));
        assert!(!by_class.matches("/api/students/by-class/"));
        assert!(!by_class.matches("/api/students/by-class/7/extra"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let dotted = pattern("/files/report.csv");
        assert!(dotted.matches("/files/report.csv"));
        assert!(!dotted.matches("/files/reportxcsv"));
    }

    #[test]
    fn rejects_malformed_patterns() {
        assert!(RoutePattern::parse("admin").is_err());
        assert!(RoutePattern::parse("/users/:").is_err());
        assert!(RoutePattern::parse("/a(b)").is_err());
    }

    #[test]
    fn first_matching_entry_governs() {
        let table = PolicyTable::new(vec![
            PolicyEntry::new("/dashboard/admin", &[Role::Admin]).unwrap(),
            PolicyEntry::new("/dashboard(.*)", &Role::ALL).unwrap(),
        ]);
        assert_eq!(
            table.evaluate("/dashboard/admin", Some(Role::Teacher)),
            RouteDecision::Redirect("/teacher".into())
        );
        assert_eq!(
            table.evaluate("/dashboard/admin", Some(Role::Admin)),
            RouteDecision::Allow
        );
        assert_eq!(
            table.evaluate("/dashboard/teacher", Some(Role::Teacher)),
            RouteDecision::Allow
        );
    }

    #[test]
    fn earlier_lax_entry_is_not_narrowed_by_later_strict_one() {
        let table = PolicyTable::new(vec![
            PolicyEntry::new("/dashboard(.*)", &Role::ALL).unwrap(),
            PolicyEntry::new("/dashboard/admin", &[Role::Admin]).unwrap(),
        ]);
        assert_eq!(
            table.evaluate("/dashboard/admin", Some(Role::Student)),
            RouteDecision::Allow
        );
    }

    #[test]
    fn unlisted_paths_pass_through() {
        let table = PolicyTable::school_default();
        assert_eq!(
            table.evaluate("/favicon.ico", None),
            RouteDecision::PassThrough
        );
        assert_eq!(
            table.evaluate("/graphql", Some(Role::Student)),
            RouteDecision::PassThrough
        );
    }

    #[test]
    fn missing_role_is_never_admitted() {
        let table = PolicyTable::school_default().with_sign_in_path("/login");
        assert_eq!(
            table.evaluate("/admin", None),
            RouteDecision::Redirect("/login".into())
        );
        assert_eq!(
            table.evaluate("/list/attendance", None),
            RouteDecision::Redirect("/login".into())
        );
    }

    #[test]
    fn school_default_sends_principals_home() {
        let table = PolicyTable::school_default();
        assert_eq!(
            table.evaluate("/admin/settings", Some(Role::Parent)),
            RouteDecision::Redirect("/parent".into())
        );
        assert_eq!(
            table.evaluate("/list/subjects", Some(Role::Teacher)),
            RouteDecision::Redirect("/teacher".into())
        );
        assert_eq!(
            table.evaluate("/list/results", Some(Role::Parent)),
            RouteDecision::Allow
        );
        assert_eq!(
            table.evaluate("/student", Some(Role::Student)),
            RouteDecision::Allow
        );
    }

    #[test]
    fn json_document_preserves_order() {
        let table = PolicyTable::from_json(
            r#"[
                {"pattern": "/reports/:id", "roles": ["admin"]},
                {"pattern": "/reports(.*)", "roles": ["admin", "teacher"]}
            ]"#,
        )
        .unwrap();
        assert_eq!(table.entries().len(), 2);
        assert_eq!(table.entries()[0].pattern.as_str(), "/reports/:id");
        assert_eq!(
            table.evaluate("/reports/4", Some(Role::Teacher)),
            RouteDecision::Redirect("/teacher".into())
        );
        assert_eq!(
            table.evaluate("/reports", Some(Role::Teacher)),
            RouteDecision::Allow
        );
    }

    #[test]
    fn json_document_rejects_unknown_roles() {
        let err = PolicyTable::from_json(r#"[{"pattern": "/x", "roles": ["janitor"]}]"#);
        assert!(matches!(err, Err(PolicyError::Document(_))));
    }
}
