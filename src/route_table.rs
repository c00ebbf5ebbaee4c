use crate::models::{Area, Group, GroupSet};

/// RouteRule
///
/// Classification of one path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub prefix: String,
    pub required: GroupSet,
    pub public: bool,
    /// Set when the prefix is the login page of an area.
    pub login_for: Option<Area>,
}

impl RouteRule {
    pub fn protected(prefix: &str, required: GroupSet) -> Self {
        Self {
            prefix: prefix.to_string(),
            required,
            public: false,
            login_for: None,
        }
    }

    pub fn public(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            required: GroupSet::any(),
            public: true,
            login_for: None,
        }
    }

    pub fn login(prefix: &str, area: Area) -> Self {
        Self {
            login_for: Some(area),
            ..Self::public(prefix)
        }
    }

    /// Segment-aware prefix match: `/admin` covers `/admin` and `/admin/x`
    /// but not `/administrator`. The root rule covers everything.
    fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// RouteMatch
///
/// The classification of a concrete path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub rule: &'a RouteRule,
    pub area: Area,
}

impl RouteMatch<'_> {
    pub fn is_public(&self) -> bool {
        self.rule.public
    }

    pub fn required(&self) -> GroupSet {
        self.rule.required
    }

    pub fn login_for(&self) -> Option<Area> {
        self.rule.login_for
    }
}

/// RouteTable
///
/// Static mapping of path prefixes to access requirements. Lookups pick the
/// longest matching prefix.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
    fallback: RouteRule,
}

impl RouteTable {
    /// An empty table whose unmatched paths require `fallback_groups`.
    pub fn new(fallback_groups: GroupSet) -> Self {
        Self {
            rules: Vec::new(),
            fallback: RouteRule::protected("/", fallback_groups),
        }
    }

    pub fn with_rule(mut self, rule: RouteRule) -> Self {
        if rule.prefix == "/" {
            self.fallback = rule;
        } else {
            self.rules.push(rule);
        }
        self
    }

    /// The portal's route layout: client pages for `Normal`/`Both`, the
    /// admin console for `Admin`/`Both`, and the password reset page for anyone
    /// signed in.
    pub fn portal() -> Self {
        RouteTable::new(GroupSet::of(&[Group::Normal, Group::Both]))
            .with_rule(RouteRule::login("/login", Area::Client))
            .with_rule(RouteRule::login("/admin/login", Area::Admin))
            .with_rule(RouteRule::public("/register"))
            .with_rule(RouteRule::public("/forget"))
            .with_rule(RouteRule::protected(
                "/admin",
                GroupSet::of(&[Group::Admin, Group::Both]),
            ))
            .with_rule(RouteRule::protected(
                "/reset-password",
                GroupSet::of(&Group::ALL),
            ))
    }

    pub fn classify<'a>(&'a self, path: &str) -> RouteMatch<'a> {
        let path = normalize(path);
        let rule = self
            .rules
            .iter()
            .filter(|rule| rule.matches(path))
            .max_by_key(|rule| rule.prefix.len())
            .unwrap_or(&self.fallback);
        RouteMatch {
            rule,
            area: Area::of_path(path),
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.classify(path).is_public()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        RouteTable::portal()
    }
}

/// Drops the query string, fragment, and trailing slashes (except for the root).
pub fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}
