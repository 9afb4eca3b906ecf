//! Visibility predicates: feature flags and token scopes.

use std::{
    collections::{BTreeSet, HashSet},
    fmt,
    sync::Arc,
};

/// Answers whether a feature flag is on. Evaluated once per build.
pub type FeatureChecker = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Feature checker backed by a fixed list of enabled flags.
pub fn feature_checker_from_list<I, S>(flags: I) -> FeatureChecker
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let enabled: HashSet<String> = flags.into_iter().map(Into::into).collect();
    Arc::new(move |flag: &str| enabled.contains(flag))
}

/// Gate for descriptors carrying an optional feature-flag key.
#[derive(Clone, Default)]
pub struct FeatureGate {
    checker: Option<FeatureChecker>,
}

impl FeatureGate {
    pub fn new(checker: FeatureChecker) -> Self {
        Self {
            checker: Some(checker),
        }
    }

    /// Whether a descriptor with this flag key is visible. Unflagged
    /// descriptors always are; flagged ones need a checker that says yes.
    pub fn allows(&self, flag: Option<&str>) -> bool {
        match (flag, &self.checker) {
            (None, _) => true,
            (Some(flag), Some(checker)) => checker(flag),
            (Some(_), None) => false,
        }
    }
}

impl fmt::Debug for FeatureGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureGate")
            .field("checker", &self.checker.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Scopes implied by holding a parent scope on a classic token.
const SCOPE_HIERARCHY: &[(&str, &[&str])] = &[
    (
        "repo",
        &[
            "repo:status",
            "repo_deployment",
            "public_repo",
            "repo:invite",
            "security_events",
        ],
    ),
    ("admin:org", &["write:org", "read:org"]),
    ("write:org", &["read:org"]),
    ("admin:public_key", &["write:public_key", "read:public_key"]),
    ("write:public_key", &["read:public_key"]),
    ("admin:repo_hook", &["write:repo_hook", "read:repo_hook"]),
    ("write:repo_hook", &["read:repo_hook"]),
    ("admin:gpg_key", &["write:gpg_key", "read:gpg_key"]),
    ("write:gpg_key", &["read:gpg_key"]),
    ("user", &["read:user", "user:email", "user:follow"]),
    ("project", &["read:project"]),
    ("write:packages", &["read:packages"]),
    ("write:discussion", &["read:discussion"]),
];

/// Add every scope implied by the granted ones.
pub fn expand_scopes<I, S>(granted: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut expanded: BTreeSet<String> = granted
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    // Implications chain (admin -> write -> read); iterate to a fixed point.
    loop {
        let before = expanded.len();
        for (parent, children) in SCOPE_HIERARCHY {
            if expanded.contains(*parent) {
                expanded.extend(children.iter().map(|c| c.to_string()));
            }
        }
        if expanded.len() == before {
            break;
        }
    }
    expanded
}

/// Hides tools whose required scopes the token does not hold.
///
/// Semantics are all-required: a tool listing several scopes is visible only
/// if every one of them is granted (directly or through the hierarchy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFilter {
    granted: BTreeSet<String>,
}

impl ScopeFilter {
    pub fn new<I, S>(token_scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            granted: expand_scopes(token_scopes),
        }
    }

    pub fn allows(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.granted.contains(scope))
    }

    pub fn granted(&self) -> &BTreeSet<String> {
        &self.granted
    }
}
