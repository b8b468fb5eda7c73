//! Policy evaluation.
//!
//! [`PolicyEvaluator`] is the seam the authorization engine calls once it
//! knows who the request is from. [`AccessControl`] is the rule-list
//! implementation configured from `access_control` in the server config.

use async_trait::async_trait;
use gatehouse_core::Result;
use http::Method;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::PolicyError;
use crate::types::{PolicyDecision, RequiredLevel, Subject, TargetObject};

/// Decides whether a subject may access a target object.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Evaluates access for `subject` to `object`.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy backend cannot answer. Callers treat
    /// this as a denial.
    async fn evaluate(
        &self,
        subject: &Subject,
        object: &TargetObject,
    ) -> Result<PolicyDecision, PolicyError>;
}

/// Access control configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessControlConfig {
    /// Level required when no rule matches.
    #[serde(default = "default_policy")]
    pub default_policy: RequiredLevel,
    /// Rules evaluated in order; the first match wins.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

fn default_policy() -> RequiredLevel {
    RequiredLevel::Deny
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            default_policy: default_policy(),
            rules: Vec::new(),
        }
    }
}

/// One access control rule as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Hosts the rule covers: exact names or `*.example.com` wildcards.
    pub domain: Vec<String>,
    /// Regexes matched against path and query. Empty matches everything.
    #[serde(default)]
    pub resources: Vec<String>,
    /// HTTP methods. Empty matches every method.
    #[serde(default)]
    pub methods: Vec<String>,
    /// `user:<name>` or `group:<name>` entries. Empty matches every subject.
    #[serde(default)]
    pub subject: Vec<String>,
    /// Level required when the rule matches.
    pub policy: RequiredLevel,
}

#[derive(Debug, Clone)]
enum DomainMatcher {
    Exact(String),
    // Stored with the leading dot.
    Suffix(String),
}

impl DomainMatcher {
    fn matches(&self, host: &str) -> bool {
        match self {
            Self::Exact(name) => host == name,
            Self::Suffix(suffix) => host.len() > suffix.len() && host.ends_with(suffix.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
enum SubjectMatcher {
    User(String),
    Group(String),
}

impl SubjectMatcher {
    fn matches(&self, subject: &Subject) -> bool {
        match self {
            Self::User(name) => subject.username.as_deref() == Some(name.as_str()),
            Self::Group(name) => subject.groups.iter().any(|g| g == name),
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    domains: Vec<DomainMatcher>,
    resources: Vec<Regex>,
    methods: Vec<Method>,
    subjects: Vec<SubjectMatcher>,
    policy: RequiredLevel,
}

impl Rule {
    fn compile(index: usize, config: &RuleConfig) -> Result<Self, PolicyError> {
        let invalid = |details: String| PolicyError::InvalidRule { index, details };

        if config.domain.is_empty() {
            return Err(invalid("rule has no domain".to_string()).into());
        }

        let domains = config
            .domain
            .iter()
            .map(|d| {
                let d = d.trim().to_ascii_lowercase();
                match d.strip_prefix('*') {
                    Some(suffix) if suffix.starts_with('.') => DomainMatcher::Suffix(suffix.into()),
                    _ => DomainMatcher::Exact(d),
                }
            })
            .collect();

        let mut resources = Vec::with_capacity(config.resources.len());
        for pattern in &config.resources {
            let regex = Regex::new(pattern)
                .map_err(|e| invalid(format!("resource '{pattern}': {e}")))?;
            resources.push(regex);
        }

        let mut methods = Vec::with_capacity(config.methods.len());
        for method in &config.methods {
            let parsed = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|e| invalid(format!("method '{method}': {e}")))?;
            methods.push(parsed);
        }

        let mut subjects = Vec::with_capacity(config.subject.len());
        for entry in &config.subject {
            let matcher = if let Some(name) = entry.strip_prefix("user:") {
                SubjectMatcher::User(name.to_string())
            } else if let Some(name) = entry.strip_prefix("group:") {
                SubjectMatcher::Group(name.to_string())
            } else {
                return Err(invalid(format!(
                    "subject '{entry}' must start with 'user:' or 'group:'"
                ))
                .into());
            };
            subjects.push(matcher);
        }

        Ok(Self {
            domains,
            resources,
            methods,
            subjects,
            policy: config.policy,
        })
    }

    fn matches_object(&self, object: &TargetObject) -> bool {
        let host = object.host();
        if !self.domains.iter().any(|d| d.matches(host)) {
            return false;
        }
        if !self.methods.is_empty() && !self.methods.contains(object.method()) {
            return false;
        }
        if self.resources.is_empty() {
            return true;
        }
        let target = object.path_and_query();
        self.resources.iter().any(|r| r.is_match(&target))
    }
}

/// Ordered access control rules with a default policy.
#[derive(Debug, Clone)]
pub struct AccessControl {
    default_policy: RequiredLevel,
    rules: Vec<Rule>,
}

impl AccessControl {
    /// Compiles the rule list.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first rule that cannot be compiled.
    pub fn from_config(config: &AccessControlConfig) -> Result<Self, PolicyError> {
        let rules = config
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| Rule::compile(index, rule))
            .collect::<Result<Vec<_>, PolicyError>>()?;

        Ok(Self {
            default_policy: config.default_policy,
            rules,
        })
    }

    /// Creates a policy with only a default level.
    #[must_use]
    pub fn with_default(default_policy: RequiredLevel) -> Self {
        Self {
            default_policy,
            rules: Vec::new(),
        }
    }

    /// Resolves the level required for `object`.
    ///
    /// Also reports whether a subject-restricted rule was skipped because the
    /// subject is anonymous.
    #[must_use]
    pub fn required_level(
        &self,
        subject: &Subject,
        object: &TargetObject,
    ) -> (RequiredLevel, bool) {
        let mut subject_rule_skipped = false;

        for rule in &self.rules {
            if !rule.matches_object(object) {
                continue;
            }
            if rule.subjects.is_empty() {
                return (rule.policy, subject_rule_skipped);
            }
            if subject.is_anonymous() {
                subject_rule_skipped = true;
                continue;
            }
            if rule.subjects.iter().any(|s| s.matches(subject)) {
                return (rule.policy, subject_rule_skipped);
            }
        }

        (self.default_policy, subject_rule_skipped)
    }
}

#[async_trait]
impl PolicyEvaluator for AccessControl {
    #[instrument(skip_all, fields(subject = %subject, object = %object))]
    async fn evaluate(
        &self,
        subject: &Subject,
        object: &TargetObject,
    ) -> Result<PolicyDecision, PolicyError> {
        let (required, subject_rule_skipped) = self.required_level(subject, object);
        let decision = PolicyDecision::from_levels(subject.level, required, subject_rule_skipped);

        debug!(%required, %decision, "access control evaluated");

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_session::{AuthenticationLevel, Identity};
    use url::Url;

    fn object(method: Method, url: &str) -> TargetObject {
        TargetObject::new(method, Url::parse(url).expect("url"))
    }

    fn rule(domain: &[&str], policy: RequiredLevel) -> RuleConfig {
        RuleConfig {
            domain: domain.iter().map(|d| d.to_string()).collect(),
            resources: Vec::new(),
            methods: Vec::new(),
            subject: Vec::new(),
            policy,
        }
    }

    fn john(level: AuthenticationLevel) -> Subject {
        let identity = Identity::new("john").with_groups(vec!["admins".to_string()]);
        Subject::from_identity(&identity, level)
    }

    fn access_control(rules: Vec<RuleConfig>) -> AccessControl {
        AccessControl::from_config(&AccessControlConfig {
            default_policy: RequiredLevel::Deny,
            rules,
        })
        .expect("compile")
    }

    #[test]
    fn first_matching_rule_wins() {
        let acl = access_control(vec![
            rule(&["public.example.com"], RequiredLevel::Bypass),
            rule(&["*.example.com"], RequiredLevel::TwoFactor),
            rule(&["*.example.com"], RequiredLevel::OneFactor),
        ]);

        let anon = Subject::anonymous();
        let public = object(Method::GET, "https://public.example.com/");
        let app = object(Method::GET, "https://app.example.com/");
        let other = object(Method::GET, "https://other.org/");

        assert_eq!(acl.required_level(&anon, &public).0, RequiredLevel::Bypass);
        assert_eq!(acl.required_level(&anon, &app).0, RequiredLevel::TwoFactor);
        assert_eq!(acl.required_level(&anon, &other).0, RequiredLevel::Deny);
    }

    #[test]
    fn wildcard_does_not_match_apex() {
        let acl = access_control(vec![rule(&["*.example.com"], RequiredLevel::Bypass)]);
        let apex = object(Method::GET, "https://example.com/");
        assert_eq!(
            acl.required_level(&Subject::anonymous(), &apex).0,
            RequiredLevel::Deny
        );
    }

    #[test]
    fn resources_and_methods_narrow_a_rule() {
        let mut admin = rule(&["app.example.com"], RequiredLevel::TwoFactor);
        admin.resources = vec!["^/admin".to_string()];
        admin.methods = vec!["post".to_string()];
        let acl = access_control(vec![admin, rule(&["app.example.com"], RequiredLevel::OneFactor)]);

        let subject = john(AuthenticationLevel::OneFactor);
        let post_admin = object(Method::POST, "https://app.example.com/admin/users");
        let get_admin = object(Method::GET, "https://app.example.com/admin/users");
        let post_home = object(Method::POST, "https://app.example.com/home");

        assert_eq!(acl.required_level(&subject, &post_admin).0, RequiredLevel::TwoFactor);
        assert_eq!(acl.required_level(&subject, &get_admin).0, RequiredLevel::OneFactor);
        assert_eq!(acl.required_level(&subject, &post_home).0, RequiredLevel::OneFactor);
    }

    #[test]
    fn subject_rules_are_skipped_for_anonymous_requests() {
        let mut admins = rule(&["app.example.com"], RequiredLevel::OneFactor);
        admins.subject = vec!["group:admins".to_string()];
        let acl = access_control(vec![admins]);
        let app = object(Method::GET, "https://app.example.com/");

        assert_eq!(
            acl.required_level(&Subject::anonymous(), &app),
            (RequiredLevel::Deny, true)
        );
        assert_eq!(
            acl.required_level(&john(AuthenticationLevel::OneFactor), &app),
            (RequiredLevel::OneFactor, false)
        );
    }

    #[test]
    fn invalid_rules_are_reported_with_index() {
        let mut bad_regex = rule(&["app.example.com"], RequiredLevel::Bypass);
        bad_regex.resources = vec!["(".to_string()];
        let err = AccessControl::from_config(&AccessControlConfig {
            default_policy: RequiredLevel::Deny,
            rules: vec![rule(&["a.example.com"], RequiredLevel::Bypass), bad_regex],
        });
        assert!(err.is_err());

        let mut bad_subject = rule(&["app.example.com"], RequiredLevel::Bypass);
        bad_subject.subject = vec!["john".to_string()];
        assert!(
            AccessControl::from_config(&AccessControlConfig {
                default_policy: RequiredLevel::Deny,
                rules: vec![bad_subject],
            })
            .is_err()
        );

        assert!(
            AccessControl::from_config(&AccessControlConfig {
                default_policy: RequiredLevel::Deny,
                rules: vec![rule(&[], RequiredLevel::Bypass)],
            })
            .is_err()
        );
    }

    #[tokio::test]
    async fn evaluate_combines_rule_and_level() {
        let mut admins = rule(&["admin.example.com"], RequiredLevel::TwoFactor);
        admins.subject = vec!["group:admins".to_string()];
        let acl = access_control(vec![
            admins,
            rule(&["admin.example.com"], RequiredLevel::Deny),
            rule(&["*.example.com"], RequiredLevel::OneFactor),
        ]);
        let admin = object(Method::GET, "https://admin.example.com/");
        let app = object(Method::GET, "https://app.example.com/");

        let decide = |subject: Subject, object: TargetObject| {
            let acl = acl.clone();
            async move { acl.evaluate(&subject, &object).await.expect("evaluate") }
        };

        assert_eq!(
            decide(john(AuthenticationLevel::TwoFactor), admin.clone()).await,
            PolicyDecision::Allow
        );
        assert_eq!(
            decide(john(AuthenticationLevel::OneFactor), admin.clone()).await,
            PolicyDecision::Unauthorized
        );
        assert_eq!(
            decide(Subject::anonymous(), admin.clone()).await,
            PolicyDecision::Unauthorized
        );

        let outsider =
            Subject::from_identity(&Identity::new("jane"), AuthenticationLevel::TwoFactor);
        assert_eq!(decide(outsider, admin).await, PolicyDecision::Forbidden);
        assert_eq!(
            decide(john(AuthenticationLevel::OneFactor), app).await,
            PolicyDecision::Allow
        );
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: AccessControlConfig = serde_json::from_str(
            r#"{"rules": [{"domain": ["*.example.com"], "policy": "one_factor"}]}"#,
        )
        .expect("deserialize");
        assert_eq!(config.default_policy, RequiredLevel::Deny);
        assert_eq!(config.rules[0].policy, RequiredLevel::OneFactor);
        assert!(config.rules[0].subject.is_empty());
    }
}
