//! Role / resource / action policy engine.
//!
//! A [`PolicyEngine`] wraps a casbin [`Enforcer`] built once at startup from a
//! model definition and a rule list. It never changes afterwards, so a single
//! `Arc<PolicyEngine>` is shared by every request without locking. The shipped
//! model is default-deny and any matching `deny` rule overrides every matching
//! `allow` rule.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use casbin::{CoreApi, DefaultModel, Enforcer, MgmtApi, StringAdapter};
use thiserror::Error;
use tracing::info;

/// Model shipped with the binary, used when no model path is configured
pub const DEFAULT_MODEL: &str = include_str!("../../config/model.conf");
/// Rule list shipped with the binary, used when no rules path is configured
pub const DEFAULT_RULES: &str = include_str!("../../config/policy.csv");

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid policy model: {0}")]
    Model(String),

    #[error("invalid policy rules: {0}")]
    Rules(String),

    #[error("policy engine error: {0}")]
    Engine(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Counts reported by `bizhub policy lint`
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PolicyStats {
    pub allow_rules: usize,
    pub deny_rules: usize,
    pub role_links: usize,
}

pub struct PolicyEngine {
    enforcer: Enforcer,
}

impl PolicyEngine {
    /// Build an engine from model and rule-list source text
    pub async fn load(model_src: &str, rules_src: &str) -> Result<Self, PolicyError> {
        let model = DefaultModel::from_str(model_src)
            .await
            .map_err(|e| PolicyError::Model(e.to_string()))?;
        let adapter = StringAdapter::new(rule_lines(rules_src));
        let enforcer = Enforcer::new(model, adapter)
            .await
            .map_err(|e| PolicyError::Rules(e.to_string()))?;

        detect_cycles(&enforcer.get_grouping_policy())?;

        let engine = Self { enforcer };
        let stats = engine.stats();
        info!(
            allow_rules = stats.allow_rules,
            deny_rules = stats.deny_rules,
            role_links = stats.role_links,
            "Policy loaded"
        );
        Ok(engine)
    }

    /// Build an engine from files, falling back to the embedded defaults
    pub async fn from_paths(
        model_path: Option<&Path>,
        rules_path: Option<&Path>,
    ) -> Result<Self, PolicyError> {
        let model_src = match model_path {
            Some(path) => read(path).await?,
            None => DEFAULT_MODEL.to_string(),
        };
        let rules_src = match rules_path {
            Some(path) => read(path).await?,
            None => DEFAULT_RULES.to_string(),
        };
        Self::load(&model_src, &rules_src).await
    }

    pub fn stats(&self) -> PolicyStats {
        let rules = self.enforcer.get_policy();
        let deny_rules = rules
            .iter()
            .filter(|rule| rule.last().is_some_and(|eft| eft == "deny"))
            .count();
        PolicyStats {
            allow_rules: rules.len() - deny_rules,
            deny_rules,
            role_links: self.enforcer.get_grouping_policy().len(),
        }
    }

    /// Decide whether `role` may perform `action` on `resource`.
    ///
    /// Returns `Ok(false)` when no rule matches. An `Err` means the enforcer
    /// could not evaluate the request and must be treated as a denial.
    pub fn enforce(&self, role: &str, resource: &str, action: &str) -> Result<bool, PolicyError> {
        self.enforcer
            .enforce((role, resource, action))
            .map_err(|e| PolicyError::Engine(e.to_string()))
    }
}

impl fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

async fn read(path: &Path) -> Result<String, PolicyError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Drop comments and blank lines and trim indentation before the adapter sees them
fn rule_lines(rules_src: &str) -> String {
    rules_src
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

fn detect_cycles(links: &[Vec<String>]) -> Result<(), PolicyError> {
    fn visit<'a>(
        role: &'a str,
        parents: &'a HashMap<&'a str, Vec<&'a str>>,
        path: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<(), PolicyError> {
        if done.contains(role) {
            return Ok(());
        }
        if path.contains(&role) {
            path.push(role);
            return Err(PolicyError::Rules(format!(
                "role inheritance cycle: {}",
                path.join(" -> ")
            )));
        }

        path.push(role);
        for &parent in parents.get(role).into_iter().flatten() {
            visit(parent, parents, path, done)?;
        }
        path.pop();
        done.insert(role);
        Ok(())
    }

    let mut parents: HashMap<&str, Vec<&str>> = HashMap::new();
    for link in links {
        if let [child, parent, ..] = link.as_slice() {
            parents.entry(child.as_str()).or_default().push(parent.as_str());
        }
    }

    let mut done = HashSet::new();
    for &role in parents.keys() {
        visit(role, &parents, &mut Vec::new(), &mut done)?;
    }
    Ok(())
}
