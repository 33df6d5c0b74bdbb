//! Vocabulary of the module dependency table: rules, the preconditions they
//! can consult and the violation a vetoed write reports.

use crate::types::TenantId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entities the dependency rules may count through the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountedEntity {
    User,
}

impl CountedEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
        }
    }
}

/// Data precondition a rule evaluates through an injected `RowCounter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "entity")]
pub enum Precondition {
    /// Holds when no row of the entity exists.
    NoRows(CountedEntity),
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRows(entity) => write!(f, "no {} rows exist", entity.as_str()),
        }
    }
}

/// A hard constraint on disabling a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "arg")]
pub enum Rule {
    /// The module can never be disabled.
    CannotDisable,
    /// The module can only be disabled while `other` is disabled.
    RequiresOtherDisabled(&'static str),
    /// The module can only be disabled while the precondition holds.
    RequiresPredicate(Precondition),
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CannotDisable => f.write_str("cannot be disabled"),
            Self::RequiresOtherDisabled(other) => {
                write!(f, "requires module `{other}` to be disabled")
            }
            Self::RequiresPredicate(p) => write!(f, "requires that {p}"),
        }
    }
}

/// A module write vetoed by the dependency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyViolation {
    /// Module whose write was rejected.
    pub module: String,
    /// State the caller asked for.
    pub desired_enabled: bool,
    /// Module the rule is registered on. Equal to `module` for disable
    /// vetoes; for enable vetoes it is the module whose rule would break.
    pub rule_owner: String,
    pub rule: Rule,
    /// Other module whose current state blocked the write, if any.
    pub blocking_module: Option<String>,
    /// Tenant whose resolved state blocked the write; `None` for the global
    /// state.
    pub tenant_id: Option<TenantId>,
}

impl DependencyViolation {
    pub fn reason(&self) -> String {
        match (&self.rule, self.desired_enabled) {
            (Rule::CannotDisable, _) => format!("module `{}` cannot be disabled", self.module),
            (Rule::RequiresOtherDisabled(other), false) => format!(
                "module `{}` cannot be disabled while `{other}` is enabled",
                self.module
            ),
            (Rule::RequiresOtherDisabled(_), true) => format!(
                "module `{}` cannot be enabled while `{}` is disabled",
                self.module, self.rule_owner
            ),
            (Rule::RequiresPredicate(p), _) => format!(
                "module `{}` cannot be disabled unless {p}",
                self.module
            ),
        }
    }
}

impl fmt::Display for DependencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason())?;
        if let Some(tenant) = &self.tenant_id {
            write!(f, " for tenant `{tenant}`")?;
        }
        Ok(())
    }
}
