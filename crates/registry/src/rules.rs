//! The module dependency table and the one function that interprets it.
//!
//! Rules are attached to the module they protect and are evaluated when that
//! module is disabled. A `RequiresOtherDisabled(other)` rule on `m` also
//! forbids enabling `other` while `m` is disabled; without that guard the two
//! writes could land in either order and leave `m` off with `other` on.

use confgate_core::dependency::{CountedEntity, DependencyViolation, Precondition, Rule};
use confgate_core::error::ConfigResult;
use std::collections::BTreeMap;

/// Current state the interpreter needs: other modules' enabled flags and
/// row counts for predicate rules.
pub trait ModuleState {
    fn is_enabled(&self, module: &str) -> ConfigResult<bool>;
    fn count(&self, entity: CountedEntity) -> ConfigResult<u64>;
}

/// Static `module -> [Rule]` table.
#[derive(Debug, Clone)]
pub struct DependencyTable {
    rules: BTreeMap<&'static str, Vec<Rule>>,
}

impl Default for DependencyTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl DependencyTable {
    /// The built-in rule set.
    pub fn standard() -> Self {
        Self::empty()
            .with("admin", Rule::CannotDisable)
            .with("auth", Rule::RequiresOtherDisabled("dashboard"))
            .with(
                "dashboard",
                Rule::RequiresPredicate(Precondition::NoRows(CountedEntity::User)),
            )
            .with("rest_api", Rule::RequiresOtherDisabled("api_docs"))
    }

    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    pub fn with(mut self, module: &'static str, rule: Rule) -> Self {
        self.rules.entry(module).or_default().push(rule);
        self
    }

    /// Rules checked when `module` is disabled.
    pub fn rules_for(&self, module: &str) -> &[Rule] {
        self.rules.get(module).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(owner, rule)` pairs that constrain enabling `module`.
    pub fn enable_guards(&self, module: &str) -> Vec<(&'static str, Rule)> {
        self.rules
            .iter()
            .flat_map(|(owner, rules)| rules.iter().map(move |rule| (*owner, *rule)))
            .filter(|(_, rule)| matches!(rule, Rule::RequiresOtherDisabled(other) if *other == module))
            .collect()
    }

    /// Every module key a write to `module` reads, including itself, sorted
    /// and deduplicated. Writers lock this whole set.
    pub fn lock_set(&self, module: &str) -> Vec<String> {
        let mut keys = vec![module.to_string()];
        for rule in self.rules_for(module) {
            if let Rule::RequiresOtherDisabled(other) = rule {
                keys.push((*other).to_string());
            }
        }
        for (owner, _) in self.enable_guards(module) {
            keys.push(owner.to_string());
        }
        keys.sort();
        keys.dedup();
        keys
    }

    /// Evaluate a transition of `module` to `desired_enabled` against the
    /// current state. Returns the first rule that vetoes it, if any.
    pub fn check(
        &self,
        module: &str,
        desired_enabled: bool,
        state: &dyn ModuleState,
    ) -> ConfigResult<Option<DependencyViolation>> {
        if desired_enabled {
            for (owner, rule) in self.enable_guards(module) {
                if !state.is_enabled(owner)? {
                    return Ok(Some(DependencyViolation {
                        module: module.to_string(),
                        desired_enabled,
                        rule_owner: owner.to_string(),
                        rule,
                        blocking_module: Some(owner.to_string()),
                        tenant_id: None,
                    }));
                }
            }
            return Ok(None);
        }

        for rule in self.rules_for(module) {
            let blocking = match rule {
                Rule::CannotDisable => Some(None),
                Rule::RequiresOtherDisabled(other) => state
                    .is_enabled(other)?
                    .then(|| Some((*other).to_string())),
                Rule::RequiresPredicate(Precondition::NoRows(entity)) => {
                    (state.count(*entity)? > 0).then_some(None)
                }
            };
            if let Some(blocking_module) = blocking {
                return Ok(Some(DependencyViolation {
                    module: module.to_string(),
                    desired_enabled,
                    rule_owner: module.to_string(),
                    rule: *rule,
                    blocking_module,
                    tenant_id: None,
                }));
            }
        }
        Ok(None)
    }
}
