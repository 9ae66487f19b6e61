//! Rule Engine (C6): transforms raw effects into [`devgraph_model::DomainEffect`]
//! records via three sibling engines sharing one [`rule::RuleEngine`] shape —
//! a base domain/provider mapper, [`grouping::GroupingEngine`], and
//! [`significance::SignificanceEngine`].

pub mod grouping;
pub mod rule;
pub mod significance;

use chrono::Utc;

use devgraph_model::DomainEffect;

use crate::parsing::RawEffect;
use crate::rules::grouping::{Container, GroupingEngine};
use crate::rules::rule::{Predicate, Rule, RuleEngine};
use crate::rules::significance::{DisambiguationContext, SignificanceEngine};

/// Domain/provider a raw effect's operation belongs to (the base rule
/// engine's emit type, distinct from [`Container`] and `SignificanceLevel`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainProvider {
    pub domain: String,
    pub provider: String,
}

impl DomainProvider {
    pub fn new(domain: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            provider: provider.into(),
        }
    }
}

pub struct RuleEngines {
    base: RuleEngine<DomainProvider>,
    grouping: GroupingEngine,
    significance: SignificanceEngine,
}

impl RuleEngines {
    pub fn new() -> Self {
        let mut base = RuleEngine::new();
        for (operation, domain, provider) in default_domain_providers() {
            base.register(Rule::new(
                format!("default-domain-{operation}"),
                Predicate::operation(operation),
                DomainProvider::new(domain, provider),
            ));
        }
        base.register(Rule::new(
            "default-domain-fallback",
            Predicate::operation("*"),
            DomainProvider::new("unknown", "unknown"),
        ));

        Self {
            base,
            grouping: GroupingEngine::new(),
            significance: SignificanceEngine::new(),
        }
    }

    pub fn register_base_rule(&mut self, rule: Rule<DomainProvider>) {
        self.base.register(rule);
    }

    pub fn register_grouping_rule(&mut self, rule: Rule<Container>) {
        self.grouping.register(rule);
    }

    pub fn register_significance_rule(&mut self, rule: Rule<devgraph_model::SignificanceLevel>) {
        self.significance.register(rule);
    }

    /// Runs every engine over `effect` and assembles the resulting
    /// [`DomainEffect`]. `branch`/`ctx` carry the identity fields the raw
    /// effect itself doesn't know about.
    pub fn apply(&mut self, effect: &RawEffect, branch: &str, ctx: &DisambiguationContext) -> DomainEffect {
        let domain_provider = self
            .base
            .evaluate(effect)
            .into_iter()
            .next()
            .unwrap_or_else(|| DomainProvider::new("unknown", "unknown"));
        let containers = self.grouping.classify(effect);
        let significance = self.significance.classify(effect, ctx);

        DomainEffect {
            source_entity_id: effect.source_entity_id.clone(),
            domain: domain_provider.domain,
            provider: effect.provider.clone().unwrap_or(domain_provider.provider),
            operation: effect.operation.clone(),
            significance_level: significance,
            group: effect.module.clone(),
            container: containers.first().map(|c| c.to_string()),
            branch: branch.to_string(),
            is_deleted: false,
            updated_at: Utc::now(),
        }
    }

    pub fn base_rules(&self) -> &[Rule<DomainProvider>] {
        self.base.rules()
    }

    pub fn grouping_rules(&self) -> &[Rule<Container>] {
        self.grouping.rules()
    }

    pub fn significance_rules(&self) -> &[Rule<devgraph_model::SignificanceLevel>] {
        self.significance.rules()
    }
}

impl Default for RuleEngines {
    fn default() -> Self {
        Self::new()
    }
}

fn default_domain_providers() -> Vec<(&'static str, &'static str, &'static str)> {
    vec![
        ("cursor.execute", "persistence", "sql"),
        ("db.query", "persistence", "sql"),
        ("fetch", "network", "http"),
        ("requests.get", "network", "http"),
        ("requests.post", "network", "http"),
        ("fs.readFile", "filesystem", "node"),
        ("fs.writeFile", "filesystem", "node"),
        ("fs::read", "filesystem", "std"),
        ("fs::write", "filesystem", "std"),
        ("console.log", "logging", "console"),
        ("print", "logging", "stdout"),
        ("println!", "logging", "stdout"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effect(operation: &str) -> RawEffect {
        RawEffect {
            source_entity_id: "r:p:function:h".into(),
            operation: operation.into(),
            module: Some("fs".into()),
            provider: None,
        }
    }

    #[test]
    fn apply_assembles_domain_effect_from_all_three_engines() {
        let mut engines = RuleEngines::new();
        let domain_effect = engines.apply(&effect("fs.writeFile"), "main", &DisambiguationContext::default());

        assert_eq!(domain_effect.domain, "filesystem");
        assert_eq!(domain_effect.provider, "node");
        assert_eq!(domain_effect.container.as_deref(), Some("storage"));
    }

    #[test]
    fn unknown_operation_falls_back_to_unknown_domain() {
        let mut engines = RuleEngines::new();
        let domain_effect = engines.apply(&effect("mystery.op"), "main", &DisambiguationContext::default());
        assert_eq!(domain_effect.domain, "unknown");
    }
}
