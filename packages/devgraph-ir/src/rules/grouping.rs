//! GroupingEngine: tags a raw effect with one or more container/layer
//! labels (analysis, storage, federation, api, rules, views).

use crate::parsing::RawEffect;
use crate::rules::rule::{Predicate, Rule, RuleEngine};

/// Container/layer a raw effect's operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    Analysis,
    Storage,
    Federation,
    Api,
    Rules,
    Views,
}

impl ToString for Container {
    fn to_string(&self) -> String {
        match self {
            Container::Analysis => "analysis",
            Container::Storage => "storage",
            Container::Federation => "federation",
            Container::Api => "api",
            Container::Rules => "rules",
            Container::Views => "views",
        }
        .to_string()
    }
}

/// Wraps a [`RuleEngine<Container>`] pre-seeded with a sensible default
/// rule set; callers may still `register` additional rules.
pub struct GroupingEngine {
    engine: RuleEngine<Container>,
}

impl GroupingEngine {
    pub fn new() -> Self {
        let mut engine = RuleEngine::new();
        for (module, container) in default_module_containers() {
            engine.register(Rule::new(
                format!("default-module-{module}"),
                Predicate::operation("*").module(module),
                container,
            ));
        }
        engine.register(
            Rule::new("default-db", Predicate::operation("*").module("db"), Container::Storage).with_priority(5),
        );
        Self { engine }
    }

    pub fn register(&mut self, rule: Rule<Container>) {
        self.engine.register(rule);
    }

    pub fn classify(&mut self, effect: &RawEffect) -> Vec<Container> {
        self.engine.evaluate(effect)
    }

    pub fn rules(&self) -> &[Rule<Container>] {
        self.engine.rules()
    }

    pub fn rules_for_container(&self, container: Container) -> Vec<&Rule<Container>> {
        self.engine
            .rules()
            .iter()
            .filter(|r| r.emit == container)
            .collect()
    }
}

impl Default for GroupingEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn default_module_containers() -> Vec<(&'static str, Container)> {
    vec![
        ("fs", Container::Storage),
        ("sqlite3", Container::Storage),
        ("parquet", Container::Storage),
        ("fetch", Container::Federation),
        ("axios", Container::Federation),
        ("requests", Container::Federation),
        ("http", Container::Api),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effect(module: &str) -> RawEffect {
        RawEffect {
            source_entity_id: "r:p:function:h".into(),
            operation: "call".into(),
            module: Some(module.to_string()),
            provider: None,
        }
    }

    #[test]
    fn classifies_fs_operations_as_storage() {
        let mut engine = GroupingEngine::new();
        let tags = engine.classify(&effect("fs"));
        assert!(tags.contains(&Container::Storage));
    }

    #[test]
    fn classifies_fetch_as_federation() {
        let mut engine = GroupingEngine::new();
        let tags = engine.classify(&effect("fetch"));
        assert!(tags.contains(&Container::Federation));
    }

    #[test]
    fn unknown_module_yields_no_tags() {
        let mut engine = GroupingEngine::new();
        let tags = engine.classify(&effect("mystery"));
        assert!(tags.is_empty());
    }
}
