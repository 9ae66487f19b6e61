//! Shared `Rule`/`RuleEngine` shape (C6): a configurable, queryable set of
//! predicate → emit mappings, evaluated in priority order.

use std::collections::BTreeMap;

use crate::parsing::RawEffect;

/// A pattern over a raw effect's operation/module/provider. `*` in any
/// field matches anything; all present fields must match.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    pub operation: Option<String>,
    pub module: Option<String>,
    pub provider: Option<String>,
}

impl Predicate {
    pub fn operation(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    fn field_matches(pattern: &str, value: &str) -> bool {
        pattern == "*" || pattern.eq_ignore_ascii_case(value)
    }

    pub fn matches(&self, effect: &RawEffect) -> bool {
        if let Some(pattern) = &self.operation {
            if !Self::field_matches(pattern, &effect.operation) {
                return false;
            }
        }
        if let Some(pattern) = &self.module {
            let module = effect.module.as_deref().unwrap_or("");
            if !Self::field_matches(pattern, module) {
                return false;
            }
        }
        if let Some(pattern) = &self.provider {
            let provider = effect.provider.as_deref().unwrap_or("");
            if !Self::field_matches(pattern, provider) {
                return false;
            }
        }
        true
    }
}

/// One rule: `predicate` selects raw effects, `emit` carries the tags this
/// engine attaches when it matches, `priority` breaks ties (higher first),
/// and `continue_matching` lets later, lower-priority rules still apply
/// (the default is first-wins).
#[derive(Debug, Clone)]
pub struct Rule<T> {
    pub id: String,
    pub predicate: Predicate,
    pub emit: T,
    pub priority: i32,
    pub continue_matching: bool,
}

impl<T> Rule<T> {
    pub fn new(id: impl Into<String>, predicate: Predicate, emit: T) -> Self {
        Self {
            id: id.into(),
            predicate,
            emit,
            priority: 0,
            continue_matching: false,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn continue_matching(mut self) -> Self {
        self.continue_matching = true;
        self
    }
}

/// A queryable, priority-ordered collection of rules emitting `T` per raw
/// effect. Shared by [`crate::rules::grouping::GroupingEngine`] and
/// [`crate::rules::significance::SignificanceEngine`].
#[derive(Debug, Default)]
pub struct RuleEngine<T: Clone> {
    rules: Vec<Rule<T>>,
    sorted: bool,
}

impl<T: Clone> RuleEngine<T> {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            sorted: true,
        }
    }

    pub fn register(&mut self, rule: Rule<T>) {
        self.rules.push(rule);
        self.sorted = false;
    }

    fn ensure_sorted(&mut self) {
        if !self.sorted {
            self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
            self.sorted = true;
        }
    }

    /// Evaluates every rule in priority order, collecting every match's
    /// `emit` value until a non-`continue_matching` rule matches (inclusive).
    pub fn evaluate(&mut self, effect: &RawEffect) -> Vec<T> {
        self.ensure_sorted();
        let mut emitted = Vec::new();
        for rule in &self.rules {
            if rule.predicate.matches(effect) {
                emitted.push(rule.emit.clone());
                if !rule.continue_matching {
                    break;
                }
            }
        }
        emitted
    }

    pub fn rules(&self) -> &[Rule<T>] {
        &self.rules
    }

    pub fn rule_by_id(&self, id: &str) -> Option<&Rule<T>> {
        self.rules.iter().find(|r| r.id == id)
    }
}

/// Counts of matches grouped by the emitted value's display form, used by
/// callers that want a rollup without re-scanning raw effects.
pub fn tally<T: ToString>(values: &[T]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for value in values {
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effect(operation: &str, module: Option<&str>) -> RawEffect {
        RawEffect {
            source_entity_id: "r:p:function:h".into(),
            operation: operation.into(),
            module: module.map(str::to_string),
            provider: None,
        }
    }

    #[test]
    fn first_matching_rule_wins_by_default() {
        let mut engine: RuleEngine<&'static str> = RuleEngine::new();
        engine.register(Rule::new("specific", Predicate::operation("fetch"), "network").with_priority(10));
        engine.register(Rule::new("fallback", Predicate::operation("*"), "unknown").with_priority(0));

        let emitted = engine.evaluate(&effect("fetch", None));
        assert_eq!(emitted, vec!["network"]);
    }

    #[test]
    fn continue_matching_accumulates_multiple_emits() {
        let mut engine: RuleEngine<&'static str> = RuleEngine::new();
        engine
            .register(Rule::new("a", Predicate::operation("fetch"), "network").with_priority(10).continue_matching());
        engine.register(Rule::new("b", Predicate::operation("*"), "generic").with_priority(0));

        let emitted = engine.evaluate(&effect("fetch", None));
        assert_eq!(emitted, vec!["network", "generic"]);
    }

    #[test]
    fn module_wildcard_matches_anything() {
        let predicate = Predicate::operation("read").module("*");
        assert!(predicate.matches(&effect("read", Some("fs"))));
        assert!(predicate.matches(&effect("read", None)));
    }

    #[test]
    fn no_match_yields_empty() {
        let mut engine: RuleEngine<&'static str> = RuleEngine::new();
        engine.register(Rule::new("only-fetch", Predicate::operation("fetch"), "network"));
        assert!(engine.evaluate(&effect("print", None)).is_empty());
    }
}
