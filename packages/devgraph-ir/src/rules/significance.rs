//! SignificanceEngine: assigns one of {critical, important, minor, hidden}
//! to a raw effect, using a disambiguation context carrying package/repo
//! hints (a test helper's `fs.writeFile` is Minor; a production handler's
//! is Important).

use devgraph_model::SignificanceLevel;

use crate::parsing::RawEffect;
use crate::rules::rule::{Predicate, Rule, RuleEngine};

/// Package/repo hints the engine uses to disambiguate otherwise-identical
/// operations (e.g. test fixtures vs. production code).
#[derive(Debug, Clone, Default)]
pub struct DisambiguationContext {
    pub package: String,
    pub repo: String,
    pub is_test_path: bool,
}

pub struct SignificanceEngine {
    engine: RuleEngine<SignificanceLevel>,
}

impl SignificanceEngine {
    pub fn new() -> Self {
        let mut engine = RuleEngine::new();
        for (operation, level) in default_operation_levels() {
            engine.register(Rule::new(
                format!("default-op-{operation}"),
                Predicate::operation(operation),
                level,
            ));
        }
        engine.register(
            Rule::new("fallback-minor", Predicate::operation("*"), SignificanceLevel::Minor).with_priority(-10),
        );
        Self { engine }
    }

    pub fn register(&mut self, rule: Rule<SignificanceLevel>) {
        self.engine.register(rule);
    }

    /// Classifies `effect`. If `ctx.is_test_path` is set, the level is
    /// demoted by one step (never below `Hidden`) since effects observed in
    /// test fixtures rarely warrant production-grade attention.
    pub fn classify(&mut self, effect: &RawEffect, ctx: &DisambiguationContext) -> SignificanceLevel {
        let levels = self.engine.evaluate(effect);
        let level = levels.into_iter().next().unwrap_or(SignificanceLevel::Hidden);
        if ctx.is_test_path {
            demote(level)
        } else {
            level
        }
    }

    pub fn rules(&self) -> &[Rule<SignificanceLevel>] {
        self.engine.rules()
    }

    pub fn rules_at_level(&self, level: SignificanceLevel) -> Vec<&Rule<SignificanceLevel>> {
        self.engine.rules().iter().filter(|r| r.emit == level).collect()
    }
}

impl Default for SignificanceEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn demote(level: SignificanceLevel) -> SignificanceLevel {
    match level {
        SignificanceLevel::Critical => SignificanceLevel::Important,
        SignificanceLevel::Important => SignificanceLevel::Minor,
        SignificanceLevel::Minor => SignificanceLevel::Hidden,
        SignificanceLevel::Hidden => SignificanceLevel::Hidden,
    }
}

fn default_operation_levels() -> Vec<(&'static str, SignificanceLevel)> {
    vec![
        ("cursor.execute", SignificanceLevel::Critical),
        ("db.query", SignificanceLevel::Critical),
        ("fs.writeFile", SignificanceLevel::Important),
        ("fs.writeFileSync", SignificanceLevel::Important),
        ("fs::write", SignificanceLevel::Important),
        ("fetch", SignificanceLevel::Important),
        ("requests.post", SignificanceLevel::Important),
        ("console.log", SignificanceLevel::Hidden),
        ("print", SignificanceLevel::Hidden),
        ("println!", SignificanceLevel::Hidden),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effect(operation: &str) -> RawEffect {
        RawEffect {
            source_entity_id: "r:p:function:h".into(),
            operation: operation.into(),
            module: None,
            provider: None,
        }
    }

    #[test]
    fn db_writes_are_critical() {
        let mut engine = SignificanceEngine::new();
        let level = engine.classify(&effect("cursor.execute"), &DisambiguationContext::default());
        assert_eq!(level, SignificanceLevel::Critical);
    }

    #[test]
    fn logging_is_hidden() {
        let mut engine = SignificanceEngine::new();
        let level = engine.classify(&effect("console.log"), &DisambiguationContext::default());
        assert_eq!(level, SignificanceLevel::Hidden);
    }

    #[test]
    fn unmatched_operation_falls_back_to_minor() {
        let mut engine = SignificanceEngine::new();
        let level = engine.classify(&effect("mystery.op"), &DisambiguationContext::default());
        assert_eq!(level, SignificanceLevel::Minor);
    }

    #[test]
    fn test_path_demotes_one_step() {
        let mut engine = SignificanceEngine::new();
        let ctx = DisambiguationContext {
            is_test_path: true,
            ..Default::default()
        };
        let level = engine.classify(&effect("fetch"), &ctx);
        assert_eq!(level, SignificanceLevel::Minor);
    }

    #[test]
    fn significance_levels_are_totally_ordered() {
        assert!(SignificanceLevel::Critical > SignificanceLevel::Important);
        assert!(SignificanceLevel::Important > SignificanceLevel::Minor);
        assert!(SignificanceLevel::Minor > SignificanceLevel::Hidden);
    }
}
