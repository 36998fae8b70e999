//! Symbolic taint evaluation.
//!
//! An [`EvalSession`] evaluates nodes of one graph for one finding. Each node
//! gets a generic rule chosen by its label type, then every override
//! registered for `(finding, language, label type)` in registration order.
//! Results are memoized for the lifetime of the session only.

pub mod generic;
pub mod matcher;
pub mod reachability;
pub mod symbols;

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{AnalysisError, Result};
use crate::ir::{Graph, LabelType, Language, NodeId, NodeKind, Value};
use crate::rules::catalog::{Catalog, RuleSet};
use crate::rules::FindingId;

pub use matcher::{MatchMode, NameMatcher, NamePattern};
pub use reachability::Liveness;

/// What is known about the value a node produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    /// Whether attacker-controlled data can reach this node.
    pub danger: bool,
    /// Statically known value, if any.
    pub value: Option<Value>,
    /// Finding-specific markers collected from this node and below.
    pub triggers: BTreeSet<String>,
}

impl Evaluation {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn tainted() -> Self {
        Self {
            danger: true,
            ..Self::default()
        }
    }

    pub fn of_value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// OR the danger and union the triggers of `other` into `self`.
    pub fn join(&mut self, other: &Evaluation) {
        self.danger |= other.danger;
        self.triggers.extend(other.triggers.iter().cloned());
    }

    pub fn has_trigger(&self, trigger: &str) -> bool {
        self.triggers.contains(trigger)
    }
}

/// Budgets that bound the work done for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub max_eval_steps: usize,
    pub max_search_nodes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_eval_steps: 200_000,
            max_search_nodes: 50_000,
        }
    }
}

pub type Rule = fn(&mut RuleArgs<'_>) -> Result<()>;

/// Everything a rule may read, plus the evaluation it is building.
pub struct RuleArgs<'a> {
    pub graph: &'a Graph,
    pub node: NodeId,
    pub finding: FindingId,
    /// Catalog entries for the session's finding and the graph's language.
    pub rules: &'a RuleSet,
    /// Nodes this node's evaluation depends on, already evaluated.
    pub dependencies: &'a [NodeId],
    known: Known<'a>,
    pub eval: Evaluation,
}

/// Finished evaluations, then the provisional ones of a cycle still being
/// iterated: this pass first, the previous pass second.
#[derive(Clone, Copy)]
struct Known<'a> {
    memo: &'a HashMap<NodeId, Evaluation>,
    current: &'a HashMap<NodeId, Evaluation>,
    previous: &'a HashMap<NodeId, Evaluation>,
}

impl<'a> Known<'a> {
    fn get(&self, id: &NodeId) -> Option<&'a Evaluation> {
        self.memo
            .get(id)
            .or_else(|| self.current.get(id))
            .or_else(|| self.previous.get(id))
    }
}

impl<'a> RuleArgs<'a> {
    pub fn kind(&self) -> &'a NodeKind {
        self.graph.kind(self.node)
    }

    pub fn language(&self) -> Language {
        self.graph.language()
    }

    /// Evaluation of `id`. A node that is still being evaluated higher up
    /// the stack reads as its previous approximation, clean at first.
    pub fn get(&self, id: NodeId) -> Evaluation {
        self.known.get(&id).cloned().unwrap_or_default()
    }

    /// OR of every dependency, no value.
    pub fn join_dependencies(&mut self) {
        for dep in self.dependencies {
            if let Some(e) = self.known.get(dep) {
                self.eval.join(e);
            }
        }
    }

    /// OR of every dependency; the value carries over only when there is
    /// exactly one.
    pub fn forward_dependencies(&mut self) {
        self.join_dependencies();
        if let [only] = self.dependencies {
            self.eval.value = self.known.get(only).and_then(|e| e.value.clone());
        }
    }
}

/// Generic rules by label type plus per-finding overrides.
#[derive(Clone, Default)]
pub struct EvalRegistry {
    generic: HashMap<LabelType, Rule>,
    overrides: HashMap<(FindingId, Language, LabelType), Vec<Rule>>,
}

impl EvalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generic rules for every label type except `Unsupported`.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        generic::register(&mut registry);
        registry
    }

    pub fn set_generic(&mut self, label: LabelType, rule: Rule) -> &mut Self {
        self.generic.insert(label, rule);
        self
    }

    pub fn remove_generic(&mut self, label: LabelType) -> Option<Rule> {
        self.generic.remove(&label)
    }

    pub fn generic(&self, label: LabelType) -> Option<Rule> {
        self.generic.get(&label).copied()
    }

    pub fn add_override(
        &mut self,
        finding: FindingId,
        languages: &[Language],
        label: LabelType,
        rule: Rule,
    ) -> &mut Self {
        for language in languages {
            self.overrides
                .entry((finding, *language, label))
                .or_default()
                .push(rule);
        }
        self
    }

    pub fn overrides(&self, finding: FindingId, language: Language, label: LabelType) -> &[Rule] {
        self.overrides
            .get(&(finding, language, label))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Read-only evaluation tables shared by every session.
#[derive(Clone)]
pub struct Evaluator {
    pub registry: EvalRegistry,
    pub catalog: Catalog,
    pub limits: Limits,
}

impl Evaluator {
    pub fn new(registry: EvalRegistry, catalog: Catalog, limits: Limits) -> Self {
        Self {
            registry,
            catalog,
            limits,
        }
    }

    /// Generic rules, the built-in finding overrides and catalog.
    pub fn standard() -> Self {
        let mut registry = EvalRegistry::standard();
        crate::rules::builtin::register_overrides(&mut registry);
        Self::new(registry, Catalog::standard(), Limits::default())
    }

    pub fn session<'s>(&'s self, graph: &'s mut Graph, finding: FindingId) -> EvalSession<'s> {
        EvalSession {
            graph,
            finding,
            evaluator: self,
            memo: HashMap::new(),
            steps: 0,
            liveness: Liveness::new(),
        }
    }
}

/// One graph evaluated for one finding.
pub struct EvalSession<'s> {
    graph: &'s mut Graph,
    finding: FindingId,
    evaluator: &'s Evaluator,
    memo: HashMap<NodeId, Evaluation>,
    steps: usize,
    liveness: Liveness,
}

impl<'s> EvalSession<'s> {
    pub fn graph(&self) -> &Graph {
        &*self.graph
    }

    pub fn finding(&self) -> FindingId {
        self.finding
    }

    pub fn language(&self) -> Language {
        self.graph.language()
    }

    /// Catalog entries for this session. Borrowed from the evaluator, so
    /// they can be held across calls to [`EvalSession::evaluate`].
    pub fn rules(&self) -> &'s RuleSet {
        let evaluator: &'s Evaluator = self.evaluator;
        evaluator.catalog.rules(self.finding, self.graph.language())
    }

    /// Nodes expanded so far in this session.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Whether `id` sits on a path control can actually take.
    pub fn is_live(&mut self, id: NodeId) -> bool {
        let max = self.evaluator.limits.max_search_nodes;
        self.liveness.is_live(self.graph, id, max)
    }

    /// Evaluate `id` and everything it depends on, post-order.
    ///
    /// A node that reads a node still on the stack only gets a provisional
    /// result. Passes over the cycle repeat, seeded with the previous
    /// pass, until the provisional results stop changing; only then are
    /// they memoized. The step budget bounds the number of passes.
    pub fn evaluate(&mut self, id: NodeId) -> Result<Evaluation> {
        if let Some(done) = self.memo.get(&id) {
            return Ok(done.clone());
        }

        let mut previous: HashMap<NodeId, Evaluation> = HashMap::new();
        loop {
            let current = self.evaluate_pass(id, &previous)?;
            if let Some(done) = self.memo.get(&id) {
                return Ok(done.clone());
            }
            if current == previous {
                trace!(node = %id, nodes = current.len(), "cycle settled");
                self.memo.extend(current);
                return self
                    .memo
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| AnalysisError::Internal(format!("node {id} left unevaluated")));
            }
            previous = current;
        }
    }

    /// One post-order pass from `id`. Returns the provisional results.
    fn evaluate_pass(
        &mut self,
        id: NodeId,
        previous: &HashMap<NodeId, Evaluation>,
    ) -> Result<HashMap<NodeId, Evaluation>> {
        let mut current: HashMap<NodeId, Evaluation> = HashMap::new();
        // Nodes expanded but not finished yet, with their dependencies.
        let mut in_progress: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut stack: Vec<(NodeId, bool)> = vec![(id, false)];

        while let Some((node, expanded)) = stack.pop() {
            if self.memo.contains_key(&node) || current.contains_key(&node) {
                continue;
            }
            if expanded {
                let deps = in_progress.remove(&node).unwrap_or_default();
                let evaluation = self.apply_rules(node, &deps, &current, previous)?;
                if deps.iter().all(|dep| self.memo.contains_key(dep)) {
                    self.memo.insert(node, evaluation);
                } else {
                    current.insert(node, evaluation);
                }
                continue;
            }
            if in_progress.contains_key(&node) {
                continue;
            }

            self.steps += 1;
            let max = self.evaluator.limits.max_eval_steps;
            if self.steps > max {
                return Err(AnalysisError::Aborted {
                    node,
                    limit: "max_eval_steps",
                    max,
                });
            }

            let deps = self.dependencies(node)?;
            stack.push((node, true));
            for dep in deps.iter().rev() {
                if !self.memo.contains_key(dep)
                    && !current.contains_key(dep)
                    && !in_progress.contains_key(dep)
                {
                    stack.push((*dep, false));
                }
            }
            in_progress.insert(node, deps);
        }
        Ok(current)
    }

    /// Nodes whose evaluations feed into `id`.
    fn dependencies(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        if self.graph.label(id) == LabelType::SymbolLookup {
            let max = self.evaluator.limits.max_search_nodes;
            return symbols::resolve(self.graph, id, max);
        }
        let graph: &Graph = &*self.graph;
        let deps = match graph.kind(id) {
            // Function and class values are opaque; their bodies are
            // evaluated where they run.
            NodeKind::MethodDeclaration { .. }
            | NodeKind::ClassDeclaration { .. }
            | NodeKind::TypeDeclaration { .. }
            | NodeKind::Import { .. }
            | NodeKind::CatchClause { .. }
            | NodeKind::Comment
            | NodeKind::Pass
            | NodeKind::Break
            | NodeKind::Continue => Vec::new(),
            NodeKind::VariableDeclaration { value, .. } => value.iter().copied().collect(),
            NodeKind::Parameter { default, .. } => default.iter().copied().collect(),
            NodeKind::Assignment { value, .. } | NodeKind::Using { value, .. } => vec![*value],
            NodeKind::If { condition, .. }
            | NodeKind::While { condition, .. }
            | NodeKind::DoWhile { condition, .. } => vec![*condition],
            NodeKind::For { condition, .. } => condition.iter().copied().collect(),
            NodeKind::ForEach { iterable, .. } => vec![*iterable],
            NodeKind::Switch { value } => vec![*value],
            NodeKind::SwitchSection { case_value } => case_value.iter().copied().collect(),
            NodeKind::Return { value } | NodeKind::Throw { value } => {
                value.iter().copied().collect()
            }
            NodeKind::TernaryOperation {
                true_value,
                false_value,
                ..
            } => vec![*true_value, *false_value],
            _ => graph.ast_children(id),
        };
        Ok(deps)
    }

    fn apply_rules(
        &self,
        id: NodeId,
        deps: &[NodeId],
        current: &HashMap<NodeId, Evaluation>,
        previous: &HashMap<NodeId, Evaluation>,
    ) -> Result<Evaluation> {
        let label = self.graph.label(id);
        let registry = &self.evaluator.registry;
        let generic = registry.generic(label).ok_or(AnalysisError::MissingCase {
            node: id,
            label_type: label,
        })?;

        let mut args = RuleArgs {
            graph: &*self.graph,
            node: id,
            finding: self.finding,
            rules: self.rules(),
            dependencies: deps,
            known: Known {
                memo: &self.memo,
                current,
                previous,
            },
            eval: Evaluation::clean(),
        };
        generic(&mut args)?;
        for rule in registry.overrides(self.finding, self.graph.language(), label) {
            rule(&mut args)?;
        }
        trace!(node = %id, label = %label, danger = args.eval.danger, "evaluated");
        Ok(args.eval)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cfg::tests::with_cfg;
    use crate::syntax::testing::find;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    pub(crate) fn call(graph: &Graph, callee: &str) -> NodeId {
        find(graph, |k| {
            matches!(k, NodeKind::MethodInvocation { expression, .. } if expression == callee)
        })
    }

    pub(crate) fn first_argument(graph: &Graph, invocation: NodeId) -> NodeId {
        let NodeKind::MethodInvocation {
            arguments: Some(args),
            ..
        } = graph.kind(invocation)
        else {
            panic!("invocation without arguments")
        };
        graph.ast_children(*args)[0]
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn request_data_taints_through_declarations() {
        let code = "const id = req.query.id;\nconst sql = 'SELECT * FROM t WHERE id = ' + id;\ndb.query(sql);\n";
        let mut graph = with_cfg(Language::JavaScript, "a.js", code);
        let arg = first_argument(&graph, call(&graph, "db.query"));
        let evaluator = Evaluator::standard();
        let mut session = evaluator.session(&mut graph, FindingId::F001);
        assert!(session.evaluate(arg).unwrap().danger);
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn literals_are_clean_and_keep_their_value() {
        let code = "const sql = 'SELECT 1';\ndb.query(sql);\n";
        let mut graph = with_cfg(Language::JavaScript, "a.js", code);
        let arg = first_argument(&graph, call(&graph, "db.query"));
        let evaluator = Evaluator::standard();
        let mut session = evaluator.session(&mut graph, FindingId::F001);
        let eval = session.evaluate(arg).unwrap();
        assert_eq!(
            eval,
            Evaluation::of_value(Value::Str("SELECT 1".into()))
        );
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn lookup_value_needs_a_single_definition() {
        let code = "let a = 'x';\nif (c) { a = 'y'; }\nuse(a);\n";
        let mut graph = with_cfg(Language::JavaScript, "a.js", code);
        let arg = first_argument(&graph, call(&graph, "use"));
        let evaluator = Evaluator::standard();
        let mut session = evaluator.session(&mut graph, FindingId::F001);
        let eval = session.evaluate(arg).unwrap();
        assert!(!eval.danger);
        assert_eq!(eval.value, None);
    }

    #[cfg(feature = "python")]
    #[test]
    fn cyclic_definitions_terminate() {
        let code = "x = request.args['a']\nwhile c:\n    x = x + 1\nuse(x)\n";
        let mut graph = with_cfg(Language::Python, "a.py", code);
        let arg = first_argument(&graph, call(&graph, "use"));
        let evaluator = Evaluator::standard();
        let mut session = evaluator.session(&mut graph, FindingId::F001);
        assert!(session.evaluate(arg).unwrap().danger);
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn memoization_is_idempotent() {
        let code = "const a = req.body.x;\nconst b = a + '1';\nuse(b);\n";
        let mut graph = with_cfg(Language::JavaScript, "a.js", code);
        let arg = first_argument(&graph, call(&graph, "use"));
        let evaluator = Evaluator::standard();
        let mut session = evaluator.session(&mut graph, FindingId::F001);
        let first = session.evaluate(arg).unwrap();
        let steps = session.steps();
        let second = session.evaluate(arg).unwrap();
        assert_eq!(first, second);
        assert_eq!(session.steps(), steps);
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn missing_rule_fails_closed() {
        let code = "const a = req.body.x;\nuse(a);\n";
        let mut graph = with_cfg(Language::JavaScript, "a.js", code);
        let arg = first_argument(&graph, call(&graph, "use"));
        let mut evaluator = Evaluator::standard();
        evaluator.registry.remove_generic(LabelType::MemberAccess);
        let mut session = evaluator.session(&mut graph, FindingId::F001);
        let err = session.evaluate(arg).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::MissingCase {
                label_type: LabelType::MemberAccess,
                ..
            }
        ));
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn unsupported_placeholder_has_no_rule() {
        let mut graph = with_cfg(Language::JavaScript, "a.js", "use(x);\n");
        let placeholder = graph.add_node(crate::ir::Node {
            kind: NodeKind::Unsupported {
                cst_kind: "mystery".into(),
            },
            position: Default::default(),
            cst_kind: "mystery".into(),
        });
        let evaluator = Evaluator::standard();
        let mut session = evaluator.session(&mut graph, FindingId::F001);
        assert!(matches!(
            session.evaluate(placeholder),
            Err(AnalysisError::MissingCase {
                label_type: LabelType::Unsupported,
                ..
            })
        ));
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn step_limit_aborts() {
        let code = "const a = req.body.x;\nconst b = a + a + a + a;\nuse(b);\n";
        let mut graph = with_cfg(Language::JavaScript, "a.js", code);
        let arg = first_argument(&graph, call(&graph, "use"));
        let mut evaluator = Evaluator::standard();
        evaluator.limits.max_eval_steps = 3;
        let mut session = evaluator.session(&mut graph, FindingId::F001);
        assert!(matches!(
            session.evaluate(arg),
            Err(AnalysisError::Aborted {
                limit: "max_eval_steps",
                ..
            })
        ));
    }

    #[cfg(feature = "javascript")]
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        /// Concatenating operands is tainted exactly when one operand is.
        #[test]
        fn concatenation_is_or_monotone(operands in proptest::collection::vec(any::<bool>(), 1..6)) {
            let parts: Vec<String> = operands
                .iter()
                .enumerate()
                .map(|(i, tainted)| if *tainted { format!("req.query.p{i}") } else { format!("'c{i}'") })
                .collect();
            let code = format!("const q = {};\nuse(q);\n", parts.join(" + "));
            let mut graph = with_cfg(Language::JavaScript, "a.js", &code);
            let arg = first_argument(&graph, call(&graph, "use"));
            let evaluator = Evaluator::standard();
            let mut session = evaluator.session(&mut graph, FindingId::F001);
            let eval = session.evaluate(arg).unwrap();
            prop_assert_eq!(eval.danger, operands.iter().any(|t| *t));
        }
    }
}
