//! End-to-end query evaluation tests.
//!
//! Tests for:
//! - Base fact retrieval and the `=` built-in
//! - Recursive rules (transitive closure) with and without a cache
//! - Negation
//! - Cache reuse across repeated queries, and no partial entries left by
//!   abandoned or overlapping evaluations
//! - Error propagation out of nested rules
//! - Parallel batch evaluation

use datalog_evaluator::ast::builders::{atom, fact, ExprBuilder, RuleBuilder};
use datalog_evaluator::{
    Answer, CacheLookup, CachedDataset, Clause, Dataset, EvalError, EvalResult, Evaluator, EvaluatorConfig,
    Expression, IndexedDataset, IndexedScan, MemoryDataset, Rule, RuleCache, Value,
    EQUALITY_PREDICATE,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

/// Dataset wrapper counting how often the evaluator scans facts
struct CountingDataset {
    inner: MemoryDataset,
    tuple_scans: AtomicUsize,
}

impl CountingDataset {
    fn new(inner: MemoryDataset) -> Self {
        CountingDataset {
            inner,
            tuple_scans: AtomicUsize::new(0),
        }
    }

    fn tuple_scans(&self) -> usize {
        self.tuple_scans.load(Ordering::SeqCst)
    }
}

impl Dataset for CountingDataset {
    fn tuples(&self) -> Box<dyn Iterator<Item = Expression> + '_> {
        self.tuple_scans.fetch_add(1, Ordering::SeqCst);
        self.inner.tuples()
    }

    fn rules(&self) -> Box<dyn Iterator<Item = Arc<Rule>> + '_> {
        self.inner.rules()
    }
}

fn ancestry() -> MemoryDataset {
    let mut db = MemoryDataset::new();
    db.add_facts([fact("edge", ["a", "b"]), fact("edge", ["b", "c"])])
        .unwrap();
    db.add_rule(
        RuleBuilder::new("ancestor")
            .head_vars(["X", "Y"])
            .body("edge", ["X", "Y"])
            .build(),
    );
    db.add_rule(
        RuleBuilder::new("ancestor")
            .head_vars(["X", "Y"])
            .body("edge", ["X", "Z"])
            .body("ancestor", ["Z", "Y"])
            .build(),
    );
    db
}

fn run(db: &dyn Dataset, query: &Expression) -> Vec<Answer> {
    Evaluator::new(db)
        .select(query, None)
        .collect::<EvalResult<_>>()
        .unwrap()
}

fn column(answers: &[Answer], var: &str) -> Vec<Value> {
    answers
        .iter()
        .map(|a| a.bindings.value_of(var).cloned().unwrap())
        .collect()
}

// ============================================================================
// Base Facts and Built-ins
// ============================================================================

#[test]
fn test_base_fact_retrieval() {
    let mut db = MemoryDataset::new();
    db.add_facts([fact("parent", ["tom", "bob"]), fact("parent", ["bob", "ann"])])
        .unwrap();

    let query = ExprBuilder::new("parent").var("X").constant("bob").build();
    let answers = run(&db, &query);

    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].tuple, fact("parent", ["tom", "bob"]));
    assert_eq!(column(&answers, "X"), vec![Value::string("tom")]);
    assert_eq!(answers[0].bindings.len(), 1);
}

#[test]
fn test_no_match_is_empty_not_error() {
    let db = ancestry();
    let query = ExprBuilder::new("edge").constant("z").var("Y").build();
    assert!(run(&db, &query).is_empty());

    let wrong_arity = ExprBuilder::new("edge").var("X").build();
    assert!(run(&db, &wrong_arity).is_empty());
}

#[test]
fn test_equality_independent_of_dataset() {
    let equal = ExprBuilder::new(EQUALITY_PREDICATE).constant("x").constant("x").build();
    let unequal = ExprBuilder::new(EQUALITY_PREDICATE).constant("x").constant("y").build();

    for db in [MemoryDataset::new(), ancestry()] {
        let counting = CountingDataset::new(db);
        assert_eq!(run(&counting, &equal).len(), 1);
        assert!(run(&counting, &unequal).is_empty());
        assert_eq!(counting.tuple_scans(), 0);
    }
}

// ============================================================================
// Recursion
// ============================================================================

#[test]
fn test_transitive_closure() {
    let db = ancestry();
    let query = ExprBuilder::new("ancestor").constant("a").var("Y").build();
    let answers = run(&db, &query);
    assert_eq!(column(&answers, "Y"), vec![Value::string("b"), Value::string("c")]);
}

#[test]
fn test_transitive_closure_cached() {
    let db = CachedDataset::new(ancestry());
    let query = ExprBuilder::new("ancestor").constant("a").var("Y").build();
    let answers = run(&db, &query);
    assert_eq!(column(&answers, "Y"), vec![Value::string("b"), Value::string("c")]);
}

#[test]
fn test_left_recursion_terminates() {
    let mut db = MemoryDataset::new();
    db.add_facts([fact("edge", [1i64, 2]), fact("edge", [2i64, 3])])
        .unwrap();
    db.add_rule(RuleBuilder::new("path").head_vars(["X", "Y"]).body("edge", ["X", "Y"]).build());
    db.add_rule(
        RuleBuilder::new("path")
            .head_vars(["X", "Z"])
            .body("path", ["X", "Y"])
            .body("edge", ["Y", "Z"])
            .build(),
    );

    let query = ExprBuilder::new("path").constant(1i64).var("Z").build();
    let plain = run(&db, &query);
    let cached = run(&CachedDataset::new(db), &query);

    assert_eq!(column(&plain, "Z"), vec![Value::from(2i64), Value::from(3i64)]);
    assert_eq!(plain, cached);
}

#[test]
fn test_mutual_recursion_terminates() {
    let mut db = MemoryDataset::new();
    db.add_fact(fact("zero", [0i64])).unwrap();
    db.add_facts([fact("succ", [0i64, 1]), fact("succ", [1i64, 2])])
        .unwrap();
    db.add_rule(RuleBuilder::new("even").head_vars(["X"]).body("zero", ["X"]).build());
    db.add_rule(
        RuleBuilder::new("even")
            .head_vars(["Y"])
            .body("odd", ["X"])
            .body("succ", ["X", "Y"])
            .build(),
    );
    db.add_rule(
        RuleBuilder::new("odd")
            .head_vars(["Y"])
            .body("even", ["X"])
            .body("succ", ["X", "Y"])
            .build(),
    );

    let cached = CachedDataset::new(db);
    let evens = run(&cached, &atom("even", ["N"]));
    assert!(column(&evens, "N").contains(&Value::from(0i64)));
    assert!(!column(&evens, "N").contains(&Value::from(1i64)));
}

// ============================================================================
// Negation
// ============================================================================

#[test]
fn test_negation() {
    let mut db = MemoryDataset::new();
    db.add_facts([fact("person", ["a"]), fact("person", ["b"]), fact("banned", ["b"])])
        .unwrap();
    db.add_rule(
        RuleBuilder::new("allowed")
            .head_vars(["X"])
            .body("person", ["X"])
            .negated("banned", ["X"])
            .build(),
    );

    let answers = run(&db, &atom("allowed", ["X"]));
    assert_eq!(column(&answers, "X"), vec![Value::string("a")]);
}

#[test]
fn test_negation_of_derived_predicate() {
    let mut db = MemoryDataset::new();
    db.add_facts([
        fact("person", ["a"]),
        fact("person", ["b"]),
        fact("flagged", ["b"]),
    ])
    .unwrap();
    db.add_rule(RuleBuilder::new("banned").head_vars(["X"]).body("flagged", ["X"]).build());
    db.add_rule(
        RuleBuilder::new("allowed")
            .head_vars(["X"])
            .body("person", ["X"])
            .negated("banned", ["X"])
            .build(),
    );

    let answers = run(&db, &atom("allowed", ["X"]));
    assert_eq!(column(&answers, "X"), vec![Value::string("a")]);
}

#[test]
fn test_negated_clause_written_first_runs_last() {
    let mut db = MemoryDataset::new();
    db.add_facts([fact("person", ["a"]), fact("person", ["b"]), fact("banned", ["b"])])
        .unwrap();
    db.add_rule(Rule::new(
        atom("allowed", ["X"]),
        vec![
            Clause::Negated(atom("banned", ["X"])),
            Clause::Positive(atom("person", ["X"])),
        ],
    ));

    // the negated clause waits until X is bound by the positive one
    let answers = run(&db, &atom("allowed", ["X"]));
    assert_eq!(column(&answers, "X"), vec![Value::string("a")]);
}

// ============================================================================
// Caching
// ============================================================================

#[test]
fn test_cached_query_is_idempotent() {
    let db = CachedDataset::new(CountingDataset::new(ancestry()));
    let query = ExprBuilder::new("ancestor").constant("a").var("Y").build();

    let first = run(&db, &query);
    let scans_after_first = db.inner().tuple_scans();
    let misses = db.stats().misses;

    let second = run(&db, &query);
    let scans_after_second = db.inner().tuple_scans();

    assert_eq!(first, second);
    assert!(scans_after_first > 1);
    // only the top-level fact scan runs again; rule bodies come from the cache
    assert_eq!(scans_after_second - scans_after_first, 1);
    assert_eq!(db.stats().misses, misses);
    assert!(db.stats().hits >= 2);
}

#[test]
fn test_cache_distinguishes_instantiations() {
    let db = CachedDataset::new(ancestry());
    let from_a = ExprBuilder::new("ancestor").constant("a").var("Y").build();
    let from_b = ExprBuilder::new("ancestor").constant("b").var("Y").build();

    let a = run(&db, &from_a);
    let b = run(&db, &from_b);
    assert_eq!(a.len(), 2);
    assert_eq!(column(&b, "Y"), vec![Value::string("c")]);
}

#[test]
fn test_abandoned_query_is_lazy() {
    let db = CountingDataset::new(ancestry());
    let query = ExprBuilder::new("ancestor").constant("a").var("Y").build();

    let mut answers = Evaluator::new(&db).select(&query, None);
    let first = answers.next().unwrap().unwrap();
    let scans = db.tuple_scans();
    drop(answers);

    assert_eq!(first.bindings.value_of("Y"), Some(&Value::string("b")));
    // the recursive branch was never started
    assert_eq!(scans, 2);
}

/// `e(a, 1)`, `e(a, 2)`, `node(a)` with `r(X, Y) :- e(X, Y)` and a rule
/// using the same `r(a, _)` instantiation twice in one body
fn repeated_instantiation() -> MemoryDataset {
    let mut db = MemoryDataset::new();
    db.add_facts([
        fact("e", [Value::string("a"), Value::from(1i64)]),
        fact("e", [Value::string("a"), Value::from(2i64)]),
        fact("node", ["a"]),
    ])
    .unwrap();
    db.add_rule(RuleBuilder::new("r").head_vars(["X", "Y"]).body("e", ["X", "Y"]).build());
    db.add_rule(
        RuleBuilder::new("pair")
            .head_vars(["Y", "Y2"])
            .clause(Clause::Positive(ExprBuilder::new("r").constant("a").var("Y").build()))
            .clause(Clause::Positive(ExprBuilder::new("r").constant("a").var("Y2").build()))
            .build(),
    );
    db.add_rule(Rule::new(
        atom("lonely", ["X"]),
        vec![
            Clause::Positive(atom("node", ["X"])),
            Clause::Negated(atom("r", ["X", "Z"])),
        ],
    ));
    db
}

#[test]
fn test_same_instantiation_twice_in_one_body() {
    let query = atom("pair", ["A", "B"]);
    let plain = run(&repeated_instantiation(), &query);
    let cached_db = CachedDataset::new(repeated_instantiation());
    let cached = run(&cached_db, &query);

    assert_eq!(plain.len(), 4);
    assert_eq!(sorted_tuples(cached), sorted_tuples(plain));
    // the second run replays complete entries
    assert_eq!(run(&cached_db, &query).len(), 4);
}

#[test]
fn test_abandoned_query_leaves_no_partial_entry() {
    let db = CachedDataset::new(repeated_instantiation());
    let r_of_a = ExprBuilder::new("r").constant("a").var("Y").build();

    let mut answers = Evaluator::new(&db).select(&r_of_a, None);
    assert!(answers.next().unwrap().is_ok());
    drop(answers);

    assert_eq!(db.stats().abandoned, 1);
    assert_eq!(db.stats().size, 0);
    assert_eq!(run(&db, &r_of_a).len(), 2);
    assert_eq!(run(&db, &atom("pair", ["A", "B"])).len(), 4);
}

#[test]
fn test_antijoin_leaves_no_partial_entry() {
    let db = CachedDataset::new(repeated_instantiation());

    // the negated clause stops after its first match
    assert!(run(&db, &atom("lonely", ["X"])).is_empty());
    assert_eq!(db.stats().abandoned, 1);

    let r_of_a = ExprBuilder::new("r").constant("a").var("Y").build();
    assert_eq!(run(&db, &r_of_a).len(), 2);
}

// ============================================================================
// Capabilities
// ============================================================================

#[test]
fn test_index_and_cache_stack() {
    let indexed = IndexedDataset::from_memory(ancestry());
    let db = CachedDataset::new(indexed);
    assert!(db.indexed().is_some());
    assert!(db.cache().is_some());

    let query = ExprBuilder::new("ancestor").constant("a").var("Y").build();
    let answers = run(&db, &query);
    assert_eq!(column(&answers, "Y"), vec![Value::string("b"), Value::string("c")]);
    assert!(db.inner().stats().lookups > 0);
}

#[test]
fn test_all_option_combinations_agree() {
    let db = CachedDataset::new(IndexedDataset::from_memory(ancestry()));
    let query = ExprBuilder::new("ancestor").var("X").constant("c").build();

    let mut results = Vec::new();
    for use_index in [false, true] {
        for use_cache in [false, true] {
            db.clear_cache();
            let options = EvaluatorConfig { use_index, use_cache };
            let answers: Vec<_> = Evaluator::with_options(&db, options)
                .select(&query, None)
                .collect::<EvalResult<_>>()
                .unwrap();
            let mut xs = column(&answers, "X");
            xs.sort();
            results.push(xs);
        }
    }
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(results[0], vec![Value::string("a"), Value::string("b")]);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_nested_error_reaches_caller() {
    let mut db = MemoryDataset::new();
    db.add_fact(fact("q", ["a"])).unwrap();
    // only negated clauses: cannot seed a join
    db.add_rule(Rule::new(atom("bad", ["X"]), vec![Clause::Negated(atom("q", ["X"]))]));
    db.add_rule(RuleBuilder::new("top").head_vars(["X"]).body("q", ["X"]).body("bad", ["X"]).build());

    let result: EvalResult<Vec<_>> = Evaluator::new(&db).select(&atom("top", ["X"]), None).collect();
    assert!(matches!(result, Err(EvalError::NoPositiveClause { .. })));
}

#[test]
fn test_unbound_head_variable_error() {
    let mut db = MemoryDataset::new();
    db.add_fact(fact("q", ["a"])).unwrap();
    db.add_rule(RuleBuilder::new("p").head_vars(["X", "Y"]).body("q", ["X"]).build());

    let err = Evaluator::new(&db)
        .select(&atom("p", ["A", "B"]), None)
        .find_map(Result::err)
        .unwrap();
    match err {
        EvalError::UnboundVariable { var, .. } => assert_eq!(var.name(), "Y"),
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Batch Evaluation
// ============================================================================

#[test]
fn test_select_batch() {
    let db = ancestry();
    let queries: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|from| ExprBuilder::new("ancestor").constant(from).var("Y").build())
        .collect();

    let results = Evaluator::new(&db).select_batch(&queries);
    let counts: Vec<_> = results.into_iter().map(|r| r.unwrap().len()).collect();
    assert_eq!(counts, vec![2, 1, 0]);
}

/// `edge(i, i + 1)` for `1 <= i < size`, plus the `ancestor` closure rules
fn chain(size: i64) -> MemoryDataset {
    let mut db = MemoryDataset::new();
    db.add_facts((1..size).map(|i| fact("edge", [i, i + 1]))).unwrap();
    for rule in ancestry().rules() {
        db.add_rule(Rule::clone(&rule));
    }
    db
}

fn sorted_tuples(answers: Vec<Answer>) -> Vec<Expression> {
    let mut tuples: Vec<_> = answers.into_iter().map(|a| a.tuple).collect();
    tuples.sort();
    tuples
}

#[test]
fn test_select_batch_on_shared_cache_matches_sequential() {
    let size = 20i64;
    let queries: Vec<_> = (1..=size)
        .chain(1..=size)
        .rev()
        .map(|from| ExprBuilder::new("ancestor").constant(from).var("Y").build())
        .collect();

    let sequential_db = CachedDataset::new(chain(size));
    let sequential: Vec<_> = queries
        .iter()
        .map(|query| sorted_tuples(run(&sequential_db, query)))
        .collect();

    let shared = CachedDataset::new(chain(size));
    let batch: Vec<_> = Evaluator::new(&shared)
        .select_batch(&queries)
        .into_iter()
        .map(|result| sorted_tuples(result.unwrap()))
        .collect();

    assert_eq!(batch, sequential);
    for (query, tuples) in queries.iter().zip(&batch) {
        let from = query.terms()[1].as_constant().and_then(Value::as_i64).unwrap();
        assert_eq!(tuples.len(), usize::try_from(size - from).unwrap(), "{query}");
    }
    assert_eq!(shared.stats().abandoned, 0);
}

#[test]
fn test_capability_fallback_through_trait_objects() {
    let db = MemoryDataset::new();
    let as_dyn: &dyn Dataset = &db;
    assert!(as_dyn.indexed().is_none());
    assert!(as_dyn.cache().is_none());

    let indexed = IndexedDataset::new();
    let scan: &dyn IndexedScan = indexed.indexed().unwrap();
    assert_eq!(scan.scan_index(&atom("p", ["X"])).count(), 0);

    let cached = CachedDataset::new(MemoryDataset::new());
    let cache: &dyn RuleCache = cached.cache().unwrap();
    let key = datalog_evaluator::CacheKey::new(
        Arc::new(RuleBuilder::new("p").head_vars(["X"]).body("q", ["X"]).build()),
        atom("p", ["X"]),
    );
    assert_eq!(cache.scan_cache(&key), CacheLookup::Reserved);
}
