//! Composite flow nodes.
//!
//! Composite nodes control how the results of multiple children combine:
//! [`FlowExpr::Pick`] (first match wins) and [`FlowExpr::Sequence`]
//! (ordered composition).

use crate::{Emitted, FlowExpr};

/// Evaluates children left to right and returns the first non-empty result.
///
/// # Semantics
///
/// - Children after the first non-empty one are **not evaluated**
/// - If every child is empty, the pick is empty
///
/// This models an if / else-if chain.
pub(crate) fn evaluate_pick<C>(children: &[FlowExpr<C>], ctx: &C) -> Emitted {
    for child in children {
        let emitted = child.evaluate(ctx);
        if !emitted.is_empty() {
            return emitted;
        }
    }
    Emitted::Nothing
}

/// Evaluates every child and keeps the non-empty results in order.
///
/// # Semantics
///
/// A `Sequence` never short-circuits: an empty child is dropped and the
/// remaining children still contribute.
pub(crate) fn evaluate_sequence<C>(children: &[FlowExpr<C>], ctx: &C) -> Emitted {
    let kept: Vec<Emitted> = children
        .iter()
        .map(|child| child.evaluate(ctx))
        .filter(|emitted| !emitted.is_empty())
        .collect();

    if kept.is_empty() {
        Emitted::Nothing
    } else {
        Emitted::Nested(kept)
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::{pick, sequence, token, when};
    use crate::compile;

    struct TestContext {
        value: i32,
    }

    #[test]
    fn pick_takes_first_non_empty() {
        let expr = pick(vec![
            when("negative", |c: &TestContext| c.value < 0, vec![token("neg")]),
            when("positive", |c: &TestContext| c.value > 0, vec![token("pos")]),
            token("zero"),
        ]);

        assert_eq!(compile(&expr, &TestContext { value: 3 }), vec!["pos"]);
        assert_eq!(compile(&expr, &TestContext { value: -1 }), vec!["neg"]);
        assert_eq!(compile(&expr, &TestContext { value: 0 }), vec!["zero"]);
    }

    #[test]
    fn pick_with_no_match_is_empty() {
        let expr = pick(vec![when("never", |_: &TestContext| false, vec![token("x")])]);
        assert!(compile(&expr, &TestContext { value: 0 }).is_empty());
    }

    #[test]
    fn sequence_keeps_all_non_empty_children() {
        let expr = sequence(vec![
            token("a"),
            when("never", |_: &TestContext| false, vec![token("b")]),
            token("c"),
        ]);
        assert_eq!(compile(&expr, &TestContext { value: 0 }), vec!["a", "c"]);
    }
}
