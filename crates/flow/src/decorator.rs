//! Decorator flow nodes.
//!
//! Decorators gate or prefix the result of their children:
//! [`FlowExpr::Predicate`] (conditional branch) and [`FlowExpr::Operation`]
//! (a step that wraps its continuation).

use crate::composite::{evaluate_pick, evaluate_sequence};
use crate::expr::PredicateFn;
use crate::{Emitted, FlowExpr};

/// Evaluates the children of a predicate node.
///
/// # Semantics
///
/// - If the test fails, the branch is pruned and children are not evaluated
/// - If the test holds, children are evaluated with pick semantics
pub(crate) fn evaluate_guard<C>(test: &PredicateFn<C>, children: &[FlowExpr<C>], ctx: &C) -> Emitted {
    if test(ctx) {
        evaluate_pick(children, ctx)
    } else {
        Emitted::Nothing
    }
}

/// Emits the operation token followed by its continuation.
pub(crate) fn evaluate_operation<C>(token: &str, children: &[FlowExpr<C>], ctx: &C) -> Emitted {
    let continuation = evaluate_sequence(children, ctx);
    if continuation.is_empty() {
        Emitted::Token(token.to_owned())
    } else {
        Emitted::Nested(vec![Emitted::Token(token.to_owned()), continuation])
    }
}
