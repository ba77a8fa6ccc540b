//! Builder utilities for ergonomic flow construction.
//!
//! Instead of writing verbose `FlowExpr::Operation { token: .., children: .. }`
//! literals, pipelines read like the flow they describe:
//!
//! ```rust
//! use activation_flow::builder::{op, pick, when};
//! use activation_flow::compile;
//!
//! struct Props { attack: bool }
//!
//! let flow = pick(vec![
//!     when("is_attack", |p: &Props| p.attack, vec![op("performAttackRoll", vec![])]),
//!     op("applyEffects", vec![]),
//! ]);
//!
//! assert_eq!(compile(&flow, &Props { attack: false }), vec!["applyEffects"]);
//! ```

use crate::FlowExpr;

/// Creates a sequence node.
#[inline]
pub fn sequence<C>(children: Vec<FlowExpr<C>>) -> FlowExpr<C> {
    FlowExpr::Sequence(children)
}

/// Creates a pick node.
#[inline]
pub fn pick<C>(children: Vec<FlowExpr<C>>) -> FlowExpr<C> {
    FlowExpr::Pick(children)
}

/// Creates a named predicate node.
#[inline]
pub fn when<C>(
    name: &'static str,
    test: impl Fn(&C) -> bool + Send + Sync + 'static,
    children: Vec<FlowExpr<C>>,
) -> FlowExpr<C> {
    FlowExpr::Predicate {
        name,
        test: Box::new(test),
        children,
    }
}

/// Creates an operation node wrapping its continuation.
#[inline]
pub fn op<C>(token: impl Into<String>, children: Vec<FlowExpr<C>>) -> FlowExpr<C> {
    FlowExpr::Operation {
        token: token.into(),
        children,
    }
}

/// Creates a literal token node.
#[inline]
pub fn token<C>(token: impl Into<String>) -> FlowExpr<C> {
    FlowExpr::Token(token.into())
}

/// Creates a node whose tokens are computed from the context.
#[inline]
pub fn tokens<C>(source: impl Fn(&C) -> Vec<String> + Send + Sync + 'static) -> FlowExpr<C> {
    FlowExpr::Tokens(Box::new(source))
}
