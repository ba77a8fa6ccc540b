//! The flow expression tree.
//!
//! This module defines [`FlowExpr`], the tagged tree that every pipeline is
//! written in. The tree is generic over a context type `C` holding the static
//! properties that predicates inspect.

use std::fmt;

use crate::Emitted;
use crate::composite::{evaluate_pick, evaluate_sequence};
use crate::decorator::{evaluate_guard, evaluate_operation};

/// Predicate over the static properties of a context.
pub type PredicateFn<C> = Box<dyn Fn(&C) -> bool + Send + Sync>;

/// Context-dependent token source.
pub type TokensFn<C> = Box<dyn Fn(&C) -> Vec<String> + Send + Sync>;

/// A node of a declarative flow.
///
/// # Semantics
///
/// - `Predicate`: if the test holds, evaluates its children with pick
///   semantics (first non-empty child wins); otherwise prunes the branch
/// - `Pick`: the first non-empty child, left to right (if / else-if chains)
/// - `Sequence`: all non-empty children, concatenated in order
/// - `Operation`: its own token, followed by all of its children (an
///   operation wraps its continuation)
/// - `Token`: a single literal token
/// - `Tokens`: a list of tokens computed from the context
pub enum FlowExpr<C> {
    Predicate {
        name: &'static str,
        test: PredicateFn<C>,
        children: Vec<FlowExpr<C>>,
    },
    Pick(Vec<FlowExpr<C>>),
    Sequence(Vec<FlowExpr<C>>),
    Operation {
        token: String,
        children: Vec<FlowExpr<C>>,
    },
    Token(String),
    Tokens(TokensFn<C>),
}

impl<C> FlowExpr<C> {
    /// Evaluates this node against the given context.
    ///
    /// The result keeps the nesting of the tree; use [`crate::compile`] to
    /// obtain the flat step list.
    pub fn evaluate(&self, ctx: &C) -> Emitted {
        match self {
            FlowExpr::Predicate { test, children, .. } => evaluate_guard(test, children, ctx),
            FlowExpr::Pick(children) => evaluate_pick(children, ctx),
            FlowExpr::Sequence(children) => evaluate_sequence(children, ctx),
            FlowExpr::Operation { token, children } => evaluate_operation(token, children, ctx),
            FlowExpr::Token(token) => Emitted::Token(token.clone()),
            FlowExpr::Tokens(source) => {
                Emitted::Nested(source(ctx).into_iter().map(Emitted::Token).collect())
            }
        }
    }
}

impl<C> fmt::Debug for FlowExpr<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowExpr::Predicate { name, children, .. } => f
                .debug_struct("Predicate")
                .field("name", name)
                .field("children", children)
                .finish(),
            FlowExpr::Pick(children) => f.debug_tuple("Pick").field(children).finish(),
            FlowExpr::Sequence(children) => f.debug_tuple("Sequence").field(children).finish(),
            FlowExpr::Operation { token, children } => f
                .debug_struct("Operation")
                .field("token", token)
                .field("children", children)
                .finish(),
            FlowExpr::Token(token) => f.debug_tuple("Token").field(token).finish(),
            FlowExpr::Tokens(_) => f.write_str("Tokens(..)"),
        }
    }
}
