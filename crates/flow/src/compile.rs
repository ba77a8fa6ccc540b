//! Flattening compiler.

use crate::FlowExpr;

/// Compiles a flow against a context into a flat list of step tokens.
///
/// The expression is evaluated eagerly, the nested result is flattened depth
/// first, and empty entries are dropped. The function is pure: compiling the
/// same flow against the same context always yields the same list.
pub fn compile<C>(flow: &FlowExpr<C>, ctx: &C) -> Vec<String> {
    flow.evaluate(ctx).flatten()
}
