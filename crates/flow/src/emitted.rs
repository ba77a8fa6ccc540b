//! Output produced by evaluating flow expressions.

/// The result of evaluating a flow expression node.
///
/// Evaluation keeps the nesting of the expression tree so that composite
/// nodes can tell an empty branch apart from a populated one. The compiler
/// flattens this tree once evaluation is finished.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Emitted {
    /// The branch produced nothing (a false predicate, an empty pick).
    #[default]
    Nothing,

    /// A single step token.
    Token(String),

    /// An ordered group of child results.
    Nested(Vec<Emitted>),
}

impl Emitted {
    /// Returns `true` if this result contains no token at any depth.
    pub fn is_empty(&self) -> bool {
        match self {
            Emitted::Nothing => true,
            Emitted::Token(token) => token.is_empty(),
            Emitted::Nested(children) => children.iter().all(Emitted::is_empty),
        }
    }

    /// Appends every non-empty token to `out`, depth first, left to right.
    pub fn flatten_into(self, out: &mut Vec<String>) {
        match self {
            Emitted::Nothing => {}
            Emitted::Token(token) => {
                if !token.is_empty() {
                    out.push(token);
                }
            }
            Emitted::Nested(children) => {
                for child in children {
                    child.flatten_into(out);
                }
            }
        }
    }

    /// Flattens into a new vector.
    pub fn flatten(self) -> Vec<String> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }
}

impl From<&str> for Emitted {
    fn from(token: &str) -> Self {
        Emitted::Token(token.to_owned())
    }
}
