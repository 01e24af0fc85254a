//! Parsed form of a field query.

use gridix_codec::Value;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// The operator with its operands swapped (`5 < age` is `age > 5`).
    pub(crate) fn flipped(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
        }
    }

    pub(crate) fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Self::Eq => ordering == Equal,
            Self::Ne => ordering != Equal,
            Self::Lt => ordering == Less,
            Self::Le => ordering != Greater,
            Self::Gt => ordering == Greater,
            Self::Ge => ordering != Less,
        }
    }
}

/// A literal or a positional parameter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Literal(Value),
    /// Zero-based position of a `?` placeholder.
    Param(usize),
}

/// Unbound predicate over field names.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Compare {
        field: String,
        op: CompareOp,
        operand: Operand,
    },
    Between {
        field: String,
        low: Operand,
        high: Operand,
        negated: bool,
    },
    In {
        field: String,
        list: Vec<Operand>,
        negated: bool,
    },
    IsNull {
        field: String,
        negated: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// Selected columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selection {
    /// `*`: the key followed by every declared field.
    All,
    Fields(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OrderBy {
    pub(crate) field: String,
    pub(crate) descending: bool,
}

/// A parsed query.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    /// Absent for a bare clause.
    pub(crate) selection: Option<Selection>,
    pub(crate) type_name: Option<String>,
    pub(crate) filter: Option<Expr>,
    pub(crate) order_by: Option<OrderBy>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    /// Number of `?` placeholders.
    pub(crate) params: usize,
}
