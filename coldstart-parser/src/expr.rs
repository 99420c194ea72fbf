// coldstart-parser - Compiled expression model
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Compiled expressions, as produced by the analyzer and stored on vars and
//! closures.

use std::fmt;
use std::sync::Arc;

use crate::lexical::BindingId;
use crate::symbol::Symbol;
use crate::value::ValueId;

/// Index of an expression in its heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub(crate) u32);

impl ExprId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Source span of an expression. Zero fields mean unknown.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Position {
    pub file: Option<Arc<str>>,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Position {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Position::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub pos: Position,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            pos: Position::default(),
            kind,
        }
    }

    pub fn at(pos: Position, kind: ExprKind) -> Self {
        Expr { pos, kind }
    }
}

/// One arity of a function: positional parameters (the rest parameter last,
/// for the variadic arity), a body, and an optional return type tag.
#[derive(Debug, Clone, PartialEq)]
pub struct FnArity {
    pub params: Vec<Symbol>,
    pub body: Vec<ExprId>,
    pub tagged_type: Option<ValueId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub exc_type: ValueId,
    pub symbol: Symbol,
    pub body: Vec<ExprId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal {
        value: ValueId,
        is_surrogate: bool,
    },
    Vector(Vec<ExprId>),
    Map {
        keys: Vec<ExprId>,
        values: Vec<ExprId>,
    },
    Set(Vec<ExprId>),
    If {
        cond: ExprId,
        positive: ExprId,
        negative: ExprId,
    },
    Def {
        var: ValueId,
        value: Option<ExprId>,
        meta: Option<ExprId>,
    },
    Call {
        callable: ExprId,
        args: Vec<ExprId>,
    },
    Recur(Vec<ExprId>),
    VarRef(ValueId),
    SetMacro(ValueId),
    Binding(BindingId),
    Meta {
        meta: ExprId,
        expr: ExprId,
    },
    Do(Vec<ExprId>),
    FnArity(FnArity),
    Fn {
        arities: Vec<ExprId>,
        variadic: Option<ExprId>,
        self_name: Option<Symbol>,
    },
    Let {
        names: Vec<Symbol>,
        values: Vec<ExprId>,
        body: Vec<ExprId>,
    },
    Loop {
        names: Vec<Symbol>,
        values: Vec<ExprId>,
        body: Vec<ExprId>,
    },
    Throw(ExprId),
    Catch(CatchClause),
    Try {
        body: Vec<ExprId>,
        catches: Vec<ExprId>,
        finally: Vec<ExprId>,
    },
}

impl ExprKind {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            ExprKind::Literal { .. } => "LiteralExpr",
            ExprKind::Vector(_) => "VectorExpr",
            ExprKind::Map { .. } => "MapExpr",
            ExprKind::Set(_) => "SetExpr",
            ExprKind::If { .. } => "IfExpr",
            ExprKind::Def { .. } => "DefExpr",
            ExprKind::Call { .. } => "CallExpr",
            ExprKind::Recur(_) => "RecurExpr",
            ExprKind::VarRef(_) => "VarRefExpr",
            ExprKind::SetMacro(_) => "SetMacroExpr",
            ExprKind::Binding(_) => "BindingExpr",
            ExprKind::Meta { .. } => "MetaExpr",
            ExprKind::Do(_) => "DoExpr",
            ExprKind::FnArity(_) => "FnArityExpr",
            ExprKind::Fn { .. } => "FnExpr",
            ExprKind::Let { .. } => "LetExpr",
            ExprKind::Loop { .. } => "LoopExpr",
            ExprKind::Throw(_) => "ThrowExpr",
            ExprKind::Catch(_) => "CatchExpr",
            ExprKind::Try { .. } => "TryExpr",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_position() {
        assert!(Position::default().is_empty());
        let pos = Position {
            start_line: 3,
            ..Position::default()
        };
        assert!(!pos.is_empty());
    }
}
