//! Abstract syntax tree for Javalette.
//!
//! The tree is produced by the parser with every `Reference.bind` unset and
//! every expression type unknown; semantic analysis decorates it in place
//! (bindings, variable ids, expression types). Bindings are `VarId` indices
//! into the enclosing function's declaration arena, never pointers.

pub mod display;
pub mod expression;
pub mod statement;
pub mod types;

pub use display::pretty;
pub use expression::{
    Assignment, BinOp, Binary, Binding, Call, Cast, Const, ConstValue, Expression, FuncId,
    Reference, UnOp, Unary, VarId,
};
pub use statement::{
    Block, Builtin, Declaration, Evaluation, Function, IfThenElse, LocalVar, Program,
    ReturnStatement, Statement, Variable, WhileLoop,
};
pub use types::{
    FunctionType, Type, EQ_COMPARABLE_TYPES, INEQ_COMPARABLE_TYPES, NUMERIC_TYPES,
};
