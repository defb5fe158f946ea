//! Core domain models for expression evaluation.
//!
//! This module contains the operator set, the operation tree and its
//! parser, and the expression and task records the scheduler works on.

pub mod ast;
pub mod expression;
pub mod operator;
pub mod parser;
pub mod task;

pub use ast::{Ast, AstBuilder, AstNode, Branch};
pub use expression::{Expression, ExpressionId, ExpressionStatus, ExpressionView};
pub use operator::Operator;
pub use parser::parse;
pub use task::{Task, TaskAssignment, TaskId, TaskResult};
