//! Sandboxed rule expressions.
//!
//! Conditions and computed substitutes are written in a small expression language that
//! can only see the arguments of the intercepted call. There are no variables, no
//! assignments, no loops and no access to program state, so evaluating an expression can
//! neither observe nor disturb the host beyond the values it is handed.
//!
//! # Syntax
//!
//! | Construct | Example |
//! |-----------|---------|
//! | Literals | `42`, `10L`, `2.5`, `"text"`, `'text'`, `true`, `null` |
//! | Arguments | `arg0`, `args[1]`, `argc`, `args` |
//! | Arithmetic | `+ - * / %`, unary `-` (`+` concatenates strings) |
//! | Comparison | `== != < <= > >=` |
//! | Logic | `&& \|\| !` (short-circuiting, operands must be boolean) |
//! | Access | `arg0.name`, `arg0["name"]`, `arg1[0]` |
//! | Builtins | `len`, `lower`, `upper`, `contains`, `starts_with`, `ends_with`, `str`, `int` |
//!
//! # Examples
//!
//! ```rust
//! use mockscope::{expr::Expression, Value};
//!
//! let condition = Expression::compile("arg0 == \"missing\" && argc == 1")?;
//! assert!(condition.test(&[Value::from("missing")])?);
//! assert!(!condition.test(&[Value::from("x")])?);
//!
//! let computed = Expression::compile("arg0 * 10")?;
//! assert_eq!(computed.evaluate(&[Value::Int(4)])?, Value::Long(40));
//! # Ok::<(), mockscope::Error>(())
//! ```

mod eval;
mod lexer;
mod parser;

use std::{fmt, sync::Arc};

pub use parser::{BinaryOp, Builtin, CompareOp, Expr, LogicalOp, UnaryOp};

use crate::{value::Value, Error, Result};

/// A compiled expression together with its source text.
///
/// Compiled expressions are immutable and cheap to clone; one instance is shared by every
/// call that evaluates it.
#[derive(Clone)]
pub struct Expression {
    source: Arc<str>,
    ast: Arc<Expr>,
}

impl Expression {
    /// Compiles an expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Expression`] with the byte offset of the first syntax problem, or
    /// [`Error::RecursionLimit`] if the expression nests too deeply.
    pub fn compile(source: &str) -> Result<Self> {
        let ast = parser::parse(source)?;
        Ok(Expression {
            source: Arc::from(source),
            ast: Arc::new(ast),
        })
    }

    /// Returns the source text the expression was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the syntax tree.
    #[must_use]
    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Evaluates the expression against call arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Evaluation`] on any runtime fault: a missing argument, a type
    /// error, integer overflow, or division by zero.
    pub fn evaluate(&self, args: &[Value]) -> Result<Value> {
        eval::evaluate(&self.ast, args)
    }

    /// Evaluates the expression as a predicate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Evaluation`] if evaluation faults or the result is not a boolean.
    pub fn test(&self, args: &[Value]) -> Result<bool> {
        match self.evaluate(args)? {
            Value::Bool(result) => Ok(result),
            other => Err(Error::Evaluation(format!(
                "condition produced {} instead of boolean",
                other.type_name()
            ))),
        }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.ast == other.ast
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expression({:?})", self.source)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
