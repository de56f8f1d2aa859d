//! Lambda lowering, after javac's `LambdaToMethod`.
//!
//! Every lambda body becomes a `private static synthetic` method of the
//! class it is written in, named `lambda$<method>$<n>` (`new` inside
//! constructors, `static` inside `<clinit>`). Its parameters are the
//! receiver when the body needs one, then the captured locals, then the
//! lambda's own parameters. The expression itself is an `invokedynamic`
//! bound by `LambdaMetafactory.metafactory` that takes the captured values
//! and returns the functional interface.

use super::defs::{CONSTRUCTOR_METHOD_NAME, STATIC_INITIALIZER_METHOD_NAME};
use super::records::BootstrapTable;
use crate::ast::{Expr, LambdaExpr};

/// A lambda whose body still has to be written as a method.
#[derive(Debug, Clone)]
pub(crate) struct PendingLambda<'a> {
    pub expr: &'a Expr,
    pub lambda: &'a LambdaExpr,
    pub name: String,
    pub descriptor: String,
    /// Naming part of the method the lambda appeared in.
    pub enclosing: String,
}

/// Class-level pieces produced while generating method bodies.
#[derive(Debug, Default)]
pub(crate) struct ClassSynthetics<'a> {
    pub bootstraps: BootstrapTable,
    pub lambdas: Vec<PendingLambda<'a>>,
    /// Naming part for lambdas of the body being generated.
    pub enclosing: String,
    count: usize,
}

impl<'a> ClassSynthetics<'a> {
    /// Enters the body of `method`.
    pub fn enter(&mut self, method: &str) {
        self.enclosing = match method {
            CONSTRUCTOR_METHOD_NAME => "new".to_string(),
            STATIC_INITIALIZER_METHOD_NAME => "static".to_string(),
            other => other.to_string(),
        };
    }

    /// Next free lambda method name for the current body.
    pub fn lambda_name(&mut self) -> String {
        let name = format!("lambda${}${}", self.enclosing, self.count);
        self.count += 1;
        name
    }
}
