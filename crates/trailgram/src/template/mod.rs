//! Message templates.
//!
//! A compact engine for Go `text/template` syntax, which is what Papertrail
//! users already write their notification templates in. Supported:
//!
//! - `{{.Field.Chain}}`, `{{$}}`, `{{$var.Field}}`, literals and `( ... )`
//! - pipelines (`{{.Events | len}}`) and `{{$x := ...}}` / `{{$x = ...}}`
//! - `if`, `else if`, `range` (with `$i, $e :=`, `else`, `break`,
//!   `continue`), `with`
//! - comments and `{{-` / `-}}` whitespace trimming
//! - the usual builtins: `and or not len index eq ne lt le gt ge print
//!   println printf html urlquery js`
//!
//! Compile once with [`Template::parse`], then [`Template::render`] per
//! request. Rendering never aborts the caller: it hands back whatever text
//! was produced alongside the error, if any.

mod exec;
mod funcs;
mod lexer;
mod parse;
mod value;

use thiserror::Error;

pub use value::Value;

/// Template errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The source is not a valid template.
    #[error("template: {name}:{line}: {message}")]
    Parse {
        /// Template name.
        name: String,
        /// 1-based source line.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// Executing the template against some data failed.
    #[error("template: {name}:{line}: executing \"{name}\" at <{action}>: {message}")]
    Exec {
        /// Template name.
        name: String,
        /// 1-based source line of the failing action.
        line: usize,
        /// Source text of the failing action.
        action: String,
        /// What went wrong.
        message: String,
    },
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Output of [`Template::render`].
///
/// `text` holds everything written before a failure, so it may be partial or
/// empty when `error` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Rendered text.
    pub text: String,
    /// The execution error, if rendering stopped early.
    pub error: Option<TemplateError>,
}

impl Rendered {
    /// Whether the template ran to completion.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// A compiled template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<parse::Node>,
}

impl Template {
    /// Compile `source` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Parse`] if the source has a syntax error.
    pub fn parse(name: &str, source: &str) -> TemplateResult<Self> {
        let parse_error = |line, message| TemplateError::Parse {
            name: name.to_string(),
            line,
            message,
        };

        let tokens = lexer::lex(source).map_err(|e| parse_error(e.line, e.message))?;
        let nodes = parse::parse(source, tokens).map_err(|e| parse_error(e.line, e.message))?;

        Ok(Self {
            name: name.to_string(),
            nodes,
        })
    }

    /// Template name used in error messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute against `data`, keeping partial output on failure.
    #[must_use]
    pub fn render(&self, data: &Value) -> Rendered {
        let mut text = String::new();
        let error = exec::execute(&self.nodes, data, &mut text)
            .err()
            .map(|e| TemplateError::Exec {
                name: self.name.clone(),
                line: e.line,
                action: e.action,
                message: e.message,
            });
        Rendered { text, error }
    }

    /// Execute against `data`, discarding partial output on failure.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Exec`] if execution fails.
    pub fn execute(&self, data: &Value) -> TemplateResult<String> {
        let Rendered { text, error } = self.render(data);
        error.map_or(Ok(text), Err)
    }
}
