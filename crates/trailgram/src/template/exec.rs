//! Tree-walking executor.

use super::funcs;
use super::parse::{Command, Node, Operand, Pipeline};
use super::value::Value;

/// A failure while executing a template, tied to the action that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExecError {
    pub(crate) line: usize,
    pub(crate) action: String,
    pub(crate) message: String,
}

type ExecResult<T> = Result<T, ExecError>;

/// How a node list finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

/// Run `nodes` against `data`, appending to `out`.
///
/// On error `out` keeps whatever was written before the failing action.
pub(crate) fn execute(nodes: &[Node], data: &Value, out: &mut String) -> ExecResult<()> {
    let mut state = State {
        vars: vec![("$".to_string(), data.clone())],
        out,
    };
    state.walk(nodes, data).map(|_| ())
}

fn fail(pipe: &Pipeline, message: impl Into<String>) -> ExecError {
    ExecError {
        line: pipe.line,
        action: pipe.text.clone(),
        message: message.into(),
    }
}

struct State<'a> {
    /// Variables in scope, innermost last. `$` is always first.
    vars: Vec<(String, Value)>,
    out: &'a mut String,
}

impl State<'_> {
    fn walk(&mut self, nodes: &[Node], dot: &Value) -> ExecResult<Flow> {
        for node in nodes {
            let flow = match node {
                Node::Text(text) => {
                    self.out.push_str(text);
                    Flow::Normal
                },
                Node::Action(pipe) => {
                    let value = self.eval_pipeline(pipe, dot, true)?;
                    if pipe.decl.is_empty() {
                        self.print(&value);
                    }
                    Flow::Normal
                },
                Node::If {
                    pipe,
                    then,
                    otherwise,
                } => {
                    let scope = self.vars.len();
                    let cond = self.eval_pipeline(pipe, dot, true)?;
                    let branch = if cond.is_truthy() { then } else { otherwise };
                    let flow = self.walk(branch, dot);
                    self.vars.truncate(scope);
                    flow?
                },
                Node::With {
                    pipe,
                    body,
                    otherwise,
                } => {
                    let scope = self.vars.len();
                    let value = self.eval_pipeline(pipe, dot, true)?;
                    let flow = if value.is_truthy() {
                        self.walk(body, &value)
                    } else {
                        self.walk(otherwise, dot)
                    };
                    self.vars.truncate(scope);
                    flow?
                },
                Node::Range {
                    pipe,
                    body,
                    otherwise,
                } => self.range(pipe, body, otherwise, dot)?,
                Node::Break => Flow::Break,
                Node::Continue => Flow::Continue,
            };
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    /// Declared variables hold the ranged value itself until the first
    /// iteration rebinds them, so `else` can still refer to them.
    fn range(
        &mut self,
        pipe: &Pipeline,
        body: &[Node],
        otherwise: &[Node],
        dot: &Value,
    ) -> ExecResult<Flow> {
        let scope = self.vars.len();
        let flow = self.range_scoped(pipe, body, otherwise, dot);
        self.vars.truncate(scope);
        flow
    }

    fn range_scoped(
        &mut self,
        pipe: &Pipeline,
        body: &[Node],
        otherwise: &[Node],
        dot: &Value,
    ) -> ExecResult<Flow> {
        let value = self.eval_pipeline(pipe, dot, true)?;
        let items: Vec<Value> = match &value {
            Value::List(items) => items.clone(),
            Value::Int(_) if pipe.decl.len() > 1 => {
                let message = format!("can't use {value} to iterate over more than one variable");
                return Err(fail(pipe, message));
            },
            Value::Int(n) => (0..*n).map(Value::Int).collect(),
            Value::Nil => Vec::new(),
            other => {
                return Err(fail(pipe, format!("range can't iterate over {other}")));
            },
        };

        if items.is_empty() {
            return self.walk(otherwise, dot);
        }

        for (i, item) in items.into_iter().enumerate() {
            match pipe.decl.as_slice() {
                [elem] => self.set_var(pipe, elem, item.clone())?,
                [idx, elem] => {
                    let i = i64::try_from(i).map_err(|_| fail(pipe, "range index overflow"))?;
                    self.set_var(pipe, idx, Value::Int(i))?;
                    self.set_var(pipe, elem, item.clone())?;
                },
                _ => {},
            }
            let scope = self.vars.len();
            let flow = self.walk(body, &item);
            self.vars.truncate(scope);
            if flow? == Flow::Break {
                break;
            }
        }
        Ok(Flow::Normal)
    }

    /// Rebind the innermost variable called `name`.
    fn set_var(&mut self, pipe: &Pipeline, name: &str, value: Value) -> ExecResult<()> {
        let slot = self
            .vars
            .iter_mut()
            .rev()
            .find(|(var, _)| var == name)
            .ok_or_else(|| fail(pipe, format!("undefined variable: {name}")))?;
        slot.1 = value;
        Ok(())
    }

    fn print(&mut self, value: &Value) {
        match value {
            Value::Nil => self.out.push_str("<no value>"),
            other => self.out.push_str(&other.to_string()),
        }
    }

    /// Evaluate a pipeline; `declare` binds its variables in the current scope.
    fn eval_pipeline(&mut self, pipe: &Pipeline, dot: &Value, declare: bool) -> ExecResult<Value> {
        let mut value = None;
        for cmd in &pipe.cmds {
            value = Some(self.eval_command(cmd, pipe, dot, value)?);
        }
        let value = value.unwrap_or(Value::Nil);

        if declare {
            for name in &pipe.decl {
                if pipe.is_assign {
                    self.set_var(pipe, name, value.clone())?;
                } else {
                    self.vars.push((name.clone(), value.clone()));
                }
            }
        }
        Ok(value)
    }

    fn eval_command(
        &mut self,
        cmd: &Command,
        pipe: &Pipeline,
        dot: &Value,
        piped: Option<Value>,
    ) -> ExecResult<Value> {
        let Some((first, rest)) = cmd.args.split_first() else {
            return Err(fail(pipe, "empty command"));
        };

        match first {
            Operand::Func(name) if name == "and" || name == "or" => {
                self.short_circuit(name, rest, pipe, dot, piped)
            },
            Operand::Func(name) => {
                let mut args = Vec::with_capacity(rest.len().saturating_add(1));
                for arg in rest {
                    args.push(self.eval_arg(arg, pipe, dot)?);
                }
                args.extend(piped);
                funcs::call(name, &args)
                    .map_err(|e| fail(pipe, format!("error calling {name}: {e}")))
            },
            Operand::Nil => Err(fail(pipe, "nil is not a command")),
            operand => {
                if !rest.is_empty() || piped.is_some() {
                    return Err(fail(
                        pipe,
                        format!("can't give argument to non-function {operand}"),
                    ));
                }
                self.eval_arg(operand, pipe, dot)
            },
        }
    }

    /// `and` stops at the first falsy argument, `or` at the first truthy one.
    fn short_circuit(
        &mut self,
        name: &str,
        rest: &[Operand],
        pipe: &Pipeline,
        dot: &Value,
        piped: Option<Value>,
    ) -> ExecResult<Value> {
        let stop_on = name == "or";
        let mut last = None;
        for arg in rest {
            let value = self.eval_arg(arg, pipe, dot)?;
            if value.is_truthy() == stop_on {
                return Ok(value);
            }
            last = Some(value);
        }
        piped.or(last).ok_or_else(|| {
            fail(
                pipe,
                format!("wrong number of args for {name}: want at least 1 got 0"),
            )
        })
    }

    fn eval_arg(&mut self, operand: &Operand, pipe: &Pipeline, dot: &Value) -> ExecResult<Value> {
        match operand {
            Operand::Dot => Ok(dot.clone()),
            Operand::Field(chain) => walk_chain(dot, chain).map_err(|e| fail(pipe, e)),
            Operand::Variable(name, chain) => {
                let value = self
                    .vars
                    .iter()
                    .rev()
                    .find(|(var, _)| var == name)
                    .map(|(_, value)| value)
                    .ok_or_else(|| fail(pipe, format!("undefined variable: {name}")))?;
                walk_chain(value, chain).map_err(|e| fail(pipe, e))
            },
            Operand::Func(name) => funcs::call(name, &[])
                .map_err(|e| fail(pipe, format!("error calling {name}: {e}"))),
            Operand::Str(s) => Ok(Value::Str(s.clone())),
            Operand::Int(n) => Ok(Value::Int(*n)),
            Operand::Bool(b) => Ok(Value::Bool(*b)),
            Operand::Nil => Ok(Value::Nil),
            Operand::Pipe(inner, chain) => {
                let value = self.eval_pipeline(inner, dot, true)?;
                walk_chain(&value, chain).map_err(|e| fail(inner, e))
            },
        }
    }
}

fn walk_chain(value: &Value, chain: &[String]) -> Result<Value, String> {
    let mut current = value;
    for name in chain {
        current = match current {
            Value::Struct { type_name, .. } => current
                .field(name)
                .ok_or_else(|| format!("can't evaluate field {name} in type {type_name}"))?,
            Value::Nil => return Err(format!("nil pointer evaluating {name}")),
            other => {
                return Err(format!("can't evaluate field {name} in type {}", other.kind()));
            },
        };
    }
    Ok(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{lexer::lex, parse::parse};

    fn data() -> Value {
        let event = |host: &str, msg: &str| {
            Value::record("Event", [("Hostname", Value::from(host)), ("Message", Value::from(msg))])
        };
        Value::record(
            "Payload",
            [
                ("Events", Value::List(vec![event("h1", "disk full"), event("h2", "oom")])),
                ("SavedSearch", Value::record("SavedSearch", [("Name", Value::from("alerts"))])),
                ("Count", Value::Int(2)),
                ("Tags", Value::List(Vec::new())),
            ],
        )
    }

    fn run(src: &str) -> (String, Option<ExecError>) {
        let nodes = parse(src, lex(src).unwrap()).unwrap();
        let mut out = String::new();
        let err = execute(&nodes, &data(), &mut out).err();
        (out, err)
    }

    fn ok(src: &str) -> String {
        let (out, err) = run(src);
        assert_eq!(err, None, "source: {src}");
        out
    }

    #[test]
    fn fields_and_range() {
        assert_eq!(
            ok("{{.SavedSearch.Name}}: {{range .Events}}{{.Message}} {{end}}"),
            "alerts: disk full oom "
        );
    }

    #[test]
    fn range_variables_and_root() {
        assert_eq!(
            ok("{{range $i, $e := .Events}}{{$i}}={{$e.Hostname}}@{{$.SavedSearch.Name}} {{end}}"),
            "0=h1@alerts 1=h2@alerts "
        );
        assert_eq!(ok("{{range $e := .Events}}{{$e.Hostname}}{{end}}"), "h1h2");
    }

    #[test]
    fn range_else_break_continue() {
        assert_eq!(ok("{{range .Tags}}x{{else}}none{{end}}"), "none");
        let skip_h1 = concat!(
            "{{range .Events}}{{if eq .Hostname \"h1\"}}{{continue}}{{end}}",
            "{{.Hostname}}{{end}}"
        );
        assert_eq!(ok(skip_h1), "h2");
        assert_eq!(ok("{{range .Events}}{{.Hostname}}{{break}}{{end}}"), "h1");
        assert_eq!(ok("{{range 3}}{{.}}{{end}}"), "012");
    }

    #[test]
    fn range_else_sees_declared_variable() {
        assert_eq!(ok("{{range $e := .Tags}}x{{else}}[{{len $e}}]{{end}}"), "[0]");
    }

    #[test]
    fn range_over_ints() {
        assert_eq!(ok("{{range $n := 2}}{{$n}}{{end}}"), "01");
        assert_eq!(ok("{{range -2}}x{{else}}none{{end}}"), "none");
        assert_eq!(ok("{{range 0}}x{{else}}none{{end}}"), "none");
    }

    #[test]
    fn conditionals_and_with() {
        assert_eq!(ok("{{if .Events}}some{{else}}none{{end}}"), "some");
        assert_eq!(ok("{{if eq .Count 1}}one{{else if eq .Count 2}}two{{end}}"), "two");
        assert_eq!(ok("{{with .SavedSearch}}{{.Name}}{{end}}"), "alerts");
        assert_eq!(ok("{{with $x := \"\"}}yes{{else}}no{{end}}"), "no");
    }

    #[test]
    fn variables_assign_and_scope() {
        assert_eq!(ok("{{$n := 1}}{{if true}}{{$n = 2}}{{end}}{{$n}}"), "2");
        assert_eq!(ok("{{$x := .Count}}{{$x}}"), "2");
    }

    #[test]
    fn pipelines_and_functions() {
        assert_eq!(ok("{{.Events | len | printf \"%d events\"}}"), "2 events");
        assert_eq!(ok("{{(index .Events 1).Message}}"), "oom");
        assert_eq!(ok("{{and .Count .SavedSearch.Name}}"), "alerts");
        assert_eq!(ok("{{or \"\" .Count}}"), "2");
        assert_eq!(ok("{{.SavedSearch}}"), "{alerts}");
    }

    #[test]
    fn and_does_not_evaluate_past_false() {
        assert_eq!(ok("{{and false .Nope.Deeper}}"), "false");
        assert_eq!(ok("{{or .Count .Nope}}"), "2");
    }

    #[test]
    fn nil_prints_no_value() {
        assert_eq!(ok("[{{or 0 nil}}]"), "[<no value>]");
        assert_eq!(ok("[{{print nil}}]"), "[<nil>]");
        assert_eq!(ok("{{$v := index .Events 0}}{{$v.Message}}"), "disk full");
    }

    #[test]
    fn errors_keep_partial_output() {
        let (out, err) = run("before {{.Nope}} after");
        assert_eq!(out, "before ");
        let err = err.unwrap();
        assert_eq!(err.line, 1);
        assert_eq!(err.action, ".Nope");
        assert_eq!(err.message, "can't evaluate field Nope in type Payload");
    }

    #[test]
    fn error_messages() {
        let cases = [
            ("{{.Count.X}}", "can't evaluate field X in type int"),
            ("{{.Count 1}}", "can't give argument to non-function .Count"),
            ("{{nil}}", "nil is not a command"),
            ("{{index .Events 9}}", "error calling index: index out of range: 9"),
            ("{{range .SavedSearch}}{{end}}", "range can't iterate over {alerts}"),
            (
                "{{range $i, $e := 3}}{{end}}",
                "can't use 3 to iterate over more than one variable",
            ),
        ];
        for (src, expected) in cases {
            let (_, err) = run(src);
            assert_eq!(err.unwrap().message, expected, "source: {src}");
        }
    }
}
