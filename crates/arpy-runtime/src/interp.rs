use crate::ast::{BoolOp, Expr, FromClause, ImportClause, Literal, Stmt, StmtKind, Target, UnaryOp};
use crate::builtins;
use crate::ops;
use crate::parser::CodeUnit;
use crate::value::{Builtin, ModuleRef, Value};
use crate::RuntimeError;
use tracing::trace;

/// Services a running module needs from its surroundings.
///
/// The interpreter never touches the filesystem or standard streams itself:
/// imports are resolved by the host (which owns the module cache and the
/// provider chain) and output goes to the host's sinks.
pub trait Host {
    /// Import the absolute dotted `name`, executing it at most once per host.
    /// Parent packages are imported first and the child is bound as an
    /// attribute of its parent.
    fn import_module(&mut self, name: &str) -> Result<ModuleRef, RuntimeError>;

    fn write_output(&mut self, text: &str) -> Result<(), RuntimeError>;

    fn write_error(&mut self, text: &str) -> Result<(), RuntimeError> {
        self.write_output(text)
    }
}

/// Execute `code` with `module`'s namespace as its globals.
pub fn execute(code: &CodeUnit, module: &ModuleRef, host: &mut dyn Host) -> Result<(), RuntimeError> {
    trace!("executing {} as {}", code.origin(), module.name());
    let mut frame = Frame {
        origin: code.origin(),
        module,
        host,
    };
    frame.block(code.body())
}

struct Frame<'a> {
    origin: &'a str,
    module: &'a ModuleRef,
    host: &'a mut dyn Host,
}

impl Frame<'_> {
    fn block(&mut self, body: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in body {
            self.statement(stmt)
                .map_err(|e| e.at(self.origin, stmt.line))?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        match &stmt.kind {
            StmtKind::Pass => Ok(()),
            StmtKind::Expr(expr) => self.eval(expr).map(drop),
            StmtKind::Assign(target, value) => {
                let value = self.eval(value)?;
                self.assign(target, value)
            }
            StmtKind::Import(clauses) => clauses.iter().try_for_each(|c| self.import(c)),
            StmtKind::FromImport {
                level,
                module,
                names,
            } => self.from_import(*level, module.as_deref(), names),
            StmtKind::If { branches, orelse } => {
                for (condition, body) in branches {
                    if self.eval(condition)?.is_truthy() {
                        return self.block(body);
                    }
                }
                self.block(orelse)
            }
        }
    }

    fn assign(&mut self, target: &Target, value: Value) -> Result<(), RuntimeError> {
        match target {
            Target::Name(name) => {
                self.module.set(name, value);
                Ok(())
            }
            Target::Attribute(object, attr) => match self.eval(object)? {
                Value::Module(module) => {
                    module.set(attr, value);
                    Ok(())
                }
                other => Err(RuntimeError::Attribute(format!(
                    "'{}' object attribute '{attr}' is read-only",
                    other.type_name()
                ))),
            },
        }
    }

    fn import(&mut self, clause: &ImportClause) -> Result<(), RuntimeError> {
        let module = self.host.import_module(&clause.module)?;
        match &clause.alias {
            Some(alias) => self.module.set(alias, Value::Module(module)),
            None => {
                let top = clause
                    .module
                    .split('.')
                    .next()
                    .unwrap_or(clause.module.as_str());
                let top_module = if top == clause.module {
                    module
                } else {
                    self.host.import_module(top)?
                };
                self.module.set(top, Value::Module(top_module));
            }
        }
        Ok(())
    }

    /// Resolve `from <dots><module>` against this module's `__package__`.
    fn resolve_from(&self, level: usize, module: Option<&str>) -> Result<String, RuntimeError> {
        if level == 0 {
            return Ok(module.unwrap_or_default().to_owned());
        }
        let package = self.module.package().unwrap_or_default();
        if package.is_empty() {
            return Err(RuntimeError::Import(
                "attempted relative import with no known parent package".to_owned(),
            ));
        }
        let segments: Vec<&str> = package.split('.').collect();
        if level > segments.len() {
            return Err(RuntimeError::Import(
                "attempted relative import beyond top-level package".to_owned(),
            ));
        }
        let mut base = segments[..segments.len() - (level - 1)].join(".");
        if let Some(module) = module {
            base.push('.');
            base.push_str(module);
        }
        Ok(base)
    }

    fn from_import(
        &mut self,
        level: usize,
        module: Option<&str>,
        names: &[FromClause],
    ) -> Result<(), RuntimeError> {
        let base = self.resolve_from(level, module)?;
        let source = self.host.import_module(&base)?;
        for clause in names {
            let value = match source.get(&clause.name) {
                Some(value) => value,
                None if source.is_package() => {
                    let child = format!("{base}.{}", clause.name);
                    match self.host.import_module(&child) {
                        Ok(module) => Value::Module(module),
                        Err(RuntimeError::Import(_)) => {
                            return Err(cannot_import(&clause.name, &base));
                        }
                        Err(other) => return Err(other),
                    }
                }
                None => return Err(cannot_import(&clause.name, &base)),
            };
            let bound = clause.alias.as_deref().unwrap_or(&clause.name);
            self.module.set(bound, value);
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Value, RuntimeError> {
        if let Some(value) = self.module.get(name) {
            return Ok(value);
        }
        Builtin::lookup(name)
            .map(Value::Builtin)
            .ok_or_else(|| RuntimeError::Name(name.to_owned()))
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::None => Value::None,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(n) => Value::Int(*n),
                Literal::Str(s) => Value::str(s.as_str()),
            }),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::list(values))
            }
            Expr::Attribute(object, attr) => {
                let object = self.eval(object)?;
                attribute(&object, attr)
            }
            Expr::Index(object, index) => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                ops::subscript(&object, &index)
            }
            Expr::Call(callee, args) => {
                let callee = self.eval(callee)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                builtins::call(&mut *self.host, &callee, args)
            }
            Expr::Unary(UnaryOp::Neg, operand) => ops::negate(&self.eval(operand)?),
            Expr::Unary(UnaryOp::Not, operand) => Ok(Value::Bool(!self.eval(operand)?.is_truthy())),
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                ops::binary(*op, &left, &right)
            }
            Expr::Compare(first, rest) => {
                let mut left = self.eval(first)?;
                for (op, operand) in rest {
                    let right = self.eval(operand)?;
                    if !ops::compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Bool(op, left, right) => {
                let left = self.eval(left)?;
                let short_circuit = match op {
                    BoolOp::And => !left.is_truthy(),
                    BoolOp::Or => left.is_truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
        }
    }
}

fn attribute(object: &Value, attr: &str) -> Result<Value, RuntimeError> {
    match object {
        Value::Module(module) => module.get(attr).ok_or_else(|| {
            RuntimeError::Attribute(format!(
                "module '{}' has no attribute '{attr}'",
                module.name()
            ))
        }),
        other => other.method(attr).ok_or_else(|| {
            RuntimeError::Attribute(format!(
                "'{}' object has no attribute '{attr}'",
                other.type_name()
            ))
        }),
    }
}

fn cannot_import(name: &str, module: &str) -> RuntimeError {
    RuntimeError::Import(format!("cannot import name '{name}' from '{module}'"))
}

#[cfg(test)]
mod tests {
    use crate::mock::MockHost;
    use crate::value::Value;
    use crate::RuntimeError;

    fn run(source: &str) -> (MockHost, Result<crate::ModuleRef, RuntimeError>) {
        let mut host = MockHost::new();
        let result = host.run_main(source);
        (host, result)
    }

    fn output_of(source: &str) -> String {
        let (host, result) = run(source);
        result.unwrap();
        host.output().to_owned()
    }

    #[test]
    fn prints_expressions() {
        assert_eq!(output_of("print(1 + 2 * 3, 'x' + 'y')\n"), "7 xy\n");
    }

    #[test]
    fn assignment_and_names() {
        assert_eq!(output_of("a = 4\nb = a // 3\nprint(a, b, a % 3)\n"), "4 1 1\n");
    }

    #[test]
    fn if_elif_else_selects_one_branch() {
        let src = "x = 2\nif x == 1:\n    print('one')\nelif x == 2:\n    print('two')\nelse:\n    print('other')\n";
        assert_eq!(output_of(src), "two\n");
    }

    #[test]
    fn main_guard_runs() {
        assert_eq!(
            output_of("if __name__ == '__main__':\n    print('main')\n"),
            "main\n"
        );
    }

    #[test]
    fn boolean_operators_return_operands() {
        assert_eq!(
            output_of("print(0 or 'fallback', 1 and 2, not [], None or None)\n"),
            "fallback 2 True None\n"
        );
    }

    #[test]
    fn short_circuit_skips_evaluation() {
        assert_eq!(output_of("print(False and undefined_name)\n"), "False\n");
    }

    #[test]
    fn chained_comparison() {
        assert_eq!(output_of("print(1 < 2 < 3, 1 < 3 < 2)\n"), "True False\n");
    }

    #[test]
    fn list_indexing_and_methods() {
        let src = "xs = [1, 2]\nxs.append(3)\nprint(xs[-1], len(xs), 2 in xs)\n";
        assert_eq!(output_of(src), "3 3 True\n");
    }

    #[test]
    fn name_error_carries_location() {
        let (_, result) = run("x = 1\nprint(y)\n");
        let err = result.unwrap_err();
        assert!(matches!(err.root(), RuntimeError::Name(n) if n == "y"));
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn error_inside_if_block_reports_inner_line() {
        let (_, result) = run("if True:\n    pass\n    1 // 0\n");
        match result.unwrap_err() {
            RuntimeError::Located { line, error, .. } => {
                assert_eq!(line, 3);
                assert!(matches!(*error, RuntimeError::ZeroDivision));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn execution_stops_at_first_error() {
        let (host, result) = run("print('before')\nmissing()\nprint('after')\n");
        assert!(result.is_err());
        assert_eq!(host.output(), "before\n");
    }

    #[test]
    fn import_binds_top_level_package() {
        let mut host = MockHost::new()
            .with_package("app", "")
            .with_module("app.util", "VALUE = 5\n");
        host.run_main("import app.util\nprint(app.util.VALUE)\n").unwrap();
        assert_eq!(host.output(), "5\n");
    }

    #[test]
    fn import_as_binds_leaf() {
        let mut host = MockHost::new()
            .with_package("app", "")
            .with_module("app.util", "VALUE = 5\n");
        let main = host.run_main("import app.util as u\nprint(u.VALUE)\n").unwrap();
        assert!(main.get("app").is_none());
        assert_eq!(host.output(), "5\n");
    }

    #[test]
    fn from_import_attribute_and_submodule() {
        let mut host = MockHost::new()
            .with_package("pkg", "NAME = 'pkg'\n")
            .with_module("pkg.helpers", "def_value = 9\n");
        host.run_main("from pkg import NAME, helpers as h\nprint(NAME, h.def_value)\n")
            .unwrap();
        assert_eq!(host.output(), "pkg 9\n");
    }

    #[test]
    fn from_import_missing_name() {
        let mut host = MockHost::new().with_module("solo", "x = 1\n");
        let err = host.run_main("from solo import y\n").unwrap_err();
        assert!(
            err.to_string()
                .contains("cannot import name 'y' from 'solo'"),
            "{err}"
        );
    }

    #[test]
    fn relative_import_inside_package() {
        let mut host = MockHost::new()
            .with_package("app", "")
            .with_module("app.util", "GREETING = 'hi'\n")
            .with_module("app.main", "from .util import GREETING\nprint(GREETING)\n");
        host.run_main("import app.main\n").unwrap();
        assert_eq!(host.output(), "hi\n");
    }

    #[test]
    fn relative_import_without_package_fails() {
        let (_, result) = run("from . import x\n");
        let err = result.unwrap_err();
        assert!(matches!(err.root(), RuntimeError::Import(_)), "{err}");
    }

    #[test]
    fn attribute_assignment_on_module() {
        let mut host = MockHost::new().with_module("config", "debug = False\n");
        host.run_main("import config\nconfig.debug = True\nprint(config.debug)\n")
            .unwrap();
        assert_eq!(host.output(), "True\n");
    }

    #[test]
    fn attribute_assignment_on_value_fails() {
        let (_, result) = run("x = 1\nx.y = 2\n");
        assert!(matches!(
            result.unwrap_err().root(),
            RuntimeError::Attribute(_)
        ));
    }

    #[test]
    fn missing_module_attribute() {
        let mut host = MockHost::new().with_module("m", "");
        let err = host.run_main("import m\nm.nope\n").unwrap_err();
        assert!(
            err.to_string()
                .contains("module 'm' has no attribute 'nope'"),
            "{err}"
        );
    }

    #[test]
    fn sys_exit_propagates_unlocated() {
        let (host, result) = run("import sys\nprint('x')\nsys.exit(2)\nprint('unreachable')\n");
        let err = result.unwrap_err();
        assert!(matches!(err, RuntimeError::Exit(2)));
        assert_eq!(host.output(), "x\n");
    }

    #[test]
    fn module_namespace_is_returned() {
        let (_, result) = run("answer = 42\n");
        assert_eq!(result.unwrap().get("answer"), Some(Value::Int(42)));
    }
}
