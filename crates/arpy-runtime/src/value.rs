use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

pub type ModuleRef = Rc<Module>;

/// Built-in callables. `SysExit` is exposed as `sys.exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Len,
    Str,
    Int,
    Repr,
    SysExit,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Repr => "repr",
            Builtin::SysExit => "exit",
        }
    }

    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "print" => Some(Builtin::Print),
            "len" => Some(Builtin::Len),
            "str" => Some(Builtin::Str),
            "int" => Some(Builtin::Int),
            "repr" => Some(Builtin::Repr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Append,
    Join,
    Upper,
    Lower,
    Strip,
    Split,
    StartsWith,
    EndsWith,
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Method::Append => "append",
            Method::Join => "join",
            Method::Upper => "upper",
            Method::Lower => "lower",
            Method::Strip => "strip",
            Method::Split => "split",
            Method::StartsWith => "startswith",
            Method::EndsWith => "endswith",
        }
    }

    fn for_list(name: &str) -> Option<Self> {
        match name {
            "append" => Some(Method::Append),
            _ => None,
        }
    }

    fn for_str(name: &str) -> Option<Self> {
        match name {
            "join" => Some(Method::Join),
            "upper" => Some(Method::Upper),
            "lower" => Some(Method::Lower),
            "strip" => Some(Method::Strip),
            "split" => Some(Method::Split),
            "startswith" => Some(Method::StartsWith),
            "endswith" => Some(Method::EndsWith),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Module(ModuleRef),
    Builtin(Builtin),
    Method(Box<Value>, Method),
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Module(_) => "module",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Method(..) => "builtin_function_or_method",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Module(_) | Value::Builtin(_) | Value::Method(..) => true,
        }
    }

    /// Bound method lookup for `value.name` on non-module values.
    pub fn method(&self, name: &str) -> Option<Value> {
        let method = match self {
            Value::List(_) => Method::for_list(name),
            Value::Str(_) => Method::for_str(name),
            _ => None,
        }?;
        Some(Value::Method(Box::new(self.clone()), method))
    }

    /// `repr()` rendering.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => quote(s),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Int(b)) | (Value::Int(b), Value::Bool(a)) => {
                i64::from(*a) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => false,
        }
    }
}

/// `str()` rendering.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.repr())?;
                }
                f.write_str("]")
            }
            Value::Module(module) => match module.origin() {
                Some(origin) => write!(f, "<module '{}' from '{origin}'>", module.name()),
                None => write!(f, "<module '{}' (built-in)>", module.name()),
            },
            Value::Builtin(b) => write!(f, "<built-in function {}>", b.name()),
            Value::Method(receiver, m) => write!(
                f,
                "<built-in method {} of {} object>",
                m.name(),
                receiver.type_name()
            ),
        }
    }
}

fn quote(s: &str) -> String {
    let delimiter = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

/// A module object: a named, mutable namespace.
///
/// Package modules carry a `__path__` attribute; the executed module's
/// `__file__` holds its origin.
pub struct Module {
    name: String,
    namespace: RefCell<BTreeMap<String, Value>>,
}

impl Module {
    pub fn new(name: &str) -> ModuleRef {
        let module = Rc::new(Module {
            name: name.to_owned(),
            namespace: RefCell::new(BTreeMap::new()),
        });
        module.set("__name__", Value::str(name));
        module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, attr: &str) -> Option<Value> {
        self.namespace.borrow().get(attr).cloned()
    }

    pub fn set(&self, attr: &str, value: Value) {
        self.namespace.borrow_mut().insert(attr.to_owned(), value);
    }

    pub fn contains(&self, attr: &str) -> bool {
        self.namespace.borrow().contains_key(attr)
    }

    pub fn keys(&self) -> Vec<String> {
        self.namespace.borrow().keys().cloned().collect()
    }

    pub fn is_package(&self) -> bool {
        self.contains("__path__")
    }

    pub fn origin(&self) -> Option<String> {
        match self.get("__file__") {
            Some(Value::Str(s)) => Some(s.to_string()),
            _ => None,
        }
    }

    /// Dotted name of the package relative imports resolve against.
    pub fn package(&self) -> Option<String> {
        match self.get("__package__") {
            Some(Value::Str(s)) => Some(s.to_string()),
            _ => None,
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("attributes", &self.keys())
            .finish()
    }
}

/// Build the `sys` module with the given `argv`.
pub fn sys_module(argv: &[String]) -> ModuleRef {
    let sys = Module::new("sys");
    set_argv(&sys, argv);
    sys.set("exit", Value::Builtin(Builtin::SysExit));
    sys.set("version", Value::str(arpy_schema::LANGUAGE_VERSION));
    sys
}

/// Replace `sys.argv` with a fresh list.
pub fn set_argv(sys: &Module, argv: &[String]) {
    let items = argv.iter().map(|a| Value::str(a.as_str())).collect();
    sys.set("argv", Value::list(items));
}

/// Read `sys.argv` back as strings, skipping non-string items.
pub fn argv_of(sys: &Module) -> Vec<String> {
    match sys.get("argv") {
        Some(Value::List(items)) => items
            .borrow()
            .iter()
            .filter_map(|v| match v {
                Value::Str(s) => Some(s.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
