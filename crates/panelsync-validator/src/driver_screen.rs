//! Driver security and syntax screen
//!
//! Generated driver source (Python, executed by the edge node's driver host)
//! is parsed with tree-sitter and rejected when it:
//! - does not parse (diagnostic carries line and column)
//! - reaches for a disallowed capability: process control, filesystem access
//!   outside the `storage` sandbox, dynamic code evaluation, runtime
//!   introspection or native code
//!
//! Dangerous builtins are flagged wherever they are referenced, not only where
//! they are called, so aliasing (`f = eval`) and indirect calls
//! (`getattr(...)(...)`) are caught. Network access is the driver's job and
//! is not restricted.
//! - does not subclass [`BASE_DRIVER_CLASS`] implementing every operation in
//!   [`REQUIRED_OPERATIONS`]

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use tree_sitter::{Node, Parser};

/// Base class every driver must extend
pub const BASE_DRIVER_CLASS: &str = "BaseDriver";

/// Operations the base contract requires
pub const REQUIRED_OPERATIONS: &[&str] = &["connect", "disconnect", "send_command"];

/// Capability classes a driver may not use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ProcessControl,
    FilesystemAccess,
    DynamicEvaluation,
    Introspection,
    NativeCode,
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::ProcessControl => "process control",
            Capability::FilesystemAccess => "filesystem access",
            Capability::DynamicEvaluation => "dynamic code evaluation",
            Capability::Introspection => "runtime introspection",
            Capability::NativeCode => "native code",
        })
    }
}

fn module_capability(module: &str) -> Option<Capability> {
    let root = module.split('.').next().unwrap_or(module);
    match root {
        "subprocess" | "multiprocessing" | "pty" | "signal" | "os" | "sys" => Some(Capability::ProcessControl),
        "shutil" | "pathlib" | "tempfile" | "glob" | "io" => Some(Capability::FilesystemAccess),
        "importlib" | "pickle" | "marshal" | "builtins" | "code" | "runpy" => Some(Capability::DynamicEvaluation),
        "ctypes" | "cffi" => Some(Capability::NativeCode),
        _ => None,
    }
}

fn builtin_capability(name: &str) -> Option<Capability> {
    match name {
        "eval" | "exec" | "compile" | "__import__" | "globals" | "locals" => Some(Capability::DynamicEvaluation),
        "open" => Some(Capability::FilesystemAccess),
        "__builtins__" | "getattr" | "setattr" | "delattr" | "vars" => Some(Capability::Introspection),
        _ => None,
    }
}

/// Attributes that reach interpreter internals from any object
fn dunder_capability(attr: &str) -> Option<Capability> {
    match attr {
        "__builtins__" | "__dict__" | "__subclasses__" | "__globals__" | "__code__" | "__closure__"
        | "__class__" | "__bases__" | "__mro__" | "__getattribute__" => Some(Capability::Introspection),
        _ => None,
    }
}

/// Sandboxed file API object
const SANDBOX_OBJECT: &str = "storage";

/// What a violation is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// Source does not parse
    Syntax { line: usize, column: usize },
    /// Use of a disallowed capability
    Capability {
        capability: Capability,
        name: String,
        line: usize,
    },
    /// No class extends the base driver
    MissingBaseClass,
    /// Driver class lacks a required operation
    MissingOperation { operation: String },
}

/// A single screening finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenViolation {
    pub kind: ViolationKind,
    pub message: String,
}

impl Display for ScreenViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Screening outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenReport {
    pub violations: Vec<ScreenViolation>,
}

impl ScreenReport {
    /// Whether the driver may be pushed
    #[inline]
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// All messages joined for transport in a single diagnostic string
    #[must_use]
    pub fn diagnostic(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn push(&mut self, kind: ViolationKind, message: String) {
        self.violations.push(ScreenViolation { kind, message });
    }
}

/// Screening infrastructure failures
#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    /// Grammar could not be loaded
    #[error("failed to load python grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    /// Parser produced no tree
    #[error("parser produced no syntax tree")]
    NoTree,
}

/// Driver screen
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverScreen;

impl DriverScreen {
    /// Create new screen
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Screen driver source
    ///
    /// A syntax error short-circuits the capability and contract checks, since
    /// the tree is unreliable past the error.
    ///
    /// # Errors
    /// Returns [`ScreenError`] only when the parser itself cannot run
    pub fn screen(&self, source: &str) -> Result<ScreenReport, ScreenError> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
        let tree = parser.parse(source, None).ok_or(ScreenError::NoTree)?;
        let root = tree.root_node();
        let bytes = source.as_bytes();

        let mut report = ScreenReport::default();

        if root.has_error() {
            let bad = first_error(root).unwrap_or(root);
            let pos = bad.start_position();
            let (line, column) = (pos.row + 1, pos.column + 1);
            let what = if bad.is_missing() {
                format!("missing '{}'", bad.kind())
            } else {
                "unexpected token".to_string()
            };
            report.push(
                ViolationKind::Syntax { line, column },
                format!("syntax error at line {line}, column {column}: {what}"),
            );
            return Ok(report);
        }

        let mut driver_methods: Option<Vec<String>> = None;
        for node in descendants(root) {
            match node.kind() {
                "import_statement" => {
                    let mut cursor = node.walk();
                    for name in node.children_by_field_name("name", &mut cursor) {
                        let module = match name.kind() {
                            "aliased_import" => name.child_by_field_name("name").unwrap_or(name),
                            _ => name,
                        };
                        check_module(&mut report, text(module, bytes), module);
                    }
                }
                "import_from_statement" => {
                    if let Some(module) = node.child_by_field_name("module_name") {
                        check_module(&mut report, text(module, bytes), module);
                    }
                }
                "identifier" => check_identifier(&mut report, node, bytes),
                "attribute" => check_attribute(&mut report, node, bytes),
                "class_definition" if driver_methods.is_none() && extends_base(node, bytes) => {
                    driver_methods = Some(class_methods(node, bytes));
                }
                _ => {}
            }
        }

        match driver_methods {
            None => report.push(
                ViolationKind::MissingBaseClass,
                format!("no class extends {BASE_DRIVER_CLASS}"),
            ),
            Some(methods) => {
                for op in REQUIRED_OPERATIONS {
                    if !methods.iter().any(|m| m == op) {
                        report.push(
                            ViolationKind::MissingOperation {
                                operation: (*op).to_string(),
                            },
                            format!("driver class does not implement required operation '{op}'"),
                        );
                    }
                }
            }
        }

        tracing::debug!(violations = report.violations.len(), "screened driver source");
        Ok(report)
    }
}

fn text<'s>(node: Node<'_>, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or_default()
}

fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

/// Pre-order traversal
fn descendants(root: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        out.push(node);
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    out
}

fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    descendants(root)
        .into_iter()
        .find(|n| n.is_error() || n.is_missing())
}

fn check_module(report: &mut ScreenReport, module: &str, node: Node<'_>) {
    if let Some(capability) = module_capability(module) {
        let line = line_of(node);
        report.push(
            ViolationKind::Capability {
                capability,
                name: module.to_string(),
                line,
            },
            format!("disallowed {capability}: import of '{module}' at line {line}"),
        );
    }
}

fn push_capability(report: &mut ScreenReport, capability: Capability, name: &str, node: Node<'_>) {
    let line = line_of(node);
    report.push(
        ViolationKind::Capability {
            capability,
            name: name.to_string(),
            line,
        },
        format!("disallowed {capability}: use of '{name}' at line {line}"),
    );
}

/// Whether `node` is the `field` child of its parent
fn is_field_of(node: Node<'_>, parent_kind: &str, field: &str) -> bool {
    node.parent().is_some_and(|p| {
        p.kind() == parent_kind && p.child_by_field_name(field) == Some(node)
    })
}

fn check_identifier(report: &mut ScreenReport, node: Node<'_>, bytes: &[u8]) {
    // Attribute names are judged with their receiver; definitions, keyword
    // names and module paths are not references.
    if is_field_of(node, "attribute", "attribute")
        || is_field_of(node, "function_definition", "name")
        || is_field_of(node, "class_definition", "name")
        || is_field_of(node, "keyword_argument", "name")
        || node.parent().is_some_and(|p| p.kind() == "dotted_name")
    {
        return;
    }
    let name = text(node, bytes);
    if let Some(capability) = builtin_capability(name) {
        push_capability(report, capability, name, node);
    }
}

fn check_attribute(report: &mut ScreenReport, node: Node<'_>, bytes: &[u8]) {
    let Some(attr) = node.child_by_field_name("attribute") else {
        return;
    };
    let name = text(attr, bytes);
    if let Some(capability) = dunder_capability(name) {
        push_capability(report, capability, name, attr);
        return;
    }
    let flagged = match builtin_capability(name) {
        Some(Capability::DynamicEvaluation) => Some(Capability::DynamicEvaluation),
        Some(Capability::FilesystemAccess) if !sandboxed_receiver(node, bytes) => {
            Some(Capability::FilesystemAccess)
        }
        _ => None,
    };
    if let Some(capability) = flagged {
        push_capability(report, capability, name, attr);
    }
}

/// `storage.open()` and methods on the driver's own objects (`self.transport.open()`).
/// A builtin can only reach `self` through a reference that is flagged itself.
fn sandboxed_receiver(attribute: Node<'_>, bytes: &[u8]) -> bool {
    let mut object = attribute.child_by_field_name("object");
    while let Some(node) = object {
        match node.kind() {
            "attribute" => object = node.child_by_field_name("object"),
            "identifier" => {
                let root = text(node, bytes);
                return root == SANDBOX_OBJECT || root == "self";
            }
            _ => return false,
        }
    }
    false
}

fn extends_base(class: Node<'_>, bytes: &[u8]) -> bool {
    let Some(supers) = class.child_by_field_name("superclasses") else {
        return false;
    };
    let mut cursor = supers.walk();
    let found = supers.named_children(&mut cursor).any(|arg| {
        let t = text(arg, bytes);
        t == BASE_DRIVER_CLASS || t.ends_with(&format!(".{BASE_DRIVER_CLASS}"))
    });
    found
}

fn class_methods(class: Node<'_>, bytes: &[u8]) -> Vec<String> {
    let Some(body) = class.child_by_field_name("body") else {
        return Vec::new();
    };
    let mut cursor = body.walk();
    let statements: Vec<_> = body.named_children(&mut cursor).collect();
    statements
        .into_iter()
        .filter_map(|stmt| match stmt.kind() {
            "function_definition" => Some(stmt),
            "decorated_definition" => stmt.child_by_field_name("definition"),
            _ => None,
        })
        .filter(|def| def.kind() == "function_definition")
        .filter_map(|def| def.child_by_field_name("name"))
        .map(|name| text(name, bytes).to_string())
        .collect()
}
