//! Reference extraction and classification.
//!
//! Every symbol an expression reads is turned into a [`Reference`] tagged
//! with a [`SubjectKind`]. Only input variables (`var.<name>`) and the
//! module meta-attributes (`terraform.workspace`, legacy `terraform.env`)
//! can be determined before provisioning; everything else is
//! [`SubjectKind::Other`] and makes the expression non-evaluable.

use hcl::expr::{Expression, ObjectKey, Operation, TraversalOperator};
use hcl::template::{Directive, Element, Template};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Root symbol for input variables.
pub const VAR_ROOT: &str = "var";

/// Root symbol for module meta-attributes.
pub const META_ROOT: &str = "terraform";

/// Meta-attributes of the `terraform` object that resolve to the workspace.
pub const WORKSPACE_ATTRIBUTES: &[&str] = &["workspace", "env"];

/// The kind of thing a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    /// `var.<name>`
    InputVariable,
    /// `terraform.workspace` / `terraform.env`
    ModuleMetaAttribute,
    /// Resources, data sources, locals, module outputs, `path.*`, ...
    Other,
}

impl SubjectKind {
    /// Whether references of this kind can be resolved before provisioning.
    #[must_use]
    pub const fn is_static(self) -> bool {
        match self {
            Self::InputVariable | Self::ModuleMetaAttribute => true,
            Self::Other => false,
        }
    }
}

/// A symbol read by an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// What the symbol refers to
    pub kind: SubjectKind,
    /// The symbol as written, e.g. `var.db_name` or `aws_instance.web`
    pub symbol: String,
}

impl Reference {
    fn new(kind: SubjectKind, symbol: String) -> Self {
        Self { kind, symbol }
    }

    /// For input variables, the variable name.
    #[must_use]
    pub fn variable_name(&self) -> Option<&str> {
        match self.kind {
            SubjectKind::InputVariable => self.symbol.strip_prefix("var."),
            _ => None,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}

/// A reference that is syntactically valid HCL but not a valid symbol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    /// `var` used without naming a variable.
    #[error("a reference to \"var\" must be followed by a variable name, as in var.name")]
    BareVariable,
    /// `terraform` used without naming an attribute.
    #[error("a reference to \"terraform\" must be followed by an attribute name, as in terraform.workspace")]
    BareMeta,
    /// `terraform.<attr>` with an unsupported attribute.
    #[error("the \"terraform\" object does not have an attribute named \"{0}\"")]
    UnknownMetaAttribute(String),
    /// A template that could not be decomposed.
    #[error("invalid template: {0}")]
    Template(String),
}

/// Extract every reference in `expr`, in source order, duplicates included.
///
/// # Errors
///
/// Returns a [`ReferenceError`] for malformed `var` or `terraform` references.
pub fn references_in_expr(expr: &Expression) -> Result<Vec<Reference>, ReferenceError> {
    let mut walker = Walker::default();
    walker.expr(expr)?;
    Ok(walker.refs)
}

/// Extract the distinct references in `expr`, in order of first occurrence.
///
/// # Errors
///
/// Returns a [`ReferenceError`] for malformed `var` or `terraform` references.
pub fn classify(expr: &Expression) -> Result<Vec<Reference>, ReferenceError> {
    let mut seen = HashSet::new();
    Ok(references_in_expr(expr)?
        .into_iter()
        .filter(|r| seen.insert(r.clone()))
        .collect())
}

/// Returns true iff every reference in `expr` can be resolved statically.
///
/// # Errors
///
/// Returns a [`ReferenceError`] for malformed `var` or `terraform` references.
pub fn is_evaluable(expr: &Expression) -> Result<bool, ReferenceError> {
    Ok(first_rejected(expr)?.is_none())
}

/// The first reference in `expr` that cannot be resolved statically.
pub(crate) fn first_rejected(expr: &Expression) -> Result<Option<Reference>, ReferenceError> {
    Ok(references_in_expr(expr)?
        .into_iter()
        .find(|r| !r.kind.is_static()))
}

/// Classify a root symbol followed by its leading attribute names.
fn classify_symbol(root: &str, attrs: &[&str]) -> Result<Reference, ReferenceError> {
    match root {
        VAR_ROOT => {
            let name = attrs.first().ok_or(ReferenceError::BareVariable)?;
            Ok(Reference::new(SubjectKind::InputVariable, format!("var.{name}")))
        }
        META_ROOT => {
            let attr = attrs.first().ok_or(ReferenceError::BareMeta)?;
            if WORKSPACE_ATTRIBUTES.contains(attr) {
                Ok(Reference::new(SubjectKind::ModuleMetaAttribute, format!("terraform.{attr}")))
            } else {
                Err(ReferenceError::UnknownMetaAttribute((*attr).to_string()))
            }
        }
        _ => {
            let depth = match root {
                "self" => 0,
                "data" => 2,
                _ => 1,
            };
            let mut symbol = root.to_string();
            for attr in attrs.iter().take(depth) {
                symbol.push('.');
                symbol.push_str(attr);
            }
            Ok(Reference::new(SubjectKind::Other, symbol))
        }
    }
}

/// Expression walker tracking `for` iterator bindings.
#[derive(Default)]
struct Walker {
    refs: Vec<Reference>,
    locals: Vec<String>,
}

impl Walker {
    fn is_local(&self, name: &str) -> bool {
        self.locals.iter().any(|l| l == name)
    }

    fn expr(&mut self, expr: &Expression) -> Result<(), ReferenceError> {
        match expr {
            Expression::Variable(v) => {
                if !self.is_local(v.as_str()) {
                    let reference = classify_symbol(v.as_str(), &[])?;
                    self.refs.push(reference);
                }
            }
            Expression::Traversal(t) => {
                match &t.expr {
                    Expression::Variable(root) if self.is_local(root.as_str()) => {}
                    Expression::Variable(root) => {
                        let attrs: Vec<&str> = t
                            .operators
                            .iter()
                            .map_while(|op| match op {
                                TraversalOperator::GetAttr(name) => Some(name.as_str()),
                                _ => None,
                            })
                            .collect();
                        let reference = classify_symbol(root.as_str(), &attrs)?;
                        self.refs.push(reference);
                    }
                    other => self.expr(other)?,
                }
                for op in &t.operators {
                    if let TraversalOperator::Index(index) = op {
                        self.expr(index)?;
                    }
                }
            }
            Expression::Array(items) => {
                for item in items {
                    self.expr(item)?;
                }
            }
            Expression::Object(object) => {
                for (key, value) in object {
                    if let ObjectKey::Expression(key_expr) = key {
                        self.expr(key_expr)?;
                    }
                    self.expr(value)?;
                }
            }
            Expression::TemplateExpr(tpl) => {
                let template = Template::from_expr(tpl)
                    .map_err(|e| ReferenceError::Template(e.to_string()))?;
                self.template(&template)?;
            }
            Expression::FuncCall(call) => {
                for arg in &call.args {
                    self.expr(arg)?;
                }
            }
            Expression::Parenthesis(inner) => self.expr(inner)?,
            Expression::Conditional(cond) => {
                self.expr(&cond.cond_expr)?;
                self.expr(&cond.true_expr)?;
                self.expr(&cond.false_expr)?;
            }
            Expression::Operation(op) => match &**op {
                Operation::Unary(unary) => self.expr(&unary.expr)?,
                Operation::Binary(binary) => {
                    self.expr(&binary.lhs_expr)?;
                    self.expr(&binary.rhs_expr)?;
                }
            },
            Expression::ForExpr(for_expr) => {
                self.expr(&for_expr.collection_expr)?;
                let bound = self.bind(for_expr.key_var.as_ref().map(|k| k.as_str()), for_expr.value_var.as_str());
                let result = self.for_body(for_expr);
                self.unbind(bound);
                result?;
            }
            _ => {}
        }
        Ok(())
    }

    fn for_body(&mut self, for_expr: &hcl::expr::ForExpr) -> Result<(), ReferenceError> {
        if let Some(key_expr) = &for_expr.key_expr {
            self.expr(key_expr)?;
        }
        self.expr(&for_expr.value_expr)?;
        if let Some(cond_expr) = &for_expr.cond_expr {
            self.expr(cond_expr)?;
        }
        Ok(())
    }

    fn template(&mut self, template: &Template) -> Result<(), ReferenceError> {
        for element in template.elements() {
            match element {
                Element::Literal(_) => {}
                Element::Interpolation(interp) => self.expr(&interp.expr)?,
                Element::Directive(Directive::If(if_dir)) => {
                    self.expr(&if_dir.cond_expr)?;
                    self.template(&if_dir.true_template)?;
                    if let Some(false_template) = &if_dir.false_template {
                        self.template(false_template)?;
                    }
                }
                Element::Directive(Directive::For(for_dir)) => {
                    self.expr(&for_dir.collection_expr)?;
                    let bound = self.bind(for_dir.key_var.as_ref().map(|k| k.as_str()), for_dir.value_var.as_str());
                    let result = self.template(&for_dir.template);
                    self.unbind(bound);
                    result?;
                }
            }
        }
        Ok(())
    }

    fn bind(&mut self, key_var: Option<&str>, value_var: &str) -> usize {
        let before = self.locals.len();
        if let Some(key_var) = key_var {
            self.locals.push(key_var.to_string());
        }
        self.locals.push(value_var.to_string());
        before
    }

    fn unbind(&mut self, before: usize) {
        self.locals.truncate(before);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn expr(src: &str) -> Expression {
        let body: hcl::Body = hcl::from_str(&format!("x = {src}\n")).unwrap();
        let attr = body.attributes().next().unwrap();
        attr.expr.clone()
    }

    fn symbols(src: &str) -> Vec<String> {
        classify(&expr(src))
            .unwrap()
            .into_iter()
            .map(|r| r.symbol)
            .collect()
    }

    #[test_case("\"literal\"", true ; "literal")]
    #[test_case("var.name", true ; "input variable")]
    #[test_case("\"${var.prefix}-${terraform.workspace}\"", true ; "template with allowed refs")]
    #[test_case("terraform.env", true ; "legacy workspace alias")]
    #[test_case("var.enabled ? var.a : var.b", true ; "conditional")]
    #[test_case("aws_db_instance.main.id", false ; "resource attribute")]
    #[test_case("data.aws_ami.ubuntu.id", false ; "data source")]
    #[test_case("local.name", false ; "local value")]
    #[test_case("module.vpc.id", false ; "module output")]
    #[test_case("path.module", false ; "path metadata")]
    #[test_case("lower(aws_instance.web.name)", false ; "nested in function call")]
    fn test_is_evaluable(src: &str, expected: bool) {
        assert_eq!(is_evaluable(&expr(src)).unwrap(), expected);
    }

    #[test]
    fn test_classify_kinds_and_symbols() {
        let refs = classify(&expr("\"${var.a}-${terraform.workspace}-${aws_instance.web.id}\"")).unwrap();
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].kind, SubjectKind::InputVariable);
        assert_eq!(refs[0].variable_name(), Some("a"));
        assert_eq!(refs[1].kind, SubjectKind::ModuleMetaAttribute);
        assert_eq!(refs[2].kind, SubjectKind::Other);
        assert_eq!(refs[2].symbol, "aws_instance.web");
    }

    #[test]
    fn test_classify_deduplicates() {
        assert_eq!(symbols("var.a == var.a ? var.b : var.a"), vec!["var.a", "var.b"]);
        assert_eq!(references_in_expr(&expr("[var.a, var.a]")).unwrap().len(), 2);
    }

    #[test]
    fn test_for_iterators_are_local() {
        assert_eq!(symbols("[for s in var.names : upper(s)]"), vec!["var.names"]);
        assert_eq!(symbols("{for k, v in var.tags : k => v if v != \"\"}"), vec!["var.tags"]);
        // iterator scope ends with the expression
        assert_eq!(symbols("[[for s in var.names : s], s]"), vec!["var.names", "s"]);
    }

    #[test]
    fn test_index_expressions_are_walked() {
        assert_eq!(symbols("var.map[aws_instance.web.id]"), vec!["var.map", "aws_instance.web"]);
    }

    #[test]
    fn test_malformed_references() {
        assert_eq!(classify(&expr("var")), Err(ReferenceError::BareVariable));
        assert_eq!(classify(&expr("var[0]")), Err(ReferenceError::BareVariable));
        assert_eq!(classify(&expr("terraform")), Err(ReferenceError::BareMeta));
        assert_eq!(
            classify(&expr("terraform.backend")),
            Err(ReferenceError::UnknownMetaAttribute("backend".into()))
        );
    }
}
