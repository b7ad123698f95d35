//! Tree-walking evaluator over `hcl-rs` expressions.

use super::context::EvaluationContext;
use super::functions;
use super::references::{first_rejected, ReferenceError, META_ROOT, VAR_ROOT};
use super::{Diagnostic, EvalError, Evaluated, Resolved};
use crate::value::{FromValue, Value};
use hcl::expr::{BinaryOp, BinaryOperator, Expression, ObjectKey, Operation, TraversalOperator, UnaryOperator};
use hcl::template::{Element, Template};
use std::collections::BTreeMap;

/// Evaluates expressions against one [`EvaluationContext`].
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    ctx: &'a EvaluationContext,
}

/// `for` iterator bindings, innermost last.
type Scope = Vec<(String, Value)>;

impl<'a> Evaluator<'a> {
    /// Create an evaluator for `ctx`.
    #[must_use]
    pub const fn new(ctx: &'a EvaluationContext) -> Self {
        Self { ctx }
    }

    /// Evaluate an expression to a dynamic value.
    ///
    /// The expression must be evaluable; otherwise evaluation is refused
    /// with [`EvalError::Rejected`] before anything is computed.
    ///
    /// # Errors
    ///
    /// Returns an [`EvalError`] for rejected or malformed references,
    /// undeclared variables, and operator or function misuse.
    pub fn evaluate(&self, expr: &Expression) -> Result<Evaluated<Value>, EvalError> {
        if let Some(reference) = first_rejected(expr)? {
            return Err(EvalError::Rejected {
                reference: reference.symbol,
            });
        }
        let mut diagnostics = Vec::new();
        let value = self.eval(expr, &mut Scope::new(), &mut diagnostics)?;
        Ok(Evaluated { value, diagnostics })
    }

    /// Evaluate an expression and convert the result to `T`.
    ///
    /// An unknown result yields [`Resolved::Unknown`]; a result that cannot
    /// convert yields [`Resolved::Unavailable`] with a diagnostic.
    ///
    /// # Errors
    ///
    /// Same as [`Evaluator::evaluate`].
    pub fn evaluate_to<T: FromValue>(&self, expr: &Expression) -> Result<Evaluated<Resolved<T>>, EvalError> {
        let Evaluated { value, diagnostics } = self.evaluate(expr)?;
        let resolved = if value.is_wholly_known() {
            match value.to_native::<T>() {
                Ok(native) => Resolved::Known(native),
                Err(e) => Resolved::Unavailable(Diagnostic::error(
                    "Incorrect value type",
                    format!("Invalid expression value: {e}."),
                )),
            }
        } else {
            Resolved::Unknown
        };
        Ok(Evaluated {
            value: resolved,
            diagnostics,
        })
    }

    fn eval(&self, expr: &Expression, scope: &mut Scope, diags: &mut Vec<Diagnostic>) -> Result<Value, EvalError> {
        match expr {
            Expression::Null => Ok(Value::Null),
            Expression::Bool(b) => Ok(Value::Bool(*b)),
            Expression::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| EvalError::Unsupported(format!("number {n}"))),
            Expression::String(s) => Ok(Value::String(s.clone())),
            Expression::Array(items) => items
                .iter()
                .map(|item| self.eval(item, scope, diags))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expression::Object(object) => {
                let mut map = BTreeMap::new();
                let mut unknown = false;
                for (key, value) in object {
                    let key = match key {
                        ObjectKey::Identifier(id) => id.as_str().to_string(),
                        ObjectKey::Expression(key_expr) => match self.eval(key_expr, scope, diags)? {
                            Value::Unknown => {
                                unknown = true;
                                continue;
                            }
                            other => other
                                .to_template_string()
                                .map_err(|e| EvalError::operation("object key", e.to_string()))?,
                        },
                        #[allow(unreachable_patterns)]
                        other => String::from(other.clone()),
                    };
                    map.insert(key, self.eval(value, scope, diags)?);
                }
                Ok(if unknown { Value::Unknown } else { Value::Map(map) })
            }
            Expression::TemplateExpr(tpl) => {
                let template = Template::from_expr(tpl)
                    .map_err(|e| EvalError::Reference(ReferenceError::Template(e.to_string())))?;
                self.template(&template, scope, diags)
            }
            Expression::Variable(v) => lookup_local(scope, v.as_str()).ok_or_else(|| EvalError::Rejected {
                reference: v.as_str().to_string(),
            }),
            Expression::Traversal(t) => {
                let (base, skip) = self.traversal_root(&t.expr, &t.operators, scope, diags)?;
                self.traverse(base, &t.operators[skip..], scope, diags)
            }
            Expression::FuncCall(call) => {
                let name = call.name.to_string();
                let mut args = Vec::with_capacity(call.args.len());
                for arg in &call.args {
                    args.push(self.eval(arg, scope, diags)?);
                }
                if call.expand_final {
                    match args.pop() {
                        Some(Value::List(items)) => args.extend(items),
                        Some(Value::Unknown) => return Ok(Value::Unknown),
                        Some(other) => {
                            return Err(EvalError::Function {
                                name,
                                message: format!("cannot expand {} with ...", other.type_name()),
                            })
                        }
                        None => {}
                    }
                }
                if !functions::is_builtin(&name) {
                    diags.push(Diagnostic::warning(
                        "Unsupported function",
                        format!("{name}() is not evaluated statically; its result is treated as unknown."),
                    ));
                    return Ok(Value::Unknown);
                }
                if !args.iter().all(Value::is_wholly_known) {
                    return Ok(Value::Unknown);
                }
                match functions::call(&name, &args) {
                    Some(Ok(value)) => Ok(value),
                    Some(Err(message)) => Err(EvalError::Function { name, message }),
                    None => Ok(Value::Unknown),
                }
            }
            Expression::Parenthesis(inner) => self.eval(inner, scope, diags),
            Expression::Conditional(cond) => match self.eval(&cond.cond_expr, scope, diags)? {
                Value::Unknown => Ok(Value::Unknown),
                value => {
                    let branch = bool::from_value(&value)
                        .map_err(|e| EvalError::operation("conditional", e.to_string()))?;
                    if branch {
                        self.eval(&cond.true_expr, scope, diags)
                    } else {
                        self.eval(&cond.false_expr, scope, diags)
                    }
                }
            },
            Expression::Operation(op) => match &**op {
                Operation::Unary(unary) => {
                    let value = self.eval(&unary.expr, scope, diags)?;
                    unary_op(&unary.operator, &value)
                }
                Operation::Binary(binary) => {
                    let chain = BinaryChain::flatten(binary);
                    self.binary_chain(&chain, &mut 0, 0, scope, diags)
                }
            },
            Expression::ForExpr(for_expr) => self.for_expr(for_expr, scope, diags),
            other => Err(EvalError::Unsupported(format!("{other:?}"))),
        }
    }

    /// Evaluate the operands of `chain` starting at `*pos`, folding every
    /// operator that binds at least as tightly as `min_precedence`.
    ///
    /// Operators of equal precedence group to the left.
    fn binary_chain(
        &self,
        chain: &BinaryChain<'_>,
        pos: &mut usize,
        min_precedence: u8,
        scope: &mut Scope,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<Value, EvalError> {
        let mut lhs = self.eval(chain.operands[*pos], scope, diags)?;
        while let Some(&operator) = chain.operators.get(*pos) {
            let bind = precedence(operator);
            if bind < min_precedence {
                break;
            }
            *pos += 1;
            let rhs = self.binary_chain(chain, pos, bind + 1, scope, diags)?;
            lhs = binary_op(operator, &lhs, &rhs)?;
        }
        Ok(lhs)
    }

    /// Resolve the root of a traversal and the number of operators it consumed.
    fn traversal_root(
        &self,
        root: &Expression,
        operators: &[TraversalOperator],
        scope: &mut Scope,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<(Value, usize), EvalError> {
        let Expression::Variable(name) = root else {
            return Ok((self.eval(root, scope, diags)?, 0));
        };
        if let Some(local) = lookup_local(scope, name.as_str()) {
            return Ok((local, 0));
        }
        match (name.as_str(), operators.first()) {
            (VAR_ROOT, Some(TraversalOperator::GetAttr(var))) => {
                let variables = self
                    .ctx
                    .variables
                    .as_ref()
                    .ok_or_else(|| EvalError::VariablesNotAllowed(var.to_string()))?;
                let value = variables
                    .get(var.as_str())
                    .cloned()
                    .ok_or_else(|| EvalError::UndeclaredVariable(var.to_string()))?;
                Ok((value, 1))
            }
            (VAR_ROOT, _) => Err(ReferenceError::BareVariable.into()),
            // classification already restricted the attribute to the workspace aliases
            (META_ROOT, Some(TraversalOperator::GetAttr(_))) => Ok((Value::String(self.ctx.workspace.clone()), 1)),
            (META_ROOT, _) => Err(ReferenceError::BareMeta.into()),
            (other, _) => Err(EvalError::Rejected {
                reference: other.to_string(),
            }),
        }
    }

    fn traverse(
        &self,
        mut value: Value,
        operators: &[TraversalOperator],
        scope: &mut Scope,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<Value, EvalError> {
        for (i, op) in operators.iter().enumerate() {
            if value == Value::Unknown {
                return Ok(Value::Unknown);
            }
            value = match op {
                TraversalOperator::GetAttr(name) => get_attr(&value, name.as_str())?,
                TraversalOperator::Index(index_expr) => {
                    let key = self.eval(index_expr, scope, diags)?;
                    index(&value, &key)?
                }
                TraversalOperator::LegacyIndex(n) => {
                    #[allow(clippy::cast_precision_loss)]
                    let key = Value::Number(*n as f64);
                    index(&value, &key)?
                }
                TraversalOperator::AttrSplat | TraversalOperator::FullSplat => {
                    let items = match value {
                        Value::Null => Vec::new(),
                        Value::List(items) => items,
                        single => vec![single],
                    };
                    let rest = &operators[i + 1..];
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.traverse(item, rest, scope, diags)?);
                    }
                    return Ok(Value::List(out));
                }
            };
        }
        Ok(value)
    }

    fn template(&self, template: &Template, scope: &mut Scope, diags: &mut Vec<Diagnostic>) -> Result<Value, EvalError> {
        // "${expr}" alone yields the value of expr unconverted
        if let [Element::Interpolation(interp)] = template.elements() {
            return self.eval(&interp.expr, scope, diags);
        }
        let mut out = String::new();
        let mut unknown = false;
        for element in template.elements() {
            match element {
                Element::Literal(literal) => out.push_str(literal),
                Element::Interpolation(interp) => match self.eval(&interp.expr, scope, diags)? {
                    Value::Unknown => unknown = true,
                    value => out.push_str(
                        &value
                            .to_template_string()
                            .map_err(|e| EvalError::operation("interpolation", e.to_string()))?,
                    ),
                },
                Element::Directive(_) => {
                    diags.push(Diagnostic::warning(
                        "Unsupported template directive",
                        "%{if} and %{for} directives are not evaluated statically; the template is treated as unknown.",
                    ));
                    unknown = true;
                }
            }
        }
        Ok(if unknown { Value::Unknown } else { Value::String(out) })
    }

    #[allow(clippy::cast_precision_loss)]
    fn for_expr(
        &self,
        for_expr: &hcl::expr::ForExpr,
        scope: &mut Scope,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<Value, EvalError> {
        let pairs: Vec<(Value, Value)> = match self.eval(&for_expr.collection_expr, scope, diags)? {
            Value::Unknown => return Ok(Value::Unknown),
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Value::Number(i as f64), v))
                .collect(),
            Value::Map(map) => map.into_iter().map(|(k, v)| (Value::String(k), v)).collect(),
            other => {
                return Err(EvalError::operation(
                    "for",
                    format!("cannot iterate over {}", other.type_name()),
                ))
            }
        };

        let mut list = Vec::new();
        let mut map: BTreeMap<String, Value> = BTreeMap::new();
        let mut unknown = false;
        for (key, value) in pairs {
            let depth = scope.len();
            if let Some(key_var) = &for_expr.key_var {
                scope.push((key_var.to_string(), key));
            }
            scope.push((for_expr.value_var.to_string(), value));
            let result = self.for_item(for_expr, scope, diags);
            scope.truncate(depth);
            match result? {
                ForItem::Skip => {}
                ForItem::Unknown => unknown = true,
                ForItem::Element(v) => list.push(v),
                ForItem::Entry(k, v) if for_expr.grouping => {
                    if let Value::List(group) = map.entry(k).or_insert_with(|| Value::List(Vec::new())) {
                        group.push(v);
                    }
                }
                ForItem::Entry(k, v) => {
                    if map.insert(k.clone(), v).is_some() {
                        return Err(EvalError::operation(
                            "for",
                            format!("duplicate object key \"{k}\"; use ... to group values"),
                        ));
                    }
                }
            }
        }

        if unknown {
            Ok(Value::Unknown)
        } else if for_expr.key_expr.is_some() {
            Ok(Value::Map(map))
        } else {
            Ok(Value::List(list))
        }
    }

    fn for_item(
        &self,
        for_expr: &hcl::expr::ForExpr,
        scope: &mut Scope,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<ForItem, EvalError> {
        if let Some(cond_expr) = &for_expr.cond_expr {
            match self.eval(cond_expr, scope, diags)? {
                Value::Unknown => return Ok(ForItem::Unknown),
                cond => {
                    let keep = bool::from_value(&cond).map_err(|e| EvalError::operation("for condition", e.to_string()))?;
                    if !keep {
                        return Ok(ForItem::Skip);
                    }
                }
            }
        }
        let value = self.eval(&for_expr.value_expr, scope, diags)?;
        let Some(key_expr) = &for_expr.key_expr else {
            return Ok(ForItem::Element(value));
        };
        match self.eval(key_expr, scope, diags)? {
            Value::Unknown => Ok(ForItem::Unknown),
            key => {
                let key = key
                    .to_template_string()
                    .map_err(|e| EvalError::operation("for key", e.to_string()))?;
                Ok(ForItem::Entry(key, value))
            }
        }
    }
}

enum ForItem {
    Skip,
    Unknown,
    Element(Value),
    Entry(String, Value),
}

fn lookup_local(scope: &Scope, name: &str) -> Option<Value> {
    scope
        .iter()
        .rev()
        .find(|(local, _)| local == name)
        .map(|(_, value)| value.clone())
}

fn get_attr(value: &Value, name: &str) -> Result<Value, EvalError> {
    match value {
        Value::Map(map) => map
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::Traversal(format!("object does not have an attribute named \"{name}\""))),
        Value::Null => Err(EvalError::Traversal(format!("attempt to get attribute \"{name}\" from a null value"))),
        other => Err(EvalError::Traversal(format!(
            "cannot get attribute \"{name}\" from a {} value",
            other.type_name()
        ))),
    }
}

fn index(value: &Value, key: &Value) -> Result<Value, EvalError> {
    match (value, key) {
        (_, Value::Unknown) => Ok(Value::Unknown),
        (Value::List(items), key) => {
            let i = i64::from_value(key).map_err(|e| EvalError::Traversal(format!("invalid list index: {e}")))?;
            usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| EvalError::Traversal(format!("index {i} out of range for list of length {}", items.len())))
        }
        (Value::Map(_), key) => {
            let name = key
                .to_template_string()
                .map_err(|e| EvalError::Traversal(format!("invalid map key: {e}")))?;
            get_attr(value, &name)
        }
        (other, _) => Err(EvalError::Traversal(format!("cannot index a {} value", other.type_name()))),
    }
}

/// An unparenthesized run of binary operations, in source order.
///
/// The parser nests every chain into its right operand regardless of
/// operator precedence, so chains are regrouped before evaluation.
struct BinaryChain<'e> {
    operands: Vec<&'e Expression>,
    operators: Vec<&'e BinaryOperator>,
}

impl<'e> BinaryChain<'e> {
    fn flatten(binary: &'e BinaryOp) -> Self {
        let mut operands = vec![&binary.lhs_expr];
        let mut operators = vec![&binary.operator];
        let mut rest = &binary.rhs_expr;
        while let Expression::Operation(op) = rest {
            let Operation::Binary(next) = &**op else { break };
            operands.push(&next.lhs_expr);
            operators.push(&next.operator);
            rest = &next.rhs_expr;
        }
        operands.push(rest);
        Self { operands, operators }
    }
}

const fn precedence(operator: &BinaryOperator) -> u8 {
    match operator {
        BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod => 6,
        BinaryOperator::Plus | BinaryOperator::Minus => 5,
        BinaryOperator::Less | BinaryOperator::LessEq | BinaryOperator::Greater | BinaryOperator::GreaterEq => 4,
        BinaryOperator::Eq | BinaryOperator::NotEq => 3,
        BinaryOperator::And => 2,
        BinaryOperator::Or => 1,
    }
}

fn unary_op(operator: &UnaryOperator, value: &Value) -> Result<Value, EvalError> {
    if *value == Value::Unknown {
        return Ok(Value::Unknown);
    }
    match operator {
        UnaryOperator::Neg => f64::from_value(value)
            .map(|n| Value::Number(-n))
            .map_err(|e| EvalError::operation("-", e.to_string())),
        UnaryOperator::Not => bool::from_value(value)
            .map(|b| Value::Bool(!b))
            .map_err(|e| EvalError::operation("!", e.to_string())),
    }
}

fn binary_op(operator: &BinaryOperator, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let symbol = operator_symbol(operator);
    match operator {
        BinaryOperator::Eq | BinaryOperator::NotEq => {
            if !lhs.is_wholly_known() || !rhs.is_wholly_known() {
                return Ok(Value::Unknown);
            }
            let equal = lhs == rhs;
            Ok(Value::Bool(if matches!(operator, BinaryOperator::Eq) { equal } else { !equal }))
        }
        BinaryOperator::And | BinaryOperator::Or => {
            let as_bool = |v: &Value| match v {
                Value::Unknown => Ok(None),
                v => bool::from_value(v).map(Some).map_err(|e| EvalError::operation(symbol, e.to_string())),
            };
            let (l, r) = (as_bool(lhs)?, as_bool(rhs)?);
            let result = match (operator, l, r) {
                (BinaryOperator::And, Some(false), _) | (BinaryOperator::And, _, Some(false)) => Some(false),
                (BinaryOperator::Or, Some(true), _) | (BinaryOperator::Or, _, Some(true)) => Some(true),
                (_, Some(l), Some(r)) => Some(if matches!(operator, BinaryOperator::And) { l && r } else { l || r }),
                _ => None,
            };
            Ok(result.map_or(Value::Unknown, Value::Bool))
        }
        _ => {
            if *lhs == Value::Unknown || *rhs == Value::Unknown {
                return Ok(Value::Unknown);
            }
            let l = f64::from_value(lhs).map_err(|e| EvalError::operation(symbol, e.to_string()))?;
            let r = f64::from_value(rhs).map_err(|e| EvalError::operation(symbol, e.to_string()))?;
            match operator {
                BinaryOperator::Less => Ok(Value::Bool(l < r)),
                BinaryOperator::LessEq => Ok(Value::Bool(l <= r)),
                BinaryOperator::Greater => Ok(Value::Bool(l > r)),
                BinaryOperator::GreaterEq => Ok(Value::Bool(l >= r)),
                BinaryOperator::Plus => Ok(Value::Number(l + r)),
                BinaryOperator::Minus => Ok(Value::Number(l - r)),
                BinaryOperator::Mul => Ok(Value::Number(l * r)),
                BinaryOperator::Div | BinaryOperator::Mod if r == 0.0 => {
                    Err(EvalError::operation(symbol, "division by zero"))
                }
                BinaryOperator::Div => Ok(Value::Number(l / r)),
                BinaryOperator::Mod => Ok(Value::Number(l % r)),
                _ => Err(EvalError::operation(symbol, "unsupported operator")),
            }
        }
    }
}

const fn operator_symbol(operator: &BinaryOperator) -> &'static str {
    match operator {
        BinaryOperator::Eq => "==",
        BinaryOperator::NotEq => "!=",
        BinaryOperator::Less => "<",
        BinaryOperator::LessEq => "<=",
        BinaryOperator::Greater => ">",
        BinaryOperator::GreaterEq => ">=",
        BinaryOperator::Plus => "+",
        BinaryOperator::Minus => "-",
        BinaryOperator::Mul => "*",
        BinaryOperator::Div => "/",
        BinaryOperator::Mod => "%",
        BinaryOperator::And => "&&",
        BinaryOperator::Or => "||",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{ModulePath, VariableValues};
    use pretty_assertions::assert_eq;

    fn expr(src: &str) -> Expression {
        let body: hcl::Body = hcl::from_str(&format!("x = {src}\n")).unwrap();
        body.attributes().next().unwrap().expr.clone()
    }

    fn ctx() -> EvaluationContext {
        let mut tags = BTreeMap::new();
        tags.insert("env".to_string(), Value::from("prod"));
        let vars: VariableValues = vec![
            ("name".to_string(), Value::from("app-server")),
            ("count".to_string(), Value::Number(3.0)),
            ("enabled".to_string(), Value::Bool(true)),
            ("zones".to_string(), Value::List(vec![Value::from("a"), Value::from("b")])),
            ("tags".to_string(), Value::Map(tags)),
            ("pending".to_string(), Value::Unknown),
        ]
        .into_iter()
        .collect();
        EvaluationContext::new(ModulePath::root(), vars, "staging")
    }

    fn eval(src: &str) -> Result<Value, EvalError> {
        let ctx = ctx();
        Evaluator::new(&ctx).evaluate(&expr(src)).map(|e| e.value)
    }

    #[test]
    fn test_literals_and_variables() {
        assert_eq!(eval("\"x\"").unwrap(), Value::from("x"));
        assert_eq!(eval("var.name").unwrap(), Value::from("app-server"));
        assert_eq!(eval("terraform.workspace").unwrap(), Value::from("staging"));
        assert_eq!(eval("terraform.env").unwrap(), Value::from("staging"));
        assert_eq!(eval("\"${var.name}-${terraform.workspace}\"").unwrap(), Value::from("app-server-staging"));
    }

    #[test]
    fn test_single_interpolation_keeps_type() {
        assert_eq!(
            eval("\"${var.zones}\"").unwrap(),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(eval("\"${var.count}\"").unwrap(), Value::Number(3.0));
        assert_eq!(eval("\"${var.enabled}\"").unwrap(), Value::Bool(true));
        assert_eq!(eval("\"${var.pending}\"").unwrap(), Value::Unknown);
        assert_eq!(eval("\"n=${var.count}\"").unwrap(), Value::from("n=3"));
        assert!(matches!(eval("\"n=${var.zones}\""), Err(EvalError::Operation { .. })));
    }

    #[test]
    fn test_operators() {
        assert_eq!(eval("var.count * 2 + 1").unwrap(), Value::Number(7.0));
        assert_eq!(eval("var.count > 2 && var.enabled").unwrap(), Value::Bool(true));
        assert_eq!(eval("!var.enabled").unwrap(), Value::Bool(false));
        assert_eq!(eval("var.enabled ? \"on\" : \"off\"").unwrap(), Value::from("on"));
        assert_eq!(eval("var.name == \"app-server\"").unwrap(), Value::Bool(true));
        assert!(matches!(eval("var.count / 0"), Err(EvalError::Operation { .. })));
        assert!(matches!(eval("var.zones + 1"), Err(EvalError::Operation { .. })));
    }

    #[test]
    fn test_operator_precedence() {
        assert_eq!(eval("1 + var.count * 2").unwrap(), Value::Number(7.0));
        assert_eq!(eval("var.count * 2 + 1 > 6").unwrap(), Value::Bool(true));
        assert_eq!(eval("(var.count + 1) * 2").unwrap(), Value::Number(8.0));
        assert_eq!(eval("10 - 4 % 3").unwrap(), Value::Number(9.0));
        assert_eq!(eval("true || false && false").unwrap(), Value::Bool(true));
        assert_eq!(eval("false && true || true").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_same_precedence_groups_left() {
        assert_eq!(eval("1 - 2 - 3").unwrap(), Value::Number(-4.0));
        assert_eq!(eval("var.count - 1 + 1").unwrap(), Value::Number(3.0));
        assert_eq!(eval("12 / 2 / 3").unwrap(), Value::Number(2.0));
        assert_eq!(eval("12 / 2 * 3").unwrap(), Value::Number(18.0));
        assert_eq!(eval("1 - (2 - 3)").unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_comparison_inside_logical_operators() {
        assert_eq!(eval("var.name == \"app-server\" && var.enabled").unwrap(), Value::Bool(true));
        assert_eq!(eval("var.enabled && var.name != \"app-server\"").unwrap(), Value::Bool(false));
        assert_eq!(eval("var.count > 5 || var.name == \"app-server\"").unwrap(), Value::Bool(true));
        assert_eq!(eval("var.count >= 3 && var.count < 4").unwrap(), Value::Bool(true));
        assert_eq!(eval("var.count == 3 && var.pending").unwrap(), Value::Unknown);
    }

    #[test]
    fn test_unknown_propagates() {
        assert_eq!(eval("var.pending").unwrap(), Value::Unknown);
        assert_eq!(eval("\"db-${var.pending}\"").unwrap(), Value::Unknown);
        assert_eq!(eval("var.pending + 1").unwrap(), Value::Unknown);
        assert_eq!(eval("upper(var.pending)").unwrap(), Value::Unknown);
        assert_eq!(eval("var.pending ? 1 : 2").unwrap(), Value::Unknown);
        assert_eq!(eval("var.pending.attr").unwrap(), Value::Unknown);
        // short-circuit on a known operand
        assert_eq!(eval("false && var.pending").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_traversal_and_collections() {
        assert_eq!(eval("var.zones[1]").unwrap(), Value::from("b"));
        assert_eq!(eval("var.tags.env").unwrap(), Value::from("prod"));
        assert_eq!(eval("var.tags[\"env\"]").unwrap(), Value::from("prod"));
        assert_eq!(eval("length(var.zones)").unwrap(), Value::Number(2.0));
        assert!(matches!(eval("var.zones[5]"), Err(EvalError::Traversal(_))));
        assert!(matches!(eval("var.tags.missing"), Err(EvalError::Traversal(_))));
    }

    #[test]
    fn test_for_expressions() {
        assert_eq!(
            eval("[for z in var.zones : upper(z)]").unwrap(),
            Value::List(vec![Value::from("A"), Value::from("B")])
        );
        let mut expected = BTreeMap::new();
        expected.insert("a".to_string(), Value::Number(0.0));
        assert_eq!(eval("{for i, z in var.zones : z => i if z != \"b\"}").unwrap(), Value::Map(expected));
    }

    #[test]
    fn test_rejected_references() {
        assert_eq!(
            eval("aws_db_instance.main.parameter_group_name"),
            Err(EvalError::Rejected {
                reference: "aws_db_instance.main".to_string()
            })
        );
        assert!(matches!(eval("var.undeclared"), Err(EvalError::UndeclaredVariable(name)) if name == "undeclared"));
    }

    #[test]
    fn test_meta_only_context_refuses_variables() {
        let ctx = EvaluationContext::meta_only(ModulePath::root(), "default");
        let result = Evaluator::new(&ctx).evaluate(&expr("var.name"));
        assert!(matches!(result, Err(EvalError::VariablesNotAllowed(_))));
        let ws = Evaluator::new(&ctx).evaluate(&expr("\"pg-${terraform.workspace}\"")).unwrap();
        assert_eq!(ws.value, Value::from("pg-default"));
    }

    #[test]
    fn test_unsupported_function_is_unknown_with_warning() {
        let ctx = ctx();
        let result = Evaluator::new(&ctx).evaluate(&expr("timestamp()")).unwrap();
        assert_eq!(result.value, Value::Unknown);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].summary, "Unsupported function");
    }

    #[test]
    fn test_evaluate_to_coercion() {
        let ctx = ctx();
        let evaluator = Evaluator::new(&ctx);
        assert_eq!(evaluator.evaluate_to::<String>(&expr("var.count")).unwrap().value, Resolved::Known("3".to_string()));
        assert_eq!(evaluator.evaluate_to::<String>(&expr("var.pending")).unwrap().value, Resolved::Unknown);
        assert!(matches!(
            evaluator.evaluate_to::<String>(&expr("var.zones")).unwrap().value,
            Resolved::Unavailable(_)
        ));
        assert!(matches!(
            evaluator.evaluate_to::<f64>(&expr("var.name")).unwrap().value,
            Resolved::Unavailable(_)
        ));
    }
}
