//! Per-instance variable values and attribute propagation.

use crate::error::{Result, TfProbeError};
use crate::eval::{is_evaluable, EvaluationContext, Evaluator, VariableValues};
use crate::parser::values::Overrides;
use crate::parser::{Attribute, Module, ModuleCall, Variable};
use crate::value::Value;
use indexmap::IndexMap;

/// Compute the variable values of one module instance.
///
/// Defaults are evaluated with a meta-only context derived from `ctx`, so
/// they may reference `terraform.workspace` but never other variables. An
/// override replaces the default whenever it is present. A variable with
/// neither is [`Value::Unknown`].
///
/// Overrides for names the module does not declare are logged and dropped.
///
/// # Errors
///
/// Returns an error if a default contains a malformed reference or cannot
/// be evaluated.
pub fn resolve_variables(
    declarations: &IndexMap<String, Variable>,
    overrides: &Overrides,
    ctx: &EvaluationContext,
) -> Result<VariableValues> {
    let meta = EvaluationContext::meta_only(ctx.module_path.clone(), ctx.workspace.clone());
    let evaluator = Evaluator::new(&meta);

    let mut values = IndexMap::with_capacity(declarations.len());
    for (name, variable) in declarations {
        let value = match &variable.default {
            Some(default) => evaluate_attribute(&evaluator, default, &meta)?,
            None => Value::Unknown,
        };
        values.insert(name.clone(), value);
    }

    for (name, value) in overrides {
        match values.get_mut(name) {
            Some(slot) => *slot = value.clone(),
            None => tracing::warn!(
                module = %ctx.module_path,
                variable = %name,
                "Value supplied for undeclared variable"
            ),
        }
    }

    tracing::trace!(module = %ctx.module_path, count = values.len(), "Resolved variables");
    Ok(VariableValues::new(values))
}

/// Evaluate the attributes a module call passes to its child.
///
/// Every variable the child declares and the call sets appears in the
/// result: evaluated when the expression is evaluable in the caller's
/// context, [`Value::Unknown`] otherwise. Variables the call does not set
/// are left to their defaults.
///
/// # Errors
///
/// Returns an error if an attribute contains a malformed reference, or an
/// evaluable attribute fails to evaluate.
pub fn propagate_attributes(
    call: &ModuleCall,
    child: &Module,
    caller: &EvaluationContext,
) -> Result<Overrides> {
    let evaluator = Evaluator::new(caller);
    let mut overrides = Overrides::new();

    for name in child.variables.keys() {
        let Some(attr) = call.attributes.get(name) else {
            continue;
        };
        let evaluable = is_evaluable(&attr.expr).map_err(|e| {
            crate::err!(ReferenceParse {
                location: attr.location.to_string(),
                message: e.to_string(),
            })
        })?;
        let value = if evaluable {
            evaluate_attribute(&evaluator, attr, caller)?
        } else {
            tracing::debug!(
                module = %caller.module_path,
                call = %call.name,
                variable = %name,
                "Attribute depends on apply-time values; passing unknown"
            );
            Value::Unknown
        };
        overrides.insert(name.clone(), value);
    }

    for name in call.attributes.keys() {
        if !child.variables.contains_key(name) {
            tracing::warn!(
                module = %caller.module_path,
                call = %call.name,
                argument = %name,
                "Module call sets an argument the module does not declare"
            );
        }
    }

    Ok(overrides)
}

fn evaluate_attribute(evaluator: &Evaluator<'_>, attr: &Attribute, ctx: &EvaluationContext) -> Result<Value> {
    let evaluated = evaluator
        .evaluate(&attr.expr)
        .map_err(|e| TfProbeError::evaluation(&attr.location, e, file!(), line!()))?;
    for diag in &evaluated.diagnostics {
        tracing::warn!(module = %ctx.module_path, location = %attr.location, "{diag}");
    }
    Ok(evaluated.value)
}
