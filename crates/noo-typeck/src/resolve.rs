//! Constraint resolution: discharging a function's constraints against
//! concrete argument types at an application site.
//!
//! Resolution is best-effort. Each `implements` constraint looks for an
//! argument whose dispatch name has an implementation and binds the
//! constraint variable to that type constructor; each `has` constraint
//! peels containers down to a record and binds the structural variables to
//! the concrete field types. Anything still polymorphic stays attached for
//! a later call site to discharge.

use noo_common::Span;

use crate::error::{TypeError, UnifyContext};
use crate::state::InferState;
use crate::ty::{Constraint, FieldSchema, RecordStructure, Type};
use crate::unify::unify;

/// Try to discharge `constraints` using the given argument types.
///
/// Returns the substituted return type when at least one constraint
/// progressed, `None` when nothing did. Errors surface only from the
/// unifications performed while binding structural variables.
pub fn try_resolve_constraints(
    state: &mut InferState,
    return_type: &Type,
    constraints: &[Constraint],
    arg_types: &[Type],
    span: Span,
) -> Result<Option<Type>, TypeError> {
    let mut progressed = false;

    for constraint in constraints {
        match constraint {
            Constraint::Implements { var, trait_name }
            | Constraint::Is {
                var,
                pred: trait_name,
            } => {
                if discharge_implements(state, var, trait_name, arg_types) {
                    progressed = true;
                }
            }
            Constraint::Has { var, structure } => {
                if discharge_has(state, var, structure, arg_types, span)? {
                    progressed = true;
                }
            }
            Constraint::HasField { var, field, ty } => {
                let structure = RecordStructure::new()
                    .with_field(field.clone(), FieldSchema::Type(ty.clone()));
                if discharge_has(state, var, &structure, arg_types, span)? {
                    progressed = true;
                }
            }
            // User-named constraints carry no resolution rule; they stay
            // attached for the host to interpret.
            Constraint::Custom { .. } => {}
        }
    }

    if progressed {
        Ok(Some(state.subst.apply(return_type)))
    } else {
        Ok(None)
    }
}

/// Discharge an `implements` constraint: find an argument whose dispatch
/// name has an implementation and bind the constraint variable to its
/// type constructor.
fn discharge_implements(
    state: &mut InferState,
    var: &str,
    trait_name: &str,
    arg_types: &[Type],
) -> bool {
    for arg in arg_types {
        let arg = state.subst.apply(arg);
        let Some(type_name) = arg.dispatch_name() else {
            continue;
        };
        if !state.traits.type_has_implementation(trait_name, &type_name) {
            continue;
        }
        if !state.subst.contains(var) {
            state.subst.insert(var, constructor_image(&arg, &type_name));
        }
        return true;
    }
    false
}

/// The value a discharged `implements` variable binds to: ADTs and lists
/// bind to their bare constructor, primitives to themselves, and
/// structural kinds to the full argument type.
fn constructor_image(arg: &Type, type_name: &str) -> Type {
    match arg {
        Type::Variant { .. } | Type::List(_) => Type::Variant {
            name: type_name.to_string(),
            args: Vec::new(),
        },
        other => other.clone(),
    }
}

/// Discharge a `has` constraint: peel the arguments down to a record and
/// bind the structure's variables to the concrete field types.
fn discharge_has(
    state: &mut InferState,
    var: &str,
    structure: &RecordStructure,
    arg_types: &[Type],
    span: Span,
) -> Result<bool, TypeError> {
    for arg in arg_types {
        let arg = state.subst.apply(arg);
        let Some(record) = peel_to_record(&arg) else {
            continue;
        };
        if discharge_structure(state, structure, &record, span)? {
            if !state.subst.contains(var) {
                state.subst.insert(var, record);
            }
            return Ok(true);
        }
    }
    Ok(false)
}

/// Find a record inside a type by peeling containers: records directly,
/// lists through their element, variants through their arguments.
fn peel_to_record(ty: &Type) -> Option<Type> {
    match ty {
        Type::Record(_) => Some(ty.clone()),
        Type::Constrained { base, .. } => peel_to_record(base),
        Type::List(elem) => peel_to_record(elem),
        Type::Variant { args, .. } => args.iter().find_map(peel_to_record),
        _ => None,
    }
}

/// Bind the structure's field variables against a concrete record.
/// Returns false (without touching the state) when a required field is
/// absent, so the caller can try the next argument.
fn discharge_structure(
    state: &mut InferState,
    structure: &RecordStructure,
    record: &Type,
    span: Span,
) -> Result<bool, TypeError> {
    let Type::Record(fields) = record else {
        return Ok(false);
    };
    for field in structure.fields.keys() {
        if !fields.contains_key(field) {
            return Ok(false);
        }
    }
    for (field, schema) in &structure.fields {
        let field_ty = fields.get(field).expect("presence checked above");
        match schema {
            FieldSchema::Type(required) => {
                unify(state, required, field_ty, span, &UnifyContext::Builtin)?;
            }
            FieldSchema::Nested(inner) => {
                let resolved = state.subst.apply(field_ty);
                let Some(inner_record) = peel_to_record(&resolved) else {
                    return Ok(false);
                };
                if !discharge_structure(state, inner, &inner_record, span)? {
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{FieldSchema, RecordStructure};
    use noo_common::Span;

    #[test]
    fn implements_discharges_on_float() {
        let mut state = InferState::new();
        let ret = state.fresh();
        let ret_name = match &ret {
            Type::Var(tv) => tv.name.clone(),
            _ => unreachable!(),
        };
        // ret is the constraint variable itself: `a -> a -> a given Add a`.
        let constraints = vec![Constraint::Implements {
            var: ret_name,
            trait_name: "Add".into(),
        }];
        let resolved = try_resolve_constraints(
            &mut state,
            &ret,
            &constraints,
            &[Type::float(), Type::float()],
            Span::zero(),
        )
        .unwrap();
        assert_eq!(resolved, Some(Type::float()));
    }

    #[test]
    fn implements_does_not_progress_on_variables() {
        let mut state = InferState::new();
        let ret = state.fresh();
        let constraints = vec![Constraint::Implements {
            var: "v".into(),
            trait_name: "Add".into(),
        }];
        let arg = state.fresh();
        let resolved =
            try_resolve_constraints(&mut state, &ret, &constraints, &[arg], Span::zero())
                .unwrap();
        assert_eq!(resolved, None);
    }

    #[test]
    fn has_binds_field_variable() {
        let mut state = InferState::new();
        let field_var = state.fresh();
        let field_name = match &field_var {
            Type::Var(tv) => tv.name.clone(),
            _ => unreachable!(),
        };
        let structure = RecordStructure::new()
            .with_field("name", FieldSchema::Type(field_var.clone()));
        let constraints = vec![Constraint::Has {
            var: "r".into(),
            structure,
        }];
        let record = Type::record(vec![("name", Type::string()), ("age", Type::float())]);

        let resolved = try_resolve_constraints(
            &mut state,
            &field_var,
            &constraints,
            &[record],
            Span::zero(),
        )
        .unwrap();
        // The bare accessor-return case: the return IS the field var.
        assert_eq!(resolved, Some(Type::string()));
        assert_eq!(state.subst.apply(&Type::var(field_name)), Type::string());
    }

    #[test]
    fn has_skips_records_without_the_field() {
        let mut state = InferState::new();
        let field_var = state.fresh();
        let structure = RecordStructure::new()
            .with_field("name", FieldSchema::Type(field_var.clone()));
        let constraints = vec![Constraint::Has {
            var: "r".into(),
            structure,
        }];
        let record = Type::record(vec![("age", Type::float())]);
        let resolved = try_resolve_constraints(
            &mut state,
            &field_var,
            &constraints,
            &[record],
            Span::zero(),
        )
        .unwrap();
        assert_eq!(resolved, None);
    }

    #[test]
    fn nested_structure_discharges_through_levels() {
        let mut state = InferState::new();
        let inner_var = state.fresh();
        let inner_name = match &inner_var {
            Type::Var(tv) => tv.name.clone(),
            _ => unreachable!(),
        };
        // r has { @address { @city t } }
        let structure = RecordStructure::new().with_field(
            "address",
            FieldSchema::Nested(
                RecordStructure::new()
                    .with_field("city", FieldSchema::Type(inner_var.clone())),
            ),
        );
        let constraints = vec![Constraint::Has {
            var: "r".into(),
            structure,
        }];
        let record = Type::record(vec![(
            "address",
            Type::record(vec![("city", Type::string())]),
        )]);
        let resolved = try_resolve_constraints(
            &mut state,
            &inner_var,
            &constraints,
            &[record],
            Span::zero(),
        )
        .unwrap();
        assert_eq!(resolved, Some(Type::string()));
        assert_eq!(state.subst.apply(&Type::var(inner_name)), Type::string());
    }

    #[test]
    fn list_container_peels_to_record() {
        let mut state = InferState::new();
        let field_var = state.fresh();
        let structure = RecordStructure::new()
            .with_field("id", FieldSchema::Type(field_var.clone()));
        let constraints = vec![Constraint::Has {
            var: "r".into(),
            structure,
        }];
        let arg = Type::list(Type::record(vec![("id", Type::float())]));
        let resolved = try_resolve_constraints(
            &mut state,
            &field_var,
            &constraints,
            &[arg],
            Span::zero(),
        )
        .unwrap();
        assert_eq!(resolved, Some(Type::float()));
    }
}
