//! Binary operator implementations.
//!
//! Direct enum-based dispatch: the operand type set is fixed, so matching on
//! `(left, right)` keeps every combination visible in one place.

use std::cmp::Ordering;

use warden_ir::BinaryOp;
use warden_value::errors::{division_by_zero, integer_overflow, type_mismatch};
use warden_value::{EvalError, EvalResult, Value};

/// Checked integer arithmetic; `None` from the operation is an overflow.
#[inline]
fn checked_arith(result: Option<i64>, op: BinaryOp) -> EvalResult {
    result
        .map(Value::Int)
        .ok_or_else(|| integer_overflow(op.as_symbol()))
}

pub(super) fn require_bool(value: &Value) -> Result<bool, EvalError> {
    value
        .as_bool()
        .ok_or_else(|| type_mismatch("bool", value.type_name()))
}

#[cold]
fn operand_mismatch(left: &Value, right: &Value, op: BinaryOp) -> EvalError {
    type_mismatch(
        &format!("operands for `{}`", op.as_symbol()),
        &format!("{} and {}", left.type_name(), right.type_name()),
    )
}

/// Evaluate a non-short-circuiting binary operation.
pub(super) fn evaluate_binary(left: &Value, right: &Value, op: BinaryOp) -> EvalResult {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => return Ok(Value::Bool(left != right)),
        _ => {}
    }
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => eval_int_binary(*a, *b, op),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => eval_float_binary(a, b, op),
                _ => Err(operand_mismatch(left, right, op)),
            }
        }
        (Value::Str(_), _) | (_, Value::Str(_)) if op == BinaryOp::Add => {
            Ok(Value::str(&format!("{left}{right}")))
        }
        (Value::Str(a), Value::Str(b)) => {
            compare(a.as_ref().cmp(b.as_ref()), op).ok_or_else(|| operand_mismatch(left, right, op))
        }
        _ => Err(operand_mismatch(left, right, op)),
    }
}

fn eval_int_binary(a: i64, b: i64, op: BinaryOp) -> EvalResult {
    match op {
        BinaryOp::Add => checked_arith(a.checked_add(b), op),
        BinaryOp::Sub => checked_arith(a.checked_sub(b), op),
        BinaryOp::Mul => checked_arith(a.checked_mul(b), op),
        BinaryOp::Div | BinaryOp::Rem if b == 0 => Err(division_by_zero()),
        BinaryOp::Div => checked_arith(a.checked_div(b), op),
        BinaryOp::Rem => checked_arith(a.checked_rem(b), op),
        _ => compare(a.cmp(&b), op)
            .ok_or_else(|| operand_mismatch(&Value::Int(a), &Value::Int(b), op)),
    }
}

/// IEEE semantics: division by zero yields an infinity or NaN.
fn eval_float_binary(a: f64, b: f64, op: BinaryOp) -> EvalResult {
    Ok(match op {
        BinaryOp::Add => Value::Float(a + b),
        BinaryOp::Sub => Value::Float(a - b),
        BinaryOp::Mul => Value::Float(a * b),
        BinaryOp::Div => Value::Float(a / b),
        BinaryOp::Rem => Value::Float(a % b),
        _ => match a.partial_cmp(&b) {
            Some(ordering) => compare(ordering, op).unwrap_or(Value::Bool(false)),
            // Every ordering against NaN is false.
            None => Value::Bool(false),
        },
    })
}

/// Relational operators; `None` for anything else.
fn compare(ordering: Ordering, op: BinaryOp) -> Option<Value> {
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::LtEq => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::GtEq => ordering.is_ge(),
        _ => return None,
    };
    Some(Value::Bool(result))
}
