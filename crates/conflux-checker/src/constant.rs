//! Constant folding

use conflux_core::ast::{BinaryOp, UnaryOp};
use conflux_core::ConstValue;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("constant overflow")]
    Overflow,

    /// Operand kinds the operator is not defined on; the checker reports
    /// these with type information before folding is attempted
    #[error("operator not defined on operands")]
    Mismatch,
}

pub fn unary(op: UnaryOp, value: &ConstValue) -> Result<ConstValue, FoldError> {
    match (op, value) {
        (UnaryOp::Neg, ConstValue::Int(v)) => {
            v.checked_neg().map(ConstValue::Int).ok_or(FoldError::Overflow)
        }
        (UnaryOp::Not, ConstValue::Bool(v)) => Ok(ConstValue::Bool(!v)),
        _ => Err(FoldError::Mismatch),
    }
}

pub fn binary(op: BinaryOp, lhs: &ConstValue, rhs: &ConstValue) -> Result<ConstValue, FoldError> {
    use ConstValue::{Bool, Int, Str};

    let value = match (op, lhs, rhs) {
        (BinaryOp::Add, Int(a), Int(b)) => Int(a.checked_add(*b).ok_or(FoldError::Overflow)?),
        (BinaryOp::Sub, Int(a), Int(b)) => Int(a.checked_sub(*b).ok_or(FoldError::Overflow)?),
        (BinaryOp::Mul, Int(a), Int(b)) => Int(a.checked_mul(*b).ok_or(FoldError::Overflow)?),
        (BinaryOp::Div, Int(_), Int(0)) => return Err(FoldError::DivisionByZero),
        (BinaryOp::Div, Int(a), Int(b)) => Int(a.checked_div(*b).ok_or(FoldError::Overflow)?),
        (BinaryOp::Add, Str(a), Str(b)) => Str(format!("{}{}", a, b)),

        (BinaryOp::Lt, Int(a), Int(b)) => Bool(a < b),
        (BinaryOp::Gt, Int(a), Int(b)) => Bool(a > b),
        (BinaryOp::Lt, Str(a), Str(b)) => Bool(a < b),
        (BinaryOp::Gt, Str(a), Str(b)) => Bool(a > b),
        (BinaryOp::Eq, a, b) if a.ty() == b.ty() => Bool(a == b),
        (BinaryOp::Ne, a, b) if a.ty() == b.ty() => Bool(a != b),

        (BinaryOp::And, Bool(a), Bool(b)) => Bool(*a && *b),
        (BinaryOp::Or, Bool(a), Bool(b)) => Bool(*a || *b),
        _ => return Err(FoldError::Mismatch),
    };
    Ok(value)
}
