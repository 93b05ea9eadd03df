//! Integer and floating-point binary arithmetic.

use super::{rhs_operand, Ctx, Result};
use crate::error::CompileError;

fn mnemonic_for(opcode: &str) -> &'static str {
    match opcode {
        "add" => "ADD",
        "sub" => "SUB",
        "mul" => "MUL",
        "fadd" => "FADD",
        "fsub" => "FSUB",
        "fmul" => "FMUL",
        "fdiv" => "FDIV",
        _ => unreachable!("caller only dispatches known arithmetic opcodes"),
    }
}

/// `%dst = add i32 %a, %b` (or an immediate in either operand position).
pub fn lower_int_binop(ctx: &mut Ctx, dest: &str, opcode: &str, rest: &str) -> Result<()> {
    let (ty, operands) = split_type_and_operands(ctx, rest)?;
    let (lhs, rhs) = operands;
    let lhs_reg = super::materialize(ctx, &lhs)?.to_string();
    let rhs_val = rhs_operand(ctx, &rhs)?;

    consume_if_value(ctx, &lhs);
    consume_if_value(ctx, &rhs);

    let dst_reg = ctx.alloc.alloc_vreg(dest, ty)?;
    ctx.alloc.asm.push(format!("{} {}, {}, {}", mnemonic_for(opcode), dst_reg, lhs_reg, rhs_val));
    Ok(())
}

/// `%dst = fadd float %a, %b`; float values are tracked via `float_alias`
/// since they share the integer register file.
pub fn lower_float_binop(ctx: &mut Ctx, dest: &str, opcode: &str, rest: &str) -> Result<()> {
    let (ty, operands) = split_type_and_operands(ctx, rest)?;
    let (lhs, rhs) = operands;
    let lhs_reg = super::materialize(ctx, &lhs)?.to_string();
    let rhs_val = rhs_operand(ctx, &rhs)?;

    consume_if_value(ctx, &lhs);
    consume_if_value(ctx, &rhs);

    let dst_reg = ctx.alloc.alloc_vreg(dest, ty)?;
    ctx.alloc.set_float_alias(dest);
    ctx.alloc.asm.push(format!("{} {}, {}, {}", mnemonic_for(opcode), dst_reg, lhs_reg, rhs_val));
    Ok(())
}

fn consume_if_value(ctx: &mut Ctx, operand: &str) {
    if operand.starts_with('%') {
        ctx.alloc.consume_use(operand);
    }
}

/// `TYPE %a, %b` -> (TYPE, (lhs, rhs)).
fn split_type_and_operands(ctx: &Ctx, rest: &str) -> Result<(crate::types::Type, (String, String))> {
    let mut parts = rest.splitn(2, char::is_whitespace);
    let ty_tok = parts.next().unwrap_or("");
    let ty = crate::types::Type::parse(ty_tok)
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown type `{}`", ty_tok)))?;
    let operand_text = parts.next().unwrap_or("");
    let operands: Vec<String> = super::split_top_level(operand_text);
    if operands.len() != 2 {
        return Err(CompileError::isel(&ctx.function_name, rest, "binary op requires exactly two operands"));
    }
    Ok((ty, (operands[0].clone(), operands[1].clone())))
}
