//! `shl`/`lshr`/`ashr` on i32. Shares the add/sub/mul operand convention:
//! both operands are materialized into registers, so an immediate shift
//! amount is loaded into scratch exactly like an immediate rhs everywhere
//! else.

use super::{rhs_operand, Ctx, Result};
use crate::error::CompileError;

fn mnemonic_for(opcode: &str) -> &'static str {
    match opcode {
        "shl" => "LSL",
        "lshr" => "LSR",
        "ashr" => "ASR",
        _ => unreachable!("caller only dispatches shl/lshr/ashr"),
    }
}

/// `%dst = shl|lshr|ashr i32 %a, (%amount|imm)`
pub fn lower_shift(ctx: &mut Ctx, dest: &str, opcode: &str, rest: &str) -> Result<()> {
    let mut parts = rest.splitn(2, char::is_whitespace);
    let ty_tok = parts.next().unwrap_or("");
    let ty = crate::types::Type::parse(ty_tok)
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown type `{}`", ty_tok)))?;
    let operand_text = parts.next().unwrap_or("");
    let operands = super::split_top_level(operand_text);
    if operands.len() != 2 {
        return Err(CompileError::isel(&ctx.function_name, rest, "shift requires exactly two operands"));
    }
    let (lhs, amount) = (&operands[0], &operands[1]);

    let lhs_reg = super::materialize(ctx, lhs)?.to_string();
    let amount_reg = rhs_operand(ctx, amount)?;
    if lhs.starts_with('%') {
        ctx.alloc.consume_use(lhs);
    }
    if amount.starts_with('%') {
        ctx.alloc.consume_use(amount);
    }

    let dst_reg = ctx.alloc.alloc_vreg(dest, ty)?;
    ctx.alloc.asm.push(format!("{} {}, {}, {}", mnemonic_for(opcode), dst_reg, lhs_reg, amount_reg));
    Ok(())
}
