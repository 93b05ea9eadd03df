//! `icmp` and `select`.
//!
//! Neither the predicate nor the selected value ever lives in a flags
//! register: `icmp` computes a `SUB` and tests the zero/sign flags it
//! leaves behind with a short branch, and `select` branches directly to one
//! of two `MOV`s rather than computing both arms unconditionally. The ISA
//! has exactly two conditional jumps, `JZ`/`JNZ`; there is no dedicated
//! signed-comparison jump, so `sgt`/`slt`/`sge`/`sle` isolate the sign bit
//! of the `SUB` result with an explicit `AND` against `0x80000000` before
//! testing it.

use super::{rhs_operand, Ctx, Result};
use crate::error::CompileError;
use crate::types::Type;

const SIGN_BIT: u32 = 0x8000_0000;

/// `%dst = icmp PRED TYPE %a, %b`
pub fn lower_icmp(ctx: &mut Ctx, dest: &str, rest: &str) -> Result<()> {
    let (pred, rest) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed icmp"))?;
    if !matches!(pred, "eq" | "ne" | "sgt" | "slt" | "sge" | "sle") {
        return Err(CompileError::isel(&ctx.function_name, rest, format!("unsupported icmp predicate `{}`", pred)));
    }

    let mut parts = rest.trim_start().splitn(2, char::is_whitespace);
    let ty_tok = parts.next().unwrap_or("");
    Type::parse(ty_tok).ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown type `{}`", ty_tok)))?;
    let operand_text = parts.next().unwrap_or("");
    let operands = super::split_top_level(operand_text);
    if operands.len() != 2 {
        return Err(CompileError::isel(&ctx.function_name, rest, "icmp requires exactly two operands"));
    }

    let lhs_reg = super::materialize(ctx, &operands[0])?.to_string();
    let rhs_reg = rhs_operand(ctx, &operands[1])?;
    if operands[0].starts_with('%') {
        ctx.alloc.consume_use(&operands[0]);
    }
    if operands[1].starts_with('%') {
        ctx.alloc.consume_use(&operands[1]);
    }

    let tmp_name = ctx.new_unique("icmp_tmp");
    let zero_name = ctx.new_unique("icmp_zero");
    let tmp_reg = ctx.alloc.alloc_vreg(&tmp_name, Type::I32)?;
    let zero_reg = ctx.alloc.alloc_vreg(&zero_name, Type::I32)?;
    ctx.alloc.asm.push(format!("SUB {}, {}, {}", tmp_reg, lhs_reg, rhs_reg));
    ctx.alloc.asm.push(format!("LDI {}, 0", zero_reg));
    ctx.alloc.asm.push(format!("CMP {}, {}", tmp_reg, zero_reg));

    let dst_reg = ctx.alloc.alloc_vreg(dest, Type::I1)?;
    ctx.alloc.asm.push(format!("LDI {}, 0", dst_reg));

    match pred {
        "eq" | "ne" => {
            let true_label = ctx.new_unique("icmp_true");
            let end_label = ctx.new_unique("icmp_end");
            let jump = if pred == "eq" { "JZ" } else { "JNZ" };
            ctx.alloc.asm.push(format!("{} {}", jump, true_label));
            ctx.alloc.asm.push(format!("JMP {}", end_label));
            ctx.alloc.asm.push(format!("{}:", true_label));
            ctx.alloc.asm.push(format!("LDI {}, 1", dst_reg));
            ctx.alloc.asm.push(format!("{}:", end_label));
        }
        "sgt" | "slt" | "sge" | "sle" => {
            let zero_label = ctx.new_unique("icmp_zero_case");
            let end_label = ctx.new_unique("icmp_end");
            ctx.alloc.asm.push(format!("JZ {}", zero_label));

            let mask_name = ctx.new_unique("icmp_mask");
            let mask_reg = ctx.alloc.alloc_vreg(&mask_name, Type::I32)?;
            ctx.alloc.asm.push(format!("LDI32 {}, {}", mask_reg, SIGN_BIT));
            ctx.alloc.asm.push(format!("AND {}, {}, {}", mask_reg, tmp_reg, mask_reg));
            ctx.alloc.asm.push(format!("CMP {}, {}", mask_reg, zero_reg));

            match pred {
                "sgt" | "sge" => {
                    // sign bit set => negative diff => not greater, leave rd = 0
                    ctx.alloc.asm.push(format!("JNZ {}", end_label));
                    ctx.alloc.asm.push(format!("LDI {}, 1", dst_reg));
                    ctx.alloc.asm.push(format!("JMP {}", end_label));
                }
                "slt" | "sle" => {
                    // sign bit clear => non-negative diff => not less, leave rd = 0
                    ctx.alloc.asm.push(format!("JZ {}", end_label));
                    ctx.alloc.asm.push(format!("LDI {}, 1", dst_reg));
                    ctx.alloc.asm.push(format!("JMP {}", end_label));
                }
                _ => unreachable!(),
            }

            ctx.alloc.asm.push(format!("{}:", zero_label));
            if matches!(pred, "sge" | "sle") {
                ctx.alloc.asm.push(format!("LDI {}, 1", dst_reg));
            }
            ctx.alloc.asm.push(format!("{}:", end_label));
            ctx.alloc.release_reg(&mask_name);
        }
        _ => unreachable!(),
    }

    ctx.alloc.release_reg(&zero_name);
    ctx.alloc.release_reg(&tmp_name);
    Ok(())
}

/// `%dst = select i1 %c, TYPE %a, TYPE %b`
pub fn lower_select(ctx: &mut Ctx, dest: &str, rest: &str) -> Result<()> {
    let mut parts = rest.splitn(2, char::is_whitespace);
    let cond_ty_tok = parts.next().unwrap_or("");
    if cond_ty_tok != "i1" {
        return Err(CompileError::isel(&ctx.function_name, rest, "select condition must be i1"));
    }
    let operand_text = parts.next().unwrap_or("");
    let operands = super::split_top_level(operand_text);
    if operands.len() != 3 {
        return Err(CompileError::isel(&ctx.function_name, rest, "select requires exactly three operands"));
    }
    let cond = &operands[0];
    let (a_ty, a_val) = super::parse_typed_operand(&operands[1])
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed select true-value"))?;
    let (_, b_val) = super::parse_typed_operand(&operands[2])
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed select false-value"))?;

    let cond_reg = super::materialize(ctx, cond)?.to_string();
    if cond.starts_with('%') {
        ctx.alloc.consume_use(cond);
    }

    let zero_name = ctx.new_unique("select_zero");
    let zero_reg = ctx.alloc.alloc_vreg(&zero_name, Type::I32)?;
    ctx.alloc.asm.push(format!("LDI {}, 0", zero_reg));
    ctx.alloc.asm.push(format!("CMP {}, {}", cond_reg, zero_reg));
    ctx.alloc.release_reg(&zero_name);

    let false_label = ctx.new_unique("select_false");
    let end_label = ctx.new_unique("select_end");
    ctx.alloc.asm.push(format!("JZ {}", false_label));

    let a_reg = super::materialize(ctx, &a_val)?.to_string();
    if a_val.starts_with('%') {
        ctx.alloc.consume_use(&a_val);
    }
    let dst_reg = ctx.alloc.alloc_vreg(dest, a_ty)?;
    if a_ty.is_float_like() {
        ctx.alloc.set_float_alias(dest);
    }
    ctx.alloc.asm.push(format!("MOV {}, {}", dst_reg, a_reg));
    ctx.alloc.asm.push(format!("JMP {}", end_label));
    ctx.alloc.asm.push(format!("{}:", false_label));
    let b_reg = super::rhs_operand(ctx, &b_val)?;
    if b_val.starts_with('%') {
        ctx.alloc.consume_use(&b_val);
    }
    ctx.alloc.asm.push(format!("MOV {}, {}", dst_reg, b_reg));
    ctx.alloc.asm.push(format!("{}:", end_label));
    Ok(())
}
