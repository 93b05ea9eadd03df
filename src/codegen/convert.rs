//! Width and representation conversions: `sext`/`zext`/`trunc`,
//! `fpext`/`fptrunc`, and `fptosi`.

use super::Ctx;
use crate::error::CompileError;
use crate::types::Type;
use std::result::Result;

type R<T> = Result<T, CompileError>;

fn mask_bits(ty: Type) -> u32 {
    match ty {
        Type::I1 => 1,
        Type::I8 => 8,
        Type::I16 => 16,
        _ => 32,
    }
}

/// `%dst = sext|zext|trunc FROM %v to TO`
pub fn lower_int_convert(ctx: &mut Ctx, dest: &str, opcode: &str, rest: &str) -> R<()> {
    let (from_tok, rest) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed conversion"))?;
    let from_ty = Type::parse(from_tok)
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown type `{}`", from_tok)))?;
    let (value, to_tok) = rest
        .trim_start()
        .split_once(" to ")
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "conversion missing `to` clause"))?;
    let to_ty = Type::parse(to_tok.trim())
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown type `{}`", to_tok)))?;

    let src_reg = super::materialize(ctx, value.trim())?.to_string();
    if value.trim().starts_with('%') {
        ctx.alloc.consume_use(value.trim());
    }
    let dst_reg = ctx.alloc.alloc_vreg(dest, to_ty)?;

    match opcode {
        "sext" => {
            let src_bits = mask_bits(from_ty) as u64;
            let low_mask = (1u64 << src_bits) - 1;
            let sign_bit = 1u64 << (src_bits - 1);
            let extend_const = 1u64 << src_bits;
            let nonneg_label = ctx.new_unique("sext_nonneg");

            ctx.alloc.asm.push(format!("MOV {}, {}", dst_reg, src_reg));
            super::load_operand_into(ctx, &low_mask.to_string(), super::SCRATCH2)?;
            ctx.alloc.asm.push(format!("AND {}, {}, {}", dst_reg, dst_reg, super::SCRATCH2));
            super::load_operand_into(ctx, &sign_bit.to_string(), super::SCRATCH2)?;
            ctx.alloc.asm.push(format!("AND {}, {}, {}", super::SCRATCH2, dst_reg, super::SCRATCH2));
            super::load_operand_into(ctx, "0", super::SCRATCH)?;
            ctx.alloc.asm.push(format!("CMP {}, {}", super::SCRATCH2, super::SCRATCH));
            ctx.alloc.asm.push(format!("JZ {}", nonneg_label));
            super::load_operand_into(ctx, &extend_const.to_string(), super::SCRATCH)?;
            ctx.alloc.asm.push(format!("SUB {}, {}, {}", dst_reg, dst_reg, super::SCRATCH));
            ctx.alloc.asm.push(format!("{}:", nonneg_label));
        }
        "zext" => {
            let mask = (1u64 << mask_bits(from_ty)) - 1;
            ctx.alloc.asm.push(format!("AND {}, {}, {}", dst_reg, src_reg, mask));
        }
        "trunc" => {
            let mask = (1u64 << mask_bits(to_ty)) - 1;
            ctx.alloc.asm.push(format!("AND {}, {}, {}", dst_reg, src_reg, mask));
        }
        _ => unreachable!("caller only dispatches sext/zext/trunc"),
    }
    Ok(())
}

/// `%dst = fpext half %v to float` / `%dst = fptrunc float %v to half`.
/// Both containers are the same 32-bit register; only the logical type
/// (tracked via `float_alias`) changes. Real bit-level half/float encoding
/// conversion is done by the `llvm.convert.{to,from}.fp16.f32` intrinsics,
/// not by these two opcodes.
pub fn lower_float_convert(ctx: &mut Ctx, dest: &str, _opcode: &str, rest: &str) -> R<()> {
    let (from_tok, rest) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed conversion"))?;
    Type::parse(from_tok)
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown type `{}`", from_tok)))?;
    let (value, to_tok) = rest
        .trim_start()
        .split_once(" to ")
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "conversion missing `to` clause"))?;
    let to_ty = Type::parse(to_tok.trim())
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown type `{}`", to_tok)))?;

    let src_reg = super::materialize(ctx, value.trim())?.to_string();
    if value.trim().starts_with('%') {
        ctx.alloc.consume_use(value.trim());
    }
    let dst_reg = ctx.alloc.alloc_vreg(dest, to_ty)?;
    ctx.alloc.set_float_alias(dest);
    ctx.alloc.asm.push(format!("MOV {}, {}", dst_reg, src_reg));
    Ok(())
}

/// `%dst = fptosi float %v to i32`
pub fn lower_fptosi(ctx: &mut Ctx, dest: &str, rest: &str) -> R<()> {
    let (from_tok, rest) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed fptosi"))?;
    Type::parse(from_tok)
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown type `{}`", from_tok)))?;
    let (value, to_tok) = rest
        .trim_start()
        .split_once(" to ")
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "fptosi missing `to` clause"))?;
    let to_ty = Type::parse(to_tok.trim())
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown type `{}`", to_tok)))?;

    let src_reg = super::materialize(ctx, value.trim())?.to_string();
    if value.trim().starts_with('%') {
        ctx.alloc.consume_use(value.trim());
    }
    let dst_reg = ctx.alloc.alloc_vreg(dest, to_ty)?;
    ctx.alloc.clear_float_alias(dest);
    ctx.alloc.asm.push(format!("F2I {}, {}", dst_reg, src_reg));
    Ok(())
}
