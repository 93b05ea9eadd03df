//! `call`, including the `llvm.convert.{to,from}.fp16.f32` and
//! `llvm.uadd.with.overflow.i32` intrinsics.
//!
//! The fp16 intrinsics stand in for real half/float bit-conversion
//! (`fpext`/`fptrunc` only change the logical type tag, not the bits — see
//! `convert.rs`): both are a plain `MOV` between two 32-bit registers, since
//! a float-typed register already holds its value as half-precision bits.
//!
//! `llvm.uadd.with.overflow.i32` returns a `{ i32, i1 }` aggregate, which
//! `Type::parse` has no token for, so its call and the matching
//! `extractvalue` are special-cased ahead of the ordinary call path.

use super::{Ctx, Result};
use crate::error::CompileError;
use crate::regalloc::{ARG_REGS, RETURN_REG};
use crate::types::Type;

/// `[%dst =] call TYPE @name(arg, arg, ...)`
pub fn lower_call(ctx: &mut Ctx, dest: Option<&str>, rest: &str) -> Result<()> {
    let rest_trim = rest.trim_start();
    if rest_trim.starts_with('{') {
        return lower_struct_call(ctx, dest, rest_trim);
    }

    let mut parts = rest.splitn(2, char::is_whitespace);
    let ret_ty_tok = parts.next().unwrap_or("");
    let ret_ty = Type::parse(ret_ty_tok)
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown return type `{}`", ret_ty_tok)))?;
    let callee_and_args = parts.next().unwrap_or("").trim_start();
    let open = callee_and_args
        .find('(')
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "call missing argument list"))?;
    let callee = callee_and_args[..open].trim();
    let name = callee
        .strip_prefix('@')
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "call target must be a global symbol"))?;
    let close = callee_and_args
        .rfind(')')
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "call missing closing paren"))?;
    let arg_text = &callee_and_args[open + 1..close];
    let args: Vec<String> = super::split_top_level(arg_text).into_iter().filter(|s| !s.is_empty()).collect();

    match name {
        "llvm.convert.to.fp16.f32" => return lower_to_fp16(ctx, dest, &args),
        "llvm.convert.from.fp16.f32" => return lower_from_fp16(ctx, dest, &args),
        _ => {}
    }

    if args.len() > 3 {
        return Err(CompileError::isel(&ctx.function_name, rest, "call has more than 3 args"));
    }

    let mut arg_regs = Vec::with_capacity(args.len());
    for arg in &args {
        let (_, value) = super::parse_typed_operand(arg)
            .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed call argument"))?;
        let reg = super::materialize(ctx, &value)?.to_string();
        arg_regs.push((reg, value));
    }
    for (i, (reg, _)) in arg_regs.iter().enumerate() {
        ctx.alloc.asm.push(format!("MOV {}, {}", ARG_REGS[i], reg));
    }
    for (_, value) in &arg_regs {
        if value.starts_with('%') {
            ctx.alloc.consume_use(value);
        }
    }

    ctx.alloc.asm.push(format!("CALL {}", name));

    if let Some(dest) = dest {
        if ret_ty != Type::Void {
            let dst_reg = ctx.alloc.alloc_vreg(dest, ret_ty)?;
            if ret_ty.is_float_like() {
                ctx.alloc.set_float_alias(dest);
            }
            ctx.alloc.asm.push(format!("MOV {}, {}", dst_reg, RETURN_REG));
        }
    }
    Ok(())
}

/// `llvm.convert.to.fp16.f32`: narrow a float-typed register (or literal)
/// into its half-precision bit pattern, held in a plain 32-bit register. An
/// SSA source must already carry a float alias; nothing downstream of this
/// call widens it back, so there is no other way to know it is a float.
fn lower_to_fp16(ctx: &mut Ctx, dest: Option<&str>, args: &[String]) -> Result<()> {
    let dest = dest.ok_or_else(|| CompileError::isel(&ctx.function_name, "fp16", "intrinsic call requires a destination"))?;
    if args.len() != 1 {
        return Err(CompileError::isel(&ctx.function_name, "fp16", "fp16 conversion intrinsic takes exactly one argument"));
    }
    let (_, value) = super::parse_typed_operand(&args[0])
        .ok_or_else(|| CompileError::isel(&ctx.function_name, "fp16", "malformed intrinsic argument"))?;

    if let Some(name) = value.strip_prefix('%') {
        let full = format!("%{}", name);
        if !ctx.alloc.has_float_alias(&full) {
            return Err(CompileError::isel(&ctx.function_name, value.as_str(), "fp16 conversion source must be a float-typed value"));
        }
        let src_reg = ctx.alloc.ensure_value_in_reg(&full)?;
        let dst_reg = ctx.alloc.alloc_vreg(dest, Type::I32)?;
        ctx.alloc.asm.push(format!("MOV {}, {}", dst_reg, src_reg));
        ctx.alloc.consume_use(&full);
        return Ok(());
    }

    let bits = crate::halffloat::float_literal_to_half_bits(&value)
        .map_err(|message| CompileError::isel(&ctx.function_name, value.as_str(), message))?;
    let dst_reg = ctx.alloc.alloc_vreg(dest, Type::I32)?;
    super::load_const(ctx, dst_reg, bits);
    Ok(())
}

/// `llvm.convert.from.fp16.f32`: widen a half-precision bit pattern into a
/// float-typed register. The bits themselves don't change, only the
/// logical type tag, exactly like `fpext`.
fn lower_from_fp16(ctx: &mut Ctx, dest: Option<&str>, args: &[String]) -> Result<()> {
    let dest = dest.ok_or_else(|| CompileError::isel(&ctx.function_name, "fp16", "intrinsic call requires a destination"))?;
    if args.len() != 1 {
        return Err(CompileError::isel(&ctx.function_name, "fp16", "fp16 conversion intrinsic takes exactly one argument"));
    }
    let (_, value) = super::parse_typed_operand(&args[0])
        .ok_or_else(|| CompileError::isel(&ctx.function_name, "fp16", "malformed intrinsic argument"))?;
    let src_reg = super::materialize(ctx, &value)?.to_string();
    if value.starts_with('%') {
        ctx.alloc.consume_use(&value);
    }
    let dst_reg = ctx.alloc.alloc_vreg(dest, Type::I32)?;
    ctx.alloc.set_float_alias(dest);
    ctx.alloc.asm.push(format!("MOV {}, {}", dst_reg, src_reg));
    Ok(())
}

/// `%dst = call { i32, i1 } @llvm.uadd.with.overflow.i32(i32 %a, i32 %b)`
///
/// The sum and its carry are two independent registers. The carry is bound
/// under a synthetic `%dest.carry` name so `extractvalue` can find it later;
/// since that name never appears in the IR text, prescan never counts its
/// uses, so it is seeded to one explicitly.
fn lower_struct_call(ctx: &mut Ctx, dest: Option<&str>, rest: &str) -> Result<()> {
    let dest = dest.ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "struct-returning call requires a destination"))?;
    let close = rest
        .find('}')
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed struct return type"))?;
    let callee_and_args = rest[close + 1..].trim_start();
    let open = callee_and_args
        .find('(')
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "call missing argument list"))?;
    let callee = callee_and_args[..open].trim();
    let name = callee
        .strip_prefix('@')
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "call target must be a global symbol"))?;
    let arg_close = callee_and_args
        .rfind(')')
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "call missing closing paren"))?;
    let args: Vec<String> = super::split_top_level(&callee_and_args[open + 1..arg_close])
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();

    if name != "llvm.uadd.with.overflow.i32" {
        return Err(CompileError::isel(&ctx.function_name, name, "unsupported struct-returning call"));
    }
    if args.len() != 2 {
        return Err(CompileError::isel(&ctx.function_name, rest, "llvm.uadd.with.overflow.i32 takes exactly two arguments"));
    }
    let (_, a) = super::parse_typed_operand(&args[0])
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed intrinsic argument"))?;
    let (_, b) = super::parse_typed_operand(&args[1])
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed intrinsic argument"))?;

    let a_reg = super::materialize_into(ctx, &a, super::SCRATCH)?;
    let b_reg = super::materialize_into(ctx, &b, super::SCRATCH2)?;
    if a.starts_with('%') {
        ctx.alloc.consume_use(&a);
    }
    if b.starts_with('%') {
        ctx.alloc.consume_use(&b);
    }

    let sum_reg = ctx.alloc.alloc_vreg(dest, Type::I32)?;
    ctx.alloc.asm.push(format!("ADD {}, {}, {}", sum_reg, a_reg, b_reg));

    let carry_name = format!("{}.carry", dest);
    let carry_reg = ctx.alloc.alloc_vreg(&carry_name, Type::I1)?;
    ctx.alloc.set_use_count(&carry_name, 1);

    let zero_name = ctx.new_unique("uadd_zero");
    let zero_reg = ctx.alloc.alloc_vreg(&zero_name, Type::I32)?;
    ctx.alloc.asm.push(format!("LDI {}, 0", zero_reg));
    ctx.alloc.asm.push(format!("ADC {}, {}, {}", carry_reg, zero_reg, zero_reg));
    ctx.alloc.release_reg(&zero_name);
    Ok(())
}

/// `%dst = extractvalue { i32, i1 } %agg, N`
pub fn lower_extractvalue(ctx: &mut Ctx, dest: &str, rest: &str) -> Result<()> {
    let close = rest
        .find('}')
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed aggregate type"))?;
    let operand_text = rest[close + 1..].trim_start();
    let operands = super::split_top_level(operand_text);
    if operands.len() != 2 {
        return Err(CompileError::isel(&ctx.function_name, rest, "extractvalue requires an aggregate and an index"));
    }
    let agg = operands[0].trim();
    let index: u32 = operands[1]
        .trim()
        .parse()
        .map_err(|_| CompileError::isel(&ctx.function_name, rest, "malformed extractvalue index"))?;

    let (field_name, ty) = match index {
        0 => (agg.to_string(), Type::I32),
        1 => (format!("{}.carry", agg), Type::I1),
        _ => return Err(CompileError::isel(&ctx.function_name, rest, "extractvalue index out of range")),
    };

    let src_reg = ctx.alloc.ensure_value_in_reg(&field_name)?;
    let dst_reg = ctx.alloc.alloc_vreg(dest, ty)?;
    ctx.alloc.asm.push(format!("MOV {}, {}", dst_reg, src_reg));
    ctx.alloc.consume_use(&field_name);
    Ok(())
}
