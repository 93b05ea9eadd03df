//! `getelementptr`, `load`, `store`, `alloca`.
//!
//! Loads and stores through an `alloca`'d pointer need no special case: the
//! alloca's result is just an ordinary pointer-valued SSA name already bound
//! to a register (the frame pointer for the function's first `alloca`, a
//! fresh one for any later ones), so `[reg+0]` addressing falls out of the
//! normal operand path.

use super::{Ctx, Result, SCRATCH};
use crate::error::CompileError;
use crate::types::{element_stride, Type};

/// `%dst = getelementptr inbounds ELEMTYPE, ptr %p, i32 %idx[, i32 %idx2]`
pub fn lower_gep(ctx: &mut Ctx, dest: &str, rest: &str) -> Result<()> {
    let rest = rest.strip_prefix("inbounds").map(str::trim_start).unwrap_or(rest);
    let operands = super::split_top_level(rest);
    if operands.len() < 3 {
        return Err(CompileError::isel(&ctx.function_name, rest, "getelementptr requires an element type, a pointer, and at least one index"));
    }
    let elem_type_tok = operands[0].trim();
    let (ptr_ty, ptr_val) = super::parse_typed_operand(&operands[1])
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed getelementptr pointer operand"))?;
    if ptr_ty != Type::Ptr {
        return Err(CompileError::isel(&ctx.function_name, rest, "getelementptr base must be ptr-typed"));
    }

    let index_operands: Vec<(Type, String)> = operands[2..]
        .iter()
        .map(|tok| super::parse_typed_operand(tok))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed getelementptr index"))?;

    let base_reg = super::materialize(ctx, &ptr_val)?.to_string();
    if ptr_val.starts_with('%') {
        ctx.alloc.consume_use(&ptr_val);
    }

    let dst_reg = ctx.alloc.alloc_vreg(dest, Type::Ptr)?;
    ctx.alloc.asm.push(format!("MOV {}, {}", dst_reg, base_reg));

    match index_operands.len() {
        1 => {
            // Shape 1: flat array of ELEMTYPE, single index.
            let stride = element_stride(elem_type_tok)
                .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown element type `{}`", elem_type_tok)))?;
            add_scaled_index(ctx, dst_reg, &index_operands[0].1, stride)?;
        }
        2 => {
            if let Some((count, elem)) = parse_array_type(elem_type_tok) {
                // Shape 2: `[N x T]`-typed pointee, outer then inner index.
                let elem_stride = element_stride(&elem)
                    .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown element type `{}`", elem)))?;
                add_scaled_index(ctx, dst_reg, &index_operands[0].1, count * elem_stride)?;
                add_scaled_index(ctx, dst_reg, &index_operands[1].1, elem_stride)?;
            } else {
                // Shape 3: object-array index plus a word-sized field index.
                let stride = element_stride(elem_type_tok)
                    .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown element type `{}`", elem_type_tok)))?;
                add_scaled_index(ctx, dst_reg, &index_operands[0].1, stride)?;
                add_scaled_index(ctx, dst_reg, &index_operands[1].1, 4)?;
            }
        }
        _ => return Err(CompileError::isel(&ctx.function_name, rest, "getelementptr supports at most two indices")),
    }

    for (_, value) in &index_operands {
        if value.starts_with('%') {
            ctx.alloc.consume_use(value);
        }
    }
    Ok(())
}

/// `[N x TYPE]` -> `(N, TYPE)`.
fn parse_array_type(tok: &str) -> Option<(u32, String)> {
    let inner = tok.strip_prefix('[')?.strip_suffix(']')?;
    let (count, elem) = inner.split_once('x')?;
    Some((count.trim().parse().ok()?, elem.trim().to_string()))
}

fn add_scaled_index(ctx: &mut Ctx, dst_reg: &'static str, index: &str, stride: u32) -> Result<()> {
    if stride == 0 {
        return Ok(());
    }
    if let Ok(literal) = index.parse::<i64>() {
        let offset = literal * stride as i64;
        if offset != 0 {
            ctx.alloc.asm.push(format!("ADD {}, {}, {}", dst_reg, dst_reg, offset));
        }
        return Ok(());
    }
    let idx_reg = super::materialize(ctx, index)?.to_string();
    ctx.alloc.asm.push(format!("MUL {}, {}, {}", SCRATCH, idx_reg, stride));
    ctx.alloc.asm.push(format!("ADD {}, {}, {}", dst_reg, dst_reg, SCRATCH));
    Ok(())
}

/// `%dst = load TYPE, ptr %p`
pub fn lower_load(ctx: &mut Ctx, dest: &str, rest: &str) -> Result<()> {
    let operands = super::split_top_level(rest);
    if operands.len() != 2 {
        return Err(CompileError::isel(&ctx.function_name, rest, "load requires a type and a pointer operand"));
    }
    let ty = Type::parse(operands[0].trim())
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown type `{}`", operands[0])))?;
    let (ptr_ty, ptr_val) = super::parse_typed_operand(&operands[1])
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed load pointer operand"))?;
    if ptr_ty != Type::Ptr {
        return Err(CompileError::isel(&ctx.function_name, rest, "load address must be ptr-typed"));
    }
    let ptr_reg = super::materialize(ctx, &ptr_val)?.to_string();
    if ptr_val.starts_with('%') {
        ctx.alloc.consume_use(&ptr_val);
    }
    let dst_reg = ctx.alloc.alloc_vreg(dest, ty)?;
    if ty.is_float_like() {
        ctx.alloc.set_float_alias(dest);
    }
    ctx.alloc.asm.push(format!("{} {}, [{}+0]", ty.load_op(), dst_reg, ptr_reg));
    Ok(())
}

/// `store TYPE %v, ptr %p`
pub fn lower_store(ctx: &mut Ctx, rest: &str) -> Result<()> {
    let operands = super::split_top_level(rest);
    if operands.len() != 2 {
        return Err(CompileError::isel(&ctx.function_name, rest, "store requires a value and a pointer operand"));
    }
    let (value_ty, value) = super::parse_typed_operand(&operands[0])
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed store value operand"))?;
    let (ptr_ty, ptr_val) = super::parse_typed_operand(&operands[1])
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed store pointer operand"))?;
    if ptr_ty != Type::Ptr {
        return Err(CompileError::isel(&ctx.function_name, rest, "store address must be ptr-typed"));
    }
    let value_reg = super::materialize(ctx, &value)?.to_string();
    let ptr_reg = super::materialize(ctx, &ptr_val)?.to_string();
    if value.starts_with('%') {
        ctx.alloc.consume_use(&value);
    }
    if ptr_val.starts_with('%') {
        ctx.alloc.consume_use(&ptr_val);
    }
    ctx.alloc.asm.push(format!("{} [{}+0], {}", value_ty.store_op(), ptr_reg, value_reg));
    Ok(())
}

/// `%dst = alloca TYPE`. The function's first `alloca` claims the frame
/// pointer register outright (see `DESIGN.md`, R7 dual-role addressing);
/// later ones in the same function behave like ordinary pointer-valued
/// definitions backed by their own data-section slot.
pub fn lower_alloca(ctx: &mut Ctx, dest: &str, rest: &str) -> Result<()> {
    let ty_tok = rest.split(',').next().unwrap_or(rest).trim();
    let ty = Type::parse(ty_tok).ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown type `{}`", ty_tok)))?;
    let label = ctx.new_unique("alloca");
    ctx.alloc.data_lines.push(format!("{}:", label));
    ctx.alloc.data_lines.push(format!("    {} 0", ty.data_directive()));

    if !ctx.alloc.frame_pointer_claimed() {
        ctx.alloc.pin_frame_pointer(dest);
        ctx.alloc.asm.push(format!("LDI32 {}, {}", crate::regalloc::FRAME_POINTER_REG, label));
    } else {
        let dst_reg = ctx.alloc.alloc_vreg(dest, Type::Ptr)?;
        ctx.alloc.asm.push(format!("LDI32 {}, {}", dst_reg, label));
    }
    Ok(())
}
