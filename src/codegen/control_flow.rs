//! `ret` and `br`, including PHI edge-copy resolution on every branch.

use super::{Ctx, Result};
use crate::error::CompileError;
use crate::ir::Function;
use crate::phi::resolve_parallel_copies;
use crate::regalloc::{PHI_SCRATCH_REG, RETURN_REG};
use crate::types::Type;

/// `ret void` / `ret TYPE %v`
pub fn lower_ret(ctx: &mut Ctx, rest: &str) -> Result<()> {
    if rest.trim() == "void" {
        ctx.alloc.asm.push("RET".to_string());
        return Ok(());
    }
    let (ty_tok, value) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed ret"))?;
    Type::parse(ty_tok).ok_or_else(|| CompileError::isel(&ctx.function_name, rest, format!("unknown type `{}`", ty_tok)))?;
    let value = value.trim();
    let reg = super::materialize(ctx, value)?.to_string();
    if value.starts_with('%') {
        ctx.alloc.consume_use(value);
    }
    ctx.alloc.asm.push(format!("MOV {}, {}", RETURN_REG, reg));
    ctx.alloc.asm.push("RET".to_string());
    Ok(())
}

/// `br label %L` / `br i1 %c, label %t, label %f`
pub fn lower_br(ctx: &mut Ctx, _function: &Function, rest: &str) -> Result<()> {
    if let Some(label) = rest.trim().strip_prefix("label %") {
        let label = label.trim().to_string();
        emit_edge_copies(ctx, &label)?;
        ctx.alloc.asm.push(format!("JMP {}", ctx.mangle(&label)));
        return Ok(());
    }

    let (cond_ty_tok, rest) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed br"))?;
    if cond_ty_tok != "i1" {
        return Err(CompileError::isel(&ctx.function_name, rest, "conditional br requires an i1 condition"));
    }
    let operands = super::split_top_level(rest.trim_start());
    if operands.len() != 3 {
        return Err(CompileError::isel(&ctx.function_name, rest, "conditional br requires cond, true label, false label"));
    }
    let cond = operands[0].trim();
    let true_label = operands[1]
        .trim()
        .strip_prefix("label %")
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed true label"))?
        .to_string();
    let false_label = operands[2]
        .trim()
        .strip_prefix("label %")
        .ok_or_else(|| CompileError::isel(&ctx.function_name, rest, "malformed false label"))?
        .to_string();

    let cond_reg = super::materialize(ctx, cond)?.to_string();
    if cond.starts_with('%') {
        ctx.alloc.consume_use(cond);
    }

    let zero_name = ctx.new_unique("br_zero");
    let zero_reg = ctx.alloc.alloc_vreg(&zero_name, Type::I32)?;
    ctx.alloc.asm.push(format!("LDI {}, 0", zero_reg));
    ctx.alloc.asm.push(format!("CMP {}, {}", cond_reg, zero_reg));
    ctx.alloc.release_reg(&zero_name);

    let false_trampoline = ctx.new_unique("br_false");
    ctx.alloc.asm.push(format!("JZ {}", false_trampoline));
    emit_edge_copies(ctx, &true_label)?;
    ctx.alloc.asm.push(format!("JMP {}", ctx.mangle(&true_label)));
    ctx.alloc.asm.push(format!("{}:", false_trampoline));
    emit_edge_copies(ctx, &false_label)?;
    ctx.alloc.asm.push(format!("JMP {}", ctx.mangle(&false_label)));
    Ok(())
}

fn emit_edge_copies(ctx: &mut Ctx, succ_label: &str) -> Result<()> {
    let key = (ctx.current_block.clone(), succ_label.to_string());
    let Some(copies) = ctx.phi_table.get(&key).cloned() else {
        return Ok(());
    };
    let mut pending: Vec<(&'static str, &'static str)> = Vec::new();
    for copy in &copies {
        if !copy.src.starts_with('%') {
            // A constant/global/null incoming value can never collide with
            // another copy's not-yet-read source register: it loads
            // straight into its own freshly allocated destination, with no
            // shared scratch in between.
            let dst_reg = ctx.alloc.alloc_vreg(&copy.dest, copy.ty)?;
            super::load_operand_into(ctx, &copy.src, dst_reg)?;
            continue;
        }
        let src_reg = ctx.alloc.ensure_value_in_reg(&copy.src)?;
        let dies_here = ctx.alloc.use_count(&copy.src) <= 1;
        if ctx.alloc.coalesce_enabled() && dies_here && !ctx.alloc.is_bound(&copy.dest) {
            ctx.alloc.alias_register(&copy.dest, src_reg, copy.ty);
            ctx.alloc.consume_use(&copy.src);
            continue;
        }
        let dst_reg = ctx.alloc.alloc_vreg(&copy.dest, copy.ty)?;
        ctx.alloc.consume_use(&copy.src);
        pending.push((dst_reg, src_reg));
    }
    let sequence = resolve_parallel_copies(&pending, PHI_SCRATCH_REG);
    ctx.alloc.asm.extend(sequence);
    Ok(())
}
