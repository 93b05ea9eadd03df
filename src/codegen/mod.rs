//! Instruction selector: lowers one function's basic blocks into HSX
//! assembly text, driving a [`crate::regalloc::Allocator`].
//!
//! Each opcode family lives in its own file, grounded on the matching
//! dispatch arm of the source's `lower_function`. This module owns the
//! per-function driver: the pre-scan (use counts, `alloca` detection, label
//! mangling), PHI extraction, the block/instruction walk, and the shared
//! operand-resolution helpers every family file calls into.

mod arith;
mod calls;
mod compare;
mod control_flow;
mod convert;
mod memory;
mod shift;

use crate::config::CompileOptions;
use crate::error::CompileError;
use crate::ir::{Function, Program};
use crate::phi::{extract_phis, PhiTable};
use crate::regalloc::{Allocator, AllocatorMetrics, ARG_REGS, RETURN_REG};
use crate::types::Type;
use std::collections::HashMap;

type Result<T> = std::result::Result<T, CompileError>;

/// Scratch register the selector uses to materialize immediates, globals,
/// and spill addresses mid-instruction. Never assigned to an SSA value.
pub const SCRATCH: &str = "R12";

/// Second scratch register, used for a binary op's right-hand operand so it
/// doesn't clobber [`SCRATCH`] when both operands are non-SSA (e.g. `add i32
/// 1, 2` must load two distinct immediates, not the same register twice).
pub const SCRATCH2: &str = "R13";

pub struct LoweredFunction {
    pub name: String,
    pub asm: Vec<String>,
    pub data: Vec<String>,
    pub metrics: AllocatorMetrics,
    pub used_registers: Vec<&'static str>,
}

/// Per-function lowering context threaded through every opcode handler.
pub(crate) struct Ctx<'a> {
    pub function_name: String,
    pub alloc: Allocator,
    pub phi_table: PhiTable,
    pub globals: &'a HashMap<String, String>,
    pub current_block: String,
    label_counter: u32,
}

impl<'a> Ctx<'a> {
    pub fn mangle(&self, label: &str) -> String {
        format!("{}__{}", self.function_name, label)
    }

    pub fn new_unique(&mut self, tag: &str) -> String {
        self.label_counter += 1;
        format!("{}__{}_{}", self.function_name, tag, self.label_counter)
    }

    /// Resolve a global reference (after quoted-name mangling) to its
    /// emitted symbol.
    pub fn global_symbol(&self, raw: &str) -> String {
        self.globals.get(raw).cloned().unwrap_or_else(|| raw.to_string())
    }
}

pub fn lower_function(
    function: &Function,
    program: &Program,
    options: CompileOptions,
) -> Result<LoweredFunction> {
    let mut function = function.clone();
    let phi_table = extract_phis(&mut function);
    let has_alloca = function
        .blocks
        .iter()
        .flat_map(|b| b.instructions.iter())
        .any(|line| is_alloca_line(line));

    let alloc = Allocator::new(&function.name, options.allocator, has_alloca);
    let mut ctx = Ctx {
        function_name: function.name.clone(),
        alloc,
        phi_table,
        globals: &program.global_name_map,
        current_block: String::new(),
        label_counter: 0,
    };

    for name in prescan_use_counts(&function, &ctx.phi_table) {
        ctx.alloc.set_use_count(&name.0, name.1);
    }

    for (i, (name, ty)) in function.parameters.iter().enumerate() {
        let reg = ARG_REGS[i];
        ctx.alloc.bind_argument(name, *ty, reg);
    }

    for block in &function.blocks {
        ctx.current_block = block.label.clone();
        ctx.alloc.asm.push(format!("{}:", ctx.mangle(&block.label)));
        for line in &block.instructions {
            lower_instruction(&mut ctx, &function, line)?;
        }
    }

    Ok(LoweredFunction {
        name: function.name.clone(),
        asm: std::mem::take(&mut ctx.alloc.asm),
        data: std::mem::take(&mut ctx.alloc.data_lines),
        metrics: ctx.alloc.metrics(),
        used_registers: ctx.alloc.used_registers(),
    })
}

fn is_alloca_line(line: &str) -> bool {
    line.split_once('=')
        .map(|(_, rest)| rest.trim_start().starts_with("alloca"))
        .unwrap_or(false)
}

fn lower_instruction(ctx: &mut Ctx, function: &Function, line: &str) -> Result<()> {
    let (dest, rest) = split_dest(line);
    let (mnemonic, rest) = first_word(rest.trim_start());
    let require_dest = |ctx: &Ctx| -> Result<String> {
        dest.clone()
            .ok_or_else(|| CompileError::isel(&ctx.function_name, line, format!("`{}` requires a destination", mnemonic)))
    };

    match mnemonic {
        "ret" => control_flow::lower_ret(ctx, rest),
        "br" => control_flow::lower_br(ctx, function, rest),
        "add" | "sub" | "mul" => arith::lower_int_binop(ctx, &require_dest(ctx)?, mnemonic, rest),
        "fadd" | "fsub" | "fmul" | "fdiv" => arith::lower_float_binop(ctx, &require_dest(ctx)?, mnemonic, rest),
        "shl" | "lshr" | "ashr" => shift::lower_shift(ctx, &require_dest(ctx)?, mnemonic, rest),
        "icmp" => compare::lower_icmp(ctx, &require_dest(ctx)?, rest),
        "select" => compare::lower_select(ctx, &require_dest(ctx)?, rest),
        "sext" | "zext" | "trunc" => convert::lower_int_convert(ctx, &require_dest(ctx)?, mnemonic, rest),
        "fpext" | "fptrunc" => convert::lower_float_convert(ctx, &require_dest(ctx)?, mnemonic, rest),
        "fptosi" => convert::lower_fptosi(ctx, &require_dest(ctx)?, rest),
        "call" => calls::lower_call(ctx, dest.as_deref(), rest),
        "extractvalue" => calls::lower_extractvalue(ctx, &require_dest(ctx)?, rest),
        "getelementptr" => memory::lower_gep(ctx, &require_dest(ctx)?, rest),
        "load" => memory::lower_load(ctx, &require_dest(ctx)?, rest),
        "store" => memory::lower_store(ctx, rest),
        "alloca" => memory::lower_alloca(ctx, &require_dest(ctx)?, rest),
        other => Err(CompileError::isel(&ctx.function_name, line, format!("unsupported opcode `{}`", other))),
    }
}

fn split_dest(line: &str) -> (Option<String>, &str) {
    if let Some((lhs, rhs)) = line.split_once('=') {
        let lhs = lhs.trim();
        if lhs.starts_with('%') {
            return (Some(lhs.to_string()), rhs.trim_start());
        }
    }
    (None, line)
}

fn first_word(rest: &str) -> (&str, &str) {
    match rest.split_once(char::is_whitespace) {
        Some((word, tail)) => (word, tail.trim_start()),
        None => (rest, ""),
    }
}

/// Split a comma-separated argument list that may itself contain nested
/// parens (call argument lists) at top level only.
pub(crate) fn split_top_level(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut cur = String::new();
    for c in s.chars() {
        match c {
            '(' | '[' => {
                depth += 1;
                cur.push(c);
            }
            ')' | ']' => {
                depth -= 1;
                cur.push(c);
            }
            ',' if depth == 0 => {
                out.push(cur.trim().to_string());
                cur.clear();
            }
            _ => cur.push(c),
        }
    }
    if !cur.trim().is_empty() {
        out.push(cur.trim().to_string());
    }
    out
}

/// Parse one `TYPE value` operand token pair, e.g. `"i32 %a"` or `"i32 5"`.
pub(crate) fn parse_typed_operand(tok: &str) -> Option<(Type, String)> {
    let tok = tok.trim();
    let (ty_tok, value) = tok.split_once(char::is_whitespace)?;
    let ty = Type::parse(ty_tok)?;
    Some((ty, value.trim().to_string()))
}

/// Materialize any operand (SSA value, integer literal, global, or `null`)
/// into a register, using [`SCRATCH`] when the operand isn't already
/// resident in one.
pub(crate) fn materialize(ctx: &mut Ctx, operand: &str) -> Result<&'static str> {
    materialize_into(ctx, operand, SCRATCH)
}

/// Materialize the right-hand operand of a binary op into [`SCRATCH2`], so a
/// literal rhs never shares a register with a literal lhs materialized into
/// [`SCRATCH`]. Every operand is materialized, never passed through as a
/// bare immediate.
pub(crate) fn rhs_operand(ctx: &mut Ctx, operand: &str) -> Result<String> {
    materialize_into(ctx, operand, SCRATCH2).map(|r| r.to_string())
}

/// Materialize any operand into a specific register: an SSA value resolves
/// to its already-assigned register (never copied into `reg`); anything else
/// (integer literal, `@global`, `null`) is loaded directly into `reg`.
pub(crate) fn materialize_into(ctx: &mut Ctx, operand: &str, reg: &'static str) -> Result<&'static str> {
    if let Some(name) = operand.strip_prefix('%') {
        let full = format!("%{}", name);
        ctx.alloc.ensure_value_in_reg(&full)
    } else {
        load_operand_into(ctx, operand, reg)?;
        Ok(reg)
    }
}

/// Load a constant value into `reg`, picking `LDI` for values that fit a
/// 16-bit immediate and `LDI32` otherwise.
pub(crate) fn load_const(ctx: &mut Ctx, reg: &'static str, value: u32) {
    if value <= 0xFFFF {
        ctx.alloc.asm.push(format!("LDI {}, {}", reg, value));
    } else {
        ctx.alloc.asm.push(format!("LDI32 {}, {}", reg, value));
    }
}

/// Load a non-SSA operand (integer literal, float literal, `@global`, or
/// `null`) directly into `reg`. A literal that isn't a plain base-10 integer
/// is converted at compile time into its 16-bit half-precision bit pattern
/// (the representation every float-typed register in this ISA holds) rather
/// than silently defaulting to zero.
pub(crate) fn load_operand_into(ctx: &mut Ctx, operand: &str, reg: &'static str) -> Result<()> {
    if let Some(raw) = operand.strip_prefix('@') {
        let sym = ctx.global_symbol(raw);
        ctx.alloc.asm.push(format!("LDI32 {}, {}", reg, sym));
        return Ok(());
    }
    if operand == "null" {
        ctx.alloc.asm.push(format!("LDI {}, 0", reg));
        return Ok(());
    }
    if let Ok(value) = operand.parse::<i64>() {
        load_const(ctx, reg, value as u32);
        return Ok(());
    }
    let bits = crate::halffloat::float_literal_to_half_bits(operand)
        .map_err(|message| CompileError::isel(&ctx.function_name, operand, message))?;
    load_const(ctx, reg, bits as u32);
    Ok(())
}

fn prescan_use_counts(function: &Function, phi_table: &PhiTable) -> HashMap<String, i64> {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for block in &function.blocks {
        for line in &block.instructions {
            for value in extract_value_refs(line) {
                *counts.entry(value).or_insert(0) += 1;
            }
        }
    }
    for copies in phi_table.values() {
        for copy in copies {
            if copy.src.starts_with('%') {
                *counts.entry(copy.src.clone()).or_insert(0) += 1;
            }
        }
    }
    counts
}

fn extract_value_refs(line: &str) -> Vec<String> {
    let (dest, rest) = split_dest(line);
    let mut refs = Vec::new();
    let mut cur = String::new();
    for c in rest.chars() {
        if c == '%' {
            if !cur.is_empty() {
                cur.clear();
            }
            cur.push('%');
        } else if !cur.is_empty() && (c.is_alphanumeric() || c == '_' || c == '.') {
            cur.push(c);
        } else if !cur.is_empty() {
            refs.push(std::mem::take(&mut cur));
        }
    }
    if !cur.is_empty() {
        refs.push(cur);
    }
    let _ = dest;
    refs
}
