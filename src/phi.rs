//! PHI pre-scan and parallel-copy resolution.
//!
//! `phi` instructions are resolved away before lowering ever sees them: this
//! module pulls every `phi` line out of a function's blocks up front,
//! grouping the incoming `(value, predecessor)` pairs by edge, so the
//! control-flow lowering for a `br` need only look up "what copies does this
//! edge need" instead of re-scanning successor blocks for `phi`s.

use crate::ir::{Block, Function};
use crate::types::Type;
use std::collections::HashMap;

/// One copy a branch edge must perform: `dest <- src` in the successor
/// block's incoming value.
#[derive(Debug, Clone, PartialEq)]
pub struct PhiCopy {
    pub dest: String,
    pub src: String,
    pub ty: Type,
}

/// Edge-keyed copy lists, `(predecessor_label, successor_label) -> copies`.
/// Labels are the function-local source labels, matching `Block::label`
/// before the caller's `<function>__<label>` emission renaming.
pub type PhiTable = HashMap<(String, String), Vec<PhiCopy>>;

/// Remove every `phi` instruction from `function`'s blocks and return the
/// edge-copy table they describe. Must run before any other lowering pass
/// touches the function's blocks.
pub fn extract_phis(function: &mut Function) -> PhiTable {
    let mut table: PhiTable = HashMap::new();
    for block in &mut function.blocks {
        retain_non_phi(block, &mut table);
    }
    table
}

fn retain_non_phi(block: &mut Block, table: &mut PhiTable) {
    let succ = block.label.clone();
    block.instructions.retain(|line| {
        let Some(parsed) = parse_phi_line(line) else {
            return true;
        };
        for (src, pred) in parsed.incoming {
            table
                .entry((pred, succ.clone()))
                .or_default()
                .push(PhiCopy {
                    dest: parsed.dest.clone(),
                    src,
                    ty: parsed.ty,
                });
        }
        false
    });
}

struct ParsedPhi {
    dest: String,
    ty: Type,
    incoming: Vec<(String, String)>,
}

/// `%dest = phi TYPE [ %val1, %label1 ], [ %val2, %label2 ], ...`
fn parse_phi_line(line: &str) -> Option<ParsedPhi> {
    let (dest, rest) = line.split_once('=')?;
    let dest = dest.trim().to_string();
    if !dest.starts_with('%') {
        return None;
    }
    let rest = rest.trim();
    let rest = rest.strip_prefix("phi")?;
    let rest = rest.trim_start();
    let (type_tok, bracket_part) = rest.split_once('[')?;
    let ty = Type::parse(type_tok.trim())?;
    let bracket_part = format!("[{}", bracket_part);

    let mut incoming = Vec::new();
    let mut remaining = bracket_part.as_str();
    while let Some(open) = remaining.find('[') {
        let after_open = &remaining[open + 1..];
        let close = after_open.find(']')?;
        let pair = &after_open[..close];
        let (val, label) = pair.split_once(',')?;
        incoming.push((val.trim().to_string(), label.trim().to_string()));
        remaining = &after_open[close + 1..];
    }
    if incoming.is_empty() {
        return None;
    }
    Some(ParsedPhi { dest, ty, incoming })
}

/// Resolve a set of `(dest_reg, src_reg)` register-level copies that must
/// all happen "simultaneously" on a branch edge into a concrete MOV
/// sequence, breaking cycles with `scratch` (by convention `R13`,
/// unavailable to the ordinary allocator pool). Self-copies are dropped.
pub fn resolve_parallel_copies(copies: &[(&'static str, &'static str)], scratch: &'static str) -> Vec<String> {
    let mut pending: Vec<(&'static str, &'static str)> =
        copies.iter().copied().filter(|(d, s)| d != s).collect();
    let mut out = Vec::new();

    loop {
        if pending.is_empty() {
            break;
        }
        let dests_still_sourced: Vec<&'static str> = pending.iter().map(|(_, s)| *s).collect();
        if let Some(pos) = pending
            .iter()
            .position(|(d, _)| !dests_still_sourced.contains(d))
        {
            let (d, s) = pending.remove(pos);
            out.push(format!("MOV {}, {}", d, s));
            continue;
        }
        // every remaining destination is also somebody's source: a cycle.
        // Break it by rotating one entry through the scratch register.
        let (d0, s0) = pending.remove(0);
        out.push(format!("MOV {}, {}", scratch, s0));
        // any later copy sourced from d0 now reads the saved value instead,
        // since d0 is about to be overwritten.
        for (_, s) in pending.iter_mut() {
            if *s == d0 {
                *s = scratch;
            }
        }
        pending.push((d0, scratch));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Block, Function};

    fn func(blocks: Vec<Block>) -> Function {
        Function {
            name: "f".to_string(),
            return_type: Type::I32,
            parameters: vec![],
            blocks,
            subprogram: None,
        }
    }

    #[test]
    fn extracts_phi_over_diamond_and_strips_it_from_block() {
        let mut f = func(vec![Block {
            label: "merge".to_string(),
            instructions: vec![
                "%r = phi i32 [ %a, left ], [ %b, right ]".to_string(),
                "ret i32 %r".to_string(),
            ],
        }]);
        let table = extract_phis(&mut f);
        assert_eq!(f.blocks[0].instructions, vec!["ret i32 %r".to_string()]);
        let left = table.get(&("left".to_string(), "merge".to_string())).unwrap();
        assert_eq!(left, &vec![PhiCopy { dest: "%r".to_string(), src: "%a".to_string(), ty: Type::I32 }]);
        let right = table.get(&("right".to_string(), "merge".to_string())).unwrap();
        assert_eq!(right, &vec![PhiCopy { dest: "%r".to_string(), src: "%b".to_string(), ty: Type::I32 }]);
    }

    #[test]
    fn leaves_blocks_without_phi_untouched() {
        let mut f = func(vec![Block {
            label: "entry".to_string(),
            instructions: vec!["ret void".to_string()],
        }]);
        let table = extract_phis(&mut f);
        assert!(table.is_empty());
        assert_eq!(f.blocks[0].instructions, vec!["ret void".to_string()]);
    }

    #[test]
    fn resolves_independent_copies_without_scratch() {
        let copies = [("R4", "R5"), ("R5", "R6")];
        let seq = resolve_parallel_copies(&copies, "R13");
        assert_eq!(seq, vec!["MOV R4, R5".to_string(), "MOV R5, R6".to_string()]);
    }

    #[test]
    fn breaks_a_swap_cycle_with_scratch_register() {
        let copies = [("R4", "R5"), ("R5", "R4")];
        let seq = resolve_parallel_copies(&copies, "R13");
        assert_eq!(
            seq,
            vec![
                "MOV R13, R5".to_string(),
                "MOV R5, R4".to_string(),
                "MOV R4, R13".to_string(),
            ]
        );
    }

    #[test]
    fn drops_self_copies() {
        let copies = [("R4", "R4"), ("R5", "R6")];
        let seq = resolve_parallel_copies(&copies, "R13");
        assert_eq!(seq, vec!["MOV R5, R6".to_string()]);
    }
}
