//! Post-selection MOV cleanup.
//!
//! The selector always materializes immediates, globals, and intermediate
//! results through a reserved scratch register (`R12`/`R13`/`R14`) before
//! using them, even when the very next instruction just copies that scratch
//! value into its real destination. Scratch registers never survive past
//! that one follow-up use in anything this crate emits, so folding
//! `DEF scratch, ...` + `MOV dst, scratch` into `DEF dst, ...` is always
//! safe here — no liveness analysis required. Skipped entirely when
//! `options.trace` is set, so traced assembly mirrors the selector 1:1.

const DEF_OPS: &[&str] = &[
    "LDI", "LDI32", "ADD", "SUB", "MUL", "FADD", "FSUB", "FMUL", "FDIV", "AND", "LSL", "LSR", "ASR", "ADC", "LD",
    "LDB", "LDH", "MOV", "F2I",
];

fn is_reserved_scratch(reg: &str) -> bool {
    matches!(reg, "R12" | "R13" | "R14")
}

fn parse_def(line: &str) -> Option<(&str, &str)> {
    let (mnem, rest) = line.split_once(' ')?;
    if !DEF_OPS.contains(&mnem) {
        return None;
    }
    let dest = rest.split(',').next()?.trim();
    Some((mnem, dest))
}

fn parse_mov(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("MOV ")?;
    let (d, s) = rest.split_once(',')?;
    Some((d.trim(), s.trim()))
}

fn replace_dest(line: &str, new_dest: &str) -> String {
    let (mnem, rest) = line.split_once(' ').unwrap();
    let (_, after_comma) = rest.split_once(',').unwrap_or(("", ""));
    format!("{} {},{}", mnem, new_dest, after_comma)
}

/// Fold a scratch-register definition directly into the instruction that
/// only existed to move it somewhere else.
fn combine_scratch_defs_into_moves(asm: &mut Vec<String>) {
    loop {
        let mut folded_any = false;
        let mut i = 0;
        while i + 1 < asm.len() {
            let folded = match (parse_def(&asm[i]), parse_mov(&asm[i + 1])) {
                (Some((_, dest_a)), Some((mov_dest, mov_src))) if is_reserved_scratch(dest_a) && mov_src == dest_a && mov_dest != dest_a => {
                    Some(replace_dest(&asm[i], mov_dest))
                }
                _ => None,
            };
            if let Some(new_line) = folded {
                asm[i] = new_line;
                asm.remove(i + 1);
                folded_any = true;
                i = i.saturating_sub(1);
            } else {
                i += 1;
            }
        }
        if !folded_any {
            break;
        }
    }
}

fn eliminate_self_moves(asm: &mut Vec<String>) {
    asm.retain(|line| match parse_mov(line) {
        Some((d, s)) => d != s,
        None => true,
    });
}

/// Run both rewrites in place.
pub fn run(asm: &mut Vec<String>) {
    combine_scratch_defs_into_moves(asm);
    eliminate_self_moves(asm);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_immediate_load_through_scratch_into_real_destination() {
        let mut asm = vec!["LDI R12, 5".to_string(), "MOV R4, R12".to_string()];
        run(&mut asm);
        assert_eq!(asm, vec!["LDI R4, 5".to_string()]);
    }

    #[test]
    fn folds_chained_scratch_definitions() {
        let mut asm = vec!["LDI32 R12, 1000".to_string(), "MOV R12, R12".to_string(), "MOV R5, R12".to_string()];
        run(&mut asm);
        assert_eq!(asm, vec!["LDI32 R5, 1000".to_string()]);
    }

    #[test]
    fn leaves_non_scratch_definitions_untouched() {
        let mut asm = vec!["ADD R4, R5, R6".to_string(), "MOV R8, R4".to_string()];
        run(&mut asm);
        assert_eq!(asm, vec!["ADD R4, R5, R6".to_string(), "MOV R8, R4".to_string()]);
    }

    #[test]
    fn drops_self_moves() {
        let mut asm = vec!["MOV R4, R4".to_string(), "ADD R5, R6, R7".to_string()];
        run(&mut asm);
        assert_eq!(asm, vec!["ADD R5, R6, R7".to_string()]);
    }
}
