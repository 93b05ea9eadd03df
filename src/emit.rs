//! Assembly section renderer: assembles one function's lowered body plus
//! the module's globals into the final `.entry`/`.export`/`.import`/
//! `.data`/`.text` text, exactly one `.entry` directive per module.

use crate::codegen::LoweredFunction;
use crate::ir::{GlobalKind, Program};
use std::collections::BTreeSet;

const BYTES_PER_LINE: usize = 8;

pub fn render(program: &Program, lowered: &[LoweredFunction]) -> String {
    let mut out = String::new();

    match program.entry_function() {
        Some(main) => out.push_str(&format!(".entry {}\n", main.name)),
        None => out.push_str(".entry\n"),
    }

    let local_names: BTreeSet<&str> = lowered.iter().map(|f| f.name.as_str()).collect();
    for name in &local_names {
        out.push_str(&format!(".export {}\n", name));
    }

    let mut imports: BTreeSet<String> = BTreeSet::new();
    for f in lowered {
        for line in &f.asm {
            if let Some(target) = line.strip_prefix("CALL ") {
                let target = target.trim();
                if !local_names.contains(target) {
                    imports.insert(target.to_string());
                }
            }
        }
    }
    for name in &imports {
        out.push_str(&format!(".import {}\n", name));
    }

    out.push('\n');
    out.push_str(".data\n");
    for line in render_globals(program) {
        out.push_str(&line);
        out.push('\n');
    }
    for f in lowered {
        for line in &f.data {
            out.push_str(line);
            out.push('\n');
        }
    }

    out.push('\n');
    out.push_str(".text\n");
    for f in lowered {
        for line in &f.asm {
            if line.ends_with(':') {
                out.push_str(line);
            } else {
                out.push_str("    ");
                out.push_str(line);
            }
            out.push('\n');
        }
    }

    out
}

fn render_globals(program: &Program) -> Vec<String> {
    let mut lines = Vec::new();
    for global in &program.globals {
        if let Some(align) = global.alignment {
            lines.push(format!(".align {}", align));
        }
        lines.push(format!("{}:", global.name));
        match &global.kind {
            GlobalKind::Bytes(bytes) => {
                if bytes.is_empty() {
                    lines.push("    .byte 0".to_string());
                }
                for chunk in bytes.chunks(BYTES_PER_LINE) {
                    let values: Vec<String> = chunk.iter().map(|b| b.to_string()).collect();
                    lines.push(format!("    .byte {}", values.join(", ")));
                }
            }
            GlobalKind::Int { bits, value } => {
                let directive = match bits {
                    1 | 8 => ".byte",
                    16 => ".half",
                    _ => ".word",
                };
                lines.push(format!("    {} {}", directive, value));
            }
            GlobalKind::Float { bits } => {
                lines.push(format!("    .word {}", bits));
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, Global};
    use crate::types::Type;

    fn lowered_stub(name: &str, asm: Vec<&str>) -> LoweredFunction {
        LoweredFunction {
            name: name.to_string(),
            asm: asm.into_iter().map(str::to_string).collect(),
            data: vec![],
            metrics: Default::default(),
            used_registers: vec![],
        }
    }

    #[test]
    fn emits_exactly_one_entry_directive_for_a_main_function() {
        let mut program = Program::default();
        program.functions.push(Function {
            name: "main".to_string(),
            return_type: Type::I32,
            parameters: vec![],
            blocks: vec![],
            subprogram: None,
        });
        let lowered = vec![lowered_stub("main", vec!["main__entry:", "RET"])];
        let asm = render(&program, &lowered);
        assert_eq!(asm.matches(".entry").count(), 1);
        assert!(asm.contains(".entry main"));
    }

    #[test]
    fn chunks_byte_array_globals_eight_per_line() {
        let mut program = Program::default();
        program.globals.push(Global {
            name: "str0".to_string(),
            kind: GlobalKind::Bytes(vec![1, 2, 3, 4, 5, 6, 7, 8, 9]),
            alignment: None,
        });
        let lines = render_globals(&program);
        assert_eq!(lines[0], "str0:");
        assert_eq!(lines[1], "    .byte 1, 2, 3, 4, 5, 6, 7, 8");
        assert_eq!(lines[2], "    .byte 9");
    }

    #[test]
    fn collects_import_directives_for_non_local_call_targets() {
        let program = Program::default();
        let lowered = vec![lowered_stub("f", vec!["CALL puts"])];
        let asm = render(&program, &lowered);
        assert!(asm.contains(".import puts"));
    }
}
