//! In-memory program representation produced by the parser.
//!
//! This is the root value the rest of the pipeline operates on: an ordered
//! list of functions (each an ordered list of basic blocks holding raw,
//! normalized instruction lines) and an ordered list of globals, plus
//! whatever debug metadata was present.

use crate::types::Type;
use std::collections::HashMap;

/// A parsed compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
    pub debug: Option<DebugTable>,
    /// Maps a raw source global name (e.g. a quoted identifier) to the
    /// mangled symbol it was given in `globals`. Unquoted, already-plain
    /// names map to themselves. Instruction-text lowering looks references
    /// up here before emitting a symbol operand.
    pub global_name_map: HashMap<String, String>,
}

impl Program {
    /// The locally defined function named `main`, if any — the entry symbol.
    pub fn entry_function(&self) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == "main")
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub return_type: Type,
    /// Up to three parameters, bound to A0/A1/A2 in order.
    pub parameters: Vec<(String, Type)>,
    pub blocks: Vec<Block>,
    /// `!DISubprogram` tag this function was annotated with, if debug
    /// metadata was present in the source.
    pub subprogram: Option<String>,
}

/// A basic block. `label` is the name as written in the source; callers
/// rename it to `<function>__<label>` for emission (§3, global uniqueness).
#[derive(Debug, Clone)]
pub struct Block {
    pub label: String,
    /// Raw, normalized instruction lines, unparsed. PHI lines have already
    /// been pulled out by the PHI pre-scan before lowering reaches a block.
    pub instructions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlobalKind {
    /// Byte array initializer, e.g. a C-string literal or a zeroed array.
    Bytes(Vec<u8>),
    /// `iW` scalar with `W` in {8, 16, 32}.
    Int { bits: u8, value: i64 },
    /// 32-bit float, stored as its IEEE-754 bit pattern.
    Float { bits: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    pub kind: GlobalKind,
    pub alignment: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebugFile {
    pub filename: String,
    pub directory: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebugSubprogram {
    pub name: String,
    pub file_tag: String,
    pub line: u32,
    pub scope_line: u32,
}

/// Metadata tables keyed by the `!N` tag they were declared under.
#[derive(Debug, Clone, Default)]
pub struct DebugTable {
    pub files: HashMap<String, DebugFile>,
    pub subprograms: HashMap<String, DebugSubprogram>,
}
