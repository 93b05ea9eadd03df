//! IR parser.
//!
//! Reads the source once, line by line, and builds a [`Program`]: function
//! signatures and their blocks of raw (normalized) instruction lines,
//! globals, and any `!DIFile`/`!DISubprogram`/`!DILocation` debug metadata.
//! Everything here is a hand-written scanner rather than a regex engine —
//! see the "tokenizer preferred for robustness" design direction this crate
//! follows: a tagged scan over each line instead of pattern re-matching.

use crate::error::CompileError;
use crate::ir::{Block, DebugFile, DebugSubprogram, DebugTable, Global, GlobalKind, Program};
use crate::normalize::normalize_line;
use crate::types::Type;
use std::collections::HashMap;

type Result<T> = std::result::Result<T, CompileError>;

/// Parses one translation unit.
pub struct Parser<'a> {
    lines: Vec<&'a str>,
    idx: usize,
    quoted_global_counter: u32,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Parser {
            lines: source.lines().collect(),
            idx: 0,
            quoted_global_counter: 0,
        }
    }

    pub fn parse(mut self) -> Result<Program> {
        let mut program = Program::default();
        let mut global_name_map: HashMap<String, String> = HashMap::new();
        let mut debug = DebugTable::default();
        let mut saw_debug = false;

        while self.idx < self.lines.len() {
            let raw = self.lines[self.idx];
            let trimmed = raw.trim();

            if trimmed.is_empty() || trimmed.starts_with(';') {
                self.idx += 1;
                continue;
            }

            if trimmed.starts_with('$') {
                // `$name = comdat any` — recognized and discarded.
                self.idx += 1;
                continue;
            }

            if trimmed.starts_with('@') {
                let global = parse_global_line(trimmed, &mut self.quoted_global_counter, &mut global_name_map)
                    .map_err(|message| CompileError::parse(None, trimmed, message))?;
                program.globals.push(global);
                self.idx += 1;
                continue;
            }

            if is_metadata_def_start(trimmed) {
                let (tag, kind, args) = self.consume_metadata_record()?;
                saw_debug = true;
                let kv = parse_kv_args(&args);
                match kind.as_str() {
                    "DIFile" => {
                        let filename = kv.get("filename").cloned().unwrap_or_default();
                        let directory = kv.get("directory").cloned().unwrap_or_default();
                        debug
                            .files
                            .insert(format!("!{}", tag), DebugFile { filename, directory });
                    }
                    "DISubprogram" => {
                        let name = kv.get("name").cloned().unwrap_or_default();
                        let file_tag = kv.get("file").cloned().unwrap_or_default();
                        let line = kv.get("line").and_then(|s| s.parse().ok()).unwrap_or(0);
                        let scope_line = kv.get("scopeLine").and_then(|s| s.parse().ok()).unwrap_or(line);
                        debug.subprograms.insert(
                            format!("!{}", tag),
                            DebugSubprogram {
                                name,
                                file_tag,
                                line,
                                scope_line,
                            },
                        );
                    }
                    "DILocation" => {
                        // Recognized so it doesn't fall through as an
                        // unsupported top-level line; no per-location
                        // record is retained downstream.
                    }
                    _ => {}
                }
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix("define") {
                if rest.is_empty() || rest.starts_with(|c: char| !c.is_whitespace()) {
                    // not actually a `define` keyword (e.g. an identifier
                    // that merely starts with it)
                    self.idx += 1;
                    continue;
                }
                let (return_type, name, parameters, subprogram) =
                    parse_function_header(trimmed).map_err(|message| CompileError::parse(None, trimmed, message))?;
                self.idx += 1;
                let blocks = self.parse_function_body(&name)?;
                program.functions.push(crate::ir::Function {
                    name,
                    return_type,
                    parameters,
                    blocks,
                    subprogram,
                });
                continue;
            }

            // Unrecognized top-level line (module ID comments, target
            // datalayout directives, etc.) — tolerated and skipped.
            self.idx += 1;
        }

        program.debug = if saw_debug { Some(debug) } else { None };
        program.global_name_map = global_name_map;
        Ok(program)
    }

    fn current_line(&self) -> &'a str {
        self.lines[self.idx]
    }

    fn at_end(&self) -> bool {
        self.idx >= self.lines.len()
    }

    /// Parse the body of one function: basic blocks of raw normalized
    /// instruction lines, up to the closing `}`.
    fn parse_function_body(&mut self, function_name: &str) -> Result<Vec<Block>> {
        let mut blocks: Vec<Block> = Vec::new();
        let mut label_seen: HashMap<String, ()> = HashMap::new();
        let mut closed = false;

        while self.idx < self.lines.len() {
            let raw = self.current_line();
            let trimmed = raw.trim();

            if trimmed.is_empty() || trimmed.starts_with(';') {
                self.idx += 1;
                continue;
            }

            if trimmed == "}" {
                closed = true;
                self.idx += 1;
                break;
            }

            if let Some(label) = parse_block_label(trimmed) {
                if label_seen.insert(label.to_string(), ()).is_some() {
                    return Err(CompileError::parse(
                        Some(function_name),
                        trimmed,
                        format!("duplicate block label `{}`", label),
                    ));
                }
                blocks.push(Block {
                    label: label.to_string(),
                    instructions: Vec::new(),
                });
                self.idx += 1;
                continue;
            }

            if blocks.is_empty() {
                // First block has an implicit `entry` label.
                if label_seen.insert("entry".to_string(), ()).is_some() {
                    unreachable!("entry cannot already be seen before any block exists");
                }
                blocks.push(Block {
                    label: "entry".to_string(),
                    instructions: Vec::new(),
                });
            }

            if let Some(normalized) = normalize_line(trimmed) {
                blocks.last_mut().unwrap().instructions.push(normalized);
            }
            self.idx += 1;
        }

        if !closed {
            return Err(CompileError::parse(
                Some(function_name),
                "<end of input>",
                "missing closing brace before end of file",
            ));
        }
        Ok(blocks)
    }

    /// Consume one `!N = [distinct] !Kind(...)` record, which may span
    /// several physical lines before its parentheses balance.
    fn consume_metadata_record(&mut self) -> Result<(String, String, String)> {
        let trimmed = self.current_line().trim();
        let (tag, after_eq) =
            parse_metadata_tag(trimmed).ok_or_else(|| CompileError::parse(None, trimmed, "malformed metadata record"))?;
        let after_eq = after_eq.strip_prefix("distinct").map(str::trim_start).unwrap_or(after_eq);
        let rest = after_eq
            .strip_prefix('!')
            .ok_or_else(|| CompileError::parse(None, trimmed, "malformed metadata record"))?;
        let kind_start = rest
            .find('(')
            .ok_or_else(|| CompileError::parse(None, trimmed, "malformed metadata record"))?;
        let kind = rest[..kind_start].trim().to_string();

        let mut buf = String::new();
        buf.push_str(&rest[kind_start..]);
        self.idx += 1;
        while paren_depth(&buf) > 0 {
            if self.at_end() {
                return Err(CompileError::parse(None, trimmed, "unterminated metadata record"));
            }
            buf.push(' ');
            buf.push_str(self.current_line().trim());
            self.idx += 1;
        }

        let open = buf.find('(').unwrap();
        let close = buf
            .rfind(')')
            .ok_or_else(|| CompileError::parse(None, trimmed, "unterminated metadata record"))?;
        let args = buf[open + 1..close].to_string();
        Ok((tag.to_string(), kind, args))
    }
}

fn parse_block_label(trimmed: &str) -> Option<&str> {
    let label = trimmed.strip_suffix(':')?;
    if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
        return None;
    }
    Some(label)
}

fn is_metadata_def_start(trimmed: &str) -> bool {
    let Some(rest) = trimmed.strip_prefix('!') else {
        return false;
    };
    rest.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn parse_metadata_tag(trimmed: &str) -> Option<(&str, &str)> {
    let rest = trimmed.strip_prefix('!')?;
    let end = rest.find(|c: char| !c.is_ascii_digit())?;
    if end == 0 {
        return None;
    }
    let tag = &rest[..end];
    let after = rest[end..].trim_start().strip_prefix('=')?.trim_start();
    Some((tag, after))
}

fn paren_depth(s: &str) -> i32 {
    let mut depth = 0i32;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
    }
    depth
}

fn split_top_level_commas(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut cur = String::new();
    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                cur.push(c);
            }
            '(' | '{' if !in_quotes => {
                depth += 1;
                cur.push(c);
            }
            ')' | '}' if !in_quotes => {
                depth -= 1;
                cur.push(c);
            }
            ',' if !in_quotes && depth == 0 => {
                parts.push(std::mem::take(&mut cur));
            }
            _ => cur.push(c),
        }
    }
    if !cur.trim().is_empty() {
        parts.push(cur);
    }
    parts
}

fn parse_kv_args(args: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for part in split_top_level_commas(args) {
        let part = part.trim();
        if let Some(colon) = part.find(':') {
            let key = part[..colon].trim().to_string();
            let mut value = part[colon + 1..].trim().to_string();
            if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                value = value[1..value.len() - 1].to_string();
            }
            map.insert(key, value);
        }
    }
    map
}

fn split_first_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    }
}

/// Parse a `@name`/`%name` or `@"quoted"`/`%"quoted"` token at the start of
/// `s`. Returns the unsigiled, unquoted name, whether it was quoted, and the
/// remainder of the string after the token.
fn parse_sigil_token(s: &str) -> Option<(String, bool, &str)> {
    let mut chars = s.char_indices();
    let (_, sigil) = chars.next()?;
    if sigil != '@' && sigil != '%' {
        return None;
    }
    let rest = &s[sigil.len_utf8()..];
    if let Some(after_quote) = rest.strip_prefix('"') {
        let end = after_quote.find('"')?;
        Some((after_quote[..end].to_string(), true, &after_quote[end + 1..]))
    } else {
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'))
            .unwrap_or(rest.len());
        Some((rest[..end].to_string(), false, &rest[end..]))
    }
}

fn is_plain_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn find_matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_param_list(s: &str) -> std::result::Result<Vec<(String, Type)>, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for piece in s.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let words: Vec<&str> = piece.split_whitespace().collect();
        if words.len() < 2 {
            return Err(format!("malformed parameter `{}`", piece));
        }
        let ty = Type::parse(words[0]).ok_or_else(|| format!("unsupported parameter type `{}`", words[0]))?;
        let name_tok = words[words.len() - 1];
        let name = name_tok
            .strip_prefix('%')
            .ok_or_else(|| format!("malformed parameter name `{}`", name_tok))?
            .to_string();
        out.push((name, ty));
    }
    if out.len() > 3 {
        return Err("function declares more than 3 parameters".to_string());
    }
    Ok(out)
}

/// Parse a `define ... { ` header line. Returns the return type, function
/// name, parameters, and the `!dbg !N` subprogram tag if present.
fn parse_function_header(
    line: &str,
) -> std::result::Result<(Type, String, Vec<(String, Type)>, Option<String>), String> {
    let rest = line.strip_prefix("define").ok_or("not a function definition")?;
    let mut rest = rest.trim_start();

    let return_type = loop {
        let (word, tail) = split_first_word(rest);
        if word.is_empty() {
            return Err("missing function return type".to_string());
        }
        if let Some(t) = Type::parse(word) {
            rest = tail.trim_start();
            break t;
        }
        rest = tail.trim_start();
    };

    if !rest.starts_with('@') {
        return Err("expected function name".to_string());
    }
    let (name, _quoted, after) = parse_sigil_token(rest).ok_or("malformed function name")?;
    let after = after.trim_start();
    if !after.starts_with('(') {
        return Err("expected parameter list".to_string());
    }
    let close = find_matching_paren(after).ok_or("unterminated parameter list")?;
    let params = parse_param_list(&after[1..close])?;

    let tail = after[close + 1..].trim();
    if !tail.ends_with('{') {
        return Err("missing opening brace".to_string());
    }
    let tail = tail[..tail.len() - 1].trim();

    let subprogram = tail.find("!dbg").map(|pos| {
        let after_dbg = tail[pos + 4..].trim_start();
        split_first_word(after_dbg).0.to_string()
    });

    Ok((return_type, name, params, subprogram))
}

fn parse_llvm_string_literal(body: &str) -> std::result::Result<Vec<u8>, String> {
    let bytes = body.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        if i + 2 >= bytes.len() {
            return Err(format!("bad string escape in c\"{}\"", body));
        }
        let hex = &body[i + 1..i + 3];
        let byte = u8::from_str_radix(hex, 16).map_err(|_| format!("bad string escape in c\"{}\"", body))?;
        out.push(byte);
        i += 3;
    }
    Ok(out)
}

fn parse_float_literal_to_bits(s: &str) -> std::result::Result<u32, String> {
    let s = s.trim();
    if s == "zeroinitializer" {
        return Ok(0);
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        let v = u64::from_str_radix(hex, 16).map_err(|_| format!("malformed float bit pattern `{}`", s))?;
        return Ok((v & 0xFFFF_FFFF) as u32);
    }
    let v: f32 = s.parse().map_err(|_| format!("malformed float literal `{}`", s))?;
    Ok(v.to_bits())
}

fn split_trailing_align(s: &str) -> (&str, Option<u32>) {
    let bytes = s.as_bytes();
    let mut in_quotes = false;
    let mut found_at = None;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b',' if !in_quotes => {
                let after = s[i + 1..].trim_start();
                if let Some(num) = after.strip_prefix("align") {
                    let num = num.trim_start();
                    if num.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                        found_at = Some(i);
                    }
                }
            }
            _ => {}
        }
    }
    match found_at {
        Some(idx) => {
            let align_str = s[idx + 1..].trim_start().strip_prefix("align").unwrap().trim();
            (s[..idx].trim_end(), align_str.parse::<u32>().ok())
        }
        None => (s, None),
    }
}

fn parse_global_body(name: String, rest: &str) -> std::result::Result<Global, String> {
    let (body, alignment) = split_trailing_align(rest);
    let body = body.trim();

    if let Some(after_bracket) = body.strip_prefix('[') {
        let close = after_bracket.find(']').ok_or("malformed array type")?;
        let inside = &after_bracket[..close];
        let mut parts = inside.splitn(2, 'x');
        let count: usize = parts
            .next()
            .unwrap_or("")
            .trim()
            .parse()
            .map_err(|_| "malformed array length".to_string())?;
        let elem = parts.next().unwrap_or("").trim();
        let tail = after_bracket[close + 1..].trim_start();

        if elem == "i8" {
            if let Some(lit) = tail.strip_prefix("c\"") {
                let end = lit.rfind('"').ok_or("unterminated string literal")?;
                let data = parse_llvm_string_literal(&lit[..end])?;
                return Ok(Global {
                    name,
                    kind: GlobalKind::Bytes(data),
                    alignment,
                });
            }
            if tail.trim() == "zeroinitializer" {
                return Ok(Global {
                    name,
                    kind: GlobalKind::Bytes(vec![0u8; count]),
                    alignment,
                });
            }
        } else if let Some(bits) = elem.strip_prefix('i').and_then(|b| b.parse::<u32>().ok()) {
            if tail.trim() == "zeroinitializer" && matches!(bits, 8 | 16 | 32) {
                let elem_size = (bits / 8) as usize;
                return Ok(Global {
                    name,
                    kind: GlobalKind::Bytes(vec![0u8; count * elem_size]),
                    alignment,
                });
            }
        }
        return Err(format!("unsupported array global initializer: {}", body));
    }

    let (ty_tok, tail) = split_first_word(body);
    if let Some(bits_str) = ty_tok.strip_prefix('i') {
        if let Ok(bits) = bits_str.parse::<u8>() {
            if matches!(bits, 8 | 16 | 32) {
                let value_str = tail.trim();
                let value = if value_str == "zeroinitializer" {
                    0
                } else {
                    value_str
                        .parse::<i64>()
                        .map_err(|_| format!("malformed integer literal `{}`", value_str))?
                };
                return Ok(Global {
                    name,
                    kind: GlobalKind::Int { bits, value },
                    alignment,
                });
            }
        }
    }
    if ty_tok == "float" {
        let bits = parse_float_literal_to_bits(tail.trim())?;
        return Ok(Global {
            name,
            kind: GlobalKind::Float { bits },
            alignment,
        });
    }
    Err(format!("unsupported global definition: {}", body))
}

fn parse_global_line(
    line: &str,
    quoted_counter: &mut u32,
    global_name_map: &mut HashMap<String, String>,
) -> std::result::Result<Global, String> {
    let (raw_name, was_quoted, after) = parse_sigil_token(line).ok_or("malformed global name")?;
    let after = after.trim_start();
    let after = after.strip_prefix('=').ok_or("expected `=` in global definition")?.trim_start();

    let mut rest = after;
    let kind_word = loop {
        let (word, tail) = split_first_word(rest);
        if word.is_empty() {
            return Err("malformed global definition".to_string());
        }
        if word == "constant" || word == "global" {
            rest = tail.trim_start();
            break word;
        }
        rest = tail.trim_start();
    };
    let _ = kind_word; // constant vs. global only affects writability, not our data model

    let name = if was_quoted || !is_plain_identifier(&raw_name) {
        let mangled = format!("__hsx_quoted_global_{}", *quoted_counter);
        *quoted_counter += 1;
        global_name_map.insert(raw_name, mangled.clone());
        mangled
    } else {
        raw_name
    };

    parse_global_body(name, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::GlobalKind;

    #[test]
    fn parses_identity_function_with_implicit_entry_block() {
        let source = "define i32 @f(i32 %x) { entry: ret i32 %x }";
        let program = Parser::new(source).parse().unwrap();
        assert_eq!(program.functions.len(), 1);
        let f = &program.functions[0];
        assert_eq!(f.name, "f");
        assert_eq!(f.blocks.len(), 1);
        assert_eq!(f.blocks[0].label, "entry");
        assert_eq!(f.blocks[0].instructions, vec!["ret i32 %x"]);
    }

    #[test]
    fn defaults_first_block_to_entry_when_unlabeled() {
        let source = "define void @g() {\nret void\n}";
        let program = Parser::new(source).parse().unwrap();
        assert_eq!(program.functions[0].blocks[0].label, "entry");
    }

    #[test]
    fn rejects_duplicate_labels() {
        let source = "define void @g() {\nentry:\nret void\nentry:\nret void\n}";
        let err = Parser::new(source).parse().unwrap_err();
        assert!(matches!(err, CompileError::Parse { .. }));
    }

    #[test]
    fn rejects_missing_closing_brace() {
        let source = "define void @g() {\nret void\n";
        let err = Parser::new(source).parse().unwrap_err();
        assert!(matches!(err, CompileError::Parse { .. }));
    }

    #[test]
    fn parses_byte_array_global_with_escapes() {
        let source = r#"@msg = constant [3 x i8] c"OK\00", align 1"#;
        let program = Parser::new(source).parse().unwrap();
        let g = &program.globals[0];
        assert_eq!(g.name, "msg");
        assert_eq!(g.alignment, Some(1));
        assert_eq!(g.kind, GlobalKind::Bytes(vec![0x4F, 0x4B, 0x00]));
    }

    #[test]
    fn parses_int_and_float_globals() {
        let source = "@count = global i32 7\n@pi = global float 0x400921FB60000000\n";
        let program = Parser::new(source).parse().unwrap();
        assert_eq!(program.globals[0].kind, GlobalKind::Int { bits: 32, value: 7 });
        match program.globals[1].kind {
            GlobalKind::Float { bits } => assert_eq!(bits, 0x6000_0000),
            _ => panic!("expected float global"),
        }
    }

    #[test]
    fn mangles_quoted_global_names_deterministically() {
        let source = "@\"weird name\" = constant [1 x i8] c\"\\00\"\n@\"another\" = constant [1 x i8] c\"\\00\"\n";
        let program = Parser::new(source).parse().unwrap();
        assert_eq!(program.globals[0].name, "__hsx_quoted_global_0");
        assert_eq!(program.globals[1].name, "__hsx_quoted_global_1");
    }

    #[test]
    fn captures_debug_metadata_and_function_subprogram_tag() {
        let source = concat!(
            "define dso_local i32 @foo() !dbg !10 {\n",
            "entry:\n",
            "ret i32 0, !dbg !11\n",
            "}\n",
            "!10 = distinct !DISubprogram(name: \"foo\", file: !12, line: 5, scopeLine: 5)\n",
            "!12 = !DIFile(filename: \"sample.c\", directory: \"/tmp/project\")\n",
            "!11 = !DILocation(line: 6, column: 3, scope: !10)\n",
        );
        let program = Parser::new(source).parse().unwrap();
        assert_eq!(program.functions[0].subprogram.as_deref(), Some("!10"));
        let debug = program.debug.unwrap();
        assert_eq!(debug.files["!12"].filename, "sample.c");
        assert_eq!(debug.files["!12"].directory, "/tmp/project");
        assert_eq!(debug.subprograms["!10"].name, "foo");
        assert_eq!(debug.subprograms["!10"].file_tag, "!12");
        assert_eq!(debug.subprograms["!10"].line, 5);
    }

    #[test]
    fn rejects_function_with_too_many_parameters() {
        let source = "define i32 @f(i32 %a, i32 %b, i32 %c, i32 %d) { ret i32 0 }";
        let err = Parser::new(source).parse().unwrap_err();
        assert!(matches!(err, CompileError::Parse { .. }));
    }
}
