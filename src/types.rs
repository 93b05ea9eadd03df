//! Type system helpers.
//!
//! Every IR type the parser accepts is classified into one of the closed
//! [`Type`] kinds, and every kind collapses further into one of three
//! [`WidthClass`]es that drive load/store opcode and data-directive
//! selection (§4.3 of the lowering contract this crate implements).

/// Closed set of value kinds the selector understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    I1,
    I8,
    I16,
    I32,
    Half,
    Float,
    Ptr,
}

/// Width class used to pick load/store opcodes and data directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthClass {
    Byte,
    Half,
    Word,
}

impl Type {
    /// Parse a leading IR type token, e.g. `"i32"`, `"half"`, `"ptr"`.
    /// Returns `None` for anything outside the supported subset.
    pub fn parse(token: &str) -> Option<Type> {
        match token {
            "void" => Some(Type::Void),
            "i1" => Some(Type::I1),
            "i8" => Some(Type::I8),
            "i16" => Some(Type::I16),
            "i32" => Some(Type::I32),
            "half" => Some(Type::Half),
            "float" => Some(Type::Float),
            "ptr" => Some(Type::Ptr),
            _ => None,
        }
    }

    pub fn width_class(&self) -> WidthClass {
        match self {
            Type::I1 | Type::I8 => WidthClass::Byte,
            Type::I16 | Type::Half => WidthClass::Half,
            Type::I32 | Type::Float | Type::Ptr => WidthClass::Word,
            Type::Void => WidthClass::Word,
        }
    }

    /// Size in bytes, used for `alloca`/spill-slot sizing and GEP strides.
    pub fn size_bytes(&self) -> u32 {
        match self.width_class() {
            WidthClass::Byte => 1,
            WidthClass::Half => 2,
            WidthClass::Word => 4,
        }
    }

    pub fn load_op(&self) -> &'static str {
        match self.width_class() {
            WidthClass::Byte => "LDB",
            WidthClass::Half => "LDH",
            WidthClass::Word => "LD",
        }
    }

    pub fn store_op(&self) -> &'static str {
        match self.width_class() {
            WidthClass::Byte => "STB",
            WidthClass::Half => "STH",
            WidthClass::Word => "ST",
        }
    }

    pub fn data_directive(&self) -> &'static str {
        match self.width_class() {
            WidthClass::Byte => ".byte",
            WidthClass::Half => ".half",
            WidthClass::Word => ".word",
        }
    }

    pub fn is_float_like(&self) -> bool {
        matches!(self, Type::Half | Type::Float)
    }
}

/// Pointee element-type stride for GEP address arithmetic; parses the same
/// subset plus the two index-only forms `i64`/`i32` that only ever appear as
/// the *index* type, never as the element type.
pub fn element_stride(elem_type: &str) -> Option<u32> {
    Type::parse(elem_type).map(|t| t.size_bytes()).or(match elem_type {
        "i64" => Some(8),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_byte_half_word() {
        assert_eq!(Type::I1.width_class(), WidthClass::Byte);
        assert_eq!(Type::I8.width_class(), WidthClass::Byte);
        assert_eq!(Type::I16.width_class(), WidthClass::Half);
        assert_eq!(Type::Half.width_class(), WidthClass::Half);
        assert_eq!(Type::I32.width_class(), WidthClass::Word);
        assert_eq!(Type::Float.width_class(), WidthClass::Word);
        assert_eq!(Type::Ptr.width_class(), WidthClass::Word);
    }

    #[test]
    fn load_store_directive_tables_agree_with_width_class() {
        assert_eq!(Type::I8.load_op(), "LDB");
        assert_eq!(Type::I16.store_op(), "STH");
        assert_eq!(Type::I32.data_directive(), ".word");
    }

    #[test]
    fn parse_rejects_unsupported_tokens() {
        assert_eq!(Type::parse("i64"), None);
        assert_eq!(Type::parse("double"), None);
        assert_eq!(Type::parse("i32"), Some(Type::I32));
    }
}
