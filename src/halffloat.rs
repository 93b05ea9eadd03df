//! Compile-time float-to-half-precision conversion for literal operands of
//! the fp16 conversion intrinsics.

/// Parse a literal float token into its 16-bit half-precision bit pattern.
/// Accepts a direct bit pattern via the `0xH` prefix, an ordinary float
/// literal (with an optional trailing `f`/`F`), or anything `f32` parses.
pub fn float_literal_to_half_bits(token: &str) -> Result<u32, String> {
    let token = token.trim();
    if let Some(hex) = token.strip_prefix("0xH").or_else(|| token.strip_prefix("0xh")) {
        let bits = u16::from_str_radix(hex, 16).map_err(|_| format!("malformed half bit-pattern literal `{}`", token))?;
        return Ok(bits as u32);
    }
    let stripped = token.strip_suffix(['f', 'F']).unwrap_or(token);
    let value: f32 = stripped.parse().map_err(|_| format!("malformed float literal `{}`", token))?;
    Ok(f32_to_f16_bits(value) as u32)
}

/// Truncating (not round-to-nearest-even) single-to-half conversion.
fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xFF) as i32 - 127 + 15;
    let mantissa = bits & 0x7FFFFF;

    if exp <= 0 {
        if exp < -10 {
            return sign;
        }
        let mantissa = mantissa | 0x0080_0000;
        let shift = (14 - exp) as u32;
        return sign | (mantissa >> shift) as u16;
    }
    if exp >= 0x1F {
        return if mantissa != 0 {
            sign | 0x7C00 | 0x0200
        } else {
            sign | 0x7C00
        };
    }
    sign | ((exp as u16) << 10) | (mantissa >> 13) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_common_float_literals() {
        assert_eq!(float_literal_to_half_bits("0.0").unwrap(), 0x0000);
        assert_eq!(float_literal_to_half_bits("1.0").unwrap(), 0x3C00);
        assert_eq!(float_literal_to_half_bits("-2.0").unwrap(), 0xC000);
    }

    #[test]
    fn accepts_trailing_f_suffix_and_direct_bit_pattern() {
        assert_eq!(float_literal_to_half_bits("1.0f").unwrap(), 0x3C00);
        assert_eq!(float_literal_to_half_bits("0xH3C00").unwrap(), 0x3C00);
    }

    #[test]
    fn rejects_unparseable_literal() {
        assert!(float_literal_to_half_bits("not-a-number").is_err());
    }
}
