//! Key encoding - textual identifiers to CQL blob literals
//!
//! Row keys and column names in the object tables are blobs. Point lookups
//! and deletes embed them directly in the statement as `0x<hex>` literals.
//!
//! Examples:
//! - `encode_key("ab", false)` → `0x6162`
//! - `encode_key("virtual-network", true)` → hex of `virtual_network`

/// Prefix CQL uses for blob literals
pub const BLOB_LITERAL_PREFIX: &str = "0x";

/// Encode `text` as a CQL blob literal.
///
/// With `substitute_separator` set, hyphens become underscores before
/// encoding. Index rows are keyed by underscore-delimited type names while
/// references carry the hyphenated form.
pub fn encode_key(text: &str, substitute_separator: bool) -> String {
    let source = logical_key(text, substitute_separator);
    format!("{}{}", BLOB_LITERAL_PREFIX, hex::encode(source))
}

/// The text a key stands for once separator substitution is applied
pub fn logical_key(text: &str, substitute_separator: bool) -> String {
    if substitute_separator {
        text.replace('-', "_")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_plain() {
        assert_eq!(encode_key("ab", false), "0x6162");
        assert_eq!(encode_key("", false), "0x");
    }

    #[test]
    fn test_encode_keeps_hyphens_without_substitution() {
        assert_eq!(encode_key("a-b", false), "0x612d62");
    }

    #[test]
    fn test_substitution_matches_manual_replace() {
        for id in ["virtual-network", "3f2a-11ee-9c1b", "no_hyphen", "--", ""] {
            assert_eq!(encode_key(id, true), encode_key(&id.replace('-', "_"), false));
        }
    }

    #[test]
    fn test_encoding_is_injective_over_ascii() {
        let ids = ["a", "b", "ab", "ba", "a-b", "a_b", "0", "00"];
        let mut encoded: Vec<String> = ids.iter().map(|id| encode_key(id, false)).collect();
        encoded.sort();
        encoded.dedup();
        assert_eq!(encoded.len(), ids.len());
    }

    #[test]
    fn test_encode_utf8() {
        assert_eq!(encode_key("é", false), "0xc3a9");
    }

    #[test]
    fn test_encode_uses_lowercase_digits() {
        assert_eq!(encode_key("Z~:", false), "0x5a7e3a");
        assert_eq!(encode_key("backref:Foo:B", false), "0x6261636b7265663a466f6f3a42");
    }
}
