use serde::Serialize;

use crate::error::ClawError;

/// Serialize `value` to canonical JSON: object keys sorted lexicographically
/// at every level, no whitespace, integers as integers, absent optional
/// fields omitted entirely.
///
/// Sorting falls out of routing through `serde_json::Value`, whose object map
/// is ordered by key (the `preserve_order` feature must never be enabled in
/// this workspace). Every digest and signature in the protocol is computed
/// over bytes produced here, so this function is the bit-compatibility
/// boundary.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, ClawError> {
    let v = serde_json::to_value(value).map_err(|e| ClawError::Serialization(e.to_string()))?;
    Ok(v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Zyx {
        zeta: u64,
        alpha: &'static str,
        mid: Option<u64>,
    }

    #[test]
    fn keys_sorted_and_compact() {
        let s = to_canonical_json(&Zyx { zeta: 7, alpha: "x", mid: Some(3) }).unwrap();
        assert_eq!(s, r#"{"alpha":"x","mid":3,"zeta":7}"#);
    }

    #[test]
    fn invariant_under_declaration_order() {
        #[derive(Serialize)]
        struct Reordered {
            mid: Option<u64>,
            alpha: &'static str,
            zeta: u64,
        }
        let a = to_canonical_json(&Zyx { zeta: 7, alpha: "x", mid: Some(3) }).unwrap();
        let b = to_canonical_json(&Reordered { mid: Some(3), alpha: "x", zeta: 7 }).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn nested_objects_sorted() {
        let v = serde_json::json!({"b": {"d": 1, "c": 2}, "a": 0});
        assert_eq!(v.to_string(), r#"{"a":0,"b":{"c":2,"d":1}}"#);
    }
}
