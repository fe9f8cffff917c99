// ── Value codec ──
//
// Logical values <-> CWMP wire strings. Inversion is applied here on
// both directions so no caller special-cases "hidden" vs "advertised".
// Decoding never fails: undecodable numbers become a sentinel plus a
// warning. Encoding is strict and reports `CodecError`.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::model::Scalar;

// ── Wire types ──────────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum WireType {
    #[strum(serialize = "xsd:boolean")]
    #[serde(rename = "xsd:boolean")]
    Boolean,
    #[strum(serialize = "xsd:int")]
    #[serde(rename = "xsd:int")]
    Int,
    #[strum(serialize = "xsd:unsignedInt")]
    #[serde(rename = "xsd:unsignedInt")]
    UnsignedInt,
    #[strum(serialize = "xsd:long")]
    #[serde(rename = "xsd:long")]
    Long,
    #[strum(serialize = "xsd:unsignedLong")]
    #[serde(rename = "xsd:unsignedLong")]
    UnsignedLong,
    #[strum(serialize = "xsd:string")]
    #[serde(rename = "xsd:string")]
    String,
    #[strum(serialize = "xsd:dateTime")]
    #[serde(rename = "xsd:dateTime")]
    DateTime,
}

impl WireType {
    /// Parse a device-reported tag; anything unrecognised is treated as a string.
    pub fn from_tag(tag: &str) -> Self {
        tag.parse().unwrap_or(Self::String)
    }

    pub fn as_tag(self) -> &'static str {
        self.into()
    }

    fn integer_bounds(self) -> Option<(i128, i128)> {
        match self {
            Self::Int => Some((i128::from(i32::MIN), i128::from(i32::MAX))),
            Self::UnsignedInt => Some((0, i128::from(u32::MAX))),
            Self::Long => Some((i128::from(i64::MIN), i128::from(i64::MAX))),
            Self::UnsignedLong => Some((0, i128::from(u64::MAX))),
            Self::Boolean | Self::String | Self::DateTime => None,
        }
    }

    fn is_signed(self) -> bool {
        matches!(self, Self::Int | Self::Long)
    }
}

// ── Value spec ──────────────────────────────────────────────────────

/// How a logical key's value travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSpec {
    pub wire_type: WireType,
    /// The logical boolean is the negation of the wire field.
    #[serde(default)]
    pub inverted: bool,
    /// Enumerated keys accept only these wire strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

impl ValueSpec {
    pub fn new(wire_type: WireType) -> Self {
        Self {
            wire_type,
            inverted: false,
            allowed: None,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    pub fn one_of(mut self, allowed: &[&str]) -> Self {
        self.allowed = Some(allowed.iter().map(|s| (*s).to_owned()).collect());
        self
    }
}

// ── Errors and warnings ─────────────────────────────────────────────

/// Encoding failure. Never retryable: the input has to change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("{value:?} is not a valid {wire_type}")]
    Invalid { value: String, wire_type: WireType },

    #[error("{value} is out of range for {wire_type}")]
    OutOfRange { value: String, wire_type: WireType },

    #[error("{value:?} is not one of: {}", .allowed.join(", "))]
    NotAllowed { value: String, allowed: Vec<String> },
}

/// A decode that fell back to a sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodecWarning {
    pub raw: String,
    pub wire_type: WireType,
    pub message: String,
}

/// Result of decoding one wire value.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: Scalar,
    pub warning: Option<CodecWarning>,
}

impl Decoded {
    fn ok(value: Scalar) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    fn fallback(value: Scalar, raw: &Scalar, wire_type: WireType, message: &str) -> Self {
        Self {
            value,
            warning: Some(CodecWarning {
                raw: raw.to_string(),
                wire_type,
                message: message.to_owned(),
            }),
        }
    }
}

// ── Primitive parsing ───────────────────────────────────────────────

fn parse_bool(raw: &Scalar) -> Option<bool> {
    match raw {
        Scalar::Bool(b) => Some(*b),
        Scalar::Int(0) | Scalar::UInt(0) => Some(false),
        Scalar::Int(1) | Scalar::UInt(1) => Some(true),
        Scalar::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Integer view of a scalar, or `None` if it is not a whole number.
fn parse_integer(raw: &Scalar) -> Option<i128> {
    match raw {
        Scalar::Int(i) => Some(i128::from(*i)),
        Scalar::UInt(u) => Some(i128::from(*u)),
        // `6.0` displays as "6"; fractional values fail to parse.
        Scalar::Float(x) => x.to_string().parse().ok(),
        Scalar::Text(s) => s.trim().parse().ok(),
        Scalar::Bool(_) | Scalar::Null => None,
    }
}

fn integer_scalar(value: i128, wire_type: WireType) -> Scalar {
    if wire_type.is_signed() {
        i64::try_from(value).map_or(Scalar::Int(0), Scalar::Int)
    } else {
        u64::try_from(value).map_or(Scalar::UInt(0), Scalar::UInt)
    }
}

fn integer_sentinel(wire_type: WireType) -> Scalar {
    integer_scalar(0, wire_type)
}

// ── Encode ──────────────────────────────────────────────────────────

/// Encode a logical value as the wire string for `spec`.
pub fn to_wire(value: &Scalar, spec: &ValueSpec) -> Result<String, CodecError> {
    let wire_type = spec.wire_type;
    let invalid = || CodecError::Invalid {
        value: value.to_string(),
        wire_type,
    };

    let wire = match wire_type {
        WireType::Boolean => {
            let b = parse_bool(value).ok_or_else(invalid)?;
            (b ^ spec.inverted).to_string()
        }
        WireType::Int | WireType::UnsignedInt | WireType::Long | WireType::UnsignedLong => {
            let n = parse_integer(value).ok_or_else(invalid)?;
            let (min, max) = wire_type.integer_bounds().ok_or_else(invalid)?;
            if n < min || n > max {
                return Err(CodecError::OutOfRange {
                    value: n.to_string(),
                    wire_type,
                });
            }
            n.to_string()
        }
        WireType::String => value.to_string(),
        WireType::DateTime => {
            let text = value.to_string();
            DateTime::parse_from_rfc3339(text.trim()).map_err(|_| invalid())?;
            text.trim().to_owned()
        }
    };

    if let Some(allowed) = &spec.allowed {
        if !allowed.iter().any(|a| a == &wire) {
            return Err(CodecError::NotAllowed {
                value: wire,
                allowed: allowed.clone(),
            });
        }
    }
    Ok(wire)
}

// ── Decode ──────────────────────────────────────────────────────────

/// Decode a wire value into its logical form.
pub fn from_wire(raw: &Scalar, spec: &ValueSpec) -> Decoded {
    let wire_type = spec.wire_type;
    match wire_type {
        WireType::String | WireType::DateTime => match raw {
            Scalar::Null => Decoded::ok(Scalar::Null),
            other => Decoded::ok(Scalar::Text(other.to_string())),
        },
        _ if raw.is_empty() => Decoded::ok(Scalar::Null),
        WireType::Boolean => match parse_bool(raw) {
            Some(b) => Decoded::ok(Scalar::Bool(b ^ spec.inverted)),
            None => Decoded::fallback(Scalar::Null, raw, wire_type, "not a boolean"),
        },
        WireType::Int | WireType::UnsignedInt | WireType::Long | WireType::UnsignedLong => {
            let bounds = wire_type.integer_bounds();
            match (parse_integer(raw), bounds) {
                (Some(n), Some((min, max))) if n >= min && n <= max => {
                    Decoded::ok(integer_scalar(n, wire_type))
                }
                (Some(_), _) => Decoded::fallback(
                    integer_sentinel(wire_type),
                    raw,
                    wire_type,
                    "out of range",
                ),
                (None, _) => Decoded::fallback(
                    integer_sentinel(wire_type),
                    raw,
                    wire_type,
                    "not an integer",
                ),
            }
        }
    }
}

/// Parse operator input (always text) into the logical value for `spec`.
///
/// Booleans and integers are typed; everything else stays text.
pub fn parse_input(input: &str, spec: &ValueSpec) -> Result<Scalar, CodecError> {
    let text = Scalar::from(input);
    match spec.wire_type {
        WireType::Boolean => parse_bool(&text)
            .map(Scalar::Bool)
            .ok_or_else(|| CodecError::Invalid {
                value: input.to_owned(),
                wire_type: spec.wire_type,
            }),
        WireType::Int | WireType::UnsignedInt | WireType::Long | WireType::UnsignedLong => {
            to_wire(&text, spec)?;
            Ok(from_wire(&text, spec).value)
        }
        WireType::String | WireType::DateTime => Ok(text),
    }
}

/// Canonical wire string for a value observed on the device.
///
/// Used to compare what the device reports against what was written
/// without tripping over `"1"` vs `"true"` or `"06"` vs `"6"`.
pub fn canonical_wire(observed: &Scalar, wire_type: WireType) -> String {
    match wire_type {
        WireType::Boolean => {
            parse_bool(observed).map_or_else(|| observed.to_string(), |b| b.to_string())
        }
        WireType::Int | WireType::UnsignedInt | WireType::Long | WireType::UnsignedLong => {
            parse_integer(observed).map_or_else(|| observed.to_string(), |n| n.to_string())
        }
        WireType::String | WireType::DateTime => observed.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn spec(wire_type: WireType) -> ValueSpec {
        ValueSpec::new(wire_type)
    }

    #[test]
    fn unknown_tags_decode_as_string() {
        assert_eq!(WireType::from_tag("xsd:unsignedInt"), WireType::UnsignedInt);
        assert_eq!(WireType::from_tag("xsd:base64"), WireType::String);
        assert_eq!(WireType::Boolean.as_tag(), "xsd:boolean");
    }

    #[test]
    fn boolean_accepts_numeric_forms_and_emits_canonical() {
        let s = spec(WireType::Boolean);
        assert_eq!(to_wire(&Scalar::from("1"), &s).unwrap(), "true");
        assert_eq!(to_wire(&Scalar::from("FALSE"), &s).unwrap(), "false");
        assert_eq!(from_wire(&Scalar::from("0"), &s).value, Scalar::Bool(false));
        assert_eq!(from_wire(&Scalar::Bool(true), &s).value, Scalar::Bool(true));
    }

    #[test]
    fn inversion_applies_both_ways() {
        let hidden = spec(WireType::Boolean).inverted();
        assert_eq!(to_wire(&Scalar::Bool(true), &hidden).unwrap(), "false");
        assert_eq!(from_wire(&Scalar::Bool(true), &hidden).value, Scalar::Bool(false));
    }

    #[test]
    fn integer_decode_failure_yields_sentinel_and_warning() {
        let decoded = from_wire(&Scalar::from("auto"), &spec(WireType::UnsignedInt));
        assert_eq!(decoded.value, Scalar::UInt(0));
        let warning = decoded.warning.unwrap();
        assert_eq!(warning.raw, "auto");
        assert_eq!(warning.wire_type, WireType::UnsignedInt);
    }

    #[test]
    fn unsigned_rejects_negative_on_encode() {
        let err = to_wire(&Scalar::Int(-1), &spec(WireType::UnsignedInt)).unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { .. }));
    }

    #[test]
    fn int_range_is_thirty_two_bits() {
        assert!(to_wire(&Scalar::Int(i64::from(i32::MAX) + 1), &spec(WireType::Int)).is_err());
        let wide = Scalar::Int(i64::from(i32::MAX) + 1);
        assert_eq!(to_wire(&wide, &spec(WireType::Long)).unwrap(), "2147483648");
    }

    #[test]
    fn enumerated_values_are_checked() {
        let band = spec(WireType::String).one_of(&["20MHz", "40MHz", "80MHz", "Auto"]);
        assert_eq!(to_wire(&Scalar::from("40MHz"), &band).unwrap(), "40MHz");
        let err = to_wire(&Scalar::from("160MHz"), &band).unwrap_err();
        assert!(err.to_string().contains("20MHz, 40MHz"));
    }

    #[test]
    fn datetime_must_be_rfc3339() {
        let s = spec(WireType::DateTime);
        assert!(to_wire(&Scalar::from("2024-06-15T10:30:00Z"), &s).is_ok());
        assert!(to_wire(&Scalar::from("yesterday"), &s).is_err());
    }

    #[test]
    fn empty_numeric_decodes_to_null_without_warning() {
        let decoded = from_wire(&Scalar::from(""), &spec(WireType::UnsignedInt));
        assert_eq!(decoded, Decoded::ok(Scalar::Null));
    }

    #[test]
    fn canonical_wire_normalizes_observed_values() {
        assert_eq!(canonical_wire(&Scalar::from("1"), WireType::Boolean), "true");
        assert_eq!(canonical_wire(&Scalar::Bool(false), WireType::Boolean), "false");
        assert_eq!(canonical_wire(&Scalar::from("06"), WireType::UnsignedInt), "6");
        assert_eq!(canonical_wire(&Scalar::Int(6), WireType::UnsignedInt), "6");
        assert_eq!(canonical_wire(&Scalar::from("Home"), WireType::String), "Home");
    }

    #[test]
    fn parse_input_types_operator_text() {
        assert_eq!(parse_input("yes", &spec(WireType::Boolean)).ok(), None);
        assert_eq!(parse_input("true", &spec(WireType::Boolean)).unwrap(), Scalar::Bool(true));
        assert_eq!(parse_input("11", &spec(WireType::UnsignedInt)).unwrap(), Scalar::UInt(11));
        assert_eq!(parse_input("-3", &spec(WireType::Int)).unwrap(), Scalar::Int(-3));
        assert!(parse_input("-3", &spec(WireType::UnsignedInt)).is_err());
        assert_eq!(parse_input("Casa", &spec(WireType::String)).unwrap(), Scalar::from("Casa"));
    }

    // ── Round-trip properties ───────────────────────────────────────

    fn round_trip(value: &Scalar, spec: &ValueSpec) -> Scalar {
        let wire = to_wire(value, spec).unwrap();
        from_wire(&Scalar::Text(wire), spec).value
    }

    proptest! {
        #[test]
        fn booleans_round_trip(b in any::<bool>(), inverted in any::<bool>()) {
            let mut s = spec(WireType::Boolean);
            s.inverted = inverted;
            prop_assert_eq!(round_trip(&Scalar::Bool(b), &s), Scalar::Bool(b));
        }

        #[test]
        fn ints_round_trip(n in any::<i32>()) {
            let v = Scalar::Int(i64::from(n));
            prop_assert_eq!(round_trip(&v, &spec(WireType::Int)), v);
        }

        #[test]
        fn longs_round_trip(n in any::<i64>()) {
            let v = Scalar::Int(n);
            prop_assert_eq!(round_trip(&v, &spec(WireType::Long)), v);
        }

        #[test]
        fn unsigned_round_trip(n in any::<u32>(), m in any::<u64>()) {
            let v = Scalar::UInt(u64::from(n));
            prop_assert_eq!(round_trip(&v, &spec(WireType::UnsignedInt)), v);
            let w = Scalar::UInt(m);
            prop_assert_eq!(round_trip(&w, &spec(WireType::UnsignedLong)), w);
        }

        #[test]
        fn strings_round_trip(s in "\\PC*") {
            let v = Scalar::Text(s);
            prop_assert_eq!(round_trip(&v, &spec(WireType::String)), v);
        }
    }
}
