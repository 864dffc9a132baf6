//! Canonical Serializer - Fixed Key Order, Fixed Escaping
//!
//! Key order comes from struct field declaration order. Escaping:
//! `\` `"` LF CR TAB are escaped, every other byte below 0x20 is dropped,
//! everything else passes through. Output is compact.

use serde::ser::Error as _;
use serde::Serialize;
use serde_json::ser::{CharEscape, Formatter, Serializer};
use std::io;

use crate::scene::ScenePlan;

/// Compact JSON formatter with the lossy control-byte escaping rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn write_char_escape<W>(&mut self, writer: &mut W, char_escape: CharEscape) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let escaped: &[u8] = match char_escape {
            CharEscape::Quote => b"\\\"",
            CharEscape::ReverseSolidus => b"\\\\",
            CharEscape::LineFeed => b"\\n",
            CharEscape::CarriageReturn => b"\\r",
            CharEscape::Tab => b"\\t",
            // backspace, form feed and the remaining C0 bytes
            _ => return Ok(()),
        };
        writer.write_all(escaped)
    }
}

/// Serialize any value with the canonical formatter.
pub fn to_canonical_json<T>(value: &T) -> Result<String, serde_json::Error>
where
    T: ?Sized + Serialize,
{
    let mut buf = Vec::with_capacity(1024);
    let mut ser = Serializer::with_formatter(&mut buf, CanonicalFormatter);
    value.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(serde_json::Error::custom)
}

/// Render the JSON control spec for a plan.
pub fn serialize_scene_plan(plan: &ScenePlan) -> Result<String, serde_json::Error> {
    to_canonical_json(plan)
}

impl ScenePlan {
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serialize_scene_plan(self)
    }
}
