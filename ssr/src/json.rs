// This is slightly modified version of formatter taken from
// https://github.com/xd009642/tarpaulin/blob/fd7059131cf7f838a68e681a9ddeefb26a8adf7c/src/report/safe_json.rs
// All copyrights belong to the author of this implementation.

//! JSON output that can be embedded into an inline `<script>` block.
//!
//! Strings are written with `<`, `>` and `&` turned into `\u003c`, `\u003e`
//! and `\u0026`, so a value can never close the surrounding tag.

use std::io;

use serde::{ser::Error as _, Serialize};
use serde_json::{
    ser::{CharEscape, CompactFormatter, Formatter},
    Serializer,
};

struct ScriptSafeFormatter(CompactFormatter);

impl Default for ScriptSafeFormatter {
    fn default() -> Self {
        ScriptSafeFormatter(CompactFormatter)
    }
}

impl Formatter for ScriptSafeFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (idx, char) in fragment.char_indices() {
            if !matches!(char, '<' | '>' | '&') {
                continue;
            }
            if start < idx {
                self.0
                    .write_string_fragment(writer, &fragment[start..idx])?;
            }
            self.0
                .write_char_escape(writer, CharEscape::AsciiControl(char as u8))?;
            start = idx + 1;
        }

        if start < fragment.len() {
            self.0.write_string_fragment(writer, &fragment[start..])?;
        }

        Ok(())
    }
}

pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut writer = Vec::new();
    let mut ser = Serializer::with_formatter(&mut writer, ScriptSafeFormatter::default());
    value.serialize(&mut ser)?;
    Ok(writer)
}

pub fn to_string<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let bytes = to_vec(value)?;
    String::from_utf8(bytes).map_err(serde_json::Error::custom)
}
