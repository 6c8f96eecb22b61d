//! Text encodings selectable by the table header.
//!
//! | selector | encoding |
//! |---|---|
//! | 0 | Shift-JIS |
//! | 1 | UTF-8 |

use encoding_rs::{SHIFT_JIS, UTF_8};
use serde::{Deserialize, Serialize};

pub const SELECTOR_SHIFT_JIS: u8 = 0;
pub const SELECTOR_UTF8:      u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    #[default]
    ShiftJis,
    Utf8,
}

impl TextEncoding {
    pub fn from_selector(selector: u8) -> Option<Self> {
        match selector {
            SELECTOR_SHIFT_JIS => Some(TextEncoding::ShiftJis),
            SELECTOR_UTF8      => Some(TextEncoding::Utf8),
            _                  => None,
        }
    }

    pub fn selector(self) -> u8 {
        match self {
            TextEncoding::ShiftJis => SELECTOR_SHIFT_JIS,
            TextEncoding::Utf8     => SELECTOR_UTF8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::ShiftJis => "shift-jis",
            TextEncoding::Utf8     => "utf-8",
        }
    }

    /// Decode raw bytes.  Malformed sequences become U+FFFD.
    pub fn decode(self, bytes: &[u8]) -> String {
        let codec = match self {
            TextEncoding::ShiftJis => SHIFT_JIS,
            TextEncoding::Utf8     => UTF_8,
        };
        let (text, _) = codec.decode_without_bom_handling(bytes);
        text.into_owned()
    }

    /// Encode `text`, or `None` if it contains a character the encoding
    /// cannot represent.
    pub fn encode(self, text: &str) -> Option<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Some(text.as_bytes().to_vec()),
            TextEncoding::ShiftJis => {
                let (bytes, _, unmappable) = SHIFT_JIS.encode(text);
                if unmappable { None } else { Some(bytes.into_owned()) }
            }
        }
    }
}
