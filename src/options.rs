use serde::{Deserialize, Serialize};

/// Dialect and policy settings shared by [`RowSource`](crate::RowSource) and [`RowSink`](crate::RowSink).
///
/// ## Example
///
/// ```
/// use csv_hydrate::Options;
///
/// let options = Options {
///   delimiter: b';',
///   has_header: false,
///   ..Default::default()
/// };
/// assert_eq!(options.quote, b'"');
/// assert!(options.skip_empty_lines);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
	pub delimiter: u8,
	pub quote: u8,
	/// Inside a quoted field, kept in the cell and stops the next byte from closing it. Off when
	/// equal to `quote`.
	pub escape: u8,
	/// Treat the first non-discarded record as the header table
	pub has_header: bool,
	/// Drop records whose every cell is empty
	pub skip_empty_lines: bool,
	/// Text encoding hint. `None` means UTF-8
	pub encoding: Option<String>,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			delimiter: b',',
			quote: b'"',
			escape: b'\\',
			has_header: true,
			skip_empty_lines: true,
			encoding: None,
		}
	}
}

impl Options {
	/// The escape byte, or `None` when it is the quote itself
	pub(crate) fn escape_byte(&self) -> Option<u8> {
		match self.escape {
			escape if escape == self.quote => None,
			escape => Some(escape),
		}
	}
}

#[test]
fn deserialize_partial() {
	let options: Options =
		serde_json::from_str(r#"{ "delimiter": 9, "has_header": false }"#).unwrap();
	assert_eq!(
		options,
		Options {
			delimiter: b'\t',
			has_header: false,
			..Default::default()
		}
	);
}

#[test]
fn escape_same_as_quote_is_off() {
	assert_eq!(Options::default().escape_byte(), Some(b'\\'));
	let options = Options {
		escape: b'"',
		..Default::default()
	};
	assert_eq!(options.escape_byte(), None);
}
