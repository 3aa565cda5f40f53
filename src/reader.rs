use crate::headers::Headers;
use crate::{Error, Options, Result, Row};
use csv::StringRecord;
use csv_core::ReadRecordResult;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Encoding {
	Utf8,
	Latin1,
}

impl Encoding {
	fn from_hint(hint: Option<&str>) -> Result<Self> {
		let hint = match hint {
			Some(hint) => hint.to_ascii_lowercase(),
			None => return Ok(Encoding::Utf8),
		};
		match hint.as_str() {
			"utf-8" | "utf8" => Ok(Encoding::Utf8),
			"iso-8859-1" | "latin1" | "latin-1" => Ok(Encoding::Latin1),
			_ => Err(Error::UnsupportedEncoding(hint)),
		}
	}

	fn name(self) -> &'static str {
		match self {
			Encoding::Utf8 => "UTF-8",
			Encoding::Latin1 => "ISO-8859-1",
		}
	}

	fn decode(self, bytes: &[u8]) -> Option<String> {
		match self {
			Encoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
			Encoding::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
		}
	}
}

/// Where the tokenizer is inside a record, tracked only as far as the escape byte needs it
#[derive(Debug, Clone, Copy, PartialEq)]
enum Quoting {
	FieldStart,
	Unquoted,
	Quoted,
	Escaped,
	QuoteInQuoted,
}

/// Keeps the escape byte in a quoted cell, and stops the quote right after it from closing the cell.
///
/// The tokenizer runs without an escape byte, so an escaped quote is handed to it doubled.
/// The state carries over from one line to the next.
struct EscapeRewriter {
	delimiter: u8,
	quote: u8,
	escape: u8,
	state: Quoting,
}

impl EscapeRewriter {
	fn rewrite(&mut self, line: &[u8]) -> Vec<u8> {
		let mut out = Vec::with_capacity(line.len());
		for &b in line {
			out.push(b);
			self.state = match self.state {
				Quoting::Quoted if b == self.escape => Quoting::Escaped,
				Quoting::Quoted if b == self.quote => Quoting::QuoteInQuoted,
				Quoting::Quoted => Quoting::Quoted,
				Quoting::Escaped => {
					if b == self.quote {
						out.push(self.quote);
					}
					Quoting::Quoted
				}
				Quoting::FieldStart | Quoting::QuoteInQuoted if b == self.quote => Quoting::Quoted,
				_ if b == self.delimiter || b == b'\r' || b == b'\n' => Quoting::FieldStart,
				_ => Quoting::Unquoted,
			};
		}
		out
	}
}

/// A forward-only stream of [`Row`]s read from delimited text.
///
/// Lines are pulled from the input one at a time. The first non-discarded record becomes the
/// header table when [`Options::has_header`] is set, and every later record is keyed by it.
///
/// ## Example
///
/// ```
/// use csv_hydrate::{Options, Row, RowSource};
///
/// let csv = "name,age\n\nAlice,30\n";
/// let rows: Vec<Row> = RowSource::from_reader(csv.as_bytes(), Options::default())
///   .unwrap()
///   .collect::<Result<_, _>>()
///   .unwrap();
///
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].get_name("age"), Some("30"));
/// ```
pub struct RowSource<R: io::Read> {
	input: BufReader<R>,
	core: csv_core::Reader,
	escapes: Option<EscapeRewriter>,
	options: Options,
	encoding: Encoding,
	headers: Option<Headers>,
	/// Current physical line, and how much of it the tokenizer has consumed
	line: Vec<u8>,
	consumed: usize,
	line_number: u64,
	output: Vec<u8>,
	out_len: usize,
	ends: Vec<usize>,
	ends_len: usize,
	/// The tokenizer is inside a record spanning several lines
	pending: bool,
	done: bool,
}

impl RowSource<File> {
	pub fn open<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
		let path = path.as_ref();
		let unreadable = |source| Error::Unreadable {
			path: path.to_path_buf(),
			source,
		};
		let file = File::open(path).map_err(unreadable)?;
		if file.metadata().map_err(unreadable)?.is_dir() {
			return Err(unreadable(io::Error::new(
				io::ErrorKind::Other,
				"is a directory",
			)));
		}
		tracing::debug!(path = %path.display(), "Opened CSV source");
		Self::from_reader(file, options)
	}
}

impl<R: io::Read> RowSource<R> {
	pub fn from_reader(reader: R, options: Options) -> Result<Self> {
		let encoding = Encoding::from_hint(options.encoding.as_deref())?;
		let core = csv_core::ReaderBuilder::new()
			.delimiter(options.delimiter)
			.quote(options.quote)
			.escape(None)
			.double_quote(true)
			.build();
		let escapes = options.escape_byte().map(|escape| EscapeRewriter {
			delimiter: options.delimiter,
			quote: options.quote,
			escape,
			state: Quoting::FieldStart,
		});
		Ok(RowSource {
			input: BufReader::new(reader),
			core,
			escapes,
			options,
			encoding,
			headers: None,
			line: Vec::new(),
			consumed: 0,
			line_number: 0,
			output: vec![0; 1024],
			out_len: 0,
			ends: vec![0; 16],
			ends_len: 0,
			pending: false,
			done: false,
		})
	}

	/// The header table, once the header row has been read
	pub fn headers(&self) -> Option<&Headers> {
		self.headers.as_ref()
	}

	/// Number of physical lines read so far
	pub fn line(&self) -> u64 {
		self.line_number
	}

	pub fn options(&self) -> &Options {
		&self.options
	}

	/// Reads the next physical record. A blank line outside a quoted field is a record with one empty cell.
	fn read_record(&mut self) -> Result<Option<StringRecord>> {
		loop {
			if self.consumed < self.line.len() {
				match self.feed(false)? {
					Some(record) => return Ok(Some(record)),
					None => continue,
				}
			}
			if self.done {
				return Ok(None);
			}

			self.line.clear();
			self.consumed = 0;
			if self.input.read_until(b'\n', &mut self.line)? == 0 {
				self.done = true;
				return self.feed(true);
			}
			self.line_number += 1;
			if let Some(escapes) = &mut self.escapes {
				self.line = escapes.rewrite(&self.line);
			}

			if !self.pending && self.line.iter().all(|b| matches!(b, b'\r' | b'\n')) {
				self.consumed = self.line.len();
				return Ok(Some(StringRecord::from(vec![""])));
			}
		}
	}

	/// Hands the unconsumed part of the current line to the tokenizer. `eof` signals end of input.
	fn feed(&mut self, eof: bool) -> Result<Option<StringRecord>> {
		let start = self.consumed;
		loop {
			let input = if eof { &[][..] } else { &self.line[self.consumed..] };
			let (result, nin, nout, nend) = self.core.read_record(
				input,
				&mut self.output[self.out_len..],
				&mut self.ends[self.ends_len..],
			);
			self.consumed += nin;
			self.out_len += nout;
			self.ends_len += nend;

			match result {
				ReadRecordResult::InputEmpty => {
					let fed = &self.line[start..self.consumed];
					if fed.iter().any(|b| !matches!(b, b'\r' | b'\n')) {
						self.pending = true;
					}
					return Ok(None);
				}
				ReadRecordResult::OutputFull => {
					let len = self.output.len();
					self.output.resize(len * 2, 0);
				}
				ReadRecordResult::OutputEndsFull => {
					let len = self.ends.len();
					self.ends.resize(len * 2, 0);
				}
				ReadRecordResult::Record => return self.take_record().map(Some),
				ReadRecordResult::End => return Ok(None),
			}
		}
	}

	fn take_record(&mut self) -> Result<StringRecord> {
		let mut fields = Vec::with_capacity(self.ends_len);
		let mut start = 0;
		let mut invalid = false;
		for &end in &self.ends[..self.ends_len] {
			match self.encoding.decode(&self.output[start..end]) {
				Some(field) => fields.push(field),
				None => invalid = true,
			}
			start = end;
		}
		self.out_len = 0;
		self.ends_len = 0;
		self.pending = false;

		if invalid {
			return Err(Error::Encoding {
				encoding: self.encoding.name(),
				line: self.line_number,
			});
		}
		Ok(StringRecord::from(fields))
	}
}

impl<R: io::Read> Iterator for RowSource<R> {
	type Item = Result<Row>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			let record = match self.read_record() {
				Ok(Some(record)) => record,
				Ok(None) => return None,
				Err(e) => {
					self.done = true;
					self.consumed = self.line.len();
					return Some(Err(e));
				}
			};

			if self.options.skip_empty_lines && record.iter().all(str::is_empty) {
				tracing::trace!(line = self.line_number, "Skipped empty record");
				continue;
			}

			if self.options.has_header && self.headers.is_none() {
				tracing::debug!(columns = record.len(), "Captured CSV header");
				self.headers = Some(Headers::from_row(record));
				continue;
			}

			let row = match &self.headers {
				Some(headers) => Row::Named(headers.align(&record)),
				None => Row::Ordered(record),
			};
			return Some(Ok(row));
		}
	}
}

#[cfg(test)]
fn read_all(csv: &str, options: Options) -> Vec<Row> {
	RowSource::from_reader(csv.as_bytes(), options)
		.unwrap()
		.collect::<Result<_>>()
		.unwrap()
}

#[cfg(test)]
fn named(pairs: &[(&str, &str)]) -> Row {
	Row::Named(
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect(),
	)
}

#[test]
fn reads_header_and_rows() {
	let mut source = RowSource::open("test/people.csv", Options::default()).unwrap();
	let first = source.next().unwrap().unwrap();
	assert_eq!(
		first,
		named(&[("name", "Alice"), ("age", "30"), ("note", "ok")])
	);
	assert_eq!(
		source.headers().unwrap().get_row(),
		&StringRecord::from(vec!["name", "age", "note"])
	);
	let rest: Vec<_> = source.collect::<Result<_>>().unwrap();
	assert_eq!(rest, vec![named(&[("name", "Bob"), ("age", "25"), ("note", "")])]);
}

#[test]
fn skips_empty_lines() {
	let rows = read_all("\n,\nname,age\n\n,,\nAlice,30\n\n", Options::default());
	assert_eq!(rows, vec![named(&[("name", "Alice"), ("age", "30")])]);
}

#[test]
fn keeps_empty_lines_when_not_skipping() {
	let options = Options {
		skip_empty_lines: false,
		..Default::default()
	};
	let rows = read_all("name,age\n\nAlice,30\n", options);
	assert_eq!(
		rows,
		vec![
			named(&[("name", ""), ("age", "")]),
			named(&[("name", "Alice"), ("age", "30")]),
		]
	);
}

#[test]
fn keeps_empty_lines_without_header() {
	let options = Options {
		has_header: false,
		skip_empty_lines: false,
		..Default::default()
	};
	let rows = read_all("a,b\r\n\r\n,\r\n", options);
	assert_eq!(
		rows,
		vec![
			Row::Ordered(StringRecord::from(vec!["a", "b"])),
			Row::Ordered(StringRecord::from(vec![""])),
			Row::Ordered(StringRecord::from(vec!["", ""])),
		]
	);
}

#[test]
fn ordered_rows_without_header() {
	let options = Options {
		has_header: false,
		..Default::default()
	};
	let rows = read_all("Gina,50\nHank,61", options);
	assert_eq!(
		rows,
		vec![
			Row::Ordered(StringRecord::from(vec!["Gina", "50"])),
			Row::Ordered(StringRecord::from(vec!["Hank", "61"])),
		]
	);
}

#[test]
fn header_and_row_lengths_differ() {
	let rows = read_all("a,b\n1,2,3\n4\n", Options::default());
	assert_eq!(
		rows,
		vec![
			named(&[("a", "1"), ("b", "2"), ("2", "3")]),
			named(&[("a", "4"), ("b", "")]),
		]
	);
}

#[test]
fn quoted_fields_span_lines() {
	let csv = "id,text\n1,\"first\n\nsecond\"\n2,\"say \"\"hi\"\"\"\n";
	let rows = read_all(csv, Options::default());
	assert_eq!(
		rows,
		vec![
			named(&[("id", "1"), ("text", "first\n\nsecond")]),
			named(&[("id", "2"), ("text", "say \"hi\"")]),
		]
	);
}

#[test]
fn custom_control_characters() {
	let options = Options {
		delimiter: b';',
		quote: b'\'',
		..Default::default()
	};
	let rows = read_all("a;b\n'x;y';'it''s'\n'x\\';y';''\n", options);
	assert_eq!(
		rows,
		vec![
			named(&[("a", "x;y"), ("b", "it's")]),
			named(&[("a", "x\\';y"), ("b", "")]),
		]
	);
}

#[test]
fn escape_byte_stays_in_quoted_cells() {
	let options = Options {
		has_header: false,
		..Default::default()
	};
	let csv = concat!(
		r#""C:\dir\file","it\"s",x\y"#,
		"\n",
		r#""\\","end""#,
		"\n",
		r#""two\"
lines""#,
		"\n",
	);
	let rows = read_all(csv, options);
	assert_eq!(
		rows,
		vec![
			Row::Ordered(StringRecord::from(vec![r"C:\dir\file", r#"it\"s"#, r"x\y"])),
			Row::Ordered(StringRecord::from(vec![r"\\", "end"])),
			Row::Ordered(StringRecord::from(vec!["two\\\"\nlines"])),
		]
	);
}

#[test]
fn escape_off_when_same_as_quote() {
	let options = Options {
		has_header: false,
		escape: b'"',
		..Default::default()
	};
	let rows = read_all(r#""C:\dir","a""b""#, options);
	assert_eq!(
		rows,
		vec![Row::Ordered(StringRecord::from(vec![r"C:\dir", r#"a"b"#]))]
	);
}

#[test]
fn latin1_encoding() {
	let options = Options {
		encoding: Some("ISO-8859-1".to_string()),
		..Default::default()
	};
	let bytes: &[u8] = b"city\nK\xf8benhavn\n";
	let rows: Vec<Row> = RowSource::from_reader(bytes, options)
		.unwrap()
		.collect::<Result<_>>()
		.unwrap();
	assert_eq!(rows, vec![named(&[("city", "København")])]);
}

#[test]
fn invalid_utf8() {
	let bytes: &[u8] = b"city\nK\xf8benhavn\nOslo\n";
	let mut source = RowSource::from_reader(bytes, Options::default()).unwrap();
	match source.next() {
		Some(Err(Error::Encoding { line, .. })) => assert_eq!(line, 2),
		other => panic!("Expected Encoding error, got {:?}", other),
	}
	assert!(source.next().is_none());
}

#[test]
fn unsupported_encoding() {
	let options = Options {
		encoding: Some("ebcdic".to_string()),
		..Default::default()
	};
	match RowSource::from_reader(&b""[..], options) {
		Err(Error::UnsupportedEncoding(name)) => assert_eq!(name, "ebcdic"),
		_ => panic!("Expected UnsupportedEncoding"),
	}
}

#[test]
fn unreadable_file() {
	match RowSource::open("test/does-not-exist.csv", Options::default()) {
		Err(Error::Unreadable { path, .. }) => {
			assert_eq!(path, Path::new("test/does-not-exist.csv"))
		}
		_ => panic!("Expected Unreadable"),
	}
	assert!(matches!(
		RowSource::open("test", Options::default()),
		Err(Error::Unreadable { .. })
	));
}

#[test]
fn empty_file_yields_no_rows() {
	let rows: Vec<_> = RowSource::open("test/empty.csv", Options::default())
		.unwrap()
		.collect();
	assert!(rows.is_empty());
}
