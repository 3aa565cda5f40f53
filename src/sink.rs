use crate::{Options, Result, Value};
use csv::{QuoteStyle, WriterBuilder};
use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Column values of an object, for [`RowSink::write_objects`].
///
/// A column resolves through [`accessor`](Extract::accessor) first, then [`field`](Extract::field).
///
/// ## Example
///
/// ```
/// use csv_hydrate::{Extract, Value};
///
/// struct Person {
///   first: String,
///   last: String,
/// }
///
/// impl Extract for Person {
///   fn fields(&self) -> Vec<(&str, Option<Value>)> {
///     vec![
///       ("first", Some(self.first.as_str().into())),
///       ("last", Some(self.last.as_str().into())),
///     ]
///   }
///
///   fn accessor(&self, name: &str) -> Option<Value> {
///     match name {
///       "full_name" => Some(format!("{} {}", self.first, self.last).into()),
///       _ => None,
///     }
///   }
/// }
///
/// let p = Person { first: "Ada".into(), last: "Lovelace".into() };
/// assert_eq!(p.column("full_name"), Some(Value::from("Ada Lovelace")));
/// assert_eq!(p.column("last"), Some(Value::from("Lovelace")));
/// assert_eq!(p.column("middle"), None);
/// ```
pub trait Extract {
	/// Every field in declaration order
	fn fields(&self) -> Vec<(&str, Option<Value>)>;

	/// Computed values, looked up before fields
	fn accessor(&self, _name: &str) -> Option<Value> {
		None
	}

	fn field(&self, name: &str) -> Option<Value> {
		self.fields()
			.into_iter()
			.find(|(field, _)| *field == name)
			.and_then(|(_, value)| value)
	}

	/// Resolve a column, `None` when neither an accessor nor a field provides it
	fn column(&self, name: &str) -> Option<Value> {
		self.accessor(name).or_else(|| self.field(name))
	}
}

/// Writes rows or objects as delimited text.
///
/// ## Example
///
/// ```
/// use csv_hydrate::{Options, RowSink};
///
/// let mut csv = String::new();
/// RowSink::string(&mut csv, Options::default())
///   .write_rows(vec![vec!["Alice", "30"], vec!["Bob", "25"]], Some(&["name", "age"]))
///   .unwrap();
///
/// assert_eq!(csv, "name,age\nAlice,30\nBob,25\n");
/// ```
pub struct RowSink<W: io::Write> {
	writer: csv::Writer<W>,
	/// Set when an escape byte is in effect. Cells are then enclosed here instead of by `csv`.
	enclose: Option<Enclose>,
}

/// Encloses cells so that [`RowSource`](crate::RowSource) reads them back unchanged under the same
/// options: quotes are doubled, except one right after an unpaired escape byte.
struct Enclose {
	delimiter: u8,
	quote: u8,
	escape: u8,
}

impl Enclose {
	fn cell<'c>(&self, cell: &'c [u8]) -> Cow<'c, [u8]> {
		let special = [self.delimiter, self.quote, self.escape, b'\r', b'\n'];
		if !cell.iter().any(|b| special.contains(b)) {
			return Cow::Borrowed(cell);
		}
		let mut out = Vec::with_capacity(cell.len() + 2);
		out.push(self.quote);
		let mut escaped = false;
		for &b in cell {
			if escaped {
				escaped = false;
			} else if b == self.escape {
				escaped = true;
			} else if b == self.quote {
				out.push(self.quote);
			}
			out.push(b);
		}
		out.push(self.quote);
		Cow::Owned(out)
	}
}

impl RowSink<File> {
	/// Truncates the file, or appends to it when `append` is set
	pub fn open<P: AsRef<Path>>(path: P, options: Options, append: bool) -> Result<Self> {
		let path = path.as_ref();
		let file = OpenOptions::new()
			.create(true)
			.write(true)
			.append(append)
			.truncate(!append)
			.open(path)?;
		tracing::debug!(path = %path.display(), append, "Opened CSV sink");
		Ok(Self::from_writer(file, options))
	}
}

impl<'a> RowSink<StringWriter<'a>> {
	pub fn string(s: &'a mut String, options: Options) -> Self {
		Self::from_writer(
			StringWriter {
				s,
				partial: Vec::new(),
			},
			options,
		)
	}
}

impl<W: io::Write> RowSink<W> {
	pub fn from_writer(writer: W, options: Options) -> Self {
		let enclose = options.escape_byte().map(|escape| Enclose {
			delimiter: options.delimiter,
			quote: options.quote,
			escape,
		});
		let quote_style = match enclose {
			Some(_) => QuoteStyle::Never,
			None => QuoteStyle::Necessary,
		};
		let writer = WriterBuilder::new()
			.delimiter(options.delimiter)
			.quote(options.quote)
			.quote_style(quote_style)
			.flexible(true)
			.from_writer(writer);
		RowSink { writer, enclose }
	}

	fn write_cells<I>(&mut self, cells: I) -> Result<()>
	where
		I: IntoIterator,
		I::Item: AsRef<[u8]>,
	{
		match &self.enclose {
			Some(enclose) => {
				for cell in cells {
					self.writer.write_field(enclose.cell(cell.as_ref()))?;
				}
				self.writer.write_record(std::iter::empty::<&[u8]>())?;
			}
			None => self.writer.write_record(cells)?,
		}
		Ok(())
	}

	/// Write `rows` cell by cell, after `header` if one is given
	pub fn write_rows<I, R, C>(&mut self, rows: I, header: Option<&[&str]>) -> Result<()>
	where
		I: IntoIterator<Item = R>,
		R: IntoIterator<Item = C>,
		C: AsRef<[u8]>,
	{
		if let Some(header) = header {
			self.write_cells(header)?;
		}
		for row in rows {
			self.write_cells(row)?;
		}
		self.writer.flush()?;
		Ok(())
	}

	/// Write one record per object.
	///
	/// With `columns`, each column is resolved through [`Extract::column`], and an unresolved column
	/// is an empty cell. Without, every field is written in declaration order.
	pub fn write_objects<'o, I, E>(
		&mut self,
		objects: I,
		columns: Option<&[&str]>,
		header: Option<&[&str]>,
	) -> Result<()>
	where
		I: IntoIterator<Item = &'o E>,
		E: Extract + 'o,
	{
		if let Some(header) = header {
			self.write_cells(header)?;
		}
		for object in objects {
			let values: Vec<Option<Value>> = match columns {
				Some(columns) => columns.iter().map(|c| object.column(c)).collect(),
				None => object.fields().into_iter().map(|(_, v)| v).collect(),
			};
			self.write_cells(values.iter().map(|v| v.as_ref().map(Value::to_string).unwrap_or_default()))?;
		}
		self.writer.flush()?;
		Ok(())
	}
}

/// Collects the output of [`RowSink::string`]. A character split across two writes is held back
/// until its last byte arrives.
pub struct StringWriter<'a> {
	s: &'a mut String,
	partial: Vec<u8>,
}

impl io::Write for StringWriter<'_> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.partial.extend_from_slice(buf);
		let complete = match std::str::from_utf8(&self.partial) {
			Ok(s) => s.len(),
			Err(e) if e.error_len().is_none() => e.valid_up_to(),
			Err(e) => {
				self.partial.clear();
				return Err(io::Error::new(io::ErrorKind::InvalidData, e));
			}
		};
		let rest = self.partial.split_off(complete);
		let text = String::from_utf8(std::mem::replace(&mut self.partial, rest))
			.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
		self.s.push_str(&text);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		if self.partial.is_empty() {
			Ok(())
		} else {
			Err(io::Error::new(
				io::ErrorKind::InvalidData,
				"incomplete UTF-8 character",
			))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Column, Hydrate, Hydrator, Row, RowSource, Schema};
	use csv::StringRecord;
	use std::fs;

	#[derive(Debug, Default, PartialEq)]
	struct Person {
		name: String,
		age: i64,
		note: Option<String>,
	}

	impl Extract for Person {
		fn fields(&self) -> Vec<(&str, Option<Value>)> {
			vec![
				("name", Some(Value::from(self.name.as_str()))),
				("age", Some(Value::Int(self.age))),
				("note", self.note.as_deref().map(Value::from)),
			]
		}
	}

	impl Hydrate for Person {
		fn schema() -> Schema<Self> {
			Schema::<Self>::new()
				.string("name", Column::name("name"), |p, v| p.name = v)
				.int("age", Column::name("age"), |p, v| p.age = v)
				.optional_string("note", Column::name("note"), |p, v| p.note = v)
		}
	}

	struct Private {
		name: String,
		age: i64,
	}

	impl Extract for Private {
		fn fields(&self) -> Vec<(&str, Option<Value>)> {
			Vec::new()
		}
		fn accessor(&self, name: &str) -> Option<Value> {
			match name {
				"name" => Some(Value::from(self.name.as_str())),
				"age" => Some(Value::Int(self.age)),
				_ => None,
			}
		}
	}

	fn people() -> Vec<Person> {
		vec![
			Person {
				name: "Alice".to_string(),
				age: 30,
				note: Some("says \"hi\", twice".to_string()),
			},
			Person {
				name: "Bob".to_string(),
				age: 25,
				note: None,
			},
		]
	}

	#[test]
	fn write_rows_with_header() {
		let file = tempfile::NamedTempFile::new().unwrap();
		let mut sink = RowSink::open(file.path(), Options::default(), false).unwrap();
		sink.write_rows(vec![vec!["Alice", "30"], vec!["Bob", "25"]], Some(&["name", "age"]))
			.unwrap();
		drop(sink);
		assert_eq!(
			fs::read_to_string(file.path()).unwrap(),
			"name,age\nAlice,30\nBob,25\n"
		);
	}

	#[test]
	fn append_mode() {
		let file = tempfile::NamedTempFile::new().unwrap();
		fs::write(file.path(), "name\nAlice\n").unwrap();
		RowSink::open(file.path(), Options::default(), true)
			.unwrap()
			.write_rows(vec![vec!["Bob"]], None)
			.unwrap();
		assert_eq!(fs::read_to_string(file.path()).unwrap(), "name\nAlice\nBob\n");

		RowSink::open(file.path(), Options::default(), false)
			.unwrap()
			.write_rows(vec![vec!["Carol"]], None)
			.unwrap();
		assert_eq!(fs::read_to_string(file.path()).unwrap(), "Carol\n");
	}

	#[test]
	fn custom_delimiter_and_quote() {
		let options = Options {
			delimiter: b';',
			quote: b'\'',
			..Default::default()
		};
		let mut csv = String::new();
		RowSink::string(&mut csv, options)
			.write_rows(vec![vec!["a;b", "it's", "plain"]], None)
			.unwrap();
		assert_eq!(csv, "'a;b';'it''s';plain\n");
	}

	#[test]
	fn write_objects_with_columns() {
		let mut csv = String::new();
		RowSink::string(&mut csv, Options::default())
			.write_objects(&people(), Some(&["name", "age"]), Some(&["name", "age"]))
			.unwrap();
		assert_eq!(csv, "name,age\nAlice,30\nBob,25\n");
	}

	#[test]
	fn write_objects_through_accessors() {
		let objects = vec![
			Private {
				name: "Alice".to_string(),
				age: 30,
			},
			Private {
				name: "Bob".to_string(),
				age: 25,
			},
		];
		let mut csv = String::new();
		RowSink::string(&mut csv, Options::default())
			.write_objects(&objects, Some(&["name", "note", "age"]), None)
			.unwrap();
		assert_eq!(csv, "Alice,,30\nBob,,25\n");
	}

	#[test]
	fn write_objects_all_fields() {
		let mut csv = String::new();
		RowSink::string(&mut csv, Options::default())
			.write_objects(&people(), None, None)
			.unwrap();
		assert_eq!(csv, "Alice,30,\"says \"\"hi\"\", twice\"\nBob,25,\n");
	}

	fn read_back(csv: &str, options: Options) -> Vec<Row> {
		let options = Options {
			has_header: false,
			..options
		};
		RowSource::from_reader(csv.as_bytes(), options)
			.unwrap()
			.collect::<Result<_>>()
			.unwrap()
	}

	#[test]
	fn escape_byte_round_trip() {
		let cells = vec![
			r#"C:\dir\"x""#,
			r#"a\"b"#,
			r#"say "hi""#,
			r"back\slash",
			r"\\",
			"plain",
		];
		let mut csv = String::new();
		RowSink::string(&mut csv, Options::default())
			.write_rows(vec![cells.clone()], None)
			.unwrap();
		assert_eq!(
			csv,
			concat!(
				r#""C:\dir\"x""","a\"b","say ""hi""","back\slash","\\",plain"#,
				"\n"
			)
		);
		assert_eq!(
			read_back(&csv, Options::default()),
			vec![Row::Ordered(StringRecord::from(cells))]
		);
	}

	#[test]
	fn doubled_quotes_when_escape_is_off() {
		let options = Options {
			escape: b'"',
			..Default::default()
		};
		let cells = vec![r#"a\"b"#, r"C:\dir"];
		let mut csv = String::new();
		RowSink::string(&mut csv, options.clone())
			.write_rows(vec![cells.clone()], None)
			.unwrap();
		assert_eq!(csv, concat!(r#""a\""b",C:\dir"#, "\n"));
		assert_eq!(
			read_back(&csv, options),
			vec![Row::Ordered(StringRecord::from(cells))]
		);
	}

	#[test]
	fn string_writer_holds_split_characters() {
		use std::io::Write;

		let mut s = String::new();
		let mut writer = StringWriter {
			s: &mut s,
			partial: Vec::new(),
		};
		let bytes = "Kø".as_bytes();
		writer.write_all(&bytes[..2]).unwrap();
		assert!(writer.flush().is_err());
		writer.write_all(&bytes[2..]).unwrap();
		writer.flush().unwrap();
		assert!(writer.write_all(&[0xff]).is_err());
		drop(writer);
		assert_eq!(s, "Kø");
	}

	#[test]
	fn round_trip() {
		let file = tempfile::NamedTempFile::new().unwrap();
		let columns = ["name", "age", "note"];
		RowSink::open(file.path(), Options::default(), false)
			.unwrap()
			.write_objects(&people(), Some(&columns), Some(&columns))
			.unwrap();

		let rows: Vec<_> = RowSource::open(file.path(), Options::default())
			.unwrap()
			.collect::<Result<_>>()
			.unwrap();
		assert_eq!(rows[0].values(), vec!["Alice", "30", "says \"hi\", twice"]);
		assert_eq!(rows[1].values(), vec!["Bob", "25", ""]);

		let source = RowSource::open(file.path(), Options::default()).unwrap();
		let hydrated = Hydrator::new(source).hydrate_all::<Person>(true).unwrap();
		assert_eq!(hydrated, people());
	}
}
