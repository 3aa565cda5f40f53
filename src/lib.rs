//! Map CSV records to and from typed structs.
//!
//! A [`RowSource`] streams rows out of a file, a [`Hydrator`] turns those rows
//! into instances of any type implementing [`Hydrate`], and a [`RowSink`]
//! writes rows or [`Extract`] objects back out.
//!
//! ## Example
//!
//! ```
//! use csv_hydrate::{Column, Hydrate, Hydrator, Options, RowSource, Schema};
//!
//! #[derive(Default)]
//! struct Person {
//!   name: String,
//!   age: i64,
//!   note: Option<String>,
//! }
//!
//! impl Hydrate for Person {
//!   fn schema() -> Schema<Self> {
//!     Schema::<Self>::new()
//!       .string("name", Column::name("name"), |p, v| p.name = v)
//!       .int("age", Column::name("age").converter("int"), |p, v| p.age = v)
//!       .optional_string("note", None, |p, v| p.note = v)
//!   }
//! }
//!
//! let csv = "name,age,note\nAlice,30,ok\nBob,25,\n";
//! let source = RowSource::from_reader(csv.as_bytes(), Options::default()).unwrap();
//! let people = Hydrator::new(source).hydrate_all::<Person>(true).unwrap();
//!
//! assert_eq!(people.len(), 2);
//! assert_eq!(people[0].age, 30);
//! assert_eq!(people[1].note, None);
//! ```

mod column;
mod converter;
mod headers;
mod hydrator;
mod options;
mod reader;
mod row;
mod schema;
mod sink;
mod value;

pub use column::{Column, ConverterRef};
pub use converter::{Converter, ConverterError, ConverterRegistry};
pub use headers::Headers;
pub use hydrator::{Hydrated, Hydrator};
pub use options::Options;
pub use reader::RowSource;
pub use row::Row;
pub use schema::{FieldKind, Hydrate, Schema};
pub use sink::{Extract, RowSink, StringWriter};
pub use value::Value;

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("CSV file not readable: {}", .path.display())]
	Unreadable {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),
	#[error("CSV error: {0}")]
	Csv(#[from] csv::Error),
	#[error("Invalid {encoding} text on line {line}")]
	Encoding { encoding: &'static str, line: u64 },
	#[error("Unsupported encoding: {0}")]
	UnsupportedEncoding(String),
	#[error(transparent)]
	Mapping(#[from] MappingError),
}

/// Raised while hydrating a row. Always names the offending field.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
	#[error("Required column for field \"{field}\" is missing or empty (row {row})")]
	MissingRequired { field: String, row: usize },
	#[error("Converter \"{converter}\" for field \"{field}\" is not callable")]
	UnresolvedConverter { field: String, converter: String },
	#[error("Converter for field \"{field}\" failed: {source} (row {row})")]
	ConverterFailed {
		field: String,
		row: usize,
		#[source]
		source: ConverterError,
	},
}

impl MappingError {
	pub fn field(&self) -> &str {
		match self {
			MappingError::MissingRequired { field, .. } => field,
			MappingError::UnresolvedConverter { field, .. } => field,
			MappingError::ConverterFailed { field, .. } => field,
		}
	}

	/// 1-based data row the error was raised on. `None` when raised before any row was read.
	pub fn row(&self) -> Option<usize> {
		match self {
			MappingError::MissingRequired { row, .. } => Some(*row),
			MappingError::UnresolvedConverter { .. } => None,
			MappingError::ConverterFailed { row, .. } => Some(*row),
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;
