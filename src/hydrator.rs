use crate::converter::Converter;
use crate::schema::{Field, FieldKind};
use crate::{ConverterRegistry, Error, Hydrate, MappingError, Result, Row, RowSource, Value};
use std::io;

/// Builds typed instances out of the rows of a [`RowSource`].
///
/// ## Example
///
/// ```
/// use csv_hydrate::{Column, Hydrate, Hydrator, Options, RowSource, Schema};
///
/// #[derive(Default)]
/// struct Pair {
///   first: String,
///   second: i64,
/// }
///
/// impl Hydrate for Pair {
///   fn schema() -> Schema<Self> {
///     Schema::<Self>::new()
///       .string("first", Column::index(0), |p, v| p.first = v)
///       .int("second", Column::index(1), |p, v| p.second = v)
///   }
/// }
///
/// let options = Options { has_header: false, ..Default::default() };
/// let source = RowSource::from_reader("Gina,50\n".as_bytes(), options).unwrap();
/// let pairs = Hydrator::new(source).hydrate_all::<Pair>(true).unwrap();
///
/// assert_eq!(pairs[0].first, "Gina");
/// assert_eq!(pairs[0].second, 50);
/// ```
pub struct Hydrator<R: io::Read> {
	source: RowSource<R>,
	converters: ConverterRegistry,
}

impl<R: io::Read> Hydrator<R> {
	/// Uses the default [`ConverterRegistry`]
	pub fn new(source: RowSource<R>) -> Self {
		Hydrator {
			source,
			converters: ConverterRegistry::default(),
		}
	}

	pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
		self.converters = converters;
		self
	}

	/// Stream instances of `T`, one per row.
	///
	/// With `use_declared_mapping` off, every [`Column`](crate::Column) descriptor is ignored and all fields
	/// are matched against the header by name. Converter references are resolved here, so an
	/// unknown converter fails before any row is read.
	pub fn hydrate<T: Hydrate>(self, use_declared_mapping: bool) -> Result<Hydrated<T, R>> {
		let fields = T::schema()
			.into_fields()
			.into_iter()
			.map(|field| FieldPlan::new(field, use_declared_mapping, &self.converters))
			.collect::<std::result::Result<Vec<_>, MappingError>>()?;
		tracing::debug!(
			target_type = std::any::type_name::<T>(),
			fields = fields.len(),
			use_declared_mapping,
			"Starting hydration"
		);
		Ok(Hydrated {
			source: self.source,
			fields,
			row: 0,
			done: false,
		})
	}

	/// Hydrate every row into memory. Fails on the first error.
	pub fn hydrate_all<T: Hydrate>(self, use_declared_mapping: bool) -> Result<Vec<T>> {
		self.hydrate::<T>(use_declared_mapping)?.collect()
	}
}

enum Lookup {
	Index(usize),
	Name(String),
	/// Match the normalized field name against the normalized row keys
	Fallback(String),
}

struct FieldPlan<T> {
	name: String,
	lookup: Lookup,
	required: bool,
	converter: Option<Converter>,
	kind: FieldKind<T>,
}

impl<T> FieldPlan<T> {
	fn new(
		field: Field<T>,
		use_declared_mapping: bool,
		converters: &ConverterRegistry,
	) -> std::result::Result<Self, MappingError> {
		let fallback = Lookup::Fallback(normalize(&field.name));
		let column = match field.column {
			Some(column) if use_declared_mapping => column,
			_ => {
				return Ok(FieldPlan {
					name: field.name,
					lookup: fallback,
					required: false,
					converter: None,
					kind: field.kind,
				})
			}
		};

		let lookup = match (column.index, column.name) {
			(Some(index), _) => Lookup::Index(index),
			(None, Some(name)) => Lookup::Name(name),
			(None, None) => fallback,
		};
		let converter = match column.converter {
			Some(converter) => match converters.resolve(&converter) {
				Some(f) => Some(f),
				None => {
					return Err(MappingError::UnresolvedConverter {
						field: field.name,
						converter: converter.to_string(),
					})
				}
			},
			None => None,
		};
		Ok(FieldPlan {
			name: field.name,
			lookup,
			required: column.required,
			converter,
			kind: field.kind,
		})
	}

	fn raw<'r>(&self, row: &'r Row) -> Option<&'r str> {
		match &self.lookup {
			Lookup::Index(index) => row.get_index(*index),
			Lookup::Name(name) => row.get_name(name),
			Lookup::Fallback(normalized) => row
				.named_cells()
				.find(|(key, _)| normalize(key) == *normalized)
				.map(|(_, value)| value),
		}
	}
}

/// Lowercase ASCII alphanumerics only, so `First Name` and `first_name` compare equal
fn normalize(name: &str) -> String {
	name.chars()
		.filter(char::is_ascii_alphanumeric)
		.map(|c| c.to_ascii_lowercase())
		.collect()
}

/// A streaming hydration pass. You can get one using [`Hydrator::hydrate`].
///
/// Stops after the first error: rows already yielded stay valid, and no partial instance is yielded
/// for the failing row.
pub struct Hydrated<T, R: io::Read> {
	source: RowSource<R>,
	fields: Vec<FieldPlan<T>>,
	/// 1-based number of the row being hydrated
	row: usize,
	done: bool,
}

impl<T: Hydrate, R: io::Read> Hydrated<T, R> {
	fn hydrate_row(&self, row: &Row) -> std::result::Result<T, MappingError> {
		let mut instance = T::default();
		for field in &self.fields {
			let raw = field.raw(row);
			if field.required && raw.map_or(true, str::is_empty) {
				return Err(MappingError::MissingRequired {
					field: field.name.clone(),
					row: self.row,
				});
			}
			let value = match (&field.converter, raw) {
				(Some(convert), Some(raw)) if !raw.is_empty() => {
					let value = convert(raw).map_err(|source| MappingError::ConverterFailed {
						field: field.name.clone(),
						row: self.row,
						source,
					})?;
					Some(value)
				}
				(_, raw) => raw.map(Value::from),
			};
			field.kind.assign(&mut instance, value);
		}
		Ok(instance)
	}
}

impl<T: Hydrate, R: io::Read> Iterator for Hydrated<T, R> {
	type Item = Result<T>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}
		let row = match self.source.next() {
			Some(Ok(row)) => row,
			Some(Err(e)) => {
				self.done = true;
				return Some(Err(e));
			}
			None => {
				self.done = true;
				tracing::debug!(rows = self.row, "Finished hydration");
				return None;
			}
		};
		self.row += 1;
		match self.hydrate_row(&row) {
			Ok(instance) => Some(Ok(instance)),
			Err(e) => {
				self.done = true;
				tracing::warn!(row = self.row, field = e.field(), error = %e, "Row hydration failed");
				Some(Err(Error::Mapping(e)))
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Column, Options, Schema};

	fn source(csv: &str, has_header: bool) -> RowSource<&[u8]> {
		let options = Options {
			has_header,
			..Default::default()
		};
		RowSource::from_reader(csv.as_bytes(), options).unwrap()
	}

	#[derive(Default, Debug, PartialEq)]
	struct Person {
		name: String,
		age: i64,
		note: Option<String>,
	}

	impl Hydrate for Person {
		fn schema() -> Schema<Self> {
			Schema::<Self>::new()
				.string("name", Column::name("name"), |p, v| p.name = v)
				.int("age", Column::name("age").converter("int"), |p, v| p.age = v)
				.optional_string("note", None, |p, v| p.note = v)
		}
	}

	#[test]
	fn hydrates_with_declared_mapping() {
		let people = Hydrator::new(source("name,age,note\nAlice,30,ok\nBob,25,\n", true))
			.hydrate_all::<Person>(true)
			.unwrap();
		assert_eq!(
			people,
			vec![
				Person {
					name: "Alice".to_string(),
					age: 30,
					note: Some("ok".to_string()),
				},
				Person {
					name: "Bob".to_string(),
					age: 25,
					note: None,
				},
			]
		);
	}

	#[test]
	fn hydrates_from_fixture() {
		let source = RowSource::open("test/people.csv", Options::default()).unwrap();
		let people: Vec<Person> = Hydrator::new(source)
			.hydrate::<Person>(true)
			.unwrap()
			.collect::<Result<_>>()
			.unwrap();
		assert_eq!(people.len(), 2);
		assert_eq!(people[1].name, "Bob");
		assert_eq!(people[1].note, None);
	}

	#[test]
	fn hydrates_without_declared_mapping() {
		let people = Hydrator::new(source("Name,AGE,note\nCarol,40,ok\n", true))
			.hydrate_all::<Person>(false)
			.unwrap();
		assert_eq!(
			people,
			vec![Person {
				name: "Carol".to_string(),
				age: 40,
				note: Some("ok".to_string()),
			}]
		);
	}

	#[derive(Default, Debug, PartialEq)]
	struct Contact {
		first_name: String,
		email_address: Option<String>,
	}

	impl Hydrate for Contact {
		fn schema() -> Schema<Self> {
			Schema::<Self>::new()
				.string("first_name", None, |c, v| c.first_name = v)
				.optional_string("email_address", None, |c, v| c.email_address = v)
		}
	}

	#[test]
	fn fallback_normalizes_names() {
		let contacts = Hydrator::new(source("First Name,E-Mail Address\nDana,d@x.io\n", true))
			.hydrate_all::<Contact>(true)
			.unwrap();
		assert_eq!(contacts[0].first_name, "Dana");
		assert_eq!(contacts[0].email_address.as_deref(), Some("d@x.io"));
	}

	#[test]
	fn fallback_needs_a_header() {
		let contacts = Hydrator::new(source("Dana,d@x.io\n", false))
			.hydrate_all::<Contact>(true)
			.unwrap();
		assert_eq!(contacts, vec![Contact::default()]);
	}

	#[derive(Default, Debug)]
	struct Precedence {
		by_index: String,
		by_name: String,
		by_fallback: String,
		unmatched: Option<String>,
	}

	impl Hydrate for Precedence {
		fn schema() -> Schema<Self> {
			Schema::<Self>::new()
				.string(
					"by_index",
					Column {
						index: Some(2),
						name: Some("byindex".to_string()),
						..Default::default()
					},
					|p, v| p.by_index = v,
				)
				.string("by_name", Column::name("by_fallback"), |p, v| p.by_name = v)
				.string("by_fallback", None, |p, v| p.by_fallback = v)
				.optional_string("unmatched", Column::name("missing"), |p, v| p.unmatched = v)
		}
	}

	#[test]
	fn resolution_precedence() {
		let rows = Hydrator::new(source("byindex,by_fallback,third\na,b,c\n", true))
			.hydrate_all::<Precedence>(true)
			.unwrap();
		assert_eq!(rows[0].by_index, "c");
		assert_eq!(rows[0].by_name, "b");
		assert_eq!(rows[0].by_fallback, "b");
		assert_eq!(rows[0].unmatched, None);

		let rows = Hydrator::new(source("byindex,by_fallback,third\na,b,c\n", true))
			.hydrate_all::<Precedence>(false)
			.unwrap();
		assert_eq!(rows[0].by_index, "a");
		assert_eq!(rows[0].by_name, "");
	}

	#[derive(Default, Debug)]
	struct RequiredName {
		name: String,
	}

	impl Hydrate for RequiredName {
		fn schema() -> Schema<Self> {
			Schema::<Self>::new().string("name", Column::name("name").required(), |r, v| r.name = v)
		}
	}

	#[test]
	fn required_present() {
		let rows = Hydrator::new(source("name\nIvy\n", true))
			.hydrate_all::<RequiredName>(true)
			.unwrap();
		assert_eq!(rows[0].name, "Ivy");
	}

	#[test]
	fn required_missing_stops_the_stream() {
		let mut hydrated = Hydrator::new(source("name,age\nJo,1\n,30\nKim,2\n", true))
			.hydrate::<RequiredName>(true)
			.unwrap();
		assert_eq!(hydrated.next().unwrap().unwrap().name, "Jo");
		match hydrated.next() {
			Some(Err(Error::Mapping(e))) => {
				assert_eq!(e.field(), "name");
				assert_eq!(e.row(), Some(2));
				assert!(e.to_string().contains("\"name\""));
			}
			_ => panic!("Expected mapping error"),
		}
		assert!(hydrated.next().is_none());
	}

	#[test]
	fn required_by_name_on_positional_rows() {
		let err = Hydrator::new(source(",30\n", false))
			.hydrate_all::<RequiredName>(true)
			.unwrap_err();
		assert!(matches!(
			err,
			Error::Mapping(MappingError::MissingRequired { .. })
		));
	}

	#[derive(Default, Debug)]
	struct Age {
		age: i64,
	}

	#[derive(Default, Debug)]
	struct UnknownConverter(Age);

	impl Hydrate for UnknownConverter {
		fn schema() -> Schema<Self> {
			Schema::<Self>::new().int(
				"age",
				Column::name("age").converter("this_is_not_callable"),
				|u, v| u.0.age = v,
			)
		}
	}

	#[test]
	fn unknown_converter() {
		let err = Hydrator::new(source("name,age\nDave,notanumber\n", true))
			.hydrate_all::<UnknownConverter>(true)
			.unwrap_err();
		match err {
			Error::Mapping(MappingError::UnresolvedConverter { field, converter }) => {
				assert_eq!(field, "age");
				assert_eq!(converter, "this_is_not_callable");
			}
			other => panic!("Expected UnresolvedConverter, got {:?}", other),
		}

		// Descriptors are ignored without declared mapping, converters included
		let rows = Hydrator::new(source("name,age\nDave,7\n", true))
			.hydrate_all::<UnknownConverter>(false)
			.unwrap();
		assert_eq!(rows[0].0.age, 7);
	}

	#[derive(Default, Debug)]
	struct Throwing(Age);

	impl Hydrate for Throwing {
		fn schema() -> Schema<Self> {
			Schema::<Self>::new().int(
				"age",
				Column::name("age").converter("Thrower::boom"),
				|t, v| t.0.age = v,
			)
		}
	}

	#[test]
	fn failing_converter_is_wrapped() {
		let mut converters = ConverterRegistry::default();
		converters.register_method("Thrower", "boom", |_| Err("boom".into()));
		let err = Hydrator::new(source("name,age\nEve,123\n", true))
			.with_converters(converters)
			.hydrate_all::<Throwing>(true)
			.unwrap_err();
		assert!(err.to_string().contains("boom"));
		assert!(err.to_string().contains("\"age\""));
		match err {
			Error::Mapping(e @ MappingError::ConverterFailed { .. }) => {
				let source = std::error::Error::source(&e).unwrap();
				assert_eq!(source.to_string(), "boom");
			}
			other => panic!("Expected ConverterFailed, got {:?}", other),
		}
	}

	#[test]
	fn converter_skips_empty_values() {
		let mut converters = ConverterRegistry::default();
		converters.register_method("Thrower", "boom", |_| Err("boom".into()));
		let rows = Hydrator::new(source("name,age\nEve,\n", true))
			.with_converters(converters)
			.hydrate_all::<Throwing>(true)
			.unwrap();
		assert_eq!(rows[0].0.age, 0);
	}

	#[derive(Default, Debug)]
	struct Scores {
		score: f64,
		active: bool,
		level: Option<i64>,
		count: i64,
	}

	impl Hydrate for Scores {
		fn schema() -> Schema<Self> {
			Schema::<Self>::new()
				.float("score", None, |s, v| s.score = v)
				.boolean("active", None, |s, v| s.active = v)
				.optional_int("level", None, |s, v| s.level = v)
				.int("count", None, |s, v| s.count = v)
		}
	}

	#[test]
	fn scalar_coercion() {
		let rows = Hydrator::new(source(
			"score,active,level,count\n4.5,yes,,\n0,no,3,x\nabc,Y,,7\n",
			true,
		))
		.hydrate_all::<Scores>(true)
		.unwrap();
		assert_eq!(rows[0].score, 4.5);
		assert!(rows[0].active);
		assert_eq!(rows[0].level, None);
		assert_eq!(rows[0].count, 0);

		assert_eq!(rows[1].score, 0.0);
		assert!(!rows[1].active);
		assert_eq!(rows[1].level, Some(3));
		assert_eq!(rows[1].count, 0);

		assert_eq!(rows[2].score, 0.0);
		assert!(rows[2].active);
		assert_eq!(rows[2].count, 7);
	}

	#[derive(Default)]
	struct Loose {
		raw: Option<Value>,
		cents: Option<Value>,
		nested: Vec<String>,
	}

	impl Hydrate for Loose {
		fn schema() -> Schema<Self> {
			Schema::<Self>::new()
				.value("raw", None, |l, v| l.raw = v)
				.value(
					"cents",
					Column::name("price").convert_with(|raw| {
						Ok(Value::Int((raw.parse::<f64>()? * 100.0).round() as i64))
					}),
					|l, v| l.cents = v,
				)
				.nested("nested", None)
		}
	}

	#[test]
	fn untyped_and_nested_fields() {
		let rows = Hydrator::new(source("raw,price,nested\n,1.25,a;b\n", true))
			.hydrate_all::<Loose>(true)
			.unwrap();
		assert_eq!(rows[0].raw, Some(Value::from("")));
		assert_eq!(rows[0].cents, Some(Value::Int(125)));
		assert!(rows[0].nested.is_empty());
	}

	#[test]
	fn index_on_named_rows_uses_position() {
		#[derive(Default)]
		struct Second {
			value: String,
		}
		impl Hydrate for Second {
			fn schema() -> Schema<Self> {
				Schema::<Self>::new().string("value", Column::index(1), |s, v| s.value = v)
			}
		}
		let rows = Hydrator::new(source("a,b\n1,2\n3\n", true))
			.hydrate_all::<Second>(true)
			.unwrap();
		assert_eq!(rows[0].value, "2");
		assert_eq!(rows[1].value, "");
	}

	#[test]
	fn reader_errors_end_the_stream() {
		let bytes: &[u8] = b"name,age,note\nAl\xffce,1,\nBob,2,\n";
		let source = RowSource::from_reader(bytes, Options::default()).unwrap();
		let mut hydrated = Hydrator::new(source).hydrate::<Person>(true).unwrap();
		assert!(matches!(hydrated.next(), Some(Err(Error::Encoding { .. }))));
		assert!(hydrated.next().is_none());
	}
}
