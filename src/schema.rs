use crate::{Column, Value};

/// A type that can be built from CSV rows.
///
/// The schema is a static table of fields, each with an optional [`Column`] descriptor and a
/// setter for its declared kind. Instances start from [`Default`] and are filled field by field.
pub trait Hydrate: Default {
	fn schema() -> Schema<Self>;
}

type Setter<T, V> = Box<dyn Fn(&mut T, V)>;

/// Declared type of a field, and how to assign it
pub enum FieldKind<T> {
	String(Setter<T, String>),
	OptionalString(Setter<T, Option<String>>),
	Int(Setter<T, i64>),
	OptionalInt(Setter<T, Option<i64>>),
	Float(Setter<T, f64>),
	OptionalFloat(Setter<T, Option<f64>>),
	Bool(Setter<T, bool>),
	OptionalBool(Setter<T, Option<bool>>),
	/// No declared type: the value is assigned as converted, without coercion
	Value(Setter<T, Option<Value>>),
	/// Non-scalar field. Never assigned, it keeps its default.
	Nested,
}

impl<T> FieldKind<T> {
	/// Coerce `value` to the declared type and assign it.
	///
	/// Optional kinds get `None` for a missing or empty value. Other kinds coerce a missing value
	/// as the empty string.
	pub(crate) fn assign(&self, target: &mut T, value: Option<Value>) {
		let present = value.clone().filter(|v| !v.is_empty());
		match self {
			FieldKind::String(set) => set(target, value.map(|v| v.to_string()).unwrap_or_default()),
			FieldKind::OptionalString(set) => set(target, present.map(|v| v.to_string())),
			FieldKind::Int(set) => set(target, value.map_or(0, |v| v.to_int())),
			FieldKind::OptionalInt(set) => set(target, present.map(|v| v.to_int())),
			FieldKind::Float(set) => set(target, value.map_or(0.0, |v| v.to_float())),
			FieldKind::OptionalFloat(set) => set(target, present.map(|v| v.to_float())),
			FieldKind::Bool(set) => set(target, value.map_or(false, |v| v.to_bool())),
			FieldKind::OptionalBool(set) => set(target, present.map(|v| v.to_bool())),
			FieldKind::Value(set) => set(target, value),
			FieldKind::Nested => {}
		}
	}
}

pub(crate) struct Field<T> {
	pub name: String,
	pub column: Option<Column>,
	pub kind: FieldKind<T>,
}

/// The field table of a [`Hydrate`] type.
///
/// ## Example
///
/// ```
/// use csv_hydrate::{Column, Schema};
///
/// #[derive(Default)]
/// struct Reading {
///   sensor: String,
///   celsius: Option<f64>,
/// }
///
/// let schema = Schema::<Reading>::new()
///   .string("sensor", Column::index(0), |r, v| r.sensor = v)
///   .optional_float("celsius", Column::index(1), |r, v| r.celsius = v);
///
/// assert_eq!(schema.field_names(), vec!["sensor", "celsius"]);
/// ```
pub struct Schema<T> {
	fields: Vec<Field<T>>,
}

impl<T> Schema<T> {
	pub fn new() -> Self {
		Schema { fields: Vec::new() }
	}

	/// Add a field with an explicit [`FieldKind`]
	pub fn field(mut self, name: &str, column: impl Into<Option<Column>>, kind: FieldKind<T>) -> Self {
		self.fields.push(Field {
			name: name.to_string(),
			column: column.into(),
			kind,
		});
		self
	}

	pub fn string<F>(self, name: &str, column: impl Into<Option<Column>>, set: F) -> Self
	where
		F: Fn(&mut T, String) + 'static,
	{
		self.field(name, column, FieldKind::String(Box::new(set)))
	}

	pub fn optional_string<F>(self, name: &str, column: impl Into<Option<Column>>, set: F) -> Self
	where
		F: Fn(&mut T, Option<String>) + 'static,
	{
		self.field(name, column, FieldKind::OptionalString(Box::new(set)))
	}

	pub fn int<F>(self, name: &str, column: impl Into<Option<Column>>, set: F) -> Self
	where
		F: Fn(&mut T, i64) + 'static,
	{
		self.field(name, column, FieldKind::Int(Box::new(set)))
	}

	pub fn optional_int<F>(self, name: &str, column: impl Into<Option<Column>>, set: F) -> Self
	where
		F: Fn(&mut T, Option<i64>) + 'static,
	{
		self.field(name, column, FieldKind::OptionalInt(Box::new(set)))
	}

	pub fn float<F>(self, name: &str, column: impl Into<Option<Column>>, set: F) -> Self
	where
		F: Fn(&mut T, f64) + 'static,
	{
		self.field(name, column, FieldKind::Float(Box::new(set)))
	}

	pub fn optional_float<F>(self, name: &str, column: impl Into<Option<Column>>, set: F) -> Self
	where
		F: Fn(&mut T, Option<f64>) + 'static,
	{
		self.field(name, column, FieldKind::OptionalFloat(Box::new(set)))
	}

	pub fn boolean<F>(self, name: &str, column: impl Into<Option<Column>>, set: F) -> Self
	where
		F: Fn(&mut T, bool) + 'static,
	{
		self.field(name, column, FieldKind::Bool(Box::new(set)))
	}

	pub fn optional_bool<F>(self, name: &str, column: impl Into<Option<Column>>, set: F) -> Self
	where
		F: Fn(&mut T, Option<bool>) + 'static,
	{
		self.field(name, column, FieldKind::OptionalBool(Box::new(set)))
	}

	/// A field without a declared type. Receives the converted value as is.
	pub fn value<F>(self, name: &str, column: impl Into<Option<Column>>, set: F) -> Self
	where
		F: Fn(&mut T, Option<Value>) + 'static,
	{
		self.field(name, column, FieldKind::Value(Box::new(set)))
	}

	/// A non-scalar field. Its column is still resolved, checked and converted, but nothing is assigned.
	pub fn nested(self, name: &str, column: impl Into<Option<Column>>) -> Self {
		self.field(name, column, FieldKind::Nested)
	}

	pub fn field_names(&self) -> Vec<&str> {
		self.fields.iter().map(|field| field.name.as_str()).collect()
	}

	pub(crate) fn into_fields(self) -> Vec<Field<T>> {
		self.fields
	}
}

impl<T> Default for Schema<T> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
#[derive(Default, Debug, PartialEq)]
struct Sample {
	text: String,
	maybe: Option<String>,
	count: i64,
	ratio: f64,
	flag: bool,
	maybe_flag: Option<bool>,
	raw: Option<Value>,
}

#[test]
fn assign_coerces_by_kind() {
	let schema = Schema::<Sample>::new()
		.string("text", None, |s, v| s.text = v)
		.optional_string("maybe", None, |s, v| s.maybe = v)
		.int("count", None, |s, v| s.count = v)
		.float("ratio", None, |s, v| s.ratio = v)
		.boolean("flag", None, |s, v| s.flag = v)
		.optional_bool("maybe_flag", None, |s, v| s.maybe_flag = v)
		.value("raw", None, |s, v| s.raw = v);
	let fields = schema.into_fields();

	let mut sample = Sample::default();
	let inputs = [
		Some(Value::Int(7)),
		Some(Value::from("")),
		Some(Value::from("12 apples")),
		Some(Value::from("4.5")),
		Some(Value::from("Yes")),
		Some(Value::from("0")),
		Some(Value::Float(2.5)),
	];
	for (field, input) in fields.iter().zip(inputs) {
		field.kind.assign(&mut sample, input);
	}
	assert_eq!(
		sample,
		Sample {
			text: "7".to_string(),
			maybe: None,
			count: 12,
			ratio: 4.5,
			flag: true,
			maybe_flag: Some(false),
			raw: Some(Value::Float(2.5)),
		}
	);
}

#[test]
fn assign_missing_values() {
	let schema = Schema::<Sample>::new()
		.string("text", None, |s, v| s.text = v)
		.int("count", None, |s, v| s.count = v)
		.optional_bool("maybe_flag", None, |s, v| s.maybe_flag = v)
		.nested("raw", None);
	let mut sample = Sample {
		text: "before".to_string(),
		count: 9,
		maybe_flag: Some(true),
		raw: Some(Value::Int(1)),
		..Default::default()
	};
	for field in schema.into_fields() {
		field.kind.assign(&mut sample, None);
	}
	assert_eq!(sample.text, "");
	assert_eq!(sample.count, 0);
	assert_eq!(sample.maybe_flag, None);
	assert_eq!(sample.raw, Some(Value::Int(1)));
}
