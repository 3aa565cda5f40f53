use crate::converter::{Converter, ConverterError};
use crate::Value;
use std::fmt;
use std::sync::Arc;

/// How a field finds its column, and what happens to the value on the way in.
///
/// ## Example
///
/// ```
/// use csv_hydrate::Column;
///
/// let column = Column::name("age").converter("int").required();
/// assert_eq!(column.name.as_deref(), Some("age"));
/// assert!(column.required);
/// ```
#[derive(Clone, Default)]
pub struct Column {
	/// Header name to read from
	pub name: Option<String>,
	/// 0-based position to read from. Takes precedence over `name`
	pub index: Option<usize>,
	pub converter: Option<ConverterRef>,
	/// Fail when the value is missing or empty
	pub required: bool,
}

impl Column {
	pub fn name(name: &str) -> Self {
		Self {
			name: Some(name.to_string()),
			..Default::default()
		}
	}

	pub fn index(index: usize) -> Self {
		Self {
			index: Some(index),
			..Default::default()
		}
	}

	/// A descriptor without a column, for fields that only need a converter or `required`
	pub fn fallback() -> Self {
		Self::default()
	}

	/// Accepts a registry name, an `owner::method` locator, or a [`ConverterRef`].
	pub fn converter(mut self, converter: impl Into<ConverterRef>) -> Self {
		self.converter = Some(converter.into());
		self
	}

	/// Use `f` directly as the converter
	pub fn convert_with<F>(self, f: F) -> Self
	where
		F: Fn(&str) -> Result<Value, ConverterError> + Send + Sync + 'static,
	{
		self.converter(ConverterRef::Inline(Arc::new(f)))
	}

	pub fn required(mut self) -> Self {
		self.required = true;
		self
	}
}

impl fmt::Debug for Column {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Column")
			.field("name", &self.name)
			.field("index", &self.index)
			.field("converter", &self.converter)
			.field("required", &self.required)
			.finish()
	}
}

/// A converter, either given directly or looked up in a [`ConverterRegistry`](crate::ConverterRegistry).
#[derive(Clone)]
pub enum ConverterRef {
	Inline(Converter),
	Named(String),
	Method { owner: String, method: String },
}

/// `"owner::method"` becomes a [`ConverterRef::Method`], anything else a [`ConverterRef::Named`].
impl From<&str> for ConverterRef {
	fn from(s: &str) -> Self {
		match s.split_once("::") {
			Some((owner, method)) => ConverterRef::Method {
				owner: owner.to_string(),
				method: method.to_string(),
			},
			None => ConverterRef::Named(s.to_string()),
		}
	}
}

impl fmt::Display for ConverterRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConverterRef::Inline(_) => write!(f, "<inline>"),
			ConverterRef::Named(name) => write!(f, "{}", name),
			ConverterRef::Method { owner, method } => write!(f, "{}::{}", owner, method),
		}
	}
}

impl fmt::Debug for ConverterRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ConverterRef({})", self)
	}
}

#[test]
fn converter_ref_from_str() {
	match ConverterRef::from("Dates::parse") {
		ConverterRef::Method { owner, method } => {
			assert_eq!(owner, "Dates");
			assert_eq!(method, "parse");
		}
		other => panic!("Expected Method, got {:?}", other),
	}
	match ConverterRef::from("int") {
		ConverterRef::Named(name) => assert_eq!(name, "int"),
		other => panic!("Expected Named, got {:?}", other),
	}
}
