use crate::value::{loose_float, loose_int};
use crate::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub type ConverterError = Box<dyn std::error::Error + Send + Sync>;

/// Turns a non-empty raw cell into a value before coercion.
pub type Converter = Arc<dyn Fn(&str) -> Result<Value, ConverterError> + Send + Sync>;

/// Named converters that [`Column::converter`](crate::Column::converter) references resolve against.
///
/// The default registry contains:
///
/// | name        | result                                        |
/// |-------------|-----------------------------------------------|
/// | `int`       | lenient integer cast                          |
/// | `float`     | lenient float cast                            |
/// | `bool`      | `1`/`true`/`yes`/`y` check                    |
/// | `strict_int`| integer parse, fails on anything else         |
/// | `trim`      | surrounding whitespace removed                |
/// | `lowercase` | lowercased string                             |
/// | `uppercase` | uppercased string                             |
#[derive(Clone)]
pub struct ConverterRegistry {
	converters: HashMap<String, Converter>,
}

impl ConverterRegistry {
	/// A registry without any converters
	pub fn empty() -> Self {
		Self {
			converters: HashMap::new(),
		}
	}

	pub fn register<F>(&mut self, name: &str, f: F) -> &mut Self
	where
		F: Fn(&str) -> Result<Value, ConverterError> + Send + Sync + 'static,
	{
		self.converters.insert(name.to_string(), Arc::new(f));
		self
	}

	/// Register under an `owner::method` locator.
	///
	/// ## Example
	///
	/// ```
	/// use csv_hydrate::{ConverterRef, ConverterRegistry, Value};
	///
	/// let mut registry = ConverterRegistry::empty();
	/// registry.register_method("Money", "cents", |raw| {
	///   Ok(Value::Int((raw.parse::<f64>()? * 100.0).round() as i64))
	/// });
	///
	/// let cents = registry.resolve(&ConverterRef::from("Money::cents")).unwrap();
	/// assert_eq!(cents("1.25").unwrap(), Value::Int(125));
	/// ```
	pub fn register_method<F>(&mut self, owner: &str, method: &str, f: F) -> &mut Self
	where
		F: Fn(&str) -> Result<Value, ConverterError> + Send + Sync + 'static,
	{
		self.register(&format!("{}::{}", owner, method), f)
	}

	pub fn get(&self, name: &str) -> Option<Converter> {
		self.converters.get(name).cloned()
	}

	/// Inline converters resolve to themselves. Returns `None` for unknown names.
	pub fn resolve(&self, converter: &crate::ConverterRef) -> Option<Converter> {
		match converter {
			crate::ConverterRef::Inline(f) => Some(f.clone()),
			crate::ConverterRef::Named(name) => self.get(name),
			crate::ConverterRef::Method { owner, method } => {
				self.get(&format!("{}::{}", owner, method))
			}
		}
	}
}

impl Default for ConverterRegistry {
	fn default() -> Self {
		let mut registry = Self::empty();
		registry
			.register("int", |raw| Ok(Value::Int(loose_int(raw))))
			.register("float", |raw| Ok(Value::Float(loose_float(raw))))
			.register("bool", |raw| Ok(Value::Bool(Value::from(raw).to_bool())))
			.register("strict_int", |raw| Ok(Value::Int(raw.trim().parse::<i64>()?)))
			.register("trim", |raw| Ok(Value::from(raw.trim())))
			.register("lowercase", |raw| Ok(Value::Str(raw.to_lowercase())))
			.register("uppercase", |raw| Ok(Value::Str(raw.to_uppercase())));
		registry
	}
}

#[test]
fn builtin_converters() {
	let registry = ConverterRegistry::default();
	let int = registry.get("int").unwrap();
	assert_eq!(int("30").unwrap(), Value::Int(30));
	assert_eq!(int("x").unwrap(), Value::Int(0));

	let strict = registry.get("strict_int").unwrap();
	assert_eq!(strict(" 7 ").unwrap(), Value::Int(7));
	assert!(strict("seven").is_err());

	assert_eq!(registry.get("trim").unwrap()(" a ").unwrap(), Value::from("a"));
	assert!(registry.get("intval").is_none());
}

#[test]
fn method_locator() {
	let mut registry = ConverterRegistry::empty();
	registry.register_method("Thrower", "boom", |_| Err("boom".into()));
	let converter = registry
		.resolve(&crate::ConverterRef::from("Thrower::boom"))
		.unwrap();
	assert_eq!(converter("x").unwrap_err().to_string(), "boom");
	assert!(registry
		.resolve(&crate::ConverterRef::from("Thrower::other"))
		.is_none());
}
