use std::fmt;

/// A scalar cell value, as produced by converters and consumed by the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Str(String),
	Int(i64),
	Float(f64),
	Bool(bool),
}

impl Value {
	/// True for the empty string. Numbers and booleans are never empty.
	pub fn is_empty(&self) -> bool {
		matches!(self, Value::Str(s) if s.is_empty())
	}

	pub fn to_int(&self) -> i64 {
		match self {
			Value::Str(s) => loose_int(s),
			Value::Int(i) => *i,
			Value::Float(f) => float_to_int(*f),
			Value::Bool(b) => *b as i64,
		}
	}

	pub fn to_float(&self) -> f64 {
		match self {
			Value::Str(s) => loose_float(s),
			Value::Int(i) => *i as f64,
			Value::Float(f) => *f,
			Value::Bool(b) => *b as i64 as f64,
		}
	}

	/// `1`, `true`, `yes` and `y` are true, in any case. Everything else is false.
	pub fn to_bool(&self) -> bool {
		match self {
			Value::Bool(b) => *b,
			other => {
				let s = other.to_string().to_lowercase();
				matches!(s.as_str(), "1" | "true" | "yes" | "y")
			}
		}
	}
}

/// Booleans print as `1` and the empty string.
impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Str(s) => f.write_str(s),
			Value::Int(i) => write!(f, "{}", i),
			Value::Float(n) => write!(f, "{}", n),
			Value::Bool(true) => f.write_str("1"),
			Value::Bool(false) => Ok(()),
		}
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::Str(s)
	}
}
impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::Str(s.to_string())
	}
}
impl From<i64> for Value {
	fn from(i: i64) -> Self {
		Value::Int(i)
	}
}
impl From<f64> for Value {
	fn from(f: f64) -> Self {
		Value::Float(f)
	}
}
impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

/// Returns the longest numeric prefix of `s` after leading whitespace, and whether it is integral.
///
/// Accepts `[+-]? (digits [. digits*] | . digits) ([eE] [+-]? digits)?`.
fn numeric_prefix(s: &str) -> Option<(&str, bool)> {
	let s = s.trim_start_matches([' ', '\t', '\n', '\r', '\x0b', '\x0c']);
	let bytes = s.as_bytes();
	let mut end = 0;
	if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
		end += 1;
	}
	let int_start = end;
	while end < bytes.len() && bytes[end].is_ascii_digit() {
		end += 1;
	}
	let mut digits = end - int_start;
	let mut integral = true;

	if bytes.get(end) == Some(&b'.') {
		let mut frac_end = end + 1;
		while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
			frac_end += 1;
		}
		let frac_digits = frac_end - end - 1;
		if digits + frac_digits > 0 {
			digits += frac_digits;
			end = frac_end;
			integral = false;
		}
	}
	if digits == 0 {
		return None;
	}

	if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
		let mut exp_end = end + 1;
		if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
			exp_end += 1;
		}
		let exp_digits_start = exp_end;
		while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
			exp_end += 1;
		}
		if exp_end > exp_digits_start {
			end = exp_end;
			integral = false;
		}
	}
	Some((&s[..end], integral))
}

/// Lenient integer cast: the numeric prefix, truncated and saturated. `0` when there is none.
pub(crate) fn loose_int(s: &str) -> i64 {
	match numeric_prefix(s) {
		Some((prefix, true)) => match prefix.parse::<i64>() {
			Ok(i) => i,
			Err(_) if prefix.starts_with('-') => i64::MIN,
			Err(_) => i64::MAX,
		},
		Some((prefix, false)) => prefix.parse::<f64>().map(float_to_int).unwrap_or(0),
		None => 0,
	}
}

/// Truncates toward zero and saturates. Infinities and NaN become `0`.
fn float_to_int(f: f64) -> i64 {
	if f.is_finite() {
		f as i64
	} else {
		0
	}
}

/// Lenient float cast: the numeric prefix, or `0.0` when there is none.
pub(crate) fn loose_float(s: &str) -> f64 {
	numeric_prefix(s)
		.and_then(|(prefix, _)| prefix.parse::<f64>().ok())
		.unwrap_or(0.0)
}

#[test]
fn loose_int_casts() {
	assert_eq!(loose_int("42"), 42);
	assert_eq!(loose_int("  -7 "), -7);
	assert_eq!(loose_int("+3"), 3);
	assert_eq!(loose_int("12abc"), 12);
	assert_eq!(loose_int("4.9"), 4);
	assert_eq!(loose_int("1e3"), 1000);
	assert_eq!(loose_int("abc"), 0);
	assert_eq!(loose_int(""), 0);
	assert_eq!(loose_int("-"), 0);
	assert_eq!(loose_int("99999999999999999999"), i64::MAX);
	assert_eq!(loose_int("-99999999999999999999"), i64::MIN);
	assert_eq!(loose_int("1e999"), 0);
	assert_eq!(loose_int("-1e999"), 0);
	assert_eq!(loose_int("1e30"), i64::MAX);
	assert_eq!(Value::Float(f64::INFINITY).to_int(), 0);
	assert_eq!(Value::Float(f64::NAN).to_int(), 0);
}

#[test]
fn loose_float_casts() {
	assert_eq!(loose_float("4.5"), 4.5);
	assert_eq!(loose_float(".5"), 0.5);
	assert_eq!(loose_float("3."), 3.0);
	assert_eq!(loose_float("2.5e2x"), 250.0);
	assert_eq!(loose_float("1e"), 1.0);
	assert_eq!(loose_float("."), 0.0);
	assert_eq!(loose_float("no"), 0.0);
	assert_eq!(loose_float(""), 0.0);
}

#[test]
fn bool_casts() {
	for s in ["1", "true", "TRUE", "Yes", "y", "Y"] {
		assert!(Value::from(s).to_bool(), "{}", s);
	}
	for s in ["0", "", "no", "false", "2", "on"] {
		assert!(!Value::from(s).to_bool(), "{}", s);
	}
	assert!(Value::Int(1).to_bool());
	assert!(!Value::Int(2).to_bool());
	assert!(Value::Float(1.0).to_bool());
}

#[test]
fn stringify() {
	assert_eq!(Value::Float(4.5).to_string(), "4.5");
	assert_eq!(Value::Float(1.0).to_string(), "1");
	assert_eq!(Value::Int(-3).to_string(), "-3");
	assert_eq!(Value::Bool(true).to_string(), "1");
	assert_eq!(Value::Bool(false).to_string(), "");
}
