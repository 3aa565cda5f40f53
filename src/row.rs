use csv::StringRecord;
use linked_hash_map::LinkedHashMap;

/// One parsed record: positional when the source has no header, keyed by header label otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
	Ordered(StringRecord),
	Named(LinkedHashMap<String, String>),
}

impl Row {
	pub fn len(&self) -> usize {
		match self {
			Row::Ordered(record) => record.len(),
			Row::Named(map) => map.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn is_named(&self) -> bool {
		matches!(self, Row::Named(_))
	}

	/// The value at a position. Named rows are indexed in header order.
	pub fn get_index(&self, index: usize) -> Option<&str> {
		match self {
			Row::Ordered(record) => record.get(index),
			Row::Named(map) => map.values().nth(index).map(String::as_str),
		}
	}

	/// The value under a header label. Always `None` for positional rows.
	pub fn get_name(&self, name: &str) -> Option<&str> {
		match self {
			Row::Ordered(_) => None,
			Row::Named(map) => map.get(name).map(String::as_str),
		}
	}

	/// Label/value pairs of a named row, in order. Empty for positional rows.
	pub fn named_cells(&self) -> impl Iterator<Item = (&str, &str)> {
		let map = match self {
			Row::Ordered(_) => None,
			Row::Named(map) => Some(map),
		};
		map.into_iter()
			.flat_map(|map| map.iter().map(|(k, v)| (k.as_str(), v.as_str())))
	}

	/// Cell values in order, for either kind of row
	pub fn values(&self) -> Vec<&str> {
		match self {
			Row::Ordered(record) => record.iter().collect(),
			Row::Named(map) => map.values().map(String::as_str).collect(),
		}
	}
}

#[test]
fn lookups() {
	let mut map = LinkedHashMap::new();
	map.insert("name".to_string(), "Alice".to_string());
	map.insert("age".to_string(), "30".to_string());
	let named = Row::Named(map);
	assert_eq!(named.get_name("age"), Some("30"));
	assert_eq!(named.get_index(0), Some("Alice"));
	assert_eq!(named.get_index(2), None);

	let ordered = Row::Ordered(StringRecord::from(vec!["Gina", "50"]));
	assert_eq!(ordered.get_index(1), Some("50"));
	assert_eq!(ordered.get_name("0"), None);
	assert_eq!(ordered.named_cells().count(), 0);
}
