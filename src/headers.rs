use csv::{StringRecord, StringRecordIter};
use linked_hash_map::LinkedHashMap;

/// The header table of a CSV file: one label per position
#[derive(Debug, Clone, PartialEq)]
pub struct Headers {
	row: StringRecord,
}

impl Headers {
	pub fn from_row(row: StringRecord) -> Self {
		Headers { row }
	}

	pub fn len(&self) -> usize {
		self.row.len()
	}

	pub fn is_empty(&self) -> bool {
		self.row.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<&str> {
		self.row.get(index)
	}

	pub fn get_row(&self) -> &StringRecord {
		&self.row
	}

	/// Key a data record by header label.
	///
	/// Positions without a label are keyed by their stringified index, and positions missing from
	/// the record get an empty value. When a label repeats, the later value wins but the key keeps
	/// its first position.
	pub fn align(&self, record: &StringRecord) -> LinkedHashMap<String, String> {
		let len = self.row.len().max(record.len());
		let mut named = LinkedHashMap::with_capacity(len);
		for i in 0..len {
			let key = match self.row.get(i) {
				Some(label) => label.to_string(),
				None => i.to_string(),
			};
			let value = record.get(i).unwrap_or("").to_string();
			match named.get_mut(&key) {
				Some(existing) => *existing = value,
				None => {
					named.insert(key, value);
				}
			}
		}
		named
	}
}

impl<'a> IntoIterator for &'a Headers {
	type Item = &'a str;
	type IntoIter = StringRecordIter<'a>;

	fn into_iter(self) -> StringRecordIter<'a> {
		self.row.into_iter()
	}
}
impl From<Headers> for StringRecord {
	fn from(headers: Headers) -> StringRecord {
		headers.row
	}
}

#[test]
fn align_longer_row() {
	let headers = Headers::from_row(StringRecord::from(vec!["a", "b"]));
	let named = headers.align(&StringRecord::from(vec!["1", "2", "3"]));
	let pairs: Vec<_> = named.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
	assert_eq!(pairs, vec![("a", "1"), ("b", "2"), ("2", "3")]);
}

#[test]
fn align_shorter_row() {
	let headers = Headers::from_row(StringRecord::from(vec!["a", "b", "c"]));
	let named = headers.align(&StringRecord::from(vec!["1"]));
	let pairs: Vec<_> = named.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
	assert_eq!(pairs, vec![("a", "1"), ("b", ""), ("c", "")]);
}

#[test]
fn align_duplicate_labels() {
	let headers = Headers::from_row(StringRecord::from(vec!["x", "y", "x"]));
	let named = headers.align(&StringRecord::from(vec!["1", "2", "3"]));
	let pairs: Vec<_> = named.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
	assert_eq!(pairs, vec![("x", "3"), ("y", "2")]);
}
