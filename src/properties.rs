//! The configuration bag a compile is run with (spec §6 "Source contract"): a key/value tree
//! with nested maps and arrays, exactly `serde_json::Value`'s shape, since `KernelMetadata`
//! already commits this crate to `serde_json` for its sibling output (spec §6 "Output").

use serde_json::Value;

/// Thin typed wrapper around a `serde_json::Value` object. Recognised top-level keys (spec §6):
/// `okl/validate`, `compiler`, `compilerFlags`, `compilerEnvScript`, `header`, `footer`,
/// `defines`, `includes`, `include_paths`, plus backend subtrees like `opencl/extensions/<name>`
/// and `serial/restrict`. Slash-separated paths (`"opencl/extensions/cl_khr_fp64"`) are looked up
/// by walking nested objects one path segment at a time, matching how the original implementation
/// treats `settings["a/b/c"]` as a nested-object accessor rather than a literal key.
#[derive(Debug, Clone, Default)]
pub struct Properties {
	root: Value,
}

impl Properties {
	#[must_use]
	pub fn new() -> Self {
		Self { root: Value::Object(serde_json::Map::new()) }
	}

	#[must_use]
	pub fn from_value(root: Value) -> Self {
		Self { root }
	}

	/// Parses a JSON document into a `Properties` bag (spec §6's "properties object").
	pub fn from_json(text: &str) -> anyhow::Result<Self> {
		Ok(Self::from_value(serde_json::from_str(text)?))
	}

	/// Parses a TOML document into a `Properties` bag, for a human-edited on-disk properties
	/// file (the CLI's `--properties foo.toml`), following the `toml_edit`-based config reading
	/// the teacher does for its own project config.
	pub fn from_toml(text: &str) -> anyhow::Result<Self> {
		let document: toml_edit::DocumentMut = text.parse()?;
		Ok(Self::from_value(toml_item_to_json(document.as_item())))
	}

	fn get_path(&self, path: &str) -> Option<&Value> {
		let mut current = &self.root;
		for segment in path.split('/') {
			current = current.as_object()?.get(segment)?;
		}
		Some(current)
	}

	pub fn set(&mut self, path: &str, value: Value) {
		let mut segments = path.split('/').peekable();
		let mut current = &mut self.root;
		while let Some(segment) = segments.next() {
			if !current.is_object() {
				*current = Value::Object(serde_json::Map::new());
			}
			let map = current.as_object_mut().expect("just ensured object");
			if segments.peek().is_none() {
				map.insert(segment.to_owned(), value);
				return;
			}
			current = map.entry(segment.to_owned()).or_insert_with(|| Value::Object(serde_json::Map::new()));
		}
	}

	#[must_use]
	pub fn has(&self, path: &str) -> bool {
		self.get_path(path).is_some()
	}

	#[must_use]
	pub fn get_bool(&self, path: &str, default: bool) -> bool {
		self.get_path(path).and_then(Value::as_bool).unwrap_or(default)
	}

	#[must_use]
	pub fn get_str(&self, path: &str) -> Option<&str> {
		self.get_path(path).and_then(Value::as_str)
	}

	#[must_use]
	pub fn get_u64(&self, path: &str, default: u64) -> u64 {
		self.get_path(path).and_then(Value::as_u64).unwrap_or(default)
	}

	#[must_use]
	pub fn get_array(&self, path: &str) -> Vec<&Value> {
		self.get_path(path).and_then(Value::as_array).map(|items| items.iter().collect()).unwrap_or_default()
	}

	/// Iterates `defines`' or an extension subtree's entries as `(key, value)` pairs, for the
	/// "each entry becomes a compiler-macro"/"enabled extension" properties (spec §6, §4.J).
	#[must_use]
	pub fn get_object(&self, path: &str) -> Vec<(&str, &Value)> {
		self.get_path(path).and_then(Value::as_object).map(|object| object.iter().map(|(key, value)| (key.as_str(), value)).collect()).unwrap_or_default()
	}
}

fn toml_item_to_json(item: &toml_edit::Item) -> Value {
	match item {
		toml_edit::Item::None => Value::Null,
		toml_edit::Item::Value(value) => toml_value_to_json(value),
		toml_edit::Item::Table(table) => Value::Object(table.iter().map(|(key, value)| (key.to_owned(), toml_item_to_json(value))).collect()),
		toml_edit::Item::ArrayOfTables(tables) => Value::Array(tables.iter().map(|table| Value::Object(table.iter().map(|(key, value)| (key.to_owned(), toml_item_to_json(value))).collect())).collect()),
	}
}

fn toml_value_to_json(value: &toml_edit::Value) -> Value {
	match value {
		toml_edit::Value::String(formatted) => Value::String(formatted.value().clone()),
		toml_edit::Value::Integer(formatted) => Value::Number((*formatted.value()).into()),
		toml_edit::Value::Float(formatted) => serde_json::Number::from_f64(*formatted.value()).map_or(Value::Null, Value::Number),
		toml_edit::Value::Boolean(formatted) => Value::Bool(*formatted.value()),
		toml_edit::Value::Datetime(formatted) => Value::String(formatted.value().to_string()),
		toml_edit::Value::Array(array) => Value::Array(array.iter().map(toml_value_to_json).collect()),
		toml_edit::Value::InlineTable(table) => Value::Object(table.iter().map(|(key, value)| (key.to_owned(), toml_value_to_json(value))).collect()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn nested_path_lookup_walks_objects() {
		let properties = Properties::from_json(r#"{"opencl": {"extensions": {"cl_khr_fp64": true}}}"#).unwrap();
		assert!(properties.get_bool("opencl/extensions/cl_khr_fp64", false));
	}

	#[test]
	fn missing_path_falls_back_to_default() {
		let properties = Properties::new();
		assert!(properties.get_bool("okl/validate", true));
		assert_eq!(properties.get_u64("serial/exclusiveArraySize", 256), 256);
	}

	#[test]
	fn toml_nested_tables_become_nested_objects() {
		let properties = Properties::from_toml("[opencl.extensions]\ncl_khr_fp64 = true\n").unwrap();
		assert!(properties.get_bool("opencl/extensions/cl_khr_fp64", false));
	}

	#[test]
	fn set_creates_intermediate_objects() {
		let mut properties = Properties::new();
		properties.set("serial/restrict", Value::String("__restrict".to_owned()));
		assert_eq!(properties.get_str("serial/restrict"), Some("__restrict"));
	}
}
