//! The per-kernel metadata a lowering pass reports back to the caller (spec §6 "Output"): enough
//! to generate a host-side launch wrapper without re-parsing the emitted source.

use serde::{Deserialize, Serialize};

/// One `@kernel` function's argument, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArgumentMetadata {
	pub name: String,
	#[serde(rename = "isConst")]
	pub is_const: bool,
	pub vartype: String,
}

/// One `@kernel` function lowered by a backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KernelMetadata {
	pub name: String,
	pub arguments: Vec<ArgumentMetadata>,
}

impl KernelMetadata {
	#[must_use]
	pub fn from_function(function: &crate::types::Function) -> Self {
		Self {
			name: function.name.clone(),
			arguments: function
				.parameters
				.iter()
				.map(|parameter| ArgumentMetadata {
					name: parameter.name.clone(),
					is_const: parameter.vartype.qualifiers.has(crate::types::qualifier::CONST),
					vartype: parameter.vartype.to_string(),
				})
				.collect(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_through_json() {
		let metadata = KernelMetadata {
			name: "addVectors".to_owned(),
			arguments: vec![ArgumentMetadata {
				name: "N".to_owned(),
				is_const: false,
				vartype: "int".to_owned(),
			}],
		};
		let json = serde_json::to_string(&metadata).unwrap();
		assert!(json.contains("\"isConst\""));
		let parsed: KernelMetadata = serde_json::from_str(&json).unwrap();
		assert_eq!(parsed, metadata);
	}
}
