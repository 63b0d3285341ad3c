use serde::{Deserialize, Deserializer};

pub fn is_default<T: Default + PartialEq>(t: &T) -> bool {
	*t == Default::default()
}

/// unix_seconds handles timestamp fields that arrive as either integer or floating point Unix
/// seconds, and always re-serialize as integer seconds.
pub mod unix_seconds {
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(t: &i64, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_i64(*t)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
	where
		D: Deserializer<'de>,
	{
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Seconds {
			Int(i64),
			Float(f64),
		}
		Ok(match Seconds::deserialize(deserializer)? {
			Seconds::Int(i) => i,
			Seconds::Float(f) => f as i64,
		})
	}
}

/// Like [`unix_seconds`] but for optional fields.
pub mod unix_seconds_option {
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(t: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
		match t {
			Some(v) => serializer.serialize_some(v),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
	where
		D: Deserializer<'de>,
	{
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Seconds {
			Int(i64),
			Float(f64),
		}
		Ok(
			Option::<Seconds>::deserialize(deserializer)?.map(|s| match s {
				Seconds::Int(i) => i,
				Seconds::Float(f) => f as i64,
			}),
		)
	}
}

/// de_string_or_int accepts either `"5"` or `5`.
pub fn de_string_or_int<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum StringOrInt {
		String(String),
		Int(i64),
	}
	Ok(match StringOrInt::deserialize(deserializer)? {
		StringOrInt::String(s) => s,
		StringOrInt::Int(i) => i.to_string(),
	})
}

#[cfg(test)]
mod tests {
	use serde::{Deserialize, Serialize};

	#[derive(Serialize, Deserialize)]
	struct Stamp {
		#[serde(with = "super::unix_seconds")]
		created: i64,
	}

	#[test]
	fn unix_seconds_widens_floats_on_ingress() {
		let s: Stamp = serde_json::from_str(r#"{"created": 1717000000.25}"#).unwrap();
		assert_eq!(s.created, 1717000000);
		let s: Stamp = serde_json::from_str(r#"{"created": 1717000000}"#).unwrap();
		assert_eq!(s.created, 1717000000);
		// Egress is always an integer
		assert_eq!(
			serde_json::to_string(&s).unwrap(),
			r#"{"created":1717000000}"#
		);
	}
}
