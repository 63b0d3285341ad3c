use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

/// Claims holds the payload of a JWT. The token is verified by the host proxy before it
/// reaches this layer; here it is only parsed so policies can read its claims.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Claims {
	pub inner: Map<String, Value>,
	pub jwt: String,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("token is not a JWT")]
	NotAJwt,
	#[error("failed to decode payload: {0}")]
	Decode(String),
}

impl Claims {
	/// parse_unverified splits and decodes a compact JWT without checking its signature.
	pub fn parse_unverified(token: &str) -> Result<Claims, Error> {
		let mut parts = token.split('.');
		let (Some(_header), Some(payload), Some(_sig), None) =
			(parts.next(), parts.next(), parts.next(), parts.next())
		else {
			return Err(Error::NotAJwt);
		};
		let bytes = URL_SAFE_NO_PAD
			.decode(payload)
			.map_err(|e| Error::Decode(e.to_string()))?;
		let value: Value =
			serde_json::from_slice(&bytes).map_err(|e| Error::Decode(e.to_string()))?;
		let Value::Object(inner) = value else {
			return Err(Error::Decode("payload is not an object".to_string()));
		};
		Ok(Claims {
			inner,
			jwt: token.to_string(),
		})
	}

	/// from_headers reads the bearer token off the Authorization header, if any.
	pub fn from_headers(headers: &::http::HeaderMap) -> Option<Claims> {
		let auth = headers.get("authorization")?.to_str().ok()?;
		let token = auth.strip_prefix("Bearer ").or_else(|| auth.strip_prefix("bearer "))?;
		Self::parse_unverified(token).ok()
	}

	/// get_claim navigates nested claims with a delimited key ("resource_access.roles").
	pub fn get_claim(&self, key: &str, key_delimiter: &str) -> Option<&str> {
		let keys = key.split(key_delimiter).collect::<Vec<&str>>();
		let mut current_value = &self.inner;
		let num_keys = keys.len();
		for (index, key_part) in keys.into_iter().enumerate() {
			let value = current_value.get(key_part)?;
			if index == num_keys - 1 {
				return value.as_str();
			}
			current_value = value.as_object()?;
		}
		None
	}

	/// scopes is the union of `scope` (whitespace-separated string) and `scp` (array or
	/// string), the two spellings in common circulation.
	pub fn scopes(&self) -> Vec<String> {
		let mut out: Vec<String> = Vec::new();
		if let Some(scope) = self.inner.get("scope").and_then(|v| v.as_str()) {
			out.extend(scope.split_whitespace().map(|s| s.to_string()));
		}
		match self.inner.get("scp") {
			Some(Value::Array(items)) => {
				out.extend(items.iter().filter_map(|v| v.as_str()).map(|s| s.to_string()));
			},
			Some(Value::String(s)) => {
				out.extend(s.split_whitespace().map(|x| x.to_string()));
			},
			_ => {},
		}
		out.sort();
		out.dedup();
		out
	}

	pub fn claims_value(&self) -> Value {
		Value::Object(self.inner.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	pub(crate) fn token(payload: serde_json::Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
		let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
		format!("{header}.{body}.sig")
	}

	#[test]
	fn parses_payload_without_verification() {
		let c = Claims::parse_unverified(&token(serde_json::json!({
			"sub": "u1", "scope": "read write", "scp": ["admin", "write"]
		})))
		.unwrap();
		assert_eq!(c.get_claim("sub", "."), Some("u1"));
		assert_eq!(c.scopes(), vec!["admin", "read", "write"]);
	}

	#[test]
	fn nested_claim_navigation() {
		let c = Claims::parse_unverified(&token(serde_json::json!({
			"realm": {"role": "ops"}
		})))
		.unwrap();
		assert_eq!(c.get_claim("realm.role", "."), Some("ops"));
		assert_eq!(c.get_claim("realm.missing", "."), None);
	}

	#[test]
	fn garbage_is_rejected() {
		assert!(Claims::parse_unverified("not-a-jwt").is_err());
		assert!(Claims::parse_unverified("a.b").is_err());
	}
}
