use sha2::{Digest, Sha256};

/// redact_string replaces content destined for debug logs with a length-and-hash marker. The
/// 16 hex characters of SHA-256 are enough to correlate equal payloads across log lines
/// without disclosing them. Empty strings pass through unchanged.
pub fn redact_string(s: &str) -> String {
	if s.is_empty() {
		return String::new();
	}
	let digest = Sha256::digest(s.as_bytes());
	let mut hash = String::with_capacity(16);
	for b in &digest[..8] {
		hash.push_str(&format!("{b:02x}"));
	}
	format!("[REDACTED LENGTH={} HASH={}]", s.len(), hash)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn format_is_stable() {
		let r = redact_string("tell me a secret");
		let re = regex_lite(&r);
		assert!(re, "unexpected format: {r}");
		assert!(r.contains("LENGTH=16"));
	}

	// Keep the assertion dependency-free: check the shape by hand.
	fn regex_lite(s: &str) -> bool {
		let Some(rest) = s.strip_prefix("[REDACTED LENGTH=") else {
			return false;
		};
		let Some((len, rest)) = rest.split_once(" HASH=") else {
			return false;
		};
		let Some(hash) = rest.strip_suffix(']') else {
			return false;
		};
		len.chars().all(|c| c.is_ascii_digit())
			&& hash.len() == 16
			&& hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
	}

	#[test]
	fn equal_inputs_equal_hashes() {
		assert_eq!(redact_string("same"), redact_string("same"));
		assert_ne!(redact_string("same"), redact_string("different"));
	}

	#[test]
	fn empty_passes_through() {
		assert_eq!(redact_string(""), "");
	}

	#[test]
	fn length_counts_bytes() {
		// Multi-byte content is measured in UTF-8 bytes, matching what was hashed
		let r = redact_string("héllo");
		assert!(r.contains("LENGTH=6"), "{r}");
	}
}
