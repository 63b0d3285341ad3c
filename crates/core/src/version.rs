use std::fmt;

/// BuildInfo describes the running binary.
#[derive(Clone, Debug, serde::Serialize)]
pub struct BuildInfo {
	pub version: &'static str,
	pub rust_version: &'static str,
}

impl BuildInfo {
	pub fn new() -> Self {
		BuildInfo {
			version: env!("CARGO_PKG_VERSION"),
			rust_version: env!("CARGO_PKG_RUST_VERSION"),
		}
	}
}

impl Default for BuildInfo {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for BuildInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "version: {} (rust {})", self.version, self.rust_version)
	}
}
