/// Strng provides a cheaply clonable, immutable string.
/// Static strings are stored inline without allocation.
pub type Strng = arcstr::ArcStr;

pub use arcstr::format;
pub use arcstr::literal;

pub fn new<A: AsRef<str>>(s: A) -> Strng {
	Strng::from(s.as_ref())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn literals_and_new_compare_equal() {
		const L: Strng = literal!("api.openai.com");
		assert_eq!(L, new("api.openai.com"));
		assert_eq!(self::format!("{}-{}", "a", "b"), new("a-b"));
	}
}
