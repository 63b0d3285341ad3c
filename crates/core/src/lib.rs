pub mod log;
pub mod strng;
pub mod version;

pub mod prelude {
	pub use crate::strng;
	pub use crate::strng::Strng;
}
