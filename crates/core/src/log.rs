use std::sync::Arc;

use parking_lot::Mutex;

/// AsyncLog is a shared cell for information that is discovered asynchronously, after the
/// logging context has been handed off. A streaming response body, for instance, learns the
/// token usage only when the final frame arrives; the request-level log keeps a handle to the
/// same cell and reads it at completion time.
#[derive(Debug)]
pub struct AsyncLog<T>(Arc<Mutex<Option<T>>>);

impl<T> Clone for AsyncLog<T> {
	fn clone(&self) -> Self {
		AsyncLog(self.0.clone())
	}
}

impl<T> Default for AsyncLog<T> {
	fn default() -> Self {
		AsyncLog(Arc::new(Mutex::new(None)))
	}
}

impl<T> AsyncLog<T> {
	pub fn store(&self, v: Option<T>) {
		*self.0.lock() = v;
	}

	/// non_atomic_mutate mutates the value in place. If no value is currently stored, the
	/// closure is not run. The mutation itself is guarded; the name warns that read-modify-write
	/// sequences spanning multiple calls are not.
	pub fn non_atomic_mutate(&self, f: impl FnOnce(&mut T)) {
		let mut guard = self.0.lock();
		if let Some(v) = guard.as_mut() {
			f(v)
		}
	}

	pub fn take(&self) -> Option<T> {
		self.0.lock().take()
	}

	pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
		f(self.0.lock().as_ref())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mutate_skips_empty_cell() {
		let log: AsyncLog<u64> = Default::default();
		log.non_atomic_mutate(|v| *v += 1);
		assert_eq!(log.take(), None);

		log.store(Some(1));
		log.non_atomic_mutate(|v| *v += 1);
		assert_eq!(log.take(), Some(2));
	}
}
