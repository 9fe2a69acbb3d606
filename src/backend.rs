//! Execution backend selection.
//!
//! Units inside one layer are independent, so a layer can compute them one
//! after another or hand them to the rayon thread pool. Layers themselves
//! always run strictly in order.
//!
//! # Supported Backends
//!
//! - `Serial`: plain iteration on the calling thread (default).
//! - `Rayon`: data-parallel units through `rayon::par_iter_mut`.
//!
//! The choice is stored globally in an `AtomicU8`, so it can be flipped at
//! runtime between passes without threading a handle through every call.

use core::convert::TryFrom;
use core::sync::atomic::{AtomicU8, Ordering};

/// Enumeration of the ways a layer can compute its units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Backend {
    /// One unit after another on the calling thread (default).
    #[default]
    Serial = 0,
    /// Units of a layer spread over the rayon pool.
    Rayon,
}

impl TryFrom<u8> for Backend {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Serial),
            1 => Ok(Self::Rayon),
            _ => Err(()),
        }
    }
}

/// Global state for the active backend.
///
/// Changing the backend while a pass is running only affects layers that
/// have not started yet.
static GLOBAL_BACKEND: AtomicU8 = AtomicU8::new(Backend::Serial as u8);

/// Sets the backend used by subsequent layer computations.
///
/// # Example
///
/// ```
/// use varnet::backend::{set_backend, get_backend, Backend};
/// set_backend(Backend::Rayon);
/// assert_eq!(get_backend(), Backend::Rayon);
/// set_backend(Backend::Serial);
/// ```
pub fn set_backend(b: Backend) {
    log::debug!("switching layer backend to {b:?}");
    GLOBAL_BACKEND.store(b as u8, Ordering::Release);
}

/// Returns the active backend.
///
/// If the stored value is invalid, defaults to [`Backend::Serial`].
pub fn get_backend() -> Backend {
    Backend::try_from(GLOBAL_BACKEND.load(Ordering::Acquire)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_conversion() {
        assert_eq!(Backend::try_from(0), Ok(Backend::Serial));
        assert_eq!(Backend::try_from(1), Ok(Backend::Rayon));
        assert!(Backend::try_from(7).is_err());
    }
}
