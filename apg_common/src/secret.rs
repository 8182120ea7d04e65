use std::fmt::{self, Debug, Display};

const MASK: &str = "****";

/// Keeps provider credentials (PayNecta and Statum API keys, the admin key) out of logs.
///
/// The wrapped value is only reachable through [`Secret::reveal`], so call sites are easy to audit, and both
/// `Debug` and `Display` print a fixed mask. A config struct holding secrets can derive `Debug` safely.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    inner: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn reveal(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}
