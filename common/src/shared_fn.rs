use std::sync::Arc;

/// An optional, cheaply clonable callback.
///
/// Generic over the function signature `F` so it can hold `dyn Fn(..)` objects.
pub struct SharedFn<F: ?Sized + Send + Sync + 'static>(Option<Arc<F>>);

impl<F: ?Sized + Send + Sync + 'static> SharedFn<F> {
    pub fn new(f: Arc<F>) -> Self {
        Self(Some(f))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn is_some(&self) -> bool {
        self.0.is_some()
    }

    pub fn as_ref(&self) -> Option<&Arc<F>> {
        self.0.as_ref()
    }
}

impl<F: ?Sized + Send + Sync + 'static> Clone for SharedFn<F> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<F: ?Sized + Send + Sync + 'static> Default for SharedFn<F> {
    fn default() -> Self {
        Self::none()
    }
}

impl<F: ?Sized + Send + Sync + 'static> std::fmt::Debug for SharedFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            None => write!(f, "SharedFn::None"),
            Some(_) => write!(f, "SharedFn::Some(...)"),
        }
    }
}

impl<F: ?Sized + Send + Sync + 'static> From<Arc<F>> for SharedFn<F> {
    fn from(f: Arc<F>) -> Self {
        Self::new(f)
    }
}
