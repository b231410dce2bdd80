//! Indicator that records published values.

use std::sync::{Arc, Mutex};

use super::lock;
use crate::traits::Indicator;

/// Records every published value. Clones share the same record.
///
/// # Examples
///
/// ```
/// use attraccess_hardware::mock::RecordingIndicator;
/// use attraccess_hardware::traits::Indicator;
///
/// let text: RecordingIndicator<str> = RecordingIndicator::new();
/// let mut sink = text.clone();
/// sink.publish("In Use");
///
/// assert_eq!(text.last().as_deref(), Some("In Use"));
/// ```
pub struct RecordingIndicator<T: ?Sized + ToOwned> {
    values: Arc<Mutex<Vec<T::Owned>>>,
}

impl<T: ?Sized + ToOwned> RecordingIndicator<T> {
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// All values published so far, oldest first.
    pub fn values(&self) -> Vec<T::Owned>
    where
        T::Owned: Clone,
    {
        lock(&self.values).clone()
    }

    pub fn last(&self) -> Option<T::Owned>
    where
        T::Owned: Clone,
    {
        lock(&self.values).last().cloned()
    }

    pub fn count(&self) -> usize {
        lock(&self.values).len()
    }
}

impl<T: ?Sized + ToOwned> Clone for RecordingIndicator<T> {
    fn clone(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
        }
    }
}

impl<T: ?Sized + ToOwned> Default for RecordingIndicator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + ToOwned> std::fmt::Debug for RecordingIndicator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingIndicator")
            .field("count", &self.count())
            .finish()
    }
}

impl<T> Indicator<T> for RecordingIndicator<T>
where
    T: ?Sized + ToOwned,
    T::Owned: Send,
{
    fn publish(&mut self, value: &T) {
        lock(&self.values).push(value.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_bool_values() {
        let indicator: RecordingIndicator<bool> = RecordingIndicator::new();
        let mut sink = indicator.clone();

        sink.publish(&false);
        sink.publish(&true);

        assert_eq!(indicator.values(), vec![false, true]);
        assert_eq!(indicator.last(), Some(true));
    }

    #[test]
    fn test_closure_indicator() {
        let mut seen = Vec::new();
        {
            let mut sink = |value: &str| seen.push(value.to_string());
            Indicator::<str>::publish(&mut sink, "Available");
        }
        assert_eq!(seen, vec!["Available".to_string()]);
    }
}
