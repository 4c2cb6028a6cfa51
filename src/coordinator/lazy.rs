//! One-shot visibility observer for deferred images

use crate::page::{ImageElement, IntersectionEntry};

use parking_lot::Mutex;
use std::collections::HashMap;

/// Tracks deferred elements until they first become visible
#[derive(Debug, Default)]
pub struct LazyObserver {
    observed: Mutex<HashMap<u64, ImageElement>>,
}

impl LazyObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, element: &ImageElement) {
        self.observed.lock().insert(element.id(), element.clone());
    }

    pub fn is_observing(&self, element_id: u64) -> bool {
        self.observed.lock().contains_key(&element_id)
    }

    pub fn len(&self) -> usize {
        self.observed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observed elements that just became visible, unobserved in the same step
    pub fn take_intersecting(&self, entries: &[IntersectionEntry]) -> Vec<ImageElement> {
        let mut observed = self.observed.lock();
        entries
            .iter()
            .filter(|entry| entry.is_intersecting)
            .filter_map(|entry| observed.remove(&entry.element_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once() {
        let observer = LazyObserver::new();
        let element = ImageElement::lazy("later.jpg");
        observer.observe(&element);

        assert!(observer.take_intersecting(&[IntersectionEntry::hidden(&element)]).is_empty());
        assert!(observer.is_observing(element.id()));

        let visible = [IntersectionEntry::visible(&element)];
        assert_eq!(observer.take_intersecting(&visible), vec![element.clone()]);
        assert!(observer.take_intersecting(&visible).is_empty());
        assert!(observer.is_empty());
    }
}
