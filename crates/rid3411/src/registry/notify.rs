use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use super::{Event, Uav};

type Observer = Box<dyn FnMut(&Uav) + Send>;

/// One observer slot per lifecycle event. Setting a slot replaces the
/// previous observer; events raised before the swap went to the old one,
/// events raised after go to the new one.
///
/// Observers run after the registry mutation with a snapshot of the record,
/// so a panicking observer cannot corrupt the registry. The panic is caught,
/// logged, and reported to the caller as a plain string.
#[derive(Default)]
pub struct EventNotifier {
    on_new: Option<Observer>,
    on_update: Option<Observer>,
    on_timeout: Option<Observer>,
}

impl fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNotifier")
            .field("on_new", &self.on_new.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_timeout", &self.on_timeout.is_some())
            .finish()
    }
}

impl EventNotifier {
    pub fn set(&mut self, event: Event, observer: Observer) {
        let slot = match event {
            Event::New => &mut self.on_new,
            Event::Update => &mut self.on_update,
            Event::Timeout => &mut self.on_timeout,
        };
        *slot = Some(observer);
    }

    /// Deliver `uav` to the observer registered for `event`, if any.
    /// Returns an error description when the observer panicked.
    pub fn notify(&mut self, event: Event, uav: &Uav) -> Option<String> {
        let slot = match event {
            Event::New => &mut self.on_new,
            Event::Update => &mut self.on_update,
            Event::Timeout => &mut self.on_timeout,
        };
        let observer = slot.as_mut()?;
        match catch_unwind(AssertUnwindSafe(|| observer(uav))) {
            Ok(()) => None,
            Err(_) => {
                warn!("{event:?} observer panicked for aircraft {}", uav.id);
                Some(format!("{event:?} observer panicked"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_delivery_and_replacement() {
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let mut notifier = EventNotifier::default();
        let counter = first.clone();
        notifier.set(
            Event::New,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let uav = Uav::default();
        assert!(notifier.notify(Event::New, &uav).is_none());

        let counter = second.clone();
        notifier.set(
            Event::New,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(notifier.notify(Event::New, &uav).is_none());
        assert!(notifier.notify(Event::New, &uav).is_none());

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_no_observer_is_silent() {
        let mut notifier = EventNotifier::default();
        assert!(notifier.notify(Event::Update, &Uav::default()).is_none());
    }

    #[test]
    fn test_panic_is_contained() {
        let mut notifier = EventNotifier::default();
        notifier.set(Event::New, Box::new(|_| panic!("observer bug")));

        let error = notifier.notify(Event::New, &Uav::default());
        assert!(error.unwrap().contains("panicked"));

        // the notifier stays usable afterwards
        notifier.set(Event::New, Box::new(|_| {}));
        assert!(notifier.notify(Event::New, &Uav::default()).is_none());
    }
}
