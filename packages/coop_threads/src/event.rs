use std::ptr;
use std::rc::Rc;
use std::time::Duration;

use crate::Source;

/// A value delivered by an event source, or handed between the frames of a thread.
///
/// Events are cheap to clone. Equality is structural, except that the source of a merged
/// [`Event::From`] is compared by identity.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub enum Event {
    /// No event was supplied, e.g. the input a task sees when it is first started.
    #[default]
    Missing,

    /// A boolean value.
    Bool(bool),

    /// An integer value, e.g. the count of a [`Semaphore`][crate::Semaphore].
    Int(i64),

    /// A text value.
    Text(Rc<str>),

    /// A point in time on the scheduler's clock.
    Time(Duration),

    /// An event that arrived through an [`AnyOf`][crate::AnyOf], tagged with the underlying
    /// source that produced it.
    From {
        /// The underlying source that fired.
        source: Source,

        /// The event the underlying source delivered.
        event: Box<Event>,
    },
}

impl Event {
    /// Tags `event` with the source that produced it.
    #[must_use]
    pub fn merged(source: Source, event: Self) -> Self {
        Self::From {
            source,
            event: Box::new(event),
        }
    }

    /// Whether the event counts as "true" for the purposes of a [`Condition`][crate::Condition].
    ///
    /// Missing events, `false`, zero, empty text and the zero time are false. Everything else
    /// is true.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Missing => false,
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
            Self::Text(value) => !value.is_empty(),
            Self::Time(value) => !value.is_zero(),
            Self::From { .. } => true,
        }
    }

    /// Whether no event was supplied.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// The integer value, if this is an integer event.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// The underlying source of a merged event.
    #[must_use]
    pub fn source(&self) -> Option<&Source> {
        match self {
            Self::From { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The inner event of a merged event, or the event itself otherwise.
    #[must_use]
    pub fn unmerged(&self) -> &Self {
        match self {
            Self::From { event, .. } => event,
            other => other,
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Missing, Self::Missing) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Time(a), Self::Time(b)) => a == b,
            (
                Self::From {
                    source: source_a,
                    event: event_a,
                },
                Self::From {
                    source: source_b,
                    event: event_b,
                },
            ) => ptr::addr_eq(Rc::as_ptr(source_a), Rc::as_ptr(source_b)) && event_a == event_b,
            _ => false,
        }
    }
}

impl From<bool> for Event {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Event {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Event {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for Event {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<String> for Event {
    fn from(value: String) -> Self {
        Self::Text(value.into())
    }
}

impl From<Duration> for Event {
    fn from(value: Duration) -> Self {
        Self::Time(value)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::{EventSource, Value};

    assert_not_impl_any!(Event: Send, Sync);

    #[test]
    fn truthiness() {
        assert!(!Event::Missing.is_truthy());
        assert!(!Event::from(false).is_truthy());
        assert!(!Event::from(0).is_truthy());
        assert!(!Event::from("").is_truthy());
        assert!(!Event::from(Duration::ZERO).is_truthy());

        assert!(Event::from(true).is_truthy());
        assert!(Event::from(27).is_truthy());
        assert!(Event::from("xx").is_truthy());
        assert!(Event::from(Duration::from_secs(1)).is_truthy());
    }

    #[test]
    fn merged_compares_source_by_identity() {
        let a = Value::new(1);
        let b = Value::new(1);

        let from_a = Event::merged(a.as_source(), Event::from(5));
        let from_a_again = Event::merged(a.as_source(), Event::from(5));
        let from_b = Event::merged(b.as_source(), Event::from(5));

        assert_eq!(from_a, from_a_again);
        assert_ne!(from_a, from_b);
        assert!(from_a.is_truthy());
        assert_eq!(from_a.unmerged(), &Event::from(5));
    }

    #[test]
    fn different_kinds_are_unequal() {
        assert_ne!(Event::from(1), Event::from(true));
        assert_ne!(Event::Missing, Event::from(false));
    }
}
