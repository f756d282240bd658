//! Desired-state container for one aspect of a component.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// Desired rows of one aspect.
///
/// `Absent` leaves stored rows untouched, `Empty` deletes them all and
/// `Values` replaces them. On the wire a missing field or `null` is
/// `Absent` and `[]` is `Empty`.
#[derive(Debug, Clone, PartialEq)]
pub enum Aspect<T> {
    Absent,
    Empty,
    Values(Vec<T>),
}

impl<T> Default for Aspect<T> {
    fn default() -> Self {
        Aspect::Absent
    }
}

impl<T> Aspect<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Aspect::Absent)
    }

    /// The rows to write, or `None` when the aspect must not be touched.
    pub fn desired(&self) -> Option<&[T]> {
        match self {
            Aspect::Absent => None,
            Aspect::Empty => Some(&[]),
            Aspect::Values(values) => Some(values),
        }
    }
}

impl<T> From<Vec<T>> for Aspect<T> {
    fn from(values: Vec<T>) -> Self {
        if values.is_empty() {
            Aspect::Empty
        } else {
            Aspect::Values(values)
        }
    }
}

impl<T: Serialize> Serialize for Aspect<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Aspect::Absent => serializer.serialize_none(),
            Aspect::Empty => Vec::<T>::new().serialize(serializer),
            Aspect::Values(values) => values.serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Aspect<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<Vec<T>>::deserialize(deserializer)? {
            None => Aspect::Absent,
            Some(values) => values.into(),
        })
    }
}
