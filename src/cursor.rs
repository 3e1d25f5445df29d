//! Bounds-checked cursor over an owned sequence.
//!
//! When a submission runs in linked-list mode every list argument is handed to
//! the script as a [`Cursor`] instead of a plain list. The script can only walk
//! the sequence one step at a time and can only store small integers, which
//! keeps "linked list" exercises honest.
//!
//! ## Invariants
//!
//! - While the sequence is non-empty, the position stays in `[0, len - 1]`.
//! - Moving past either end is an error; the position never changes on error.
//! - Writes accept integers in `[MIN_VALUE, MAX_VALUE]` only. The value is
//!   checked before anything else, so an invalid write fails the same way at
//!   every position.
//! - Equality looks at the sequence content and ignores the position.

use std::fmt;

use thiserror::Error;

/// Smallest value a cursor will store
pub const MIN_VALUE: i64 = -99;

/// Largest value a cursor will store
pub const MAX_VALUE: i64 = 99;

/// Elements a cursor can validate on write
pub trait CursorElement {
    /// Integer view of the element, `None` if it is not an integer
    fn as_integer(&self) -> Option<i64>;
}

impl CursorElement for i64 {
    fn as_integer(&self) -> Option<i64> {
        Some(*self)
    }
}

/// Direction of a failed move
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Towards the last element
    Forward,
    /// Towards the first element
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => f.write_str("forward past the end"),
            Self::Backward => f.write_str("backward past the start"),
        }
    }
}

/// Cursor operation errors
///
/// Every variant carries the source line of the caller that attempted the
/// operation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CursorError {
    /// Move beyond either end of the sequence
    #[error("cannot move {direction} of the list")]
    OutOfBounds {
        /// Which way the caller tried to move
        direction: Direction,
        /// Caller's source line
        line: usize,
    },
    /// Write of a non-integer or out-of-range value
    #[error("list values must be integers between {MIN_VALUE} and {MAX_VALUE}")]
    InvalidValue {
        /// Caller's source line
        line: usize,
    },
    /// Read or write on an empty sequence
    #[error("the list is empty")]
    Empty {
        /// Caller's source line
        line: usize,
    },
}

impl CursorError {
    /// Source line of the failing caller
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::OutOfBounds { line, .. } | Self::InvalidValue { line } | Self::Empty { line } => {
                *line
            }
        }
    }
}

/// A movable position over an owned sequence
#[derive(Clone, Debug)]
pub struct Cursor<T> {
    items: Vec<T>,
    position: usize,
}

impl<T> Cursor<T> {
    /// Wrap a sequence, positioned at its first element
    #[must_use]
    pub const fn new(items: Vec<T>) -> Self {
        Self { items, position: 0 }
    }

    /// Move one element forward
    ///
    /// # Errors
    /// Returns [`CursorError::OutOfBounds`] when already at the last element
    pub fn advance(&mut self, line: usize) -> Result<(), CursorError> {
        if !self.has_next() {
            return Err(CursorError::OutOfBounds {
                direction: Direction::Forward,
                line,
            });
        }
        self.position += 1;
        Ok(())
    }

    /// Move one element backward
    ///
    /// # Errors
    /// Returns [`CursorError::OutOfBounds`] when already at the first element
    pub fn retreat(&mut self, line: usize) -> Result<(), CursorError> {
        if !self.has_previous() {
            return Err(CursorError::OutOfBounds {
                direction: Direction::Backward,
                line,
            });
        }
        self.position -= 1;
        Ok(())
    }

    /// Whether [`Cursor::advance`] would succeed
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.position + 1 < self.items.len()
    }

    /// Whether [`Cursor::retreat`] would succeed
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.position > 0
    }

    /// Element at the current position
    ///
    /// # Errors
    /// Returns [`CursorError::Empty`] for an empty sequence
    pub fn read(&self, line: usize) -> Result<&T, CursorError> {
        self.items.get(self.position).ok_or(CursorError::Empty { line })
    }

    /// Current position
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// The whole sequence
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the sequence has no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: CursorElement> Cursor<T> {
    /// Replace the element at the current position
    ///
    /// # Errors
    /// Returns [`CursorError::InvalidValue`] unless `value` is an integer in
    /// range, and [`CursorError::Empty`] for an empty sequence
    pub fn write(&mut self, value: T, line: usize) -> Result<(), CursorError> {
        match value.as_integer() {
            Some(v) if (MIN_VALUE..=MAX_VALUE).contains(&v) => {}
            _ => return Err(CursorError::InvalidValue { line }),
        }
        let slot = self
            .items
            .get_mut(self.position)
            .ok_or(CursorError::Empty { line })?;
        *slot = value;
        Ok(())
    }
}

impl<T: PartialEq> PartialEq for Cursor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_walk_forward_and_back() {
        let mut cursor = Cursor::new(vec![1_i64, 2, 3]);
        assert!(!cursor.has_previous());
        assert_eq!(*cursor.read(1).unwrap(), 1);

        cursor.advance(1).unwrap();
        cursor.advance(1).unwrap();
        assert_eq!(*cursor.read(1).unwrap(), 3);
        assert!(!cursor.has_next());

        cursor.retreat(1).unwrap();
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_advance_past_end_keeps_position() {
        let mut cursor = Cursor::new(vec![7_i64]);
        let err = cursor.advance(12).unwrap_err();
        assert_eq!(
            err,
            CursorError::OutOfBounds {
                direction: Direction::Forward,
                line: 12
            }
        );
        assert_eq!(err.line(), 12);
        assert_eq!(cursor.position(), 0);
        assert_eq!(err.to_string(), "cannot move forward past the end of the list");
    }

    #[test]
    fn test_retreat_at_start() {
        let mut cursor = Cursor::new(vec![1_i64, 2]);
        let err = cursor.retreat(3).unwrap_err();
        assert!(matches!(
            err,
            CursorError::OutOfBounds {
                direction: Direction::Backward,
                line: 3
            }
        ));
    }

    #[test]
    fn test_write_in_place() {
        let mut cursor = Cursor::new(vec![1_i64, 2, 3]);
        cursor.advance(1).unwrap();
        cursor.write(-99, 2).unwrap();
        assert_eq!(cursor.items(), &[1, -99, 3]);
    }

    #[test]
    fn test_write_out_of_range() {
        let mut cursor = Cursor::new(vec![1_i64]);
        let err = cursor.write(100, 5).unwrap_err();
        assert_eq!(err, CursorError::InvalidValue { line: 5 });
        assert_eq!(cursor.items(), &[1]);
    }

    #[test]
    fn test_empty_sequence() {
        let mut cursor: Cursor<i64> = Cursor::new(Vec::new());
        assert!(cursor.is_empty());
        assert!(!cursor.has_next());
        assert!(!cursor.has_previous());
        assert_eq!(cursor.read(4), Err(CursorError::Empty { line: 4 }));
        assert_eq!(cursor.write(1, 4), Err(CursorError::Empty { line: 4 }));
        // Value validation comes first, even with nowhere to write.
        assert_eq!(cursor.write(500, 4), Err(CursorError::InvalidValue { line: 4 }));
    }

    proptest! {
        #[test]
        fn equality_ignores_position(items in prop::collection::vec(-99_i64..=99, 1..16), steps in 0_usize..16) {
            let a = Cursor::new(items.clone());
            let mut b = Cursor::new(items);
            for _ in 0..steps {
                if b.has_next() {
                    b.advance(1).unwrap();
                }
            }
            prop_assert!(a == b);
        }

        #[test]
        fn out_of_range_writes_always_fail(
            items in prop::collection::vec(-99_i64..=99, 0..16),
            steps in 0_usize..16,
            value in prop_oneof![i64::MIN..-99, 100_i64..i64::MAX],
        ) {
            let mut cursor = Cursor::new(items);
            for _ in 0..steps {
                if cursor.has_next() {
                    cursor.advance(1).unwrap();
                }
            }
            let before = cursor.items().to_vec();
            prop_assert_eq!(cursor.write(value, 9), Err(CursorError::InvalidValue { line: 9 }));
            prop_assert_eq!(cursor.items(), before.as_slice());
        }
    }
}
