//! Height cursor: the engine's `lastKnownHeight`.

use serde::{Deserialize, Serialize};

/// Boundary between processed and unprocessed heights.
///
/// The cursor only ever moves forward; a height that failed to mirror is
/// still passed over so a single bad block cannot stall polling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightCursor {
    height: Option<u64>,
}

impl HeightCursor {
    /// A cursor that has not seen any height yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cursor positioned at `height`.
    pub fn at(height: u64) -> Self {
        Self {
            height: Some(height),
        }
    }

    /// Last known height, if any.
    pub fn height(&self) -> Option<u64> {
        self.height
    }

    /// Move the cursor to `height` if that is ahead of it.
    ///
    /// Returns `true` if the cursor moved.
    pub fn advance(&mut self, height: u64) -> bool {
        match self.height {
            Some(current) if current >= height => false,
            _ => {
                self.height = Some(height);
                true
            }
        }
    }

    /// First height not yet processed; `floor` when the cursor is unset.
    pub fn next_height(&self, floor: u64) -> u64 {
        match self.height {
            Some(h) => h + 1,
            None => floor,
        }
    }

    /// Returns `true` if `tip` lies beyond the cursor.
    pub fn is_behind(&self, tip: u64) -> bool {
        self.height.map_or(true, |h| tip > h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_advance() {
        let mut cursor = HeightCursor::at(100);
        assert!(cursor.advance(101));
        assert_eq!(cursor.height(), Some(101));
    }

    #[test]
    fn cursor_never_rewinds() {
        let mut cursor = HeightCursor::at(100);
        assert!(!cursor.advance(99));
        assert!(!cursor.advance(100));
        assert_eq!(cursor.height(), Some(100));
    }

    #[test]
    fn cursor_next_height() {
        assert_eq!(HeightCursor::at(500).next_height(0), 501);
        assert_eq!(HeightCursor::new().next_height(0), 0);
        assert_eq!(HeightCursor::new().next_height(42), 42);
    }

    #[test]
    fn cursor_behind() {
        let mut cursor = HeightCursor::new();
        assert!(cursor.is_behind(0));
        cursor.advance(10);
        assert!(cursor.is_behind(11));
        assert!(!cursor.is_behind(10));
    }
}
