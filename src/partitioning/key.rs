//! Composite partition keys.
//!
//! A key is a single `u64`:
//!
//! ```text
//!  63                  32 31                   0
//! +----------------------+----------------------+
//! |   base pixel id      |   fine pixel id      |   refined cell
//! +----------------------+----------------------+
//! |          0           |   base pixel id      |   unrefined cell
//! +----------------------+----------------------+
//! ```
//!
//! The fine id of a refined key is always a nested descendant of its base id.
//!
//! Ambiguity of base cell 0
//! -----------------
//! A refined key of base cell 0 has zero high bits, exactly like an unrefined key. Without
//! knowing which base cells are refined, [`PartitionKey::decode`] therefore reads such a
//! key as unrefined. [`crate::partitioning::PartitionLayout::decode`] resolves it.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{PixelId, FINE_MASK, KEY_SHIFT};
use crate::healpix::{parent_at, Nside};
use crate::skypart_errors::SkyPartError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(u64);

impl PartitionKey {
    /// Key of an unrefined base cell.
    #[inline]
    pub fn base(base_id: PixelId) -> Self {
        debug_assert!(
            base_id <= FINE_MASK,
            "base cell {base_id} does not fit the low 32 bits of a key"
        );
        PartitionKey(base_id & FINE_MASK)
    }

    /// Key of the fine cell `fine_id` (at `fine`) inside the refined base cell `base_id`
    /// (at `base`).
    ///
    /// Errors
    /// -----------------
    /// * [`SkyPartError::InconsistentCompositeKey`] if `fine_id` is not a descendant of
    ///   `base_id`.
    /// * [`SkyPartError::PixelOutOfRange`] / [`SkyPartError::InvalidConfiguration`] if the
    ///   ids or resolutions are out of range.
    pub fn refined(
        base_id: PixelId,
        fine_id: PixelId,
        base: Nside,
        fine: Nside,
    ) -> Result<Self, SkyPartError> {
        if parent_at(fine_id, fine, base)? != base_id {
            return Err(SkyPartError::InconsistentCompositeKey {
                base: base_id,
                fine: fine_id,
            });
        }
        Ok(Self::compose(base_id, fine_id))
    }

    /// Pack two ids without checking their relationship.
    #[inline]
    pub(crate) fn compose(base_id: PixelId, fine_id: PixelId) -> Self {
        PartitionKey((base_id << KEY_SHIFT) | (fine_id & FINE_MASK))
    }

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        PartitionKey(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// `true` when the high half is non-zero. Refined keys of base cell 0 report `false`.
    #[inline]
    pub fn is_refined(self) -> bool {
        self.0 >> KEY_SHIFT != 0
    }

    /// Base pixel id, read without layout knowledge.
    #[inline]
    pub fn base_id(self) -> PixelId {
        if self.is_refined() {
            self.0 >> KEY_SHIFT
        } else {
            self.0
        }
    }

    /// Fine pixel id for refined keys.
    #[inline]
    pub fn fine_id(self) -> Option<PixelId> {
        self.is_refined().then_some(self.0 & FINE_MASK)
    }

    /// `(base id, fine id if refined)`.
    pub fn decode(self) -> (PixelId, Option<PixelId>) {
        (self.base_id(), self.fine_id())
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            (base, None) => write!(f, "{base}"),
            (base, Some(fine)) => write!(f, "{base}/{fine}"),
        }
    }
}

impl From<PartitionKey> for u64 {
    fn from(value: PartitionKey) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(n: u32) -> Nside {
        Nside::new(n).unwrap()
    }

    #[test]
    fn test_base_key() {
        let k = PartitionKey::base(1234);
        assert_eq!(k.raw(), 1234);
        assert!(!k.is_refined());
        assert_eq!(k.decode(), (1234, None));
        assert_eq!(k.to_string(), "1234");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "does not fit")]
    fn test_base_key_rejects_wide_ids() {
        PartitionKey::base(1 << 32);
    }

    #[test]
    fn test_refined_key() {
        // 1234 at nside 64 has the 16 children 19744..19760 at nside 256.
        let k = PartitionKey::refined(1234, 19_750, ns(64), ns(256)).unwrap();
        assert_eq!(k.raw(), (1234u64 << 32) | 19_750);
        assert!(k.is_refined());
        assert_eq!(k.decode(), (1234, Some(19_750)));
        assert_eq!(k.to_string(), "1234/19750");
    }

    #[test]
    fn test_refined_key_checks_parent() {
        assert_eq!(
            PartitionKey::refined(1234, 19_760, ns(64), ns(256)),
            Err(SkyPartError::InconsistentCompositeKey {
                base: 1234,
                fine: 19_760
            })
        );
        assert!(PartitionKey::refined(1, 2, ns(256), ns(64)).is_err());
    }

    #[test]
    fn test_base_zero_refined_reads_as_unrefined() {
        let k = PartitionKey::refined(0, 5, ns(64), ns(256)).unwrap();
        assert_eq!(k.raw(), 5);
        assert_eq!(k.decode(), (5, None));
    }

    #[test]
    fn test_ordering_groups_refined_cells() {
        let a = PartitionKey::compose(3, 48);
        let b = PartitionKey::compose(3, 49);
        let c = PartitionKey::base(49_000);
        assert!(c < a && a < b);
    }
}
