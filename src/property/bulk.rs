//! Chunked upload of coefficient tables.
//!
//! `Begin` rewinds the write offset and mutes the consumer, every `Chunk`
//! delivers five words for the current offset, `End` un-mutes. Words that
//! would land past `CAP` are dropped and loading carries on until `End`.

use crate::fixed::Sample;

use super::{Property, PropertyId, CLASS_BEGIN, CLASS_CHUNK, CLASS_END, PAYLOAD_WORDS, TABLE_BULK};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BulkState {
    #[default]
    Idle,
    Loading,
}

/// Words of one chunk to store at `offset`. Only `words[..len]` fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkWrite {
    pub offset: usize,
    pub words: [Sample; PAYLOAD_WORDS],
    pub len: usize,
}

impl BulkWrite {
    pub fn words(&self) -> &[Sample] {
        &self.words[..self.len]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    None,
    Begin,
    Write(BulkWrite),
    End,
}

/// Largest supported scaling shift; a word divided by `2^31` is `0` or `-1`.
pub const MAX_SHIFT: u32 = 31;

#[derive(Debug, Clone)]
pub struct BulkLoader<const CAP: usize> {
    state: BulkState,
    offset: usize,
    shift: u32,
}

impl<const CAP: usize> Default for BulkLoader<CAP> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<const CAP: usize> BulkLoader<CAP> {
    /// Incoming words are divided by `2^shift` before they are stored. Shifts
    /// past [`MAX_SHIFT`] are clamped to it.
    pub const fn new(shift: u32) -> Self {
        Self {
            state: BulkState::Idle,
            offset: 0,
            shift: if shift > MAX_SHIFT { MAX_SHIFT } else { shift },
        }
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }

    pub fn state(&self) -> BulkState {
        self.state
    }

    /// Muted while an upload is in progress.
    #[inline]
    pub fn is_muted(&self) -> bool {
        self.state == BulkState::Loading
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn capacity(&self) -> usize {
        CAP
    }

    pub fn begin(&mut self) {
        self.offset = 0;
        self.state = BulkState::Loading;
    }

    /// Scales the payload and advances the offset by five words. Returns
    /// `None` when idle or when the chunk lies entirely past capacity.
    pub fn chunk(&mut self, payload: &[Sample; PAYLOAD_WORDS]) -> Option<BulkWrite> {
        if self.state != BulkState::Loading {
            return None;
        }
        let offset = self.offset;
        self.offset = self.offset.saturating_add(PAYLOAD_WORDS);

        let len = CAP.saturating_sub(offset).min(PAYLOAD_WORDS);
        if len == 0 {
            return None;
        }
        let divisor = 1i64 << self.shift;

        Some(BulkWrite {
            offset,
            words: payload.map(|w| (w as i64 / divisor) as Sample),
            len,
        })
    }

    pub fn end(&mut self) {
        self.state = BulkState::Idle;
    }

    /// Dispatches `0x15_1`/`0x15_2`/`0x15_3` properties; anything else yields
    /// [`BulkAction::None`].
    #[inline]
    pub fn handle(&mut self, property: &Property) -> BulkAction {
        let id = PropertyId(property.id);
        if property.is_empty() || id.is_extended() || id.table() != TABLE_BULK {
            return BulkAction::None;
        }
        match id.class() {
            CLASS_BEGIN => {
                self.begin();
                BulkAction::Begin
            }
            CLASS_CHUNK => match self.chunk(&property.data) {
                Some(write) => BulkAction::Write(write),
                None => BulkAction::None,
            },
            CLASS_END => {
                self.end();
                BulkAction::End
            }
            _ => BulkAction::None,
        }
    }
}
