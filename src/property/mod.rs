//! Property messages and the single-slot mailboxes that carry them.
//!
//! A property is six 32-bit words: an id and five payload words. An id of zero
//! means "no message". Ids used by the preset and bulk protocols are laid out
//! as `0xTTpc`: table byte `TT`, preset or sub-index nibble `p`, command class
//! nibble `c`.

pub mod bulk;

use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use crate::fixed::Sample;

/// Payload words per property.
pub const PAYLOAD_WORDS: usize = 5;

/// Bytes carried by one packed payload.
pub const PAYLOAD_BYTES: usize = PAYLOAD_WORDS * 4;

/// Bulk data (IR and preset uploads).
pub const TABLE_BULK: u8 = 0x15;

/// Preset read/write.
pub const TABLE_PRESET: u8 = 0x17;

/// Label text.
pub const TABLE_LABEL: u8 = 0x20;

pub const CLASS_READ: u8 = 0x0;
pub const CLASS_BEGIN: u8 = 0x1;
pub const CLASS_CHUNK: u8 = 0x2;
pub const CLASS_NOTIFY: u8 = 0x2;
pub const CLASS_END: u8 = 0x3;
pub const CLASS_NOTIFY_ACTIVE: u8 = 0x3;
pub const CLASS_UPDATE: u8 = 0x4;
pub const CLASS_UPDATE_ACTIVATE: u8 = 0x5;
pub const CLASS_ERROR: u8 = 0xF;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Property {
    pub id: u32,
    pub data: [Sample; PAYLOAD_WORDS],
}

impl Property {
    pub const EMPTY: Self = Self {
        id: 0,
        data: [0; PAYLOAD_WORDS],
    };

    pub const fn new(id: u32, data: [Sample; PAYLOAD_WORDS]) -> Self {
        Self { id, data }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.id == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        *self = Self::EMPTY;
    }

    #[inline]
    pub const fn decode_id(&self) -> PropertyId {
        PropertyId(self.id)
    }

    /// Wire layout: id followed by the payload.
    pub fn to_words(&self) -> [i32; 6] {
        let d = self.data;
        [self.id as i32, d[0], d[1], d[2], d[3], d[4]]
    }

    pub fn from_words(words: &[i32; 6]) -> Self {
        Self {
            id: words[0] as u32,
            data: [words[1], words[2], words[3], words[4], words[5]],
        }
    }
}

/// Decoded view of a property id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyId(pub u32);

impl PropertyId {
    /// Builds `0xTTpc`.
    pub const fn compose(table: u8, index: u8, class: u8) -> u32 {
        ((table as u32) << 8) | (((index & 0xF) as u32) << 4) | (class & 0xF) as u32
    }

    /// Table byte (bits 8..16).
    #[inline]
    pub const fn table(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Preset or sub-index nibble (bits 4..8).
    #[inline]
    pub const fn index(self) -> u8 {
        ((self.0 >> 4) & 0xF) as u8
    }

    /// Command class nibble (bits 0..4).
    #[inline]
    pub const fn class(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    /// The id with the index nibble masked out, for matching commands.
    #[inline]
    pub const fn command(self) -> u32 {
        self.0 & 0xFFFF_FF0F
    }

    /// Low byte, used as the label number of `0x20nn` ids.
    #[inline]
    pub const fn low_byte(self) -> u8 {
        self.0 as u8
    }

    /// True for ids outside the 16-bit table space.
    #[inline]
    pub const fn is_extended(self) -> bool {
        self.0 > 0xFFFF
    }
}

/// Single-slot, single-writer/single-reader property mailbox.
///
/// The producer stores the payload before the id and the consumer only reads
/// the payload after observing a non-zero id. A post overwrites any message
/// that has not been taken yet.
#[derive(Debug)]
pub struct Mailbox {
    id: AtomicU32,
    data: [AtomicI32; PAYLOAD_WORDS],
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            id: AtomicU32::new(0),
            data: [const { AtomicI32::new(0) }; PAYLOAD_WORDS],
        }
    }

    /// Publishes `property`. Empty properties are not posted.
    pub fn post(&self, property: &Property) {
        if property.is_empty() {
            return;
        }
        for (slot, word) in self.data.iter().zip(property.data.iter()) {
            slot.store(*word, Ordering::Relaxed);
        }
        self.id.store(property.id, Ordering::Release);
    }

    /// Removes and returns the pending property, or [`Property::EMPTY`].
    #[inline]
    pub fn take(&self) -> Property {
        let id = self.id.load(Ordering::Acquire);
        if id == 0 {
            return Property::EMPTY;
        }
        let mut data = [0; PAYLOAD_WORDS];
        for (word, slot) in data.iter_mut().zip(self.data.iter()) {
            *word = slot.load(Ordering::Relaxed);
        }
        self.id.store(0, Ordering::Release);

        Property { id, data }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.id.load(Ordering::Acquire) != 0
    }
}

/// Packs a 20-byte blob into five big-endian words.
pub fn pack_bytes(bytes: &[u8; PAYLOAD_BYTES]) -> [Sample; PAYLOAD_WORDS] {
    core::array::from_fn(|n| {
        i32::from_be_bytes([
            bytes[4 * n],
            bytes[4 * n + 1],
            bytes[4 * n + 2],
            bytes[4 * n + 3],
        ])
    })
}

/// Inverse of [`pack_bytes`].
pub fn unpack_bytes(words: &[Sample; PAYLOAD_WORDS]) -> [u8; PAYLOAD_BYTES] {
    let mut bytes = [0; PAYLOAD_BYTES];
    for (chunk, word) in bytes.chunks_exact_mut(4).zip(words.iter()) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }

    bytes
}

/// Packs up to 20 bytes of text, stopping at the first NUL. The rest is zeroed.
pub fn pack_text(text: &[u8]) -> [Sample; PAYLOAD_WORDS] {
    let mut bytes = [0; PAYLOAD_BYTES];
    for (dest, src) in bytes
        .iter_mut()
        .zip(text.iter().take_while(|b| **b != 0))
    {
        *dest = *src;
    }

    pack_bytes(&bytes)
}

