//! Tests for properties, mailboxes and bulk uploads

use std::sync::Arc;
use std::thread;

use flexfx_dsp::property::bulk::{self, BulkAction, BulkLoader, BulkState};
use flexfx_dsp::property::*;

#[test]
fn id_layout() {
    let id = PropertyId(0x1735);

    assert_eq!(id.table(), TABLE_PRESET);
    assert_eq!(id.index(), 3);
    assert_eq!(id.class(), CLASS_UPDATE_ACTIVATE);
    assert_eq!(id.command(), 0x1705);
    assert!(!id.is_extended());

    assert_eq!(PropertyId::compose(TABLE_BULK, 2, CLASS_CHUNK), 0x1522);
    assert_eq!(PropertyId(0x2007).low_byte(), 7);
    assert!(PropertyId(0x8000_0001).is_extended());
}

#[test]
fn wire_words() {
    let property = Property::new(0x1502, [1, -2, 3, -4, 5]);
    let words = property.to_words();

    assert_eq!(words, [0x1502, 1, -2, 3, -4, 5]);
    assert_eq!(Property::from_words(&words), property);
    assert_eq!(property.decode_id().class(), CLASS_CHUNK);
}

#[test]
fn byte_packing() {
    let bytes: [u8; PAYLOAD_BYTES] = core::array::from_fn(|i| i as u8 * 13);
    let words = pack_bytes(&bytes);

    assert_eq!(words[0], i32::from_be_bytes([0, 13, 26, 39]));
    assert_eq!(unpack_bytes(&words), bytes);
}

#[test]
fn text_packing() {
    let words = pack_text(b"Band 01");
    let bytes = unpack_bytes(&words);

    assert_eq!(&bytes[..7], b"Band 01");
    assert!(bytes[7..].iter().all(|b| *b == 0));

    let long = pack_text(b"A label that is far too long to fit");
    assert_eq!(&unpack_bytes(&long), b"A label that is far ");

    let terminated = unpack_bytes(&pack_text(b"abc\0def"));
    assert_eq!(&terminated[..4], b"abc\0");
    assert_eq!(terminated[4], 0);
}

#[test]
fn mailbox_take_clears() {
    let mailbox = Mailbox::new();
    assert!(mailbox.take().is_empty());

    let property = Property::new(0x0011, [5, 4, 3, 2, 1]);
    mailbox.post(&property);
    assert!(mailbox.is_pending());
    assert_eq!(mailbox.take(), property);
    assert!(!mailbox.is_pending());
    assert!(mailbox.take().is_empty());

    // Empty posts are dropped, newer posts replace older ones.
    mailbox.post(&Property::EMPTY);
    assert!(!mailbox.is_pending());
    mailbox.post(&property);
    mailbox.post(&Property::new(0x0012, [9; 5]));
    assert_eq!(mailbox.take().id, 0x0012);
}

#[test]
fn mailbox_across_threads() {
    let mailbox = Arc::new(Mailbox::new());
    let producer = {
        let mailbox = mailbox.clone();
        thread::spawn(move || {
            for n in 1..=1000 {
                while mailbox.is_pending() {
                    thread::yield_now();
                }
                mailbox.post(&Property::new(n, [n as i32; 5]));
            }
        })
    };

    let mut received = 0;
    while received < 1000 {
        let property = mailbox.take();
        if property.is_empty() {
            thread::yield_now();
            continue;
        }
        received += 1;
        assert_eq!(property.id, received);
        assert!(property.data.iter().all(|w| *w == received as i32));
    }

    producer.join().unwrap();
}

fn chunk(words: [i32; 5]) -> Property {
    Property::new(0x1502, words)
}

#[test]
fn bulk_upload() {
    let mut loader = BulkLoader::<12>::new(5);
    assert_eq!(loader.state(), BulkState::Idle);
    assert!(!loader.is_muted());

    // Chunks before a begin are ignored.
    assert_eq!(loader.handle(&chunk([32; 5])), BulkAction::None);

    assert_eq!(loader.handle(&Property::new(0x1501, [0; 5])), BulkAction::Begin);
    assert!(loader.is_muted());

    let mut table = [0; 12];
    for n in 0..4 {
        let words = [32 * (5 * n + 1); 5];
        if let BulkAction::Write(write) = loader.handle(&chunk(words)) {
            table[write.offset..write.offset + write.len].copy_from_slice(write.words());
        }
    }

    assert_eq!(&table[..5], &[1; 5]);
    assert_eq!(&table[5..10], &[6; 5]);
    assert_eq!(&table[10..], &[11; 2]);
    assert_eq!(loader.offset(), 20);

    assert_eq!(loader.handle(&Property::new(0x1503, [0; 5])), BulkAction::End);
    assert!(!loader.is_muted());

    // Begin rewinds.
    loader.begin();
    let write = loader.chunk(&[64; 5]);
    assert_eq!(write.map(|w| w.offset), Some(0));
    assert_eq!(write.map(|w| w.words[0]), Some(2));
}

#[test]
fn bulk_ignores_other_tables() {
    let mut loader = BulkLoader::<12>::new(0);

    assert_eq!(loader.handle(&Property::new(0x1701, [0; 5])), BulkAction::None);
    assert_eq!(loader.handle(&Property::new(0x0001, [0; 5])), BulkAction::None);
    assert_eq!(loader.handle(&Property::EMPTY), BulkAction::None);
    assert!(!loader.is_muted());
}

#[test]
fn bulk_shift_is_clamped() {
    let mut loader = BulkLoader::<5>::new(40);
    assert_eq!(loader.shift(), bulk::MAX_SHIFT);

    loader.begin();
    let write = loader.chunk(&[i32::MIN, i32::MAX, -1, 1 << 30, 0]);
    assert_eq!(write.map(|w| w.words), Some([-1, 0, 0, 0, 0]));

    let mut loader = BulkLoader::<5>::new(5);
    loader.begin();
    let write = loader.chunk(&[-33, 33, -31, i32::MIN, i32::MAX]);
    assert_eq!(
        write.map(|w| w.words),
        Some([-1, 1, 0, -(1 << 26), (1 << 26) - 1])
    );
}
