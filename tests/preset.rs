//! Tests for preset storage and the host preset protocol

use flexfx_dsp::preset::protocol::{BULK_FIRST_PAGE, BULK_MAX_PAGES, BULK_PAGE_SIZE};
use flexfx_dsp::preset::*;
use flexfx_dsp::property::{pack_bytes, pack_text, unpack_bytes, Property};
use flexfx_dsp::FlashError;

const LABELS: &[&str] = &["Volume", "Tone", "Drive"];

fn defaults() -> PresetTable {
    core::array::from_fn(|n| [n as u8; PRESET_SIZE])
}

fn protocol() -> PresetProtocol<MemoryFlash> {
    let mut protocol = PresetProtocol::new(MemoryFlash::new(), defaults(), LABELS);
    protocol.initialize();
    protocol
}

/// Flash whose writes always fail.
#[derive(Default)]
struct FaultyFlash;

impl Flash for FaultyFlash {
    fn open(&mut self) -> Result<(), FlashError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), FlashError> {
        Ok(())
    }

    fn read(&mut self, page: usize, _buffer: &mut [u8]) -> Result<(), FlashError> {
        Err(FlashError::Io { page })
    }

    fn write(&mut self, page: usize, _data: &[u8]) -> Result<(), FlashError> {
        Err(FlashError::Io { page })
    }
}

/// Flash that corrupts the first byte of every read.
#[derive(Default)]
struct FlakyFlash(MemoryFlash);

impl Flash for FlakyFlash {
    fn open(&mut self) -> Result<(), FlashError> {
        self.0.open()
    }

    fn close(&mut self) -> Result<(), FlashError> {
        self.0.close()
    }

    fn read(&mut self, page: usize, buffer: &mut [u8]) -> Result<(), FlashError> {
        self.0.read(page, buffer)?;
        if let Some(first) = buffer.first_mut() {
            *first ^= 0x80;
        }
        Ok(())
    }

    fn write(&mut self, page: usize, data: &[u8]) -> Result<(), FlashError> {
        self.0.write(page, data)
    }
}

#[test]
fn defaults_survive_empty_flash() {
    let protocol = protocol();

    assert_eq!(protocol.store().active(), 1);
    assert_eq!(protocol.store().presets(), &defaults());
}

#[test]
fn read_preset() {
    let mut protocol = protocol();

    let reply = protocol.handle(&Property::new(0x1730, [0; 5]));
    assert_eq!(reply.id, 0x1730);
    assert_eq!(unpack_bytes(&reply.data), [3; PRESET_SIZE]);

    // Index 0 reads the active preset.
    let reply = protocol.handle(&Property::new(0x1700, [0; 5]));
    assert_eq!(reply.id, 0x1710);
    assert_eq!(unpack_bytes(&reply.data), [1; PRESET_SIZE]);
}

#[test]
fn write_then_read_back() {
    let mut protocol = protocol();
    let preset: Preset = core::array::from_fn(|i| 100 + i as u8);

    let reply = protocol.handle(&Property::new(0x1754, pack_bytes(&preset)));
    assert_eq!(reply.id, 0x1752);
    assert_eq!(unpack_bytes(&reply.data), preset);
    assert_eq!(protocol.store().active(), 1);

    let reply = protocol.handle(&Property::new(0x1750, [0; 5]));
    assert_eq!(unpack_bytes(&reply.data), preset);

    // The whole table went to flash page 0.
    let mut stored = vec![0; PRESET_COUNT * PRESET_SIZE];
    protocol
        .store()
        .session()
        .and_then(|mut session| session.read(PRESET_PAGE, &mut stored))
        .unwrap();
    assert_eq!(&stored[5 * PRESET_SIZE..6 * PRESET_SIZE], &preset);
}

#[test]
fn write_and_activate() {
    let mut protocol = protocol();
    let preset = [42; PRESET_SIZE];

    let reply = protocol.handle(&Property::new(0x17B5, pack_bytes(&preset)));
    assert_eq!(reply.id, 0x17B3);
    assert_eq!(protocol.store().active(), 11);
    assert_eq!(protocol.store().active_preset(), &preset);
}

#[test]
fn failed_write_keeps_ram() {
    let mut protocol = PresetProtocol::new(FaultyFlash, defaults(), LABELS);
    protocol.initialize();

    let reply = protocol.handle(&Property::new(0x1725, pack_bytes(&[9; PRESET_SIZE])));
    assert_eq!(reply.id, 0x172F);
    assert_eq!(protocol.store().read(2), Ok(&[2; PRESET_SIZE]));
    assert_eq!(protocol.store().active(), 1);
}

#[test]
fn verify_mismatch_is_reported() {
    let mut store = PresetStore::new(FlakyFlash::default(), defaults());

    assert_eq!(
        store.write(4, &[7; PRESET_SIZE]),
        Err(FlashError::Verify { page: PRESET_PAGE })
    );
    assert_eq!(store.read(4), Ok(&[4; PRESET_SIZE]));
}

#[test]
fn session_is_exclusive() {
    let store = PresetStore::new(MemoryFlash::new(), defaults());

    let session = store.session();
    assert!(session.is_ok());
    assert_eq!(store.session().err(), Some(FlashError::Busy));
    drop(session);
    assert!(store.session().is_ok());
}

#[test]
fn invalid_slots() {
    let mut store = PresetStore::new(MemoryFlash::new(), defaults());

    assert_eq!(store.read(16).err(), Some(FlashError::InvalidSlot(16)));
    assert_eq!(store.activate(20), Err(FlashError::InvalidSlot(20)));
    assert_eq!(store.active(), 1);
}

#[test]
fn save_and_load() {
    let mut store = PresetStore::new(MemoryFlash::new(), defaults());
    store.save().unwrap();

    let mut bytes = vec![0; PRESET_COUNT * PRESET_SIZE];
    store
        .session()
        .and_then(|mut session| session.read(PRESET_PAGE, &mut bytes))
        .unwrap();
    assert_eq!(&bytes[..], defaults().as_flattened());

    store.load().unwrap();
    assert_eq!(store.presets(), &defaults());
}

#[test]
fn labels() {
    let mut protocol = protocol();

    let reply = protocol.handle(&Property::new(0x2002, [0; 5]));
    assert_eq!(reply.id, 0x2002);
    assert_eq!(reply.data, pack_text(b"Drive"));

    let reply = protocol.handle(&Property::new(0x2040, [0; 5]));
    assert_eq!(reply.id, 0x2040);
    assert_eq!(reply.data, [0; 5]);
}

#[test]
fn unknown_properties_are_ignored() {
    let mut protocol = protocol();

    assert!(protocol.handle(&Property::EMPTY).is_empty());
    assert!(protocol.handle(&Property::new(0x0042, [1; 5])).is_empty());
    assert!(protocol.handle(&Property::new(0x8000_1700, [1; 5])).is_empty());
}

fn chunk(preset: u32, n: u8) -> Property {
    Property::new(0x1502 | preset << 4, pack_bytes(&[n; 20]))
}

#[test]
fn bulk_upload_pages() {
    let mut protocol = protocol();
    let chunks_per_page = (BULK_PAGE_SIZE / 20) as u8;

    assert!(protocol.handle(&Property::new(0x1521, [0; 5])).is_empty());
    assert!(protocol.is_uploading());
    for n in 0..chunks_per_page + 1 {
        assert!(protocol.handle(&chunk(2, n)).is_empty());
    }
    assert!(protocol.handle(&Property::new(0x1523, [0; 5])).is_empty());
    assert!(!protocol.is_uploading());

    let first = BULK_FIRST_PAGE + 2 * BULK_MAX_PAGES;
    let mut page = vec![0; BULK_PAGE_SIZE];
    let mut session = protocol.store().session().unwrap();
    session.read(first, &mut page).unwrap();
    assert_eq!(&page[..20], &[0; 20]);
    assert_eq!(&page[220..], &[chunks_per_page - 1; 20]);

    let mut tail = vec![0; BULK_PAGE_SIZE];
    session.read(first + 1, &mut tail).unwrap();
    assert_eq!(&tail[..20], &[chunks_per_page; 20]);
    assert!(tail[20..].iter().all(|b| *b == 0xFF));
}

#[test]
fn bulk_write_failure() {
    let mut protocol = PresetProtocol::new(FaultyFlash, defaults(), LABELS);
    let chunks_per_page = (BULK_PAGE_SIZE / 20) as u8;

    protocol.handle(&Property::new(0x1531, [0; 5]));
    let replies: Vec<Property> = (0..chunks_per_page)
        .map(|n| protocol.handle(&chunk(3, n)))
        .collect();

    assert!(replies[..replies.len() - 1].iter().all(Property::is_empty));
    assert_eq!(replies[replies.len() - 1].id, 0x153F);
    assert!(!protocol.is_uploading());
}
