//! Host-facing preset and bulk-data properties.
//!
//! | Id     | Meaning                                                   |
//! |--------|-----------------------------------------------------------|
//! | `17p0` | read preset `p` (`p == 0` reads the active preset)        |
//! | `17p1` | same as `17p0`                                            |
//! | `17p4` | write preset `p`, notifies with `17p2`                    |
//! | `17p5` | write preset `p` and activate it, notifies with `17p3`    |
//! | `15n1` | begin bulk data for preset `n`                            |
//! | `15n2` | next 20 bytes of bulk data                                |
//! | `15n3` | end of bulk data, flushes the last partial page           |
//! | `20nn` | read label `nn`                                           |
//!
//! Failures are answered with class `F` in place of the command class.

use crate::error::FlashError;
use crate::property::{
    pack_bytes, pack_text, unpack_bytes, Property, PropertyId, CLASS_BEGIN, CLASS_CHUNK,
    CLASS_END, CLASS_ERROR, CLASS_NOTIFY, CLASS_NOTIFY_ACTIVE, CLASS_READ, CLASS_UPDATE,
    CLASS_UPDATE_ACTIVATE, PAYLOAD_BYTES, TABLE_BULK, TABLE_LABEL, TABLE_PRESET,
};

use super::{Flash, PresetStore, PresetTable};

/// Payload bytes per bulk-data flash page.
pub const BULK_PAGE_SIZE: usize = 240;

/// Pages one bulk upload may fill.
pub const BULK_MAX_PAGES: usize = 24;

/// First flash page used by bulk data; preset `n` owns
/// `BULK_FIRST_PAGE + n * BULK_MAX_PAGES ..`.
pub const BULK_FIRST_PAGE: usize = 1;

#[derive(Debug, Clone)]
struct Upload {
    preset: u8,
    page: usize,
    fill: usize,
    data: [u8; BULK_PAGE_SIZE],
}

impl Upload {
    fn new(preset: u8) -> Self {
        Self {
            preset,
            page: 0,
            fill: 0,
            data: [0; BULK_PAGE_SIZE],
        }
    }

    fn flash_page(&self) -> usize {
        BULK_FIRST_PAGE + self.preset as usize * BULK_MAX_PAGES + self.page
    }
}

pub struct PresetProtocol<F: Flash> {
    store: PresetStore<F>,
    labels: &'static [&'static str],
    upload: Option<Upload>,
}

impl<F: Flash> PresetProtocol<F> {
    pub fn new(flash: F, defaults: PresetTable, labels: &'static [&'static str]) -> Self {
        Self {
            store: PresetStore::new(flash, defaults),
            labels,
            upload: None,
        }
    }

    /// Loads the preset table from flash. On failure the defaults stay in use.
    pub fn initialize(&mut self) {
        if let Err(err) = self.store.load() {
            log::warn!("loading presets failed, using defaults: {err}");
        }
    }

    pub fn store(&self) -> &PresetStore<F> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PresetStore<F> {
        &mut self.store
    }

    pub fn is_uploading(&self) -> bool {
        self.upload.is_some()
    }

    /// Handles one host property and returns the reply, or an empty property.
    pub fn handle(&mut self, rcv: &Property) -> Property {
        let id = PropertyId(rcv.id);
        if rcv.is_empty() || id.is_extended() {
            return Property::EMPTY;
        }

        match (id.table(), id.class()) {
            (TABLE_PRESET, CLASS_READ | CLASS_BEGIN) => self.read_preset(id),
            (TABLE_PRESET, CLASS_UPDATE | CLASS_UPDATE_ACTIVATE) => self.write_preset(id, rcv),
            (TABLE_BULK, CLASS_BEGIN | CLASS_CHUNK | CLASS_END) => self.bulk(id, rcv),
            (TABLE_LABEL, _) => self.read_label(id),
            _ => {
                log::trace!("ignoring property {:#x}", rcv.id);
                Property::EMPTY
            }
        }
    }

    fn slot(&self, id: PropertyId) -> u8 {
        match id.index() {
            0 => self.store.active(),
            p => p,
        }
    }

    fn read_preset(&self, id: PropertyId) -> Property {
        let slot = self.slot(id);
        match self.store.read(slot) {
            Ok(preset) => Property::new(
                PropertyId::compose(TABLE_PRESET, slot, CLASS_READ),
                pack_bytes(preset),
            ),
            Err(err) => error_reply(TABLE_PRESET, slot, err),
        }
    }

    fn write_preset(&mut self, id: PropertyId, rcv: &Property) -> Property {
        let slot = self.slot(id);
        let preset = unpack_bytes(&rcv.data);
        let activate = id.class() == CLASS_UPDATE_ACTIVATE;

        let result = self.store.write(slot, &preset).and_then(|()| {
            if activate {
                self.store.activate(slot)
            } else {
                Ok(())
            }
        });

        match result {
            Ok(()) => {
                let class = if activate {
                    CLASS_NOTIFY_ACTIVE
                } else {
                    CLASS_NOTIFY
                };
                Property::new(PropertyId::compose(TABLE_PRESET, slot, class), rcv.data)
            }
            Err(err) => error_reply(TABLE_PRESET, slot, err),
        }
    }

    fn bulk(&mut self, id: PropertyId, rcv: &Property) -> Property {
        let preset = id.index();
        match id.class() {
            CLASS_BEGIN => {
                log::debug!("bulk upload for preset {preset} started");
                self.upload = Some(Upload::new(preset));
                Property::EMPTY
            }
            CLASS_CHUNK => match self.bulk_chunk(rcv) {
                Ok(()) => Property::EMPTY,
                Err(err) => {
                    self.upload = None;
                    error_reply(TABLE_BULK, preset, err)
                }
            },
            _ => {
                let result = self.bulk_flush();
                self.upload = None;
                log::debug!("bulk upload for preset {preset} finished");
                match result {
                    Ok(()) => Property::EMPTY,
                    Err(err) => error_reply(TABLE_BULK, preset, err),
                }
            }
        }
    }

    fn bulk_chunk(&mut self, rcv: &Property) -> Result<(), FlashError> {
        let Some(upload) = self.upload.as_mut() else {
            log::trace!("bulk chunk without begin");
            return Ok(());
        };
        let bytes = unpack_bytes(&rcv.data);
        upload.data[upload.fill..upload.fill + PAYLOAD_BYTES].copy_from_slice(&bytes);
        upload.fill += PAYLOAD_BYTES;

        if upload.fill == BULK_PAGE_SIZE {
            self.bulk_flush()?;
        }

        Ok(())
    }

    /// Writes the pending page, if any. Pages past the upload limit are dropped.
    fn bulk_flush(&mut self) -> Result<(), FlashError> {
        let Some(upload) = self.upload.as_mut() else {
            return Ok(());
        };
        if upload.fill == 0 {
            return Ok(());
        }
        if upload.page < BULK_MAX_PAGES {
            let page = upload.flash_page();
            self.store.session()?.write(page, &upload.data[..upload.fill])?;
            upload.page += 1;
        }
        upload.fill = 0;

        Ok(())
    }

    fn read_label(&self, id: PropertyId) -> Property {
        let text = self
            .labels
            .get(id.low_byte() as usize)
            .map(|label| label.as_bytes())
            .unwrap_or_default();

        Property::new(id.0, pack_text(text))
    }
}

fn error_reply(table: u8, index: u8, err: FlashError) -> Property {
    log::warn!("preset request failed: {err}");
    Property::new(PropertyId::compose(table, index, CLASS_ERROR), [0; 5])
}
