//! Flash-backed preset storage.
//!
//! Sixteen 20-byte presets live in flash page 0 and are mirrored in RAM. Saves
//! are staged: the new table is written, read back and compared before the RAM
//! copy is replaced, so a failed save never leaves a torn preset behind.

pub mod protocol;

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use spin::{Mutex, MutexGuard};

use crate::error::FlashError;

pub use protocol::PresetProtocol;

pub const PRESET_COUNT: usize = 16;
pub const PRESET_SIZE: usize = 20;

/// Flash page holding the preset table.
pub const PRESET_PAGE: usize = 0;

pub type Preset = [u8; PRESET_SIZE];
pub type PresetTable = [Preset; PRESET_COUNT];

/// Raw flash access provided by the platform.
pub trait Flash {
    fn open(&mut self) -> Result<(), FlashError>;
    fn close(&mut self) -> Result<(), FlashError>;
    fn read(&mut self, page: usize, buffer: &mut [u8]) -> Result<(), FlashError>;
    fn write(&mut self, page: usize, data: &[u8]) -> Result<(), FlashError>;
}

/// Open flash handle. Closes the device when dropped.
pub struct FlashSession<'a, F: Flash> {
    flash: MutexGuard<'a, F>,
}

impl<'a, F: Flash> FlashSession<'a, F> {
    fn open(mut flash: MutexGuard<'a, F>) -> Result<Self, FlashError> {
        flash.open()?;
        Ok(Self { flash })
    }

    pub fn read(&mut self, page: usize, buffer: &mut [u8]) -> Result<(), FlashError> {
        self.flash.read(page, buffer)
    }

    pub fn write(&mut self, page: usize, data: &[u8]) -> Result<(), FlashError> {
        self.flash.write(page, data)
    }

    /// Writes `data` and reads it back.
    pub fn write_verified(&mut self, page: usize, data: &[u8]) -> Result<(), FlashError> {
        self.flash.write(page, data)?;
        let mut check = alloc::vec![0u8; data.len()];
        self.flash.read(page, &mut check)?;
        if check != data {
            return Err(FlashError::Verify { page });
        }

        Ok(())
    }
}

impl<F: Flash> Drop for FlashSession<'_, F> {
    fn drop(&mut self) {
        if let Err(err) = self.flash.close() {
            log::warn!("closing flash failed: {err}");
        }
    }
}

pub struct PresetStore<F: Flash> {
    flash: Mutex<F>,
    presets: PresetTable,
    active: u8,
}

impl<F: Flash> PresetStore<F> {
    pub fn new(flash: F, defaults: PresetTable) -> Self {
        Self {
            flash: Mutex::new(flash),
            presets: defaults,
            active: 1,
        }
    }

    /// Opens flash for exclusive use. Fails with [`FlashError::Busy`] while
    /// another session is alive.
    pub fn session(&self) -> Result<FlashSession<'_, F>, FlashError> {
        let flash = self.flash.try_lock().ok_or(FlashError::Busy)?;
        FlashSession::open(flash)
    }

    /// Replaces the RAM table with the one stored in flash.
    pub fn load(&mut self) -> Result<(), FlashError> {
        let mut bytes = [0u8; PRESET_COUNT * PRESET_SIZE];
        self.session()?.read(PRESET_PAGE, &mut bytes)?;
        for (preset, chunk) in self.presets.iter_mut().zip(bytes.chunks_exact(PRESET_SIZE)) {
            preset.copy_from_slice(chunk);
        }

        Ok(())
    }

    /// Persists the current RAM table.
    pub fn save(&mut self) -> Result<(), FlashError> {
        let table = self.presets;
        self.persist(&table)
    }

    pub fn read(&self, slot: u8) -> Result<&Preset, FlashError> {
        self.presets
            .get(slot as usize)
            .ok_or(FlashError::InvalidSlot(slot))
    }

    /// Stores `preset` in `slot`, in flash first and then in RAM.
    pub fn write(&mut self, slot: u8, preset: &Preset) -> Result<(), FlashError> {
        let mut staged = self.presets;
        *staged
            .get_mut(slot as usize)
            .ok_or(FlashError::InvalidSlot(slot))? = *preset;
        self.persist(&staged)?;
        self.presets = staged;

        Ok(())
    }

    pub fn activate(&mut self, slot: u8) -> Result<(), FlashError> {
        if slot as usize >= PRESET_COUNT {
            return Err(FlashError::InvalidSlot(slot));
        }
        self.active = slot;
        log::debug!("preset {slot} active");

        Ok(())
    }

    pub fn active(&self) -> u8 {
        self.active
    }

    pub fn active_preset(&self) -> &Preset {
        &self.presets[self.active as usize % PRESET_COUNT]
    }

    pub fn presets(&self) -> &PresetTable {
        &self.presets
    }

    fn persist(&self, table: &PresetTable) -> Result<(), FlashError> {
        self.session()?
            .write_verified(PRESET_PAGE, table.as_flattened())
    }
}

/// Flash kept in RAM, for host-side simulation.
#[derive(Debug, Default, Clone)]
pub struct MemoryFlash {
    pages: BTreeMap<usize, Vec<u8>>,
    open: bool,
}

impl MemoryFlash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn page(&self, page: usize) -> Option<&[u8]> {
        self.pages.get(&page).map(Vec::as_slice)
    }
}

impl Flash for MemoryFlash {
    fn open(&mut self) -> Result<(), FlashError> {
        if self.open {
            return Err(FlashError::Busy);
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), FlashError> {
        self.open = false;
        Ok(())
    }

    fn read(&mut self, page: usize, buffer: &mut [u8]) -> Result<(), FlashError> {
        let stored = self.pages.get(&page).ok_or(FlashError::Io { page })?;
        let n = stored.len().min(buffer.len());
        buffer[..n].copy_from_slice(&stored[..n]);
        buffer[n..].fill(0xFF);
        Ok(())
    }

    fn write(&mut self, page: usize, data: &[u8]) -> Result<(), FlashError> {
        if !self.open {
            return Err(FlashError::Io { page });
        }
        self.pages.insert(page, data.to_vec());
        Ok(())
    }
}
