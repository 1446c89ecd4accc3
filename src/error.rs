//! Control-plane errors.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlashError {
    #[error("flash is already open")]
    Busy,
    #[error("flash I/O failed on page {page}")]
    Io { page: usize },
    #[error("read-back of page {page} does not match what was written")]
    Verify { page: usize },
    #[error("preset slot {0} does not exist")]
    InvalidSlot(u8),
}
