//! Bridge error types.

use hostref_value::HostError;
use thiserror::Error;

/// Errors raised by the bridge.
///
/// Every variant that reaches the import surface is turned into a wasm trap,
/// aborting the guest call that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The host rejected a reflective operation (capability mismatch).
    #[error(transparent)]
    Host(#[from] HostError),

    /// A slot id that was never allocated.
    #[error("unknown value slot {0}")]
    UnknownSlot(u32),

    /// A slot id that has been released and not reused since.
    #[error("value slot {0} has been released")]
    ReleasedSlot(u32),

    /// Every 32-bit slot id is in use.
    #[error("value table is full")]
    TableFull,

    /// A guest address range outside the current linear memory.
    #[error("memory access out of bounds: {len} bytes at {addr} (memory size {size})")]
    OutOfBounds { addr: u32, len: usize, size: usize },

    /// The encoded string does not fit the 32-bit length channel.
    #[error("string of {0} bytes exceeds the 32-bit length channel")]
    StringTooLong(usize),

    /// Configuration could not be parsed.
    #[error("invalid bridge configuration: {0}")]
    Config(String),

    /// An import could not be registered with the linker.
    #[error("failed to define import `{name}`: {message}")]
    Link { name: &'static str, message: String },

    /// The instance exports no memory under the expected name.
    #[error("instance does not export a memory named `{0}`")]
    MissingMemory(String),
}

impl wasmi::core::HostError for BridgeError {}

/// Bridge result type alias.
pub type BridgeResult<T> = Result<T, BridgeError>;
