//! Host-side value bridge for WASM guests.
//!
//! A guest can only pass numbers across the boundary. The bridge lets those
//! numbers stand in for arbitrary host values by keeping the values in a
//! [`ValueTable`] and handing the guest NaN-boxed slot ids.
//!
//! # Architecture
//!
//! - [`codec`]: slot id ⇄ boxed 64-bit reference.
//! - [`table`]: slot storage, predefined singletons, LIFO free pool.
//! - [`memory`]: scalars, references and UTF-8 text in linear memory.
//! - [`ops`]: the reflective operations (get, set, construct, apply, …).
//! - [`imports`]: registration of those operations with a `wasmi` linker.
//!
//! ## Imports (namespace `zig-js` by default)
//! - `valueGet(out, objId, keyAddr, keyLen)`
//! - `valueSet(objId, keyAddr, keyLen, valueRefAddr)`
//! - `valueDeinit(id)`
//! - `valueObjectCreate(out)`
//! - `valueStringCreate(out, addr, len)`
//! - `valueStringLen(id) → len`
//! - `valueStringCopy(id, addr, max)`
//! - `valueNew(out, ctorId, argsAddr, argc)`
//! - `funcApply(out, fnId, thisRefAddr, argsAddr, argc)`
//!
//! Results are written as 8-byte references to the `out` address.
//!
//! ## Predefined slots
//!
//! | id | value        |
//! |----|--------------|
//! | 0  | NaN          |
//! | 1  | null         |
//! | 2  | true         |
//! | 3  | false        |
//! | 4  | undefined    |
//! | 5  | global object|
//! | 6  | runtime handle |
//!
//! # Usage
//!
//! ```no_run
//! use hostref::{bind_exported_memory, define_imports, Bridge};
//!
//! # fn run(wasm: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = wasmi::Engine::default();
//! let module = wasmi::Module::new(&engine, wasm)?;
//! let bridge = Bridge::new();
//! let mut linker = wasmi::Linker::<Bridge>::new(&engine);
//! define_imports(&mut linker, bridge.config())?;
//! let mut store = wasmi::Store::new(&engine, bridge);
//! let instance = linker.instantiate(&mut store, &module)?.start(&mut store)?;
//! bind_exported_memory(&mut store, &instance)?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod codec;
pub mod config;
pub mod error;
pub mod imports;
pub mod memory;
pub mod ops;
pub mod table;

pub use bridge::Bridge;
pub use codec::{decode_ref, encode_ref, Ref, TypeTag};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use hostref_value::{Function, HostError, Object, Realm, Symbol, Value, ValueKind};
pub use imports::{bind_exported_memory, define_imports, AsBridge};
pub use memory::GuestMemory;
pub use table::{Predefined, Release, TableStats, ValueTable, PREDEFINED_ID_MAX};
