//! The bridge instance: one per guest instance.

use hostref_value::{Object, Realm, Value};
use log::warn;

use crate::codec::{Ref, TypeTag};
use crate::config::BridgeConfig;
use crate::error::BridgeResult;
use crate::memory::{GuestMemory, REF_SIZE};
use crate::table::{Predefined, TableStats, ValueTable};

/// Host-side state backing one guest instance: its realm, value table and
/// linear-memory binding.
///
/// The bridge is not thread-safe. A multi-threaded guest needs one bridge per
/// thread.
#[derive(Debug)]
pub struct Bridge {
    config: BridgeConfig,
    realm: Realm,
    runtime: Object,
    table: ValueTable,
    memory: Option<wasmi::Memory>,
}

impl Bridge {
    /// Create a bridge with a fresh realm and default configuration.
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        Self::with_realm(Realm::new(), config)
    }

    /// Create a bridge over an existing realm.
    pub fn with_realm(realm: Realm, config: BridgeConfig) -> Self {
        let runtime = Object::new();
        runtime.set("namespace", Value::string(config.namespace.as_str()));
        let table = ValueTable::new(realm.global_value(), Value::Object(runtime.clone()));
        Self {
            config,
            realm,
            runtime,
            table,
            memory: None,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// The object in predefined slot 6. Loaders may hang their own
    /// properties on it for the guest to find.
    pub fn runtime(&self) -> &Object {
        &self.runtime
    }

    pub fn table(&self) -> &ValueTable {
        &self.table
    }

    pub fn stats(&self) -> TableStats {
        self.table.stats()
    }

    // ── Memory binding ───────────────────────────────────────────────────

    /// Attach the guest's linear memory. Must happen before the guest makes
    /// any call that needs memory; earlier calls see unbound memory.
    pub fn bind_memory(&mut self, memory: wasmi::Memory) {
        self.memory = Some(memory);
    }

    pub fn unbind_memory(&mut self) -> Option<wasmi::Memory> {
        self.memory.take()
    }

    pub fn memory(&self) -> Option<wasmi::Memory> {
        self.memory
    }

    // ── Host-side value access ───────────────────────────────────────────

    /// Load the value in slot `id`, e.g. an id a guest export returned.
    pub fn load_value(&self, id: u32) -> BridgeResult<Value> {
        self.table.load(id)
    }

    /// Load the value in slot `id` and release the slot. Predefined values
    /// are returned but stay in place.
    pub fn delete_value(&mut self, id: u32) -> BridgeResult<Value> {
        let value = self.table.load(id)?;
        self.table.release(id);
        Ok(value)
    }

    /// Encode a host value for handing to the guest.
    pub fn store_value(&mut self, value: Value) -> BridgeResult<Ref> {
        self.table.store(value)
    }

    /// Add a claim to slot `id` so it survives one more release.
    pub fn retain_value(&mut self, id: u32) -> BridgeResult<u32> {
        self.table.retain(id)
    }

    pub(crate) fn table_mut(&mut self) -> &mut ValueTable {
        &mut self.table
    }

    // ── Reference marshaling ─────────────────────────────────────────────

    /// Read a reference at `addr`, retrying while the bits are a NaN without
    /// the reserved prefix. A NaN that never shows the prefix decodes as the
    /// NaN slot. `None` when memory is unbound.
    pub fn read_ref(&self, mem: &GuestMemory<'_>, addr: u32) -> BridgeResult<Option<Ref>> {
        let mut attempts = 0;
        loop {
            let Some(r) = mem.read_ref(addr)? else {
                return Ok(None);
            };
            if r.is_boxed() || r.as_number().is_some() {
                return Ok(Some(r));
            }
            if attempts >= self.config.decode_retries {
                warn!(
                    "reference at {addr} is a foreign NaN ({:#018x}); decoding as NaN",
                    r.bits()
                );
                return Ok(Some(Ref::boxed(Predefined::Nan.id(), TypeTag::None)));
            }
            attempts += 1;
        }
    }

    /// Resolve the reference at `addr` to a host value. Unbound memory reads
    /// as `undefined`.
    pub fn load_ref(&self, mem: &GuestMemory<'_>, addr: u32) -> BridgeResult<Value> {
        let Some(r) = self.read_ref(mem, addr)? else {
            return Ok(Value::Undefined);
        };
        match (r.as_number(), r.slot()) {
            (Some(n), _) => Ok(Value::Number(n)),
            (None, Some(id)) => self.table.load(id),
            (None, None) => Ok(Value::Number(f64::NAN)),
        }
    }

    /// Store `value` and write its reference to `addr`. Nothing is stored
    /// when memory is unbound or `addr` cannot hold a reference, so a slot
    /// is never allocated for an id the guest does not receive.
    pub fn store_ref(&mut self, mem: &mut GuestMemory<'_>, addr: u32, value: Value) -> BridgeResult<()> {
        if !mem.is_bound() {
            return Ok(());
        }
        mem.check(addr, REF_SIZE as usize)?;
        let r = self.table.store(value)?;
        mem.write_ref(addr, r)
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}
