//! The reflective operations behind each import.
//!
//! Every operation resolves its operands through the table and the guest
//! memory, performs the host action, and writes any result reference to the
//! guest's output address. Results never travel as a raw `f64` return value,
//! so NaN payloads are not exposed to engine canonicalization.
//!
//! No capability pre-checks are made: asking a number for a property or
//! calling a string fails in the host and surfaces as a trap.

use hostref_value::{Object, Value};
use log::debug;

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::memory::{ref_array_addr, GuestMemory};
use crate::table::Release;

impl Bridge {
    /// `valueGet(out, objId, keyAddr, keyLen)`
    pub fn value_get(
        &mut self,
        mem: &mut GuestMemory<'_>,
        out: u32,
        obj_id: u32,
        key_addr: u32,
        key_len: u32,
    ) -> BridgeResult<()> {
        let target = self.table().load(obj_id)?;
        let key = mem.read_string(key_addr, key_len)?;
        let result = target.get(&key)?;
        self.store_ref(mem, out, result)
    }

    /// `valueSet(objId, keyAddr, keyLen, valueRefAddr)`
    pub fn value_set(
        &mut self,
        mem: &mut GuestMemory<'_>,
        obj_id: u32,
        key_addr: u32,
        key_len: u32,
        value_ref_addr: u32,
    ) -> BridgeResult<()> {
        let target = self.table().load(obj_id)?;
        let key = mem.read_string(key_addr, key_len)?;
        let value = self.load_ref(mem, value_ref_addr)?;
        if !target.set(&key, value)? {
            debug!("write to `{key}` on slot {obj_id} refused by host");
        }
        Ok(())
    }

    /// `valueDeinit(id)`
    pub fn value_deinit(&mut self, id: u32) -> Release {
        self.table_mut().release(id)
    }

    /// `valueObjectCreate(out)`
    pub fn value_object_create(&mut self, mem: &mut GuestMemory<'_>, out: u32) -> BridgeResult<()> {
        self.store_ref(mem, out, Value::Object(Object::new()))
    }

    /// `valueStringCreate(out, addr, len)`
    pub fn value_string_create(
        &mut self,
        mem: &mut GuestMemory<'_>,
        out: u32,
        addr: u32,
        len: u32,
    ) -> BridgeResult<()> {
        let text = mem.read_string(addr, len)?;
        self.store_ref(mem, out, Value::string(text))
    }

    /// `valueStringLen(id) -> len`: UTF-8 byte length, not character count.
    pub fn value_string_len(&self, id: u32) -> BridgeResult<u32> {
        let len = self.encode_string(id)?.len();
        u32::try_from(len).map_err(|_| BridgeError::StringTooLong(len))
    }

    /// `valueStringCopy(id, addr, max)`: copies nothing when the encoded
    /// string is longer than `max`.
    pub fn value_string_copy(
        &self,
        mem: &mut GuestMemory<'_>,
        id: u32,
        addr: u32,
        max: u32,
    ) -> BridgeResult<()> {
        if !mem.is_bound() {
            return Ok(());
        }
        let bytes = self.encode_string(id)?;
        if bytes.len() > max as usize {
            debug!(
                "string copy of slot {id} skipped: {} bytes exceed capacity {max}",
                bytes.len()
            );
            return Ok(());
        }
        mem.write_bytes(addr, bytes.as_bytes())
    }

    /// `valueNew(out, ctorId, argsAddr, argc)`
    pub fn value_new(
        &mut self,
        mem: &mut GuestMemory<'_>,
        out: u32,
        ctor_id: u32,
        args_addr: u32,
        argc: u32,
    ) -> BridgeResult<()> {
        let ctor = self.table().load(ctor_id)?;
        let args = self.load_args(mem, args_addr, argc)?;
        let result = ctor.construct(&args)?;
        self.store_ref(mem, out, result)
    }

    /// `funcApply(out, fnId, thisRefAddr, argsAddr, argc)`
    pub fn func_apply(
        &mut self,
        mem: &mut GuestMemory<'_>,
        out: u32,
        fn_id: u32,
        this_ref_addr: u32,
        args_addr: u32,
        argc: u32,
    ) -> BridgeResult<()> {
        let func = self.table().load(fn_id)?;
        let this = self.load_ref(mem, this_ref_addr)?;
        let args = self.load_args(mem, args_addr, argc)?;
        let result = func.call(&this, &args)?;
        self.store_ref(mem, out, result)
    }

    /// Read `argc` consecutive references starting at `args_addr`.
    fn load_args(&self, mem: &GuestMemory<'_>, args_addr: u32, argc: u32) -> BridgeResult<Vec<Value>> {
        (0..argc)
            .map(|i| self.load_ref(mem, ref_array_addr(args_addr, i)?))
            .collect()
    }

    /// The host string coercion of slot `id`, UTF-8 encoded.
    fn encode_string(&self, id: u32) -> BridgeResult<String> {
        Ok(self.table().load(id)?.to_host_string()?)
    }
}

#[cfg(test)]
mod tests {
    use hostref_value::{Function, HostError, ValueKind};

    use super::*;
    use crate::codec::Ref;
    use crate::table::Predefined;

    const GLOBAL: u32 = Predefined::Global.id();

    fn write_key(buf: &mut [u8], addr: usize, key: &str) -> (u32, u32) {
        buf[addr..addr + key.len()].copy_from_slice(key.as_bytes());
        (addr as u32, key.len() as u32)
    }

    #[test]
    fn get_missing_property_is_undefined() {
        let mut bridge = Bridge::new();
        let mut buf = vec![0u8; 64];
        let (k, n) = write_key(&mut buf, 16, "nothing_here");
        let mut mem = GuestMemory::new(&mut buf);
        bridge.value_get(&mut mem, 0, GLOBAL, k, n).unwrap();
        assert_eq!(mem.read_u32(0).unwrap(), Some(Predefined::Undefined.id()));
    }

    #[test]
    fn get_on_boolean_slot_faults() {
        let mut bridge = Bridge::new();
        let mut buf = vec![0u8; 32];
        let mut mem = GuestMemory::new(&mut buf);
        let err = bridge
            .value_get(&mut mem, 0, Predefined::True.id(), 8, 0)
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::Host(HostError::NotAnObject {
                operation: "get",
                kind: ValueKind::Boolean
            })
        );
    }

    #[test]
    fn apply_on_non_function_faults() {
        let mut bridge = Bridge::new();
        let mut buf = vec![0u8; 32];
        let mut mem = GuestMemory::new(&mut buf);
        mem.write_ref(8, Predefined::Undefined.to_ref()).unwrap();
        let err = bridge
            .func_apply(&mut mem, 0, Predefined::Global.id(), 8, 16, 0)
            .unwrap_err();
        assert_eq!(err, BridgeError::Host(HostError::NotCallable(ValueKind::Object)));
    }

    #[test]
    fn apply_passes_receiver() {
        let mut bridge = Bridge::new();
        let id = bridge
            .store_value(Value::Function(Function::native("whoami", |this, _| {
                Ok(this.clone())
            })))
            .unwrap()
            .slot()
            .unwrap();
        let mut buf = vec![0u8; 32];
        let mut mem = GuestMemory::new(&mut buf);
        mem.write_ref(8, Predefined::Global.to_ref()).unwrap();
        bridge.func_apply(&mut mem, 0, id, 8, 16, 0).unwrap();
        let result = bridge.load_ref(&mem, 0).unwrap();
        assert_eq!(result, bridge.realm().global_value());
    }

    #[test]
    fn object_create_allocates_tagged_slot() {
        let mut bridge = Bridge::new();
        let mut buf = vec![0u8; 8];
        let mut mem = GuestMemory::new(&mut buf);
        bridge.value_object_create(&mut mem, 0).unwrap();
        let r = mem.read_ref(0).unwrap().unwrap();
        assert_eq!(r.tag(), Some(crate::codec::TypeTag::Object));
        assert_eq!(bridge.load_value(r.slot().unwrap()).unwrap().kind(), ValueKind::Object);
    }

    #[test]
    fn object_create_with_short_output_leaks_no_slot() {
        let mut bridge = Bridge::new();
        let mut buf = [0u8; 4];
        let mut mem = GuestMemory::new(&mut buf);
        assert!(bridge.value_object_create(&mut mem, 0).is_err());
        assert_eq!(bridge.stats().live, 0);
        assert_eq!(bridge.stats().slots, Predefined::ALL.len());
    }

    #[test]
    fn string_len_coerces_non_strings() {
        let mut bridge = Bridge::new();
        assert_eq!(bridge.value_string_len(Predefined::Null.id()).unwrap(), 4);
        let sym = bridge
            .realm()
            .lookup_global("Symbol")
            .call(&Value::Undefined, &[])
            .unwrap();
        let id = bridge.store_value(sym).unwrap().slot().unwrap();
        assert_eq!(
            bridge.value_string_len(id).unwrap_err(),
            BridgeError::Host(HostError::SymbolToString)
        );
    }

    #[test]
    fn oversized_copy_writes_nothing() {
        let mut bridge = Bridge::new();
        let id = bridge.store_value(Value::from("abcdef")).unwrap().slot().unwrap();
        let mut buf = vec![0u8; 16];
        let mut mem = GuestMemory::new(&mut buf);
        bridge.value_string_copy(&mut mem, id, 0, 5).unwrap();
        drop(mem);
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn deinit_reports_release_outcome() {
        let mut bridge = Bridge::new();
        let id = bridge.store_value(Value::from("x")).unwrap().slot().unwrap();
        assert_eq!(bridge.value_deinit(id), Release::Freed);
        assert_eq!(bridge.value_deinit(id), Release::NotLive);
        assert_eq!(bridge.value_deinit(GLOBAL), Release::Predefined);
    }

    #[test]
    fn set_refused_by_host_is_not_an_error() {
        let mut bridge = Bridge::new();
        let buffer = bridge
            .realm()
            .lookup_global("Uint8Array")
            .construct(&[Value::Number(2.0)])
            .unwrap();
        let id = bridge.store_value(buffer.clone()).unwrap().slot().unwrap();
        let mut buf = vec![0u8; 32];
        let (k, n) = write_key(&mut buf, 16, "length");
        let mut mem = GuestMemory::new(&mut buf);
        mem.write_ref(0, Ref::number(9.0)).unwrap();
        bridge.value_set(&mut mem, id, k, n, 0).unwrap();
        assert_eq!(buffer.get("length").unwrap(), Value::Number(2.0));
    }
}
