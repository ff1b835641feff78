//! Registration of the bridge's imports with a `wasmi` linker.
//!
//! The store's data must give access to a [`Bridge`] through [`AsBridge`].
//! Every import resolves the bound memory afresh, borrows its bytes together
//! with the bridge, and runs the matching operation from [`crate::ops`]. An
//! operation error becomes a host trap that aborts the guest call.

use log::debug;
use wasmi::{Caller, Instance, Linker, Store};

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::memory::GuestMemory;

/// Name of the memory export [`bind_exported_memory`] looks for.
pub const MEMORY_EXPORT: &str = "memory";

/// `valueGet(out: i32, objId: i32, keyAddr: i32, keyLen: i32)`
pub const VALUE_GET: &str = "valueGet";
/// `valueSet(objId: i32, keyAddr: i32, keyLen: i32, valueRefAddr: i32)`
pub const VALUE_SET: &str = "valueSet";
/// `valueDeinit(id: i32)`
pub const VALUE_DEINIT: &str = "valueDeinit";
/// `valueObjectCreate(out: i32)`
pub const VALUE_OBJECT_CREATE: &str = "valueObjectCreate";
/// `valueStringCreate(out: i32, addr: i32, len: i32)`
pub const VALUE_STRING_CREATE: &str = "valueStringCreate";
/// `valueStringLen(id: i32) -> i32`
pub const VALUE_STRING_LEN: &str = "valueStringLen";
/// `valueStringCopy(id: i32, addr: i32, max: i32)`
pub const VALUE_STRING_COPY: &str = "valueStringCopy";
/// `valueNew(out: i32, ctorId: i32, argsAddr: i32, argc: i32)`
pub const VALUE_NEW: &str = "valueNew";
/// `funcApply(out: i32, fnId: i32, thisRefAddr: i32, argsAddr: i32, argc: i32)`
pub const FUNC_APPLY: &str = "funcApply";

/// Every import name, in registration order.
pub const IMPORT_NAMES: [&str; 9] = [
    VALUE_GET,
    VALUE_SET,
    VALUE_DEINIT,
    VALUE_OBJECT_CREATE,
    VALUE_STRING_CREATE,
    VALUE_STRING_LEN,
    VALUE_STRING_COPY,
    VALUE_NEW,
    FUNC_APPLY,
];

/// Store data that owns a bridge.
pub trait AsBridge {
    fn bridge(&self) -> &Bridge;
    fn bridge_mut(&mut self) -> &mut Bridge;
}

impl AsBridge for Bridge {
    fn bridge(&self) -> &Bridge {
        self
    }

    fn bridge_mut(&mut self) -> &mut Bridge {
        self
    }
}

/// Run `op` against the caller's bridge and the current bytes of its bound
/// memory (or an unbound view).
fn with_bridge<T, R>(
    caller: &mut Caller<'_, T>,
    op: impl FnOnce(&mut Bridge, &mut GuestMemory<'_>) -> BridgeResult<R>,
) -> Result<R, wasmi::Error>
where
    T: AsBridge,
{
    let result = match caller.data().bridge().memory() {
        Some(memory) => {
            let (bytes, data) = memory.data_and_store_mut(&mut *caller);
            op(data.bridge_mut(), &mut GuestMemory::new(bytes))
        }
        None => {
            debug!("import called before memory was bound");
            op(caller.data_mut().bridge_mut(), &mut GuestMemory::unbound())
        }
    };
    result.map_err(|e| {
        debug!("import trapped: {e}");
        wasmi::Error::host(e)
    })
}

fn link_error<E: std::fmt::Display>(name: &'static str) -> impl FnOnce(E) -> BridgeError {
    move |e| BridgeError::Link {
        name,
        message: e.to_string(),
    }
}

/// Define all bridge imports on `linker` under `config.namespace`.
pub fn define_imports<T>(linker: &mut Linker<T>, config: &BridgeConfig) -> BridgeResult<()>
where
    T: AsBridge + 'static,
{
    let ns = config.namespace.as_str();

    linker
        .func_wrap(
            ns,
            VALUE_GET,
            |mut caller: Caller<'_, T>, out: u32, id: u32, key: u32, key_len: u32| {
                with_bridge(&mut caller, |b, mem| b.value_get(mem, out, id, key, key_len))
            },
        )
        .map_err(link_error(VALUE_GET))?;

    linker
        .func_wrap(
            ns,
            VALUE_SET,
            |mut caller: Caller<'_, T>, id: u32, key: u32, key_len: u32, value: u32| {
                with_bridge(&mut caller, |b, mem| b.value_set(mem, id, key, key_len, value))
            },
        )
        .map_err(link_error(VALUE_SET))?;

    linker
        .func_wrap(ns, VALUE_DEINIT, |mut caller: Caller<'_, T>, id: u32| {
            caller.data_mut().bridge_mut().value_deinit(id);
        })
        .map_err(link_error(VALUE_DEINIT))?;

    linker
        .func_wrap(ns, VALUE_OBJECT_CREATE, |mut caller: Caller<'_, T>, out: u32| {
            with_bridge(&mut caller, |b, mem| b.value_object_create(mem, out))
        })
        .map_err(link_error(VALUE_OBJECT_CREATE))?;

    linker
        .func_wrap(
            ns,
            VALUE_STRING_CREATE,
            |mut caller: Caller<'_, T>, out: u32, addr: u32, len: u32| {
                with_bridge(&mut caller, |b, mem| b.value_string_create(mem, out, addr, len))
            },
        )
        .map_err(link_error(VALUE_STRING_CREATE))?;

    linker
        .func_wrap(ns, VALUE_STRING_LEN, |caller: Caller<'_, T>, id: u32| {
            caller
                .data()
                .bridge()
                .value_string_len(id)
                .map_err(wasmi::Error::host)
        })
        .map_err(link_error(VALUE_STRING_LEN))?;

    linker
        .func_wrap(
            ns,
            VALUE_STRING_COPY,
            |mut caller: Caller<'_, T>, id: u32, addr: u32, max: u32| {
                with_bridge(&mut caller, |b, mem| b.value_string_copy(mem, id, addr, max))
            },
        )
        .map_err(link_error(VALUE_STRING_COPY))?;

    linker
        .func_wrap(
            ns,
            VALUE_NEW,
            |mut caller: Caller<'_, T>, out: u32, ctor: u32, args: u32, argc: u32| {
                with_bridge(&mut caller, |b, mem| b.value_new(mem, out, ctor, args, argc))
            },
        )
        .map_err(link_error(VALUE_NEW))?;

    linker
        .func_wrap(
            ns,
            FUNC_APPLY,
            |mut caller: Caller<'_, T>, out: u32, func: u32, this: u32, args: u32, argc: u32| {
                with_bridge(&mut caller, |b, mem| {
                    b.func_apply(mem, out, func, this, args, argc)
                })
            },
        )
        .map_err(link_error(FUNC_APPLY))?;

    Ok(())
}

/// Bind the instance's exported memory into the store's bridge.
pub fn bind_exported_memory<T: AsBridge>(
    store: &mut Store<T>,
    instance: &Instance,
) -> BridgeResult<()> {
    let memory = instance
        .get_memory(&*store, MEMORY_EXPORT)
        .ok_or_else(|| BridgeError::MissingMemory(MEMORY_EXPORT.to_string()))?;
    store.data_mut().bridge_mut().bind_memory(memory);
    Ok(())
}
