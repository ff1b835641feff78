//! The value table: slot id → host value.
//!
//! Slots `0..=PREDEFINED_ID_MAX` hold fixed singletons and are never
//! overwritten or released. Every other slot is dynamic: allocated by
//! [`ValueTable::store`], freed by [`ValueTable::release`], and recycled
//! through a LIFO pool so balanced allocate/release workloads do not grow the
//! table.
//!
//! Each dynamic slot tracks whether it is live and how many claims are
//! outstanding on it. A release of a dead slot is ignored, so a guest that
//! frees the same id twice cannot push it onto the pool twice.

use hostref_value::Value;
use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::codec::{Ref, TypeTag};
use crate::error::{BridgeError, BridgeResult};

/// Highest predefined slot id.
pub const PREDEFINED_ID_MAX: u32 = 6;

/// The predefined singleton slots. Ids are stable across instances and are
/// part of the guest contract.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Predefined {
    Nan = 0,
    Null = 1,
    True = 2,
    False = 3,
    Undefined = 4,
    Global = 5,
    Runtime = 6,
}

impl Predefined {
    /// All predefined slots in id order.
    pub const ALL: [Self; 7] = [
        Self::Nan,
        Self::Null,
        Self::True,
        Self::False,
        Self::Undefined,
        Self::Global,
        Self::Runtime,
    ];

    pub const fn id(self) -> u32 {
        self as u32
    }

    /// The boxed reference to this slot.
    pub const fn to_ref(self) -> Ref {
        Ref::boxed(self.id(), TypeTag::None)
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Live { value: Value, claims: u32 },
    Free,
}

/// Outcome of a [`ValueTable::release`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The id names a predefined singleton; nothing changed.
    Predefined,
    /// The last claim was dropped; the id is back in the pool.
    Freed,
    /// Claims remain; the slot stays live.
    Retained(u32),
    /// The id was not live (already released, or never allocated).
    NotLive,
}

/// Counters describing table occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    /// Total slots, predefined included.
    pub slots: usize,
    /// Live dynamic slots.
    pub live: usize,
    /// Ids waiting in the free pool.
    pub pooled: usize,
}

/// Slot storage plus the free pool.
#[derive(Debug, Clone)]
pub struct ValueTable {
    slots: Vec<Slot>,
    pool: Vec<u32>,
}

impl ValueTable {
    /// Create a table holding the predefined singletons. `global` and
    /// `runtime` fill slots 5 and 6.
    pub fn new(global: Value, runtime: Value) -> Self {
        let singletons = [
            Value::Number(f64::NAN),
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::Undefined,
            global,
            runtime,
        ];
        let slots = singletons
            .into_iter()
            .map(|value| Slot::Live {
                value,
                claims: u32::MAX,
            })
            .collect();
        Self {
            slots,
            pool: Vec::new(),
        }
    }

    /// Look up the value at `id`.
    pub fn load(&self, id: u32) -> BridgeResult<Value> {
        match self.slots.get(id as usize) {
            Some(Slot::Live { value, .. }) => Ok(value.clone()),
            Some(Slot::Free) => Err(BridgeError::ReleasedSlot(id)),
            None => Err(BridgeError::UnknownSlot(id)),
        }
    }

    /// Encode `value`, allocating a slot only when it cannot travel as a raw
    /// number or a predefined singleton.
    pub fn store(&mut self, value: Value) -> BridgeResult<Ref> {
        let predefined = match &value {
            Value::Number(n) if !n.is_nan() => return Ok(Ref::number(*n)),
            Value::Number(_) => Predefined::Nan,
            Value::Null => Predefined::Null,
            Value::Undefined => Predefined::Undefined,
            _ => return self.allocate(value),
        };
        Ok(predefined.to_ref())
    }

    fn allocate(&mut self, value: Value) -> BridgeResult<Ref> {
        let tag = TypeTag::of(&value);
        let slot = Slot::Live { value, claims: 1 };
        let id = match self.pool.pop() {
            Some(id) => {
                self.slots[id as usize] = slot;
                id
            }
            None => {
                let id = u32::try_from(self.slots.len()).map_err(|_| BridgeError::TableFull)?;
                self.slots.push(slot);
                id
            }
        };
        trace!("slot {id} allocated ({tag:?})");
        Ok(Ref::boxed(id, tag))
    }

    /// Add a claim to a live dynamic slot; returns the new claim count.
    /// Predefined slots have no count and are left alone.
    pub fn retain(&mut self, id: u32) -> BridgeResult<u32> {
        if id <= PREDEFINED_ID_MAX {
            return Ok(u32::MAX);
        }
        match self.slots.get_mut(id as usize) {
            Some(Slot::Live { claims, .. }) => {
                *claims = claims.saturating_add(1);
                Ok(*claims)
            }
            Some(Slot::Free) => Err(BridgeError::ReleasedSlot(id)),
            None => Err(BridgeError::UnknownSlot(id)),
        }
    }

    /// Drop one claim on `id`, freeing the slot when none remain.
    pub fn release(&mut self, id: u32) -> Release {
        if id <= PREDEFINED_ID_MAX {
            return Release::Predefined;
        }
        let Some(slot) = self.slots.get_mut(id as usize) else {
            warn!("release of unknown slot {id} ignored");
            return Release::NotLive;
        };
        match slot {
            Slot::Live { claims, .. } if *claims > 1 => {
                *claims -= 1;
                Release::Retained(*claims)
            }
            Slot::Live { .. } => {
                *slot = Slot::Free;
                self.pool.push(id);
                trace!("slot {id} released");
                Release::Freed
            }
            Slot::Free => {
                warn!("double release of slot {id} ignored");
                Release::NotLive
            }
        }
    }

    /// Whether `id` currently holds a value.
    pub fn is_live(&self, id: u32) -> bool {
        matches!(self.slots.get(id as usize), Some(Slot::Live { .. }))
    }

    /// Number of slots ever allocated, predefined included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always `false`: the predefined slots are present from construction.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stats(&self) -> TableStats {
        let predefined = Predefined::ALL.len();
        TableStats {
            slots: self.slots.len(),
            live: self.slots.len() - predefined - self.pool.len(),
            pooled: self.pool.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use hostref_value::Object;

    use super::*;

    fn table() -> ValueTable {
        ValueTable::new(Value::Object(Object::new()), Value::Object(Object::new()))
    }

    fn obj() -> Value {
        Value::Object(Object::new())
    }

    #[test]
    fn predefined_slots() {
        let t = table();
        assert!(t.load(Predefined::Nan.id()).unwrap().is_nan());
        assert_eq!(t.load(1).unwrap(), Value::Null);
        assert_eq!(t.load(2).unwrap(), Value::Bool(true));
        assert_eq!(t.load(3).unwrap(), Value::Bool(false));
        assert!(t.load(4).unwrap().is_undefined());
        assert_eq!(t.len(), Predefined::ALL.len());
    }

    #[test]
    fn numbers_bypass_the_table() {
        let mut t = table();
        let r = t.store(Value::Number(12.5)).unwrap();
        assert_eq!(r.as_number(), Some(12.5));
        assert_eq!(t.len(), 7);
    }

    #[test]
    fn nan_null_undefined_use_singletons() {
        let mut t = table();
        assert_eq!(t.store(Value::Number(f64::NAN)).unwrap().slot(), Some(0));
        assert_eq!(t.store(Value::Null).unwrap().slot(), Some(1));
        assert_eq!(t.store(Value::Undefined).unwrap().slot(), Some(4));
        assert_eq!(t.len(), 7);
    }

    #[test]
    fn booleans_get_untagged_dynamic_slots() {
        let mut t = table();
        let r = t.store(Value::Bool(true)).unwrap();
        assert_eq!(r.slot(), Some(PREDEFINED_ID_MAX + 1));
        assert_eq!(r.tag(), Some(TypeTag::None));
        assert_eq!(t.load(PREDEFINED_ID_MAX + 1).unwrap(), Value::Bool(true));
        assert_eq!(t.stats().live, 1);
        assert_eq!(t.release(PREDEFINED_ID_MAX + 1), Release::Freed);
    }

    #[test]
    fn dynamic_slots_start_after_predefined() {
        let mut t = table();
        let r = t.store(Value::from("hi")).unwrap();
        assert_eq!(r.slot(), Some(PREDEFINED_ID_MAX + 1));
        assert_eq!(r.tag(), Some(TypeTag::String));
        assert_eq!(t.load(7).unwrap(), Value::from("hi"));
    }

    #[test]
    fn pool_is_lifo() {
        let mut t = table();
        let a = t.store(obj()).unwrap().slot().unwrap();
        let b = t.store(obj()).unwrap().slot().unwrap();
        assert_eq!(t.release(a), Release::Freed);
        assert_eq!(t.release(b), Release::Freed);
        assert_eq!(t.store(obj()).unwrap().slot(), Some(b));
        assert_eq!(t.store(obj()).unwrap().slot(), Some(a));
        assert_eq!(t.len(), 9);
    }

    #[test]
    fn released_slot_cannot_be_loaded() {
        let mut t = table();
        let id = t.store(obj()).unwrap().slot().unwrap();
        t.release(id);
        assert_eq!(t.load(id).unwrap_err(), BridgeError::ReleasedSlot(id));
        assert_eq!(t.load(99).unwrap_err(), BridgeError::UnknownSlot(99));
    }

    #[test]
    fn double_release_does_not_corrupt_pool() {
        let mut t = table();
        let id = t.store(obj()).unwrap().slot().unwrap();
        assert_eq!(t.release(id), Release::Freed);
        assert_eq!(t.release(id), Release::NotLive);
        let first = t.store(obj()).unwrap().slot().unwrap();
        let second = t.store(obj()).unwrap().slot().unwrap();
        assert_ne!(first, second);
        assert_eq!(t.stats().pooled, 0);
    }

    #[test]
    fn predefined_release_is_noop() {
        let mut t = table();
        for p in Predefined::ALL {
            assert_eq!(t.release(p.id()), Release::Predefined);
            assert!(t.is_live(p.id()));
        }
        assert_eq!(t.load(1).unwrap(), Value::Null);
    }

    #[test]
    fn claims_delay_release() {
        let mut t = table();
        let id = t.store(obj()).unwrap().slot().unwrap();
        assert_eq!(t.retain(id).unwrap(), 2);
        assert_eq!(t.release(id), Release::Retained(1));
        assert!(t.is_live(id));
        assert_eq!(t.release(id), Release::Freed);
        assert!(!t.is_live(id));
        assert_eq!(t.retain(id).unwrap_err(), BridgeError::ReleasedSlot(id));
    }

    #[test]
    fn stats_track_occupancy() {
        let mut t = table();
        let a = t.store(obj()).unwrap().slot().unwrap();
        t.store(obj()).unwrap();
        t.release(a);
        assert_eq!(
            t.stats(),
            TableStats {
                slots: 9,
                live: 1,
                pooled: 1
            }
        );
    }
}
