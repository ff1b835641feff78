//! Marshaling to and from guest linear memory.
//!
//! A [`GuestMemory`] borrows the bytes of linear memory for the duration of
//! one import call. It is rebuilt on every call from the live `wasmi::Memory`,
//! so a `memory.grow` between calls can never leave the bridge holding a stale
//! view.
//!
//! When no memory has been bound yet the view is *unbound*: reads report
//! `None` and writes do nothing, so early calls degrade to empty results
//! instead of trapping.
//!
//! All multi-byte values are little-endian.

use std::ops::Range;

use log::debug;

use crate::codec::Ref;
use crate::error::{BridgeError, BridgeResult};

/// Size of one reference in memory; also the stride of argument arrays.
pub const REF_SIZE: u32 = 8;

/// A borrowed view of linear memory, or nothing when unbound.
#[derive(Debug)]
pub struct GuestMemory<'m> {
    bytes: Option<&'m mut [u8]>,
}

impl<'m> GuestMemory<'m> {
    pub fn new(bytes: &'m mut [u8]) -> Self {
        Self { bytes: Some(bytes) }
    }

    pub fn unbound() -> Self {
        Self { bytes: None }
    }

    pub fn is_bound(&self) -> bool {
        self.bytes.is_some()
    }

    /// Current size in bytes (0 when unbound).
    pub fn size(&self) -> usize {
        self.bytes.as_deref().map_or(0, <[u8]>::len)
    }

    fn range(&self, addr: u32, len: usize) -> BridgeResult<Range<usize>> {
        let size = self.size();
        let start = addr as usize;
        match start.checked_add(len) {
            Some(end) if end <= size => Ok(start..end),
            _ => Err(BridgeError::OutOfBounds { addr, len, size }),
        }
    }

    /// Fail with `OutOfBounds` unless `len` bytes at `addr` fit. Unbound
    /// memory passes, since every access to it is a no-op.
    pub fn check(&self, addr: u32, len: usize) -> BridgeResult<()> {
        if self.is_bound() {
            self.range(addr, len)?;
        }
        Ok(())
    }

    fn read_array<const N: usize>(&self, addr: u32) -> BridgeResult<Option<[u8; N]>> {
        let Some(bytes) = self.bytes.as_deref() else {
            return Ok(None);
        };
        let range = self.range(addr, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes[range]);
        Ok(Some(out))
    }

    /// Copy `data` to `addr`. A no-op when unbound.
    pub fn write_bytes(&mut self, addr: u32, data: &[u8]) -> BridgeResult<()> {
        let range = self.range(addr, data.len());
        let Some(bytes) = self.bytes.as_deref_mut() else {
            debug!("write of {} bytes at {addr} skipped: memory not bound", data.len());
            return Ok(());
        };
        bytes[range?].copy_from_slice(data);
        Ok(())
    }

    pub fn read_u32(&self, addr: u32) -> BridgeResult<Option<u32>> {
        Ok(self.read_array(addr)?.map(u32::from_le_bytes))
    }

    pub fn read_f64(&self, addr: u32) -> BridgeResult<Option<f64>> {
        Ok(self.read_array(addr)?.map(f64::from_le_bytes))
    }

    pub fn write_f64(&mut self, addr: u32, n: f64) -> BridgeResult<()> {
        self.write_bytes(addr, &n.to_le_bytes())
    }

    /// Read the raw 8 bytes of a reference. The bits are taken as an integer
    /// so no floating-point path can touch a NaN payload.
    pub fn read_ref(&self, addr: u32) -> BridgeResult<Option<Ref>> {
        Ok(self
            .read_array(addr)?
            .map(|b| Ref::from_bits(u64::from_le_bytes(b))))
    }

    pub fn write_ref(&mut self, addr: u32, r: Ref) -> BridgeResult<()> {
        self.write_bytes(addr, &r.bits().to_le_bytes())
    }

    /// Decode `len` bytes at `addr` as UTF-8, replacing invalid sequences.
    /// The bytes are copied out of linear memory before decoding. Unbound
    /// memory reads as the empty string.
    pub fn read_string(&self, addr: u32, len: u32) -> BridgeResult<String> {
        let Some(bytes) = self.bytes.as_deref() else {
            debug!("string read at {addr} skipped: memory not bound");
            return Ok(String::new());
        };
        let copy = bytes[self.range(addr, len as usize)?].to_vec();
        Ok(match String::from_utf8(copy) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }
}

/// Address of element `index` in an array of references at `base`.
pub fn ref_array_addr(base: u32, index: u32) -> BridgeResult<u32> {
    index
        .checked_mul(REF_SIZE)
        .and_then(|offset| base.checked_add(offset))
        .ok_or(BridgeError::OutOfBounds {
            addr: base,
            len: (index as usize + 1) * REF_SIZE as usize,
            size: 0,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TypeTag;

    #[test]
    fn scalar_roundtrip() {
        let mut buf = [0u8; 16];
        let mut mem = GuestMemory::new(&mut buf);
        mem.write_f64(8, -2.5).unwrap();
        assert_eq!(mem.read_f64(8).unwrap(), Some(-2.5));
        assert_eq!(buf[8..16], (-2.5f64).to_le_bytes());
    }

    #[test]
    fn ref_bits_survive_exactly() {
        let mut buf = [0u8; 8];
        let mut mem = GuestMemory::new(&mut buf);
        let r = Ref::boxed(1234, TypeTag::Function);
        mem.write_ref(0, r).unwrap();
        assert_eq!(mem.read_ref(0).unwrap(), Some(r));
        assert_eq!(mem.read_u32(0).unwrap(), Some(1234));
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let mut buf = [0u8; 8];
        let mut mem = GuestMemory::new(&mut buf);
        assert_eq!(
            mem.read_f64(1).unwrap_err(),
            BridgeError::OutOfBounds {
                addr: 1,
                len: 8,
                size: 8
            }
        );
        assert!(mem.write_bytes(u32::MAX, &[1]).is_err());
        assert!(mem.read_string(4, 5).is_err());
        assert!(mem.check(0, 8).is_ok());
        assert!(mem.check(4, 8).is_err());
    }

    #[test]
    fn unbound_memory_is_inert() {
        let mut mem = GuestMemory::unbound();
        assert!(!mem.is_bound());
        assert_eq!(mem.read_f64(0).unwrap(), None);
        assert_eq!(mem.read_u32(0).unwrap(), None);
        assert_eq!(mem.read_string(0, 10).unwrap(), "");
        mem.write_f64(0, 1.0).unwrap();
        mem.check(u32::MAX, 8).unwrap();
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut buf = *b"a\xffb";
        let mem = GuestMemory::new(&mut buf);
        assert_eq!(mem.read_string(0, 3).unwrap(), "a\u{fffd}b");
    }

    #[test]
    fn ref_array_addressing() {
        assert_eq!(ref_array_addr(16, 0).unwrap(), 16);
        assert_eq!(ref_array_addr(16, 3).unwrap(), 40);
        assert!(ref_array_addr(u32::MAX - 4, 1).is_err());
    }
}
