use eyre::{bail, Result};

use super::taint::Taint;

/// Upper bound on memory size. Offsets derived from untrusted input can be
/// arbitrarily large; anything past this bound halts the path.
pub const MEMORY_LIMIT: usize = 1 << 20;

/// The [`Memory`] struct represents the memory of an EVM, with the provenance of
/// every byte tracked alongside it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Memory {
    /// Vector storing memory data
    pub memory: Vec<u8>,
    taint: Vec<Taint>,
}

impl Memory {
    /// Creates a new, empty [`Memory`]
    pub fn new() -> Memory {
        Memory { memory: Vec::with_capacity(2048), taint: Vec::with_capacity(2048) }
    }

    /// Gets the current size of the memory in bytes.
    ///
    /// ```
    /// use argus_vm::core::memory::Memory;
    ///
    /// let memory = Memory::new();
    /// assert_eq!(memory.size(), 0);
    /// ```
    pub fn size(&self) -> usize {
        self.memory.len()
    }

    /// Extends the memory so that `offset..offset+size` is addressable, rounding
    /// up to a multiple of 32 bytes. A zero `size` never extends.
    ///
    /// ```
    /// use argus_vm::core::memory::Memory;
    ///
    /// let mut memory = Memory::new();
    /// memory.extend(0, 33).expect("within limits");
    /// assert_eq!(memory.size(), 64);
    /// ```
    pub fn extend(&mut self, offset: usize, size: usize) -> Result<()> {
        if size == 0 {
            return Ok(());
        }

        let end = match offset.checked_add(size) {
            Some(end) if end <= MEMORY_LIMIT => end,
            _ => bail!("memory access out of bounds: offset {offset}, size {size}"),
        };
        let new_size = end.div_ceil(32) * 32;
        if new_size > self.memory.len() {
            self.memory.resize(new_size, 0);
            self.taint.resize(new_size, Taint::NONE);
        }
        Ok(())
    }

    /// Store `value` at `offset`, marking every written byte with `taint`.
    ///
    /// ```
    /// use argus_vm::core::{memory::Memory, taint::Taint};
    ///
    /// let mut memory = Memory::new();
    /// memory.store(0, &[0xff; 32], Taint::NONE).expect("within limits");
    /// assert_eq!(memory.read(0, 32).expect("within limits"), vec![0xff; 32]);
    /// ```
    pub fn store(&mut self, offset: usize, value: &[u8], taint: Taint) -> Result<()> {
        self.extend(offset, value.len())?;
        self.memory[offset..offset + value.len()].copy_from_slice(value);
        self.taint[offset..offset + value.len()].fill(taint);
        Ok(())
    }

    /// Copy `data[src..src+size]` into memory at `offset`, zero-filling past the
    /// end of `data`.
    pub fn copy_from(
        &mut self,
        offset: usize,
        data: &[u8],
        src: usize,
        size: usize,
        taint: Taint,
    ) -> Result<()> {
        if size == 0 {
            return Ok(());
        }

        self.extend(offset, size)?;

        let target = &mut self.memory[offset..offset + size];
        let available = data.len().saturating_sub(src).min(size);
        if available > 0 {
            target[..available].copy_from_slice(&data[src..src + available]);
        }
        target[available..].fill(0);
        self.taint[offset..offset + size].fill(taint);
        Ok(())
    }

    /// Read `size` bytes at `offset`, extending memory as the EVM does.
    pub fn read(&mut self, offset: usize, size: usize) -> Result<Vec<u8>> {
        self.extend(offset, size)?;
        Ok(self.memory.get(offset..offset + size).map(<[u8]>::to_vec).unwrap_or_default())
    }

    /// The combined provenance of `offset..offset+size`.
    pub fn taint_of(&self, offset: usize, size: usize) -> Taint {
        let end = offset.saturating_add(size).min(self.taint.len());
        if offset >= end {
            return Taint::NONE;
        }
        Taint::union(self.taint[offset..end].iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_extends() {
        let mut memory = Memory::new();
        assert_eq!(memory.read(10, 4).expect("within limits"), vec![0; 4]);
        assert_eq!(memory.size(), 32);
    }

    #[test]
    fn test_limit() {
        let mut memory = Memory::new();
        assert!(memory.extend(MEMORY_LIMIT, 1).is_err());
        assert!(memory.extend(usize::MAX, 2).is_err());
        assert!(memory.extend(usize::MAX, 0).is_ok());
    }

    #[test]
    fn test_taint_tracking() {
        let mut memory = Memory::new();
        memory.store(0, &[1; 32], Taint::NONE).expect("within limits");
        memory.store(32, &[2; 32], Taint::CALLDATA).expect("within limits");

        assert_eq!(memory.taint_of(0, 32), Taint::NONE);
        assert_eq!(memory.taint_of(16, 32), Taint::CALLDATA);
        assert_eq!(memory.taint_of(1000, 32), Taint::NONE);
    }

    #[test]
    fn test_copy_from_checks_limit_before_copying() {
        let mut memory = Memory::new();
        assert!(memory.copy_from(0, &[0xaa], 0, usize::MAX >> 1, Taint::CALLDATA).is_err());
        assert!(memory.copy_from(MEMORY_LIMIT, &[], 0, 1, Taint::NONE).is_err());
        assert_eq!(memory.size(), 0);
    }

    #[test]
    fn test_copy_from_overwrites_stale_bytes() {
        let mut memory = Memory::new();
        memory.store(0, &[0xff; 4], Taint::NONE).expect("within limits");
        memory.copy_from(0, &[0xaa], 0, 4, Taint::CALLDATA).expect("within limits");
        assert_eq!(memory.read(0, 4).expect("within limits"), vec![0xaa, 0, 0, 0]);
        assert_eq!(memory.taint_of(0, 4), Taint::CALLDATA);
    }

    #[test]
    fn test_copy_from_zero_fills() {
        let mut memory = Memory::new();
        memory.copy_from(0, &[0xaa, 0xbb], 1, 4, Taint::CALLDATA).expect("within limits");
        assert_eq!(memory.read(0, 4).expect("within limits"), vec![0xbb, 0, 0, 0]);
    }
}
