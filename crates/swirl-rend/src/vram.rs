use std::sync::{Arc, PoisonError, RwLock};

/// Handle to emulated video memory passed to backend factories.
pub type VramHandle = Arc<Vram>;

/// Emulated video memory.
///
/// The dispatch core never looks inside; backends read textures out of it and render-to-texture
/// frames write back into it.
#[derive(Debug)]
pub struct Vram {
    bytes: RwLock<Box<[u8]>>,
}

impl Vram {
    pub fn new(size: usize) -> VramHandle {
        Arc::new(Self {
            bytes: RwLock::new(vec![0u8; size].into_boxed_slice()),
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self.bytes.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.bytes.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_visible_through_every_handle() {
        let vram = Vram::new(16);
        let other = vram.clone();

        vram.write(|bytes| bytes[3] = 0xaa);
        assert_eq!(other.read(|bytes| bytes[3]), 0xaa);
        assert_eq!(other.len(), 16);
    }
}
