//! Two-slot double buffering with a single parity bit

/// Slots A and B; one is read while the other is written.
///
/// `parity` selects the read slot and flips once per pass, so a pass never
/// writes the slot it reads.
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    slots: [T; 2],
    parity: usize,
}

impl<T> PingPong<T> {
    /// `a` starts as the read slot
    pub fn new(a: T, b: T) -> Self {
        Self {
            slots: [a, b],
            parity: 0,
        }
    }

    pub fn read(&self) -> &T {
        &self.slots[self.parity]
    }

    pub fn write(&self) -> &T {
        &self.slots[1 - self.parity]
    }

    /// Make the slot just written the read slot
    pub fn swap(&mut self) {
        self.parity ^= 1;
    }

    pub fn parity(&self) -> usize {
        self.parity
    }
}
