//! Pseudo-random register (offsets 10-11, spec.md §4.6): writes are ignored,
//! each read advances the generator and returns a fresh byte or word.
//!
//! `original_source/machine/rng.go` wraps Go's `math/rand` seeded from
//! `time.Now().Unix()`. The core crate stays dependency-free (matching every
//! other module here, and the teacher's own zero-dependency lib), so this is
//! a small xorshift64* generator instead of pulling in a `rand`-family crate
//! for one register; the CLI crate seeds it from the wall clock at startup.

pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        // xorshift64* requires a nonzero seed.
        Rng { state: seed | 1 }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    pub fn next_byte(&mut self) -> u8 {
        (self.next() & 0xFF) as u8
    }

    pub fn next_word(&mut self) -> u16 {
        (self.next() & 0xFFFF) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successive_reads_differ() {
        let mut rng = Rng::new(1);
        let a = rng.next_word();
        let b = rng.next_word();
        assert_ne!(a, b);
    }

    #[test]
    fn same_seed_is_deterministic() {
        let mut a = Rng::new(42);
        let mut b = Rng::new(42);
        for _ in 0..8 {
            assert_eq!(a.next_word(), b.next_word());
        }
    }
}
