/// Approximate membership filter used to gate first-sight admissions.
///
/// `exist_or_insert` returns whether `id` has been observed before (with
/// the filter's false-positive profile) and unconditionally records the
/// observation.
pub trait AdmissionFilter: Send {
    fn exist_or_insert(&mut self, id: i64) -> bool;
}

/// A double-hashing bit-set filter: a fixed-size bit array probed at `k`
/// positions derived from two independent hash seeds, in the style of
/// bloom-filter admission policies used by production CDN cache
/// simulators.
pub struct BloomFilter {
    bits: Vec<bool>,
    k: u32,
    seed_a: u64,
    seed_b: u64,
}

impl BloomFilter {
    /// `expected_items` sizes the bit array at roughly 10 bits per
    /// expected item, a conventional bloom-filter sizing for a ~1% false
    /// positive rate at `k = 7`.
    pub fn new(expected_items: u64) -> Self {
        let bits_len = (expected_items.max(1) * 10) as usize;
        BloomFilter {
            bits: vec![false; bits_len],
            k: 7,
            seed_a: 0x9E3779B97F4A7C15,
            seed_b: 0xC2B2AE3D27D4EB4F,
        }
    }

    fn positions(&self, id: i64) -> Vec<usize> {
        let h1 = splitmix64(id as u64 ^ self.seed_a);
        let h2 = splitmix64(id as u64 ^ self.seed_b);
        (0..self.k)
            .map(|i| (h1.wrapping_add((i as u64).wrapping_mul(h2)) as usize) % self.bits.len())
            .collect()
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

impl AdmissionFilter for BloomFilter {
    fn exist_or_insert(&mut self, id: i64) -> bool {
        let positions = self.positions(id);
        let already_set = positions.iter().all(|&p| self.bits[p]);
        for p in positions {
            self.bits[p] = true;
        }
        already_set
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_sight_is_false() {
        let mut f = BloomFilter::new(100);
        assert!(!f.exist_or_insert(42));
    }

    #[test]
    fn second_sight_is_true() {
        let mut f = BloomFilter::new(100);
        assert!(!f.exist_or_insert(42));
        assert!(f.exist_or_insert(42));
    }

    #[test]
    fn distinct_ids_do_not_all_collide() {
        let mut f = BloomFilter::new(1000);
        let mut first_sight_misses = 0;
        for id in 0..50 {
            if !f.exist_or_insert(id) {
                first_sight_misses += 1;
            }
        }
        assert!(first_sight_misses > 40);
    }
}
