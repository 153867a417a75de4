#[derive(Clone, Debug)]
pub struct Rng {
    seed: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn next_f32(&mut self) -> f32 {
        self.seed = self.seed.wrapping_add(0x6d2b79f5);
        let mut t = self.seed;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        let out = t ^ (t >> 14);
        (out as f64 / 4_294_967_296.0) as f32
    }

    pub fn pick_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        (self.next_f32() * len as f32).floor().min((len - 1) as f32) as usize
    }
}

/// Shuffles player ids so that every actor, given the same set in any input
/// order, lands on the same permutation: the ids are sorted first and the
/// seed is derived from the sorted sequence. Used to assign spread slots
/// without any cross-actor communication.
pub fn consistent_shuffle(ids: &mut [u32]) {
    ids.sort_unstable();
    let mut seed: u32 = 0;
    for (index, id) in ids.iter().enumerate() {
        seed = seed.wrapping_add(id.wrapping_add(3).wrapping_mul(index as u32 + 7));
    }
    let mut rng = Rng::new(seed);
    for i in (1..ids.len()).rev() {
        let j = rng.pick_index(i + 1);
        ids.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_ignores_input_order() {
        let mut a = vec![3, 1, 7, 12, 5];
        let mut b = vec![12, 5, 3, 1, 7];
        consistent_shuffle(&mut a);
        consistent_shuffle(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut ids = vec![10, 20, 30, 40];
        consistent_shuffle(&mut ids);
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![10, 20, 30, 40]);
    }

    #[test]
    fn shuffle_is_not_the_identity_everywhere() {
        // Spot check that the shuffle actually reorders something; a
        // sort-only implementation would leave every set sorted.
        let mut reordered = false;
        for base in 0..8u32 {
            let mut ids: Vec<u32> = (base..base + 6).collect();
            let sorted = ids.clone();
            consistent_shuffle(&mut ids);
            if ids != sorted {
                reordered = true;
                break;
            }
        }
        assert!(reordered);
    }

    #[test]
    fn singleton_and_empty_sets_are_stable() {
        let mut one = vec![42];
        consistent_shuffle(&mut one);
        assert_eq!(one, vec![42]);

        let mut none: Vec<u32> = Vec::new();
        consistent_shuffle(&mut none);
        assert!(none.is_empty());
    }

    #[test]
    fn raw_rng_stays_in_unit_range() {
        let mut rng = Rng::new(7);
        for _ in 0..1_000 {
            let value = rng.next_f32();
            assert!((0.0..1.0).contains(&value));
        }
    }
}
