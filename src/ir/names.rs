use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generates unique names for globals declared under the blank name `_`.
/// The salt keeps anonymous names from colliding across separately built
/// packages; seeding it makes test builds reproducible.
#[derive(Debug, Clone)]
pub struct NameGen {
    salt: u32,
    count: u32,
}

impl NameGen {
    pub fn new() -> Self {
        NameGen::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        NameGen::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(mut rng: StdRng) -> Self {
        NameGen {
            salt: rng.r#gen(),
            count: 0,
        }
    }

    pub fn fresh(&mut self) -> String {
        let name = format!("_:{:08x}:{}", self.salt, self.count);
        self.count += 1;
        name
    }
}

impl Default for NameGen {
    fn default() -> Self {
        NameGen::new()
    }
}
