use crate::{
    HashMap,
    TypeId,
    context::{Context, DataPlugin},
    hashing::hash_str,
    logging::trace,
    type_of,
};
use rand::{
    Rng,
    SeedableRng,
    distr::uniform::{SampleRange, SampleUniform},
    prelude::Distribution,
};
use std::any::Any;

/// A named, independently seeded random number stream. Use `define_rng!` rather than
/// implementing this by hand.
pub trait RngId: Any {
    type RngType: SeedableRng;
    const NAME: &'static str;
    fn new(seed: u64) -> Self;
    fn rng(&mut self) -> &mut Self::RngType;
}

struct RngPlugin {
    base_seed: u64,
    // This is actually a `HashMap<TypeId, Box<R: RngId>>`.
    rng_map: HashMap<TypeId, Box<dyn Any>>,
}

impl RngPlugin {
    fn clear(&mut self) {
        self.rng_map.clear();
    }

    fn get_rng<R: RngId>(&mut self) -> &mut R::RngType {
        let base_seed = self.base_seed;
        self.rng_map
            .entry(type_of::<R>())
            .or_insert_with(|| {
                // Each stream gets its own offset so streams stay independent of one another
                // and of the order in which they are first used.
                let seed_offset = base_seed.wrapping_add(hash_str(R::NAME));
                Box::new(R::new(seed_offset))
            })
            .downcast_mut::<R>()
            .unwrap() // Will never panic as the entry for `type_of::<R>()` is always an `R`
            .rng()
    }
}

impl DataPlugin for RngPlugin {
    fn create() -> Self {
        RngPlugin {
            base_seed: 0,
            rng_map: HashMap::default(),
        }
    }
}

/// Gets a mutable reference to the random number generator associated with the given
/// `RngId`.
// This is a private free function so that it's not leaked to the public API.
fn get_rng<R: RngId>(context: &mut Context) -> &mut R::RngType {
    context.get_data_container_mut::<RngPlugin>().get_rng::<R>()
}

pub trait ContextRandomExt {
    /// Sets the base seed and discards existing streams so they are re-seeded on next use.
    fn init_random(&mut self, base_seed: u64);

    /// Gets a random sample from the random number generator associated with the given
    /// `RngId` by applying the specified sampler function. If the Rng has not been used
    /// before, one will be created with the base seed you defined in `init_random`.
    fn sample<R: RngId, T>(&mut self, sampler: impl FnOnce(&mut R::RngType) -> T) -> T;

    /// Gets a random sample from the specified distribution using the generator
    /// associated with the given `RngId`.
    fn sample_distr<R: RngId, T>(&mut self, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng;

    /// Gets a random sample within the range provided by `range`
    /// using the generator associated with the given `RngId`.
    fn sample_range<R: RngId, S, T>(&mut self, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform;
}

impl ContextRandomExt for Context {
    fn init_random(&mut self, base_seed: u64) {
        trace!("initializing random module with base seed {base_seed}");
        let rng_container = self.get_data_container_mut::<RngPlugin>();
        rng_container.base_seed = base_seed;
        rng_container.clear();
    }

    fn sample<R: RngId, T>(&mut self, sampler: impl FnOnce(&mut R::RngType) -> T) -> T {
        let rng = get_rng::<R>(self);
        sampler(rng)
    }

    fn sample_distr<R: RngId, T>(&mut self, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng,
    {
        let rng = get_rng::<R>(self);
        distribution.sample::<R::RngType>(rng)
    }

    fn sample_range<R: RngId, S, T>(&mut self, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample::<R, T>(|rng| rng.random_range(range))
    }
}

/// Defines a named random stream backed by `StdRng`, or by the given generator type.
#[macro_export]
macro_rules! define_rng {
    ($random_id:ident) => {
        $crate::define_rng!($random_id, $crate::rand::rngs::StdRng);
    };
    ($random_id:ident, $rng_type:ty) => {
        pub struct $random_id {
            rng: $rng_type,
        }

        impl $crate::random::RngId for $random_id {
            type RngType = $rng_type;
            const NAME: &'static str = stringify!($random_id);

            fn new(seed: u64) -> Self {
                use $crate::rand::SeedableRng;
                Self {
                    rng: <$rng_type>::seed_from_u64(seed),
                }
            }

            fn rng(&mut self) -> &mut Self::RngType {
                &mut self.rng
            }
        }
    };
}
