//! Double-buffered particle state.

use super::hash::rand01;
use super::Particle;
use crate::params::FieldPhysics;

/// Streams used for the initial population, disjoint from respawn streams
const INIT_STREAM: u32 = 16;

/// Which of two buffers is current.
///
/// Steps read `read()` and write `write()`; `flip()` hands the freshly written
/// buffer over as the new current one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PingPong {
    current: usize,
}

impl PingPong {
    pub fn read(&self) -> usize {
        self.current
    }

    pub fn write(&self) -> usize {
        1 - self.current
    }

    pub fn flip(&mut self) {
        self.current = 1 - self.current;
    }
}

/// CPU particle state store: two equally-shaped arenas, one current.
///
/// Particles are addressed by grid index `(i, j)` and recycled in place.
pub struct ParticleStore {
    buffers: [Vec<Particle>; 2],
    ping_pong: PingPong,
    grid_width: u32,
}

impl ParticleStore {
    /// Create a store seeded with the initial population
    pub fn new(physics: &FieldPhysics) -> Self {
        let initial = initial_population(physics);
        Self {
            buffers: [initial.clone(), initial],
            ping_pong: PingPong::default(),
            grid_width: physics.grid_width,
        }
    }

    pub fn len(&self) -> usize {
        self.buffers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers[0].is_empty()
    }

    /// Linear index of grid cell (i, j)
    pub fn index_of(&self, i: u32, j: u32) -> usize {
        (j * self.grid_width + i) as usize
    }

    /// Read-only view of the current buffer
    pub fn current(&self) -> &[Particle] {
        &self.buffers[self.ping_pong.read()]
    }

    pub fn get(&self, i: u32, j: u32) -> Option<&Particle> {
        if i >= self.grid_width || j >= self.grid_width {
            return None;
        }
        self.current().get(self.index_of(i, j))
    }

    /// Borrow (current, next) for one step
    pub fn split(&mut self) -> (&[Particle], &mut [Particle]) {
        let (first, second) = self.buffers.split_at_mut(1);
        if self.ping_pong.read() == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        }
    }

    /// Make the buffer written by the last step current
    pub fn swap(&mut self) {
        self.ping_pong.flip();
    }
}

/// Initial population: a column around the source with staggered lives so
/// turnover is spread across ticks
pub fn initial_population(physics: &FieldPhysics) -> Vec<Particle> {
    let seed = physics.seed;
    (0..physics.particle_count_u32())
        .map(|index| {
            let r = |k| rand01(index, 0, seed, INIT_STREAM + k);
            let angle = r(0) * std::f32::consts::TAU;
            let radius = r(1) * physics.initial_radius;
            let y = (r(2) * 2.0 - 1.0) * physics.initial_half_height;
            Particle {
                position: [angle.cos() * radius, y, angle.sin() * radius],
                life: r(3),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_physics() -> FieldPhysics {
        FieldPhysics {
            grid_width: 8,
            ..Default::default()
        }
    }

    #[test]
    fn test_ping_pong() {
        let mut pp = PingPong::default();
        assert_eq!((pp.read(), pp.write()), (0, 1));
        pp.flip();
        assert_eq!((pp.read(), pp.write()), (1, 0));
        pp.flip();
        assert_eq!(pp.read(), 0);
    }

    #[test]
    fn test_store_shape_and_addressing() {
        let store = ParticleStore::new(&small_physics());
        assert_eq!(store.len(), 64);
        assert_eq!(store.index_of(3, 2), 19);
        assert!(store.get(7, 7).is_some());
        assert!(store.get(8, 0).is_none());
    }

    #[test]
    fn test_initial_population_is_bounded() {
        let physics = small_physics();
        for p in initial_population(&physics) {
            assert!((0.0..1.0).contains(&p.life));
            let r = (p.position[0].powi(2) + p.position[2].powi(2)).sqrt();
            assert!(r <= physics.initial_radius + 1e-5);
            assert!(p.position[1].abs() <= physics.initial_half_height);
        }
    }

    #[test]
    fn test_split_writes_next_and_swap_publishes_it() {
        let mut store = ParticleStore::new(&small_physics());
        let before = store.current().to_vec();

        {
            let (current, next) = store.split();
            assert_eq!(current, &before[..]);
            for p in next.iter_mut() {
                p.life = 0.5;
            }
        }
        // Current buffer is untouched until the swap
        assert_eq!(store.current(), &before[..]);

        store.swap();
        assert!(store.current().iter().all(|p| p.life == 0.5));

        let (current, _) = store.split();
        assert!(current.iter().all(|p| p.life == 0.5));
    }
}
