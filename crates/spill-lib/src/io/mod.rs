pub mod particles;
pub mod text;

pub use particles::{read_particles_csv, write_particles_csv, ParticleSource, ParticleTable};
