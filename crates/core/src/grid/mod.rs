//! Column grid layout and ground heights

pub mod ground;
pub mod mapper;

pub use ground::{
    build_chunk, chunk_count, chunk_rect, chunks_in_radius, DirtyChunks, FlatGround, GroundCast,
    HeightField, HeightFn, HeightSource, CHUNK_SIZE,
};
pub use mapper::{estimated_column_count, local_bounds, GridLayout};
