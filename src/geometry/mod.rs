mod ground;

pub use ground::{ground_intersection, likely_visual_observation, GeometryConfig, GroundSolution};
