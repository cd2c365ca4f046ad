pub mod constants;
pub mod frame;
pub mod geometry;
pub mod model_resolver;
pub mod prediction;
