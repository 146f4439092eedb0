pub mod config;

// Pose geometry and scoring
pub mod geometry;
pub mod thresholds;
pub mod asymmetry;

// Timed holds and recorded frames
pub mod temporal;
pub mod frames;
