pub mod geometry;
pub mod input;
pub mod orientation;
pub mod time;
