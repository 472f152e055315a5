pub mod descriptor;
pub mod event;
pub mod image;
pub mod outcome;

pub use descriptor::*;
pub use event::*;
pub use image::*;
pub use outcome::*;
