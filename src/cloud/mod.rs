mod catalog;
mod image;

pub use catalog::Catalog;
pub use image::Image;
