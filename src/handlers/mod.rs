pub mod artifacts;
pub mod health;
pub mod pages;
pub mod phantom;
pub mod reconstruct;
pub mod upload;

pub use artifacts::*;
pub use health::*;
pub use pages::*;
pub use phantom::*;
pub use reconstruct::*;
pub use upload::*;
