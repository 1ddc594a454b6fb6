pub mod cache_service;
pub mod path_key;
pub mod process_runner;
pub mod producers;
pub mod tomography_service;

pub use cache_service::*;
pub use path_key::*;
pub use process_runner::*;
pub use producers::*;
pub use tomography_service::*;
