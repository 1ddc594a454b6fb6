pub mod artifact_repo;
pub mod key_locks;

pub use artifact_repo::*;
pub use key_locks::*;
