// In-process state behind the organization workers

pub mod directory;

pub use directory::{Directory, DirectoryError};
