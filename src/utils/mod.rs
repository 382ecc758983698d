pub mod archive;
pub mod cancel;
pub mod file;
pub mod paths;
