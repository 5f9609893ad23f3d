pub mod derivatives;
pub mod process;
pub mod upload;
pub mod volume;
