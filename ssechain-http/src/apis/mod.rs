pub mod origin;
pub mod relay;
pub mod types;
