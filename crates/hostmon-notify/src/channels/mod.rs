pub mod email;
pub mod log;
