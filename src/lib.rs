pub mod constants;
pub mod engine;
pub mod frame;
pub mod message;
pub mod session;
pub mod utils;
