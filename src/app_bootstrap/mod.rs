pub mod console;
pub mod services;
