pub mod core;
pub mod exports;
pub mod session;
pub mod students;
pub mod users;
