//! Background push agent. Shares nothing with the page client; it talks to
//! the server and to the platform's notification and window facilities only.

pub mod console;
pub mod payload;
pub mod worker;
