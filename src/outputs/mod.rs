pub mod autoplay;
pub mod console;
pub mod ui;
