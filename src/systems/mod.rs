pub mod input;
pub mod render;
pub mod setup;
pub mod ui;
pub mod window;
