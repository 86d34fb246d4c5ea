pub mod ai;
pub mod citations;
pub mod markdown;
pub mod session;
pub mod stream;
pub mod types;
pub mod ui;
pub mod views;
