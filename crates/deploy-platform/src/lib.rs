pub mod command;
pub mod service;
pub mod shortcut;
