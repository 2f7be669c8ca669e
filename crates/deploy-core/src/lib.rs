pub mod config;
pub mod display;
pub mod files;
pub mod installer;
pub mod process;
pub mod reconciler;
pub mod runner;
pub mod sc;
pub mod status;

#[cfg(test)]
mod testing;
