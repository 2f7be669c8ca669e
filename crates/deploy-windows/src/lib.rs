// Windows platform implementations. Both types exist on every target so callers
// can name them; off Windows every call fails with a "not supported" error.

pub mod service;

pub mod shortcut;
