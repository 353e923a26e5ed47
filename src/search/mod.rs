pub mod controller;
pub mod timer;

pub use controller::{SearchController, SearchView, DEFAULT_DEBOUNCE};
pub use timer::DebounceTimer;
