mod scope_timer;

pub use scope_timer::ScopeTimer;
