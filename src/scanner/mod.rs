pub mod format;
pub mod lifecycle;
pub mod matcher;
pub mod orchestrator;
pub mod paginator;
pub mod resolver;
