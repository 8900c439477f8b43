pub mod config;
pub mod decisions;
pub mod market;
pub mod metrics;
pub mod roster;
pub mod series;
/// LIVE/PAUSED controller driving the tick and refresh timers.
pub mod session;
pub mod simulation;
pub mod team;
pub mod updater;
