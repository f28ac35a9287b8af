pub mod aggregates;
pub mod audit;
pub mod entries;
pub mod health;
pub mod sessions;
pub mod sweeps;
