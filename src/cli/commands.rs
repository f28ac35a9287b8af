pub mod initdb;
pub mod repair;
pub mod serve;
pub mod sweep;

pub use initdb::init_database;
pub use repair::repair_dates;
pub use serve::serve;
pub use sweep::sweep;
