pub mod sqlite;

pub use sqlite::{
    run_migrations, DatabaseManager, SqliteExecutionLogRepository, SqliteExecutorDetailRepository,
    SqliteExecutorRepository, SqliteFiredTriggerRepository, SqliteJobDetailRepository,
    SqliteTriggerRepository,
};
