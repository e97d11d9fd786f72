use migration::Migrator;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

/// Fills in the environment variables the config singleton requires, so
/// tests never depend on a local `.env`. Existing values are kept.
fn ensure_test_env() {
    for (var, value) in [
        ("DATABASE_PATH", "sqlite::memory:"),
        ("JWT_SECRET", "test-secret"),
    ] {
        if std::env::var(var).is_err() {
            // SAFETY: test setup runs before any concurrent reader of these
            // variables in the test binary.
            unsafe {
                std::env::set_var(var, value);
            }
        }
    }
}

pub async fn setup_test_db() -> DatabaseConnection {
    ensure_test_env();

    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory db");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}
