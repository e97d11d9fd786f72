//! Application state container shared across Axum route handlers and services.
//!
//! Holds the database connection together with the two injected capabilities
//! the attendance core depends on: the clock and the face-encoding provider.
//! Clones share the underlying handles; route handlers receive it via Axum's
//! `State<T>` extractor.

use crate::clock::Clock;
use recognition::encoder::FaceEncoder;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
    encoder: Arc<dyn FaceEncoder>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        clock: Arc<dyn Clock>,
        encoder: Arc<dyn FaceEncoder>,
    ) -> Self {
        Self { db, clock, encoder }
    }

    /// Returns a shared reference to the internal `DatabaseConnection`.
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn encoder(&self) -> &dyn FaceEncoder {
        self.encoder.as_ref()
    }
}
