//! Test utilities for the Calendar API integration tests.
//!
//! Provides an in-memory SQLite database with migrations applied, a baseline
//! test configuration, and a helper that spawns the full app on a random
//! port.

use anyhow::{Context, Result};
use calendar_api::config::AppConfig;
use calendar_api::migration::{Migrator, MigratorTrait};
use calendar_api::server::{AppState, create_app};
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

#[allow(dead_code)]
pub const TEST_TOKEN: &str = "test-token";
pub const TEST_SIGNING_KEY: &str = "integration-test-signing-key-32b!!!!";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Baseline configuration for tests: mock providers, fixed bearer token.
#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    AppConfig {
        api_tokens: vec![TEST_TOKEN.to_string()],
        state_signing_key: TEST_SIGNING_KEY.to_string(),
        use_mock_providers: true,
        ..Default::default()
    }
}

#[allow(dead_code)]
pub struct TestServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<Result<()>>>,
}

#[allow(dead_code)]
impl TestServerHandle {
    fn new(shutdown_tx: oneshot::Sender<()>, join_handle: JoinHandle<Result<()>>) -> Self {
        Self {
            shutdown_tx: Some(shutdown_tx),
            join_handle: Some(join_handle),
        }
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.join_handle.take() {
            handle.await.context("server task join failed")??;
        }

        Ok(())
    }
}

/// Spawns the app on a random port and returns its base URL.
#[allow(dead_code)]
pub async fn spawn_test_app(config: AppConfig) -> (String, DatabaseConnection, TestServerHandle) {
    let db = setup_test_db().await.unwrap();
    let state = AppState::new(Arc::new(config), db.clone());
    let app = create_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_url = format!("http://{}", addr);

    let (ready_tx, ready_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server_task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let _ = ready_tx.send(());

        server.await.context("axum server error")
    });

    ready_rx.await.expect("server task to signal readiness");

    (server_url, db, TestServerHandle::new(shutdown_tx, server_task))
}
