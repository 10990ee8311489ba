use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use nexero_database::DbConnection;
use tracing::{debug, info, warn};

/// Waits for Ctrl+C or SIGTERM and releases resources once the server has drained
pub struct ShutdownSignal {
    cleanup_timeout: Duration,
    db: Arc<DbConnection>,
}

impl ShutdownSignal {
    pub fn new(cleanup_timeout: Duration, db: Arc<DbConnection>) -> Self {
        Self {
            cleanup_timeout,
            db,
        }
    }

    /// Resolves on the first termination signal
    pub fn wait_for_signal(&self) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async {
            let ctrl_c = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut signal) => {
                        signal.recv().await;
                    }
                    Err(e) => {
                        warn!("Failed to listen for SIGTERM: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
                _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
            }
        })
    }

    /// Close the database pool, bounded by the cleanup timeout
    pub async fn cleanup_resources(self) {
        info!("Starting resource cleanup...");

        let cleanup_timeout = self.cleanup_timeout;
        match tokio::time::timeout(cleanup_timeout, self.cleanup_database()).await {
            Ok(()) => info!("Graceful shutdown completed"),
            Err(_) => warn!(
                "Cleanup timeout exceeded ({:?}), forcing shutdown",
                cleanup_timeout
            ),
        }
    }

    async fn cleanup_database(self) {
        debug!("Closing database connections...");

        match Arc::try_unwrap(self.db) {
            Ok(db) => {
                if let Err(e) = db.close().await {
                    warn!("Error closing database connection: {}", e);
                } else {
                    debug!("Database connection closed successfully");
                }
            }
            Err(_) => {
                debug!("Database still has other references, skipping close");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexero_core::DatabaseConfig;

    #[tokio::test]
    async fn test_cleanup_closes_unshared_connection() {
        let db = nexero_database::establish_connection(&DatabaseConfig::new("sqlite::memory:"))
            .await
            .unwrap();

        let signal = ShutdownSignal::new(Duration::from_secs(5), db);
        signal.cleanup_resources().await;
    }
}
