//! Serving with a bounded graceful drain.
//!
//! Once the shutdown signal fires, in-flight requests and then tracked
//! background tasks share one grace window. Running past it is an error.

use std::future::Future;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Instant, timeout_at};

use crate::tasks::BackgroundTasks;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shutdown did not complete within {0:?}")]
    DrainTimeout(Duration),
}

/// Serve `app` on `listener` until `shutdown` resolves, then drain.
///
/// # Errors
///
/// Returns `ServeError::Io` if serving fails and `DrainTimeout` if requests
/// or background tasks outlive `grace`.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    tasks: BackgroundTasks,
    grace: Duration,
    shutdown: F,
) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (started_tx, mut started_rx) = oneshot::channel::<Instant>();
    let signal = async move {
        shutdown.await;
        tracing::info!("Shutdown signal received, draining");
        let _ = started_tx.send(Instant::now());
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .into_future();
    let mut server = std::pin::pin!(server);

    let started = tokio::select! {
        result = &mut server => {
            result?;
            started_rx.try_recv().unwrap_or_else(|_| Instant::now())
        }
        started = &mut started_rx => {
            let started = started.unwrap_or_else(|_| Instant::now());
            match timeout_at(started + grace, &mut server).await {
                Ok(result) => result?,
                Err(_) => {
                    tracing::error!(?grace, "In-flight requests outlived the shutdown deadline");
                    return Err(ServeError::DrainTimeout(grace));
                }
            }
            started
        }
    };

    tasks.close();
    if timeout_at(started + grace, tasks.wait()).await.is_err() {
        tracing::error!(
            ?grace,
            outstanding = tasks.len(),
            "Background tasks outlived the shutdown deadline"
        );
        return Err(ServeError::DrainTimeout(grace));
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::routing::get;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_millis(150)).await;
        "done"
    }

    async fn get_raw(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request =
            format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_in_flight_request_finishes_during_drain() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/slow", get(slow));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(serve(
            listener,
            app,
            BackgroundTasks::new(),
            Duration::from_secs(5),
            async {
                let _ = stop_rx.await;
            },
        ));

        let client = tokio::spawn(get_raw(addr, "/slow"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop_tx.send(()).unwrap();

        let response = client.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("done"));
        assert!(server.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_background_task_past_deadline_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let tasks = BackgroundTasks::new();
        tasks.spawn("stuck", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let result = serve(
            listener,
            Router::new(),
            tasks,
            Duration::from_millis(50),
            std::future::ready(()),
        )
        .await;
        assert!(matches!(result, Err(ServeError::DrainTimeout(_))));
    }

    #[tokio::test]
    async fn test_background_work_is_awaited() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let tasks = BackgroundTasks::new();
        let (done_tx, done_rx) = oneshot::channel::<()>();
        tasks.spawn("quick", async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = done_tx.send(());
        });

        serve(
            listener,
            Router::new(),
            tasks,
            Duration::from_secs(5),
            std::future::ready(()),
        )
        .await
        .unwrap();
        assert!(done_rx.await.is_ok());
    }
}
