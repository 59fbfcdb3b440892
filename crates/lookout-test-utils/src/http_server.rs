use std::net::SocketAddr;

use axum::Router;
use tokio::{net::TcpListener, sync::oneshot};
use url::Url;

/// An axum router served on an ephemeral localhost port for the lifetime
/// of the value.
pub struct TestHttpServer {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
}

impl TestHttpServer {
    /// # Panics
    ///
    /// If the listener cannot be bound.
    pub async fn new(router: Router) -> Self {
        let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("test listener address");

        // The listener is bound before `new` returns, so requests made
        // right after it queue until the server task picks them up.
        let (stop, stopped) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = stopped.await;
                })
                .await
                .expect("serve test router");
        });

        Self {
            addr,
            stop: Some(stop),
        }
    }

    /// `http://127.0.0.1:<port><path>`.
    ///
    /// # Panics
    ///
    /// If `path` does not form a valid URL.
    #[must_use]
    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{path}", self.addr)).expect("test server URL")
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
