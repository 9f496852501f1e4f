//! Adapters for the external capabilities the assistant can use.
//!
//! Each adapter turns provider outcomes into plain sentences so callers
//! never handle provider-specific errors.

pub mod calendar;
pub mod identity;
pub mod spotify;
pub mod token_store;

pub use calendar::{CalendarTool, GoogleCalendar, GoogleCredentials};
pub use identity::{FirebaseIdentity, IdentityVerifier};
pub use spotify::{SpotifyCredentials, SpotifyService};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenPair, TokenStore};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A shareable request counter for fake provider routes.
    #[derive(Clone, Default)]
    pub struct Hits(Arc<AtomicUsize>);

    impl Hits {
        /// Records a request and returns its 1-based ordinal.
        pub fn hit(&self) -> usize {
            self.0.fetch_add(1, Ordering::SeqCst) + 1
        }

        pub fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Serves `router` on an ephemeral local port and returns its base URL.
    pub async fn spawn_server(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake provider");
        let addr = listener.local_addr().expect("fake provider address");
        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("fake provider crashed");
        });
        format!("http://{addr}")
    }
}
