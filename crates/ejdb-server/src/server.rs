//! Thread-per-request accept loop (spec.md §6 "Embedded HTTP gateway"),
//! poll-based shutdown mirrored from a raw-socket accept loop but driven
//! by `tiny_http`'s own timeout-bounded `recv_timeout` instead of a
//! manually non-blocking `TcpListener`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use signal_hook::consts::SIGTERM;
use signal_hook::flag;
use tiny_http::Server as HttpServer;

use ejdb_db::Db;
use ejdb_store::Store;

use crate::config::Config;
use crate::handler;

pub struct Server<S: Store> {
    db: Arc<Db<S>>,
    config: Config,
}

impl<S: Store + Send + Sync + 'static> Server<S> {
    pub fn new(db: Db<S>, config: Config) -> Self {
        Self {
            db: Arc::new(db),
            config,
        }
    }

    pub fn serve(&self) -> Result<(), std::io::Error> {
        let http = HttpServer::http(&self.config.addr)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        tracing::info!(addr = %self.config.addr, "ejdb-server listening");

        let shutdown = Arc::new(AtomicBool::new(false));
        flag::register(SIGTERM, Arc::clone(&shutdown))?;

        let mut handles = Vec::new();

        while !shutdown.load(Ordering::Relaxed) {
            match http.recv_timeout(Duration::from_millis(200)) {
                Ok(Some(request)) => {
                    let db = Arc::clone(&self.db);
                    let config = self.config.clone();
                    handles.push(thread::spawn(move || {
                        handler::dispatch(request, &db, &config);
                    }));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "accept error");
                }
            }
        }

        tracing::info!("shutdown signal received, draining connections");
        for handle in handles {
            let _ = handle.join();
        }
        self.db.close();
        tracing::info!("shutdown complete");
        Ok(())
    }
}
