//! Background TTL sweep thread (SPEC_FULL.md "TTL-bearing collections").
//! `get`/`scan` already treat an expired document as absent, so this
//! sweep only reclaims space by physically deleting rows reads already
//! skip: an `AtomicBool` + `Condvar` shutdown handshake around a
//! per-collection purge loop driven by each collection's own
//! `ttl_field`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use ejdb_engine::KvEngine;
use ejdb_store::Store;

pub struct TtlHandle {
    shutdown: Arc<AtomicBool>,
    notify: Arc<(Mutex<()>, Condvar)>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TtlHandle {
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.notify.1.notify_one();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for TtlHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn spawn<S: Store + Send + Sync + 'static>(
    engine: Arc<KvEngine<S>>,
    interval_secs: u64,
) -> Option<TtlHandle> {
    if interval_secs == 0 {
        return None;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let notify = Arc::new((Mutex::new(()), Condvar::new()));
    let sweep_flag = Arc::clone(&shutdown);
    let sweep_notify = Arc::clone(&notify);
    let interval = Duration::from_secs(interval_secs);

    let handle = thread::spawn(move || loop {
        let (lock, cvar) = &*sweep_notify;
        let guard = lock.lock().unwrap();
        let _ = cvar.wait_timeout(guard, interval).unwrap();
        if sweep_flag.load(Ordering::Relaxed) {
            break;
        }
        sweep_once(&engine);
    });

    Some(TtlHandle {
        shutdown,
        notify,
        handle: Some(handle),
    })
}

fn sweep_once<S: Store>(engine: &KvEngine<S>) {
    let names = {
        let txn = match engine.begin(true) {
            Ok(t) => t,
            Err(_) => return,
        };
        let metas = match txn.list_collections() {
            Ok(m) => m,
            Err(_) => return,
        };
        metas
            .into_iter()
            .filter(|m| m.options.ttl_field.is_some())
            .map(|m| m.name)
            .collect::<Vec<_>>()
    };

    for name in names {
        let mut txn = match engine.begin(false) {
            Ok(t) => t,
            Err(_) => continue,
        };
        match txn.purge_expired(&name) {
            Ok(_) => {
                let _ = txn.commit();
            }
            Err(_) => {
                let _ = txn.rollback();
            }
        }
    }
}
