use ejdb_db::{Db, OpenOptions};
use ejdb_server::{Config, Server};
use ejdb_store::{MemoryStore, RedbStore};

fn main() {
    tracing_subscriber::fmt::init();
    let config = Config::from_env();

    match &config.path {
        Some(path) => {
            let store = RedbStore::open(path).expect("failed to open store");
            let db = Db::open(store, OpenOptions::read_write()).expect("failed to open database");
            db.spawn_ttl_sweeper(60);
            let server = Server::new(db, config);
            server.serve().expect("server failed");
        }
        None => {
            let store = MemoryStore::new();
            let db = Db::open(store, OpenOptions::read_write()).expect("failed to open database");
            db.spawn_ttl_sweeper(60);
            let server = Server::new(db, config);
            server.serve().expect("server failed");
        }
    }
}
