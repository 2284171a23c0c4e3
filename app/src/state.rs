/// state.rs — Shared application state passed to every Axum handler.
use std::sync::Arc;

use crate::{config::Config, session::Session};

#[derive(Clone)]
pub struct AppState {
    pub cfg:     Arc<Config>,
    pub session: Arc<Session>,     // current document + running operations
}

impl AppState {
    pub fn new(cfg: Config) -> Self {
        let session = Session::new(&cfg);
        Self { cfg: Arc::new(cfg), session }
    }
}
