use std::sync::Arc;

use crate::application::ingest::IngestService;
use crate::application::query::QueryService;

#[derive(Clone)]
pub struct ApiState {
    pub ingest: Arc<IngestService>,
    pub query: Arc<QueryService>,
}
