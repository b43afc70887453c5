use std::sync::Arc;

use crate::fetch::ImageFetcher;
use crate::overlay::OverlayRenderer;

#[derive(Clone)]
pub struct ServerState {
    pub(crate) renderer: OverlayRenderer,
    pub(crate) fetcher: Arc<dyn ImageFetcher>,
    pub(crate) api_key: Option<String>,
}

impl ServerState {
    pub fn new(
        renderer: OverlayRenderer,
        fetcher: Arc<dyn ImageFetcher>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            renderer,
            fetcher,
            api_key,
        }
    }
}
