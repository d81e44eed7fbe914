//! Wires the channel registry, client registry, and scheduler into one
//! shared handle (`Core`), built once at startup and cloned into every
//! session and accept-loop iteration as an `Arc`.

use crate::clients::ClientRegistry;
use crate::config::Config;
use crate::registry::ChannelRegistry;
use crate::scheduler::Scheduler;
use crate::time::now_timestamp;
use std::sync::Arc;

pub struct Core {
    pub config: Arc<Config>,
    pub channels: Arc<ChannelRegistry>,
    pub clients: Arc<ClientRegistry>,
    pub scheduler: Arc<Scheduler>,
    pub started_at: f64,
}

impl Core {
    pub fn new(config: Arc<Config>) -> Arc<Self> {
        let channels = ChannelRegistry::new();
        let scheduler = Scheduler::new(Arc::clone(&channels));
        let clients = ClientRegistry::new(Arc::clone(&channels), config.max_clients);
        Arc::new(Self {
            started_at: now_timestamp(),
            config,
            channels,
            clients,
            scheduler,
        })
    }
}
