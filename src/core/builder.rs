use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{config::EngineConfig, engine::Engine, engine::Inner},
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
    worker::Spawn,
};

/// Builder for constructing an [`Engine`].
pub struct EngineBuilder {
    spawner: Arc<dyn Spawn>,
    cfg: EngineConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl EngineBuilder {
    pub(crate) fn new(spawner: Arc<dyn Spawn>) -> Self {
        Self {
            spawner,
            cfg: EngineConfig::default(),
            subscribers: Vec::new(),
        }
    }

    pub fn with_config(mut self, cfg: EngineConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive engine events through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the engine. The worker is not spawned until [`Engine::start`].
    ///
    /// Must be called inside a tokio runtime when subscribers are configured.
    pub fn build(self) -> Engine {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let listener = CancellationToken::new();

        if !self.subscribers.is_empty() {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            subscriber_listener(&bus, set, listener.clone());
        }

        let inner = Inner::new(self.cfg, self.spawner, bus, listener);
        Engine::from_inner(Arc::new(inner))
    }
}

/// Forwards bus events to `set` until the engine is dropped.
fn subscriber_listener(bus: &Bus, set: SubscriberSet, token: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit_arc(Arc::new(ev)),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
            }
        }
        set.shutdown().await;
    });
}
