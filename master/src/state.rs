// master/src/state.rs

use common::{WorkerAddr, WorkerInfo};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::SystemTime,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct AppState {
    pub registry: WorkerRegistry,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            registry: WorkerRegistry::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct WorkerMeta {
    pub first_registered: SystemTime,
    pub last_registered: SystemTime,
    pub registrations: u32,
}

#[derive(Default)]
struct RegistryInner {
    workers: HashMap<WorkerAddr, WorkerMeta>,
    // orden de llegada, para reenviarlo igual a cada suscriptor nuevo
    order: Vec<WorkerAddr>,
    subscribers: Vec<mpsc::UnboundedSender<WorkerAddr>>,
    total_registrations: usize,
}

/// Registro de workers del master.
///
/// Cada registro se reenvía a todos los suscriptores (un pool por fase).
/// Un suscriptor nuevo recibe primero todos los workers conocidos.
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Anota el registro y lo reenvía. Devuelve el total de registros recibidos.
    pub fn register(&self, addr: WorkerAddr) -> usize {
        let mut inner = self.lock();
        let now = SystemTime::now();

        match inner.workers.get_mut(&addr) {
            Some(meta) => {
                meta.registrations += 1;
                meta.last_registered = now;
                debug!("worker {} se registró de nuevo", addr);
            }
            None => {
                inner.workers.insert(
                    addr.clone(),
                    WorkerMeta {
                        first_registered: now,
                        last_registered: now,
                        registrations: 1,
                    },
                );
                inner.order.push(addr.clone());
                info!("worker registrado: {}", addr);
            }
        }
        inner.total_registrations += 1;

        // los pools que ya terminaron cerraron su receptor
        inner
            .subscribers
            .retain(|tx| tx.send(addr.clone()).is_ok());

        inner.total_registrations
    }

    /// Stream de registros para un pool nuevo. Arranca con los workers ya conocidos.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<WorkerAddr> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        for addr in &inner.order {
            // rx sigue vivo acá, no puede fallar
            let _ = tx.send(addr.clone());
        }
        inner.subscribers.push(tx);
        rx
    }

    /// Cierra todos los streams abiertos; los pools que estén drenando terminan.
    pub fn close_subscriptions(&self) {
        let mut inner = self.lock();
        let n = inner.subscribers.len();
        inner.subscribers.clear();
        debug!("{} suscripciones de registro cerradas", n);
    }

    pub fn list(&self) -> Vec<WorkerInfo> {
        let inner = self.lock();
        let now = SystemTime::now();
        inner
            .order
            .iter()
            .filter_map(|addr| inner.workers.get(addr).map(|m| (addr, m)))
            .map(|(addr, meta)| WorkerInfo {
                address: addr.clone(),
                registrations: meta.registrations,
                registered_secs_ago: now
                    .duration_since(meta.first_registered)
                    .map(|d| d.as_secs())
                    .unwrap_or(0),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
