//! Pool de workers disponibles.
//!
//! Convierte el stream de registros en una cola acotada de workers libres:
//! - `acquire` espera hasta que haya uno y lo consume
//! - `release` lo devuelve a la cola; `discard` lo da por muerto
//! - si la cola está llena, el registro (o release) más nuevo se descarta con un warn;
//!   quien produce registros nunca se bloquea
//!
//! Al terminar la fase, `drain` lee y descarta todo lo que siga llegando.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use common::WorkerAddr;
use tokio::sync::{
    mpsc::{
        self,
        error::{TryRecvError, TrySendError},
    },
    watch, Mutex,
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_POOL_CAPACITY: usize = 1 << 10;

#[derive(Clone)]
pub struct WorkerPool {
    idle_tx: mpsc::Sender<WorkerAddr>,
    // compartido entre todos los que esperan un worker; el primero en llegar gana
    idle_rx: Arc<Mutex<mpsc::Receiver<WorkerAddr>>>,
    registrations_closed: watch::Receiver<bool>,
    // workers entregados por `acquire` que todavía no volvieron ni se descartaron
    in_use: Arc<watch::Sender<usize>>,
    dropped: Arc<AtomicUsize>,
}

fn offer(tx: &mpsc::Sender<WorkerAddr>, dropped: &AtomicUsize, addr: WorkerAddr, origin: &str) {
    match tx.try_send(addr) {
        Ok(()) => {}
        Err(TrySendError::Full(addr)) => {
            dropped.fetch_add(1, Ordering::Relaxed);
            warn!("demasiados workers libres, se descarta {} ({})", addr, origin);
        }
        Err(TrySendError::Closed(addr)) => {
            debug!("pool cerrado, se ignora {} ({})", addr, origin);
        }
    }
}

async fn wait_closed(rx: &mut watch::Receiver<bool>) {
    loop {
        let closed = *rx.borrow_and_update();
        if closed || rx.changed().await.is_err() {
            return;
        }
    }
}

impl WorkerPool {
    /// Arranca el loop que pasa los registros a la cola de libres.
    /// Es el único lector de `registrations`.
    pub fn spawn(mut registrations: mpsc::UnboundedReceiver<WorkerAddr>, capacity: usize) -> Self {
        let (idle_tx, idle_rx) = mpsc::channel(capacity.max(1));
        let (closed_tx, closed_rx) = watch::channel(false);
        let (in_use, _) = watch::channel(0usize);
        let dropped = Arc::new(AtomicUsize::new(0));

        let tx = idle_tx.clone();
        let dropped_in_loop = Arc::clone(&dropped);
        tokio::spawn(async move {
            while let Some(addr) = registrations.recv().await {
                debug!("worker {} disponible", addr);
                offer(&tx, &dropped_in_loop, addr, "registro");
            }
            debug!("stream de registros cerrado");
            let _ = closed_tx.send(true);
        });

        Self {
            idle_tx,
            idle_rx: Arc::new(Mutex::new(idle_rx)),
            registrations_closed: closed_rx,
            in_use: Arc::new(in_use),
            dropped,
        }
    }

    fn lend(&self, addr: WorkerAddr) -> WorkerAddr {
        self.in_use.send_modify(|n| *n += 1);
        addr
    }

    fn give_back(&self) {
        self.in_use.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Espera un worker libre y lo consume.
    ///
    /// `None` cuando el pool ya no puede dar ninguno: el stream de registros
    /// se cerró, la cola está vacía y no queda ningún worker prestado que
    /// pueda volver con `release`.
    pub async fn acquire(&self) -> Option<WorkerAddr> {
        let mut rx = self.idle_rx.lock().await;
        let mut closed = self.registrations_closed.clone();
        let mut in_use = self.in_use.subscribe();

        loop {
            // leer el estado antes de mirar la cola: un cambio posterior despierta el select
            let is_closed = *closed.borrow_and_update();
            let lent = *in_use.borrow_and_update();

            match rx.try_recv() {
                Ok(addr) => return Some(self.lend(addr)),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => {}
            }
            if is_closed && lent == 0 {
                debug!("sin registros ni workers prestados: el pool no puede dar más workers");
                return None;
            }

            tokio::select! {
                addr = rx.recv() => return addr.map(|a| self.lend(a)),
                _ = closed.changed(), if !is_closed => {}
                _ = in_use.changed() => {}
            }
        }
    }

    /// Devuelve un worker a la cola. Nunca bloquea.
    pub fn release(&self, addr: WorkerAddr) {
        // primero a la cola y recién después deja de contar como prestado
        offer(&self.idle_tx, &self.dropped, addr, "release");
        self.give_back();
    }

    /// El worker no respondió: no vuelve a la cola. Si revive, se registra de nuevo.
    pub fn discard(&self, addr: WorkerAddr) {
        debug!("worker {} descartado", addr);
        self.give_back();
    }

    /// Registros o releases descartados por cola llena.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drenaje posterior a la fase: descarta todo lo que llegue a la cola
    /// hasta que se cierre el stream de registros. Devuelve cuántos descartó.
    pub fn drain(self) -> JoinHandle<usize> {
        let idle_rx = Arc::clone(&self.idle_rx);
        let mut closed = self.registrations_closed.clone();

        tokio::spawn(async move {
            let mut rx = idle_rx.lock_owned().await;
            let mut discarded = 0;
            loop {
                tokio::select! {
                    biased;
                    addr = rx.recv() => match addr {
                        Some(addr) => {
                            discarded += 1;
                            debug!("fase terminada, se descarta {}", addr);
                        }
                        None => break,
                    },
                    _ = wait_closed(&mut closed) => break,
                }
            }
            discarded
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn acquire_devuelve_workers_registrados_antes_y_durante() {
        let (reg_tx, reg_rx) = mpsc::unbounded_channel();
        reg_tx.send("w1:7070".to_string()).unwrap();

        let pool = WorkerPool::spawn(reg_rx, 8);
        assert_eq!(pool.acquire().await.as_deref(), Some("w1:7070"));

        // registro tardío, con alguien ya esperando
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await })
        };
        sleep(Duration::from_millis(20)).await;
        reg_tx.send("w2:7070".to_string()).unwrap();

        let got = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(got.as_deref(), Some("w2:7070"));
    }

    #[tokio::test]
    async fn release_deja_el_worker_disponible_otra_vez() {
        let (reg_tx, reg_rx) = mpsc::unbounded_channel();
        reg_tx.send("w1".to_string()).unwrap();
        let pool = WorkerPool::spawn(reg_rx, 8);

        let w = pool.acquire().await.unwrap();
        pool.release(w);

        let again = timeout(Duration::from_secs(1), pool.acquire()).await.unwrap();
        assert_eq!(again.as_deref(), Some("w1"));
    }

    #[tokio::test]
    async fn con_cola_llena_se_descarta_el_registro_mas_nuevo() {
        let (reg_tx, reg_rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::spawn(reg_rx, 2);

        for w in ["w1", "w2", "w3"] {
            reg_tx.send(w.to_string()).unwrap();
        }
        // el productor nunca se bloquea; damos tiempo al loop de registro
        sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.dropped(), 1);

        assert_eq!(pool.acquire().await.as_deref(), Some("w1"));
        assert_eq!(pool.acquire().await.as_deref(), Some("w2"));
        assert!(timeout(Duration::from_millis(50), pool.acquire())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn drain_descarta_lo_que_llega_despues_de_la_fase() {
        let (reg_tx, reg_rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::spawn(reg_rx, 4);

        let handle = pool.clone().drain();
        pool.release("rezagado".to_string());
        reg_tx.send("tardio".to_string()).unwrap();
        drop(reg_tx);

        let discarded = timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(discarded, 2);
    }

    #[tokio::test]
    async fn acquire_devuelve_none_si_ya_no_puede_llegar_ningun_worker() {
        let (reg_tx, reg_rx) = mpsc::unbounded_channel();
        reg_tx.send("w1".to_string()).unwrap();
        drop(reg_tx);
        let pool = WorkerPool::spawn(reg_rx, 8);

        // lo ya registrado se entrega aunque el stream esté cerrado
        let w = pool.acquire().await.unwrap();
        assert_eq!(w, "w1");

        // w1 sigue prestado: quien espera tiene que esperar su release
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await })
        };
        sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        pool.release(w);
        let got = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(got.as_deref(), Some("w1"));

        // descartado el único worker, no hay nada más que esperar
        pool.discard("w1".to_string());
        let none = timeout(Duration::from_secs(1), pool.acquire()).await.unwrap();
        assert_eq!(none, None);
    }

    #[tokio::test]
    async fn discard_despierta_a_quien_espera_con_el_stream_cerrado() {
        let (reg_tx, reg_rx) = mpsc::unbounded_channel();
        reg_tx.send("w1".to_string()).unwrap();
        drop(reg_tx);
        let pool = WorkerPool::spawn(reg_rx, 8);
        let w = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await })
        };
        sleep(Duration::from_millis(20)).await;
        pool.discard(w);

        let got = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(got, None);
    }
}
