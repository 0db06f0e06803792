//! Threads de fundo com parada cooperativa.
//!
//! `stop()` apenas baixa uma flag e acorda o `sleep` em andamento; o laço
//! confere a flag no início da próxima iteração.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

/// Flag de execução + canal para interromper esperas.
#[derive(Debug)]
pub struct StopSignal {
    running: AtomicBool,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl StopSignal {
    pub fn new() -> Arc<Self> {
        let (wake_tx, wake_rx) = bounded(1);
        Arc::new(Self {
            running: AtomicBool::new(true),
            wake_tx,
            wake_rx,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        // Canal cheio = já tem um aviso pendente
        let _ = self.wake_tx.try_send(());
    }

    /// Espera `duration` ou até `stop()`. Retorna se ainda está rodando.
    pub fn sleep(&self, duration: Duration) -> bool {
        // Timeout e aviso de parada terminam a espera do mesmo jeito
        let _ = self.wake_rx.recv_timeout(duration);
        self.is_running()
    }
}

/// Handle de uma thread de fundo.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    stop: Arc<StopSignal>,
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pede parada sem esperar.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Pede parada e espera a thread terminar.
    pub fn join(self) {
        self.stop.stop();
        if self.thread.join().is_err() {
            tracing::error!("Thread {} terminou com panic", self.name);
        }
    }
}

/// Cria uma thread nomeada que recebe o próprio [`StopSignal`].
pub fn spawn_worker<F>(name: &str, body: F) -> std::io::Result<WorkerHandle>
where
    F: FnOnce(Arc<StopSignal>) + Send + 'static,
{
    let stop = StopSignal::new();
    let thread_stop = Arc::clone(&stop);
    let thread = std::thread::Builder::new()
        .name(name.into())
        .spawn(move || body(thread_stop))?;

    Ok(WorkerHandle {
        name: name.into(),
        stop,
        thread,
    })
}
