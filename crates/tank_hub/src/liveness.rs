//! Monitor de alcançabilidade do ESP via ping.
//!
//! Independe do MQTT: distingue "ESP fora da rede" de "ESP conectado mas
//! quieto no broker". O resultado vai para o registro como bool.

use crate::worker::{WorkerHandle, spawn_worker};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tank_core::config::{self, LivenessConfig};
use tank_core::status::StatusRegistry;
use tracing::{debug, info, warn};

/// Folga além do timeout para o processo `ping` subir e encerrar.
const PROCESS_SLACK: Duration = Duration::from_millis(250);
const POLL_STEP: Duration = Duration::from_millis(20);

/// Teste de alcançabilidade de um host.
pub trait Prober: Send + Sync + 'static {
    /// `true` se o host respondeu dentro de `timeout`. Nunca falha.
    fn probe(&self, host: &str, timeout: Duration) -> bool;
}

/// Usa o `ping` do sistema com a sintaxe da plataforma. A sintaxe
/// alternativa só é tentada se o processo nem chegou a subir, e as duas
/// tentativas dividem o mesmo prazo.
#[derive(Debug, Clone)]
pub struct PingProber {
    program: PathBuf,
}

impl Default for PingProber {
    fn default() -> Self {
        Self::new("ping")
    }
}

impl PingProber {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Prober for PingProber {
    fn probe(&self, host: &str, timeout: Duration) -> bool {
        // Host vem do próprio ESP; nunca deixar virar opção do ping
        if host.is_empty() || host.starts_with('-') {
            return false;
        }

        let deadline = Instant::now() + timeout + PROCESS_SLACK;
        let unix_secs = (timeout.as_millis() / 1000).max(1).to_string();
        let windows_ms = timeout.as_millis().max(1).to_string();
        let unix = ["-c", "1", "-W", unix_secs.as_str()];
        let windows = ["-n", "1", "-w", windows_ms.as_str()];
        let (first, second) = if cfg!(windows) {
            (windows, unix)
        } else {
            (unix, windows)
        };

        match run_ping(&self.program, &first, host) {
            Some(child) => wait_bounded(child, deadline),
            None => run_ping(&self.program, &second, host)
                .is_some_and(|child| wait_bounded(child, deadline)),
        }
    }
}

/// `None` se o `ping` não pôde ser executado.
fn run_ping(program: &Path, args: &[&str], host: &str) -> Option<Child> {
    let child = Command::new(program)
        .args(args)
        .arg(host)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    match child {
        Ok(child) => Some(child),
        Err(e) => {
            debug!("{} {args:?} indisponível: {e}", program.display());
            None
        }
    }
}

/// Espera o processo até `deadline`; depois disso mata e conta como falha.
fn wait_bounded(mut child: Child, deadline: Instant) -> bool {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.success(),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                debug!("ping excedeu o prazo");
                return false;
            }
            Ok(None) => std::thread::sleep(POLL_STEP),
            Err(e) => {
                warn!("Erro aguardando ping: {e}");
                let _ = child.kill();
                let _ = child.wait();
                return false;
            }
        }
    }
}

/// Pinga o ESP periodicamente e grava o resultado.
pub struct LivenessMonitor<P: Prober> {
    registry: Arc<StatusRegistry>,
    config: LivenessConfig,
    prober: P,
}

impl<P: Prober> LivenessMonitor<P> {
    pub fn new(registry: Arc<StatusRegistry>, config: LivenessConfig, prober: P) -> Self {
        Self {
            registry,
            config,
            prober,
        }
    }

    /// Um ciclo: lê o IP anunciado (ou o padrão), pinga e grava.
    pub fn run_once(&self) -> bool {
        let host = self
            .registry
            .get_status_or(&self.config.ip_key, self.config.default_ip.as_str())
            .to_string();
        let timeout = Duration::from_millis(self.config.timeout_ms);

        let alive = !host.is_empty() && self.prober.probe(&host, timeout);
        self.registry.update_status(&self.config.status_key, alive);
        debug!("Ping {host}: {}", if alive { "online" } else { "offline" });
        alive
    }

    /// Roda o laço numa thread (`esp-liveness`) até `stop()`.
    pub fn spawn(self) -> std::io::Result<WorkerHandle> {
        let interval = config::secs(self.config.interval_secs);
        info!(
            "Monitor do ESP iniciado (intervalo {:.1}s, timeout {}ms)",
            self.config.interval_secs, self.config.timeout_ms
        );
        spawn_worker("esp-liveness", move |stop| {
            while stop.is_running() {
                self.run_once();
                stop.sleep(interval);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tank_core::Value;
    use tank_core::status::keys;

    /// Responde `true` só para os hosts listados e guarda as chamadas.
    #[derive(Default)]
    struct FakeProber {
        reachable: Vec<String>,
        calls: Mutex<Vec<(String, Duration)>>,
    }

    impl Prober for Arc<FakeProber> {
        fn probe(&self, host: &str, timeout: Duration) -> bool {
            self.calls.lock().unwrap().push((host.to_owned(), timeout));
            self.reachable.iter().any(|h| h == host)
        }
    }

    fn monitor(prober: Arc<FakeProber>) -> (Arc<StatusRegistry>, LivenessMonitor<Arc<FakeProber>>) {
        let registry = Arc::new(StatusRegistry::new());
        let m = LivenessMonitor::new(Arc::clone(&registry), LivenessConfig::default(), prober);
        (registry, m)
    }

    #[test]
    fn uses_default_ip_until_announced() {
        let prober = Arc::new(FakeProber {
            reachable: vec!["10.0.0.5".into()],
            ..Default::default()
        });
        let (registry, m) = monitor(Arc::clone(&prober));

        assert!(!m.run_once());
        assert_eq!(registry.get_status_or(keys::ESP_ONLINE, true), Value::Bool(false));

        registry.update_status(keys::ESP_IP, "10.0.0.5");
        assert!(m.run_once());
        assert_eq!(registry.get_status_or(keys::ESP_ONLINE, false), Value::Bool(true));

        let calls = prober.calls.lock().unwrap();
        assert_eq!(calls[0].0, "172.22.80.58");
        assert_eq!(calls[1].0, "10.0.0.5");
        assert_eq!(calls[1].1, Duration::from_millis(1000));
    }

    #[test]
    fn empty_ip_is_offline_without_probing() {
        let prober = Arc::new(FakeProber::default());
        let (registry, m) = monitor(Arc::clone(&prober));
        registry.update_status(keys::ESP_IP, "");

        assert!(!m.run_once());
        assert!(prober.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn loop_writes_status_and_stops() {
        let prober = Arc::new(FakeProber {
            reachable: vec!["172.22.80.58".into()],
            ..Default::default()
        });
        let registry = Arc::new(StatusRegistry::new());
        let config = LivenessConfig {
            interval_secs: 0.01,
            ..LivenessConfig::default()
        };
        let handle = LivenessMonitor::new(Arc::clone(&registry), config, Arc::clone(&prober))
            .spawn()
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while prober.calls.lock().unwrap().len() < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        handle.join();

        assert!(prober.calls.lock().unwrap().len() >= 3);
        assert_eq!(registry.get_status_or(keys::ESP_ONLINE, false), Value::Bool(true));
    }

    #[test]
    fn ping_rejects_option_like_hosts() {
        let ping = PingProber::default();
        assert!(!ping.probe("-f", Duration::from_millis(10)));
        assert!(!ping.probe("", Duration::from_millis(10)));
    }

    #[test]
    fn missing_ping_binary_is_offline() {
        let ping = PingProber::new("/nao/existe/ping");
        let start = Instant::now();
        assert!(!ping.probe("10.0.0.5", Duration::from_millis(200)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    /// `ping` falso que nunca responde.
    #[cfg(unix)]
    fn hanging_ping(tag: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("tank-hub-{}-{tag}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ping");
        std::fs::write(&path, "#!/bin/sh\nexec sleep 10\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn hanging_ping_is_killed_at_timeout() {
        let ping = PingProber::new(hanging_ping("hang"));
        let timeout = Duration::from_millis(500);

        let start = Instant::now();
        assert!(!ping.probe("10.0.0.5", timeout));
        let elapsed = start.elapsed();

        // Uma única tentativa: timeout + folga do processo, nunca o dobro
        assert!(elapsed >= timeout, "{elapsed:?}");
        assert!(elapsed < timeout + PROCESS_SLACK + Duration::from_millis(400), "{elapsed:?}");
    }

    #[test]
    fn unreachable_host_is_bounded_by_timeout() {
        // TEST-NET-1 não roteável
        let start = Instant::now();
        let alive = PingProber::default().probe("192.0.2.1", Duration::from_millis(200));
        assert!(!alive);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
