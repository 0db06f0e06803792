//! # Tank Hub
//!
//! Conecta ao broker MQTT, mantém o registro de status do tanque, pinga o
//! ESP e grava as temperaturas periodicamente em SQLite.
//!
//! ## Uso
//! ```bash
//! RUST_LOG=debug tank_hub   # tank_hub.toml ao lado do executável
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tank_core::config::{self, AppConfig};
use tank_core::sensor::Sensors;
use tank_core::status::{StatusRegistry, keys};
use tank_hub::{
    Dispatcher, LivenessMonitor, PersistenceSampler, PingProber, StoreError, TemperatureStore,
    TransportBridge,
};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
enum HubError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Falha ao criar thread: {0}")]
    Spawn(#[from] std::io::Error),
}

fn main() -> Result<(), HubError> {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }
    for e in config.validate() {
        warn!("Config: {e}");
    }

    // ── Estado compartilhado ──
    let registry = Arc::new(StatusRegistry::new());
    let sensors = Sensors::from_config(&config.sensors);

    // Banco é o único erro fatal
    let store = Arc::new(TemperatureStore::open(Path::new(&config.sampler.db_path))?);

    // ── Componentes ──
    let bridge = TransportBridge::start(
        &config.broker,
        Dispatcher::new(Arc::clone(&registry), sensors.clone()),
    )?;
    let liveness = LivenessMonitor::new(
        Arc::clone(&registry),
        config.liveness.clone(),
        PingProber::default(),
    )
    .spawn()?;
    let sampler =
        PersistenceSampler::new(sensors.clone(), Arc::clone(&store), config.sampler.clone())
            .spawn()?;

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   🐢 TANK HUB – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Broker:    {}:{}", config.broker.host, config.broker.port);
    println!("  Banco:     {}", config.sampler.db_path);
    println!("  Log temp:  a cada {:.0}s", config.sampler.interval_secs);
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal: resumo periódico do estado ──
    let summary_interval = config::secs(config.hub.summary_interval_secs).max(Duration::from_secs(1));
    let status_timeout = config::secs(config.hub.status_timeout_secs);
    loop {
        std::thread::sleep(summary_interval);
        log_summary(&registry, &sensors, &bridge, status_timeout);
        for worker in [&liveness, &sampler] {
            if worker.is_finished() {
                warn!("Thread {} parou inesperadamente", worker.name());
            }
        }
    }
}

/// Lê o estado como a UI leria: valores velhos viram padrão.
fn log_summary(
    registry: &StatusRegistry,
    sensors: &Sensors,
    bridge: &TransportBridge,
    timeout: Duration,
) {
    let basking = sensors.basking.get(Some(timeout), true);
    let water = sensors.water.get(Some(timeout), true);
    let online = registry.get_status_or(keys::ESP_ONLINE, false);
    let lights = registry.get_fresh_or(keys::LIGHT_STATUS, "N/A", timeout);
    let feeder = registry.get_fresh_or(keys::FEEDER_STATE, "N/A", timeout);
    let ip = registry.get_fresh_or(keys::ESP_IP, "N/A", timeout);

    info!(
        "MQTT {:?} | ESP {} online={} | Basking {:.1}°F | Água {:.1}°F | Luzes {} | Alimentador {}",
        bridge.state(),
        ip,
        online,
        basking,
        water,
        lights,
        feeder
    );
    for entry in registry.snapshot() {
        debug!("  {} = {} ({}s)", entry.key, entry.value, entry.age.as_secs());
    }
}
