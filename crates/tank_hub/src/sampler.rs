//! Logger periódico de temperaturas.
//!
//! Antes do primeiro registro espera as duas leituras ficarem válidas, para
//! não gravar zeros de antes do ESP reportar. Depois grava a cada intervalo
//! apenas se basking e água estiverem frescas e fora do padrão.

use crate::store::{TIMESTAMP_FORMAT, TemperatureRecord, TemperatureStore};
use crate::worker::{StopSignal, WorkerHandle, spawn_worker};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tank_core::config::{self, SamplerConfig};
use tank_core::sensor::Sensors;
use tracing::{error, info, warn};

/// Resultado de um ciclo de amostragem.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Recorded(i64),
    /// Alguma leitura velha, ausente ou fora da faixa.
    Skipped { basking: f64, water: f64 },
    /// Erro do banco (já logado).
    Failed,
}

pub struct PersistenceSampler {
    sensors: Sensors,
    store: Arc<TemperatureStore>,
    config: SamplerConfig,
}

impl PersistenceSampler {
    pub fn new(sensors: Sensors, store: Arc<TemperatureStore>, config: SamplerConfig) -> Self {
        Self {
            sensors,
            store,
            config,
        }
    }

    /// Leituras atuais com fallback de idade (velha = padrão).
    fn current(&self) -> (f64, f64) {
        let timeout = Some(config::secs(self.config.stale_after_secs));
        (
            self.sensors.basking.get(timeout, true),
            self.sensors.water.get(timeout, true),
        )
    }

    /// As duas leituras, se ambas estiverem frescas e válidas.
    pub fn valid_readings(&self) -> Option<(f64, f64)> {
        let timeout = config::secs(self.config.stale_after_secs);
        let basking = self.sensors.basking.get_fresh(timeout)?;
        let water = self.sensors.water.get_fresh(timeout)?;
        Some((basking, water))
    }

    /// Um ciclo: grava um registro ou loga o motivo de pular.
    pub fn log_once(&self) -> SampleOutcome {
        self.log_once_at(Local::now())
    }

    fn log_once_at(&self, now: DateTime<Local>) -> SampleOutcome {
        let Some((basking, water)) = self.valid_readings() else {
            let (basking, water) = self.current();
            warn!("[TempLogger] Pulado: leitura velha ou ausente - Basking={basking}, Água={water}");
            return SampleOutcome::Skipped { basking, water };
        };

        let record = TemperatureRecord {
            timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
            basking_temp: basking,
            water_temp: water,
        };
        match self.store.append(&record) {
            Ok(id) => {
                info!(
                    "[TempLogger] Registro #{id} gravado - Basking={basking:.1}°F, Água={water:.1}°F"
                );
                SampleOutcome::Recorded(id)
            }
            Err(e) => {
                error!("[TempLogger] Erro ao gravar registro: {e}");
                SampleOutcome::Failed
            }
        }
    }

    /// Bloqueia (só esta thread) até as duas leituras serem válidas.
    /// Retorna `false` se foi parado antes.
    pub fn wait_for_valid_readings(&self, stop: &StopSignal) -> bool {
        let poll = config::secs(self.config.gate_poll_secs);
        info!("[TempLogger] Aguardando leituras válidas...");
        while stop.is_running() {
            if let Some((basking, water)) = self.valid_readings() {
                info!("[TempLogger] Leituras iniciais OK - Basking={basking}, Água={water}");
                return true;
            }
            let (basking, water) = self.current();
            info!("[TempLogger] Aguardando leituras válidas... Basking={basking}, Água={water}");
            stop.sleep(poll);
        }
        false
    }

    /// Roda o logger numa thread (`temp-logger`) até `stop()`.
    pub fn spawn(self) -> std::io::Result<WorkerHandle> {
        let interval = config::secs(self.config.interval_secs);
        spawn_worker("temp-logger", move |stop| {
            if !self.wait_for_valid_readings(&stop) {
                return;
            }
            while stop.is_running() {
                self.log_once();
                stop.sleep(interval);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tank_core::config::SensorsConfig;

    fn sampler(config: SamplerConfig) -> (Sensors, Arc<TemperatureStore>, PersistenceSampler) {
        let sensors = Sensors::from_config(&SensorsConfig::default());
        let store = Arc::new(TemperatureStore::open_in_memory().unwrap());
        let s = PersistenceSampler::new(sensors.clone(), Arc::clone(&store), config);
        (sensors, store, s)
    }

    #[test]
    fn skips_when_never_reported() {
        let (_, store, s) = sampler(SamplerConfig::default());
        assert_eq!(
            s.log_once(),
            SampleOutcome::Skipped {
                basking: 0.0,
                water: 0.0
            }
        );
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn skips_when_only_one_sensor_is_fresh() {
        let (sensors, store, s) = sampler(SamplerConfig::default());
        sensors.basking.update(88.0).unwrap();
        assert!(matches!(s.log_once(), SampleOutcome::Skipped { water, .. } if water == 0.0));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn records_once_per_tick_when_fresh() {
        let (sensors, store, s) = sampler(SamplerConfig::default());
        sensors.basking.update(88.0).unwrap();
        sensors.water.update(76.5).unwrap();

        let now = Local::now();
        assert!(matches!(s.log_once_at(now), SampleOutcome::Recorded(_)));
        assert_eq!(store.count().unwrap(), 1);

        let row = &store.latest(1).unwrap()[0];
        assert_eq!(row.basking_temp, 88.0);
        assert_eq!(row.water_temp, 76.5);
        assert_eq!(row.timestamp, now.format("%Y-%m-%d %H:%M:%S").to_string());
        assert_eq!(row.timestamp.len(), 19);

        assert!(matches!(s.log_once(), SampleOutcome::Recorded(_)));
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn stale_readings_count_as_default() {
        let (sensors, store, s) = sampler(SamplerConfig {
            stale_after_secs: 0.05,
            ..SamplerConfig::default()
        });
        sensors.basking.update(88.0).unwrap();
        sensors.water.update(76.0).unwrap();
        std::thread::sleep(Duration::from_millis(120));

        assert_eq!(
            s.log_once(),
            SampleOutcome::Skipped {
                basking: 0.0,
                water: 0.0
            }
        );
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn gate_returns_false_when_stopped() {
        let (_, _, s) = sampler(SamplerConfig::default());
        let stop = StopSignal::new();
        stop.stop();
        assert!(!s.wait_for_valid_readings(&stop));
    }

    #[test]
    fn gate_waits_then_loop_records() {
        let (sensors, store, s) = sampler(SamplerConfig {
            gate_poll_secs: 0.01,
            interval_secs: 3600.0,
            ..SamplerConfig::default()
        });
        let handle = s.spawn().unwrap();

        // Nada gravado enquanto não há leituras
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(store.count().unwrap(), 0);

        sensors.basking.update(90.0).unwrap();
        sensors.water.update(78.0).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while store.count().unwrap() == 0 && Instant::now() < deadline {
            sensors.basking.update(90.0).unwrap();
            sensors.water.update(78.0).unwrap();
            std::thread::sleep(Duration::from_millis(10));
        }
        handle.join();

        // Um registro: o próximo só viria depois do intervalo
        assert_eq!(store.count().unwrap(), 1);
    }
}
