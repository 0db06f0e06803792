//! Leituras escalares com faixa válida, valor padrão e controle de idade.
//!
//! Cada [`ValidatedValue`] é criado uma vez na inicialização e compartilhado
//! via `Arc` entre a thread MQTT (único escritor) e os leitores (logger de
//! temperatura, resumo de status, UI).

use crate::config::{SensorConfig, SensorsConfig};
use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Faixa aceita por um sensor. Um limite `None` deixa aquele lado aberto.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRange<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: PartialOrd> ValidRange<T> {
    pub fn unbounded() -> Self {
        Self { min: None, max: None }
    }

    pub fn between(min: T, max: T) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Limites inclusivos. Valores incomparáveis (NaN) ficam de fora.
    pub fn contains(&self, value: &T) -> bool {
        let above_min = self.min.as_ref().is_none_or(|min| {
            matches!(value.partial_cmp(min), Some(Ordering::Greater | Ordering::Equal))
        });
        let below_max = self.max.as_ref().is_none_or(|max| {
            matches!(value.partial_cmp(max), Some(Ordering::Less | Ordering::Equal))
        });
        // NaN não se compara nem consigo mesmo
        let comparable = value.partial_cmp(value).is_some();
        comparable && above_min && below_max
    }
}

/// Atualização recusada por estar fora da faixa. Não é fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("[{sensor}] valor inválido recebido: {value}")]
pub struct ValidationRejected {
    pub sensor: String,
    pub value: String,
}

#[derive(Debug)]
struct Reading<T> {
    value: T,
    /// `None` até a primeira atualização aceita.
    last_updated: Option<Instant>,
}

/// Valor de sensor validado e sincronizado.
#[derive(Debug)]
pub struct ValidatedValue<T> {
    name: String,
    default: T,
    range: ValidRange<T>,
    reading: Mutex<Reading<T>>,
}

impl<T: Clone + PartialOrd + Debug> ValidatedValue<T> {
    pub fn new(name: impl Into<String>, default: T, range: ValidRange<T>) -> Self {
        Self {
            name: name.into(),
            reading: Mutex::new(Reading {
                value: default.clone(),
                last_updated: None,
            }),
            default,
            range,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn is_valid(&self, value: &T) -> bool {
        self.range.contains(value)
    }

    /// Aceita `value` se estiver na faixa e marca o horário da atualização.
    /// Fora da faixa, o estado fica intacto e a recusa é logada aqui; o
    /// `Err` é só informativo e o chamador pode descartá-lo.
    pub fn update(&self, value: T) -> Result<(), ValidationRejected> {
        if !self.is_valid(&value) {
            let rejected = ValidationRejected {
                sensor: self.name.clone(),
                value: format!("{value:?}"),
            };
            warn!("{rejected}");
            return Err(rejected);
        }

        let mut reading = self.lock();
        reading.value = value;
        reading.last_updated = Some(Instant::now());
        Ok(())
    }

    /// Último valor aceito. Com `timeout` e `fallback_on_stale`, um valor
    /// velho é trocado pelo padrão.
    pub fn get(&self, timeout: Option<Duration>, fallback_on_stale: bool) -> T {
        self.get_at(timeout, fallback_on_stale, Instant::now())
    }

    /// Valor fresco, dentro da faixa e diferente do padrão; senão `None`.
    pub fn get_fresh(&self, timeout: Duration) -> Option<T> {
        let value = self.get(Some(timeout), true);
        (value != self.default && self.is_valid(&value)).then_some(value)
    }

    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.is_stale_at(timeout, Instant::now())
    }

    /// Volta ao padrão se estiver velho. O horário é renovado para não
    /// resetar de novo a cada checagem.
    pub fn reset_if_stale(&self, timeout: Duration) -> bool {
        self.reset_if_stale_at(timeout, Instant::now())
    }

    pub fn last_updated(&self) -> Option<Instant> {
        self.lock().last_updated
    }

    fn get_at(&self, timeout: Option<Duration>, fallback_on_stale: bool, now: Instant) -> T {
        let reading = self.lock();
        match timeout {
            Some(t) if fallback_on_stale && is_expired(reading.last_updated, t, now) => {
                self.default.clone()
            }
            _ => reading.value.clone(),
        }
    }

    fn is_stale_at(&self, timeout: Duration, now: Instant) -> bool {
        is_expired(self.lock().last_updated, timeout, now)
    }

    fn reset_if_stale_at(&self, timeout: Duration, now: Instant) -> bool {
        let mut reading = self.lock();
        if !is_expired(reading.last_updated, timeout, now) {
            return false;
        }
        info!("[{}] resetado por inatividade", self.name);
        reading.value = self.default.clone();
        reading.last_updated = Some(now);
        true
    }

    fn lock(&self) -> MutexGuard<'_, Reading<T>> {
        self.reading.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Nunca atualizado conta como velho para qualquer timeout.
fn is_expired(last_updated: Option<Instant>, timeout: Duration, now: Instant) -> bool {
    match last_updated {
        Some(t) => now.saturating_duration_since(t) > timeout,
        None => true,
    }
}

// ──────────────────────────────────────────────
// Sensores de temperatura do tanque
// ──────────────────────────────────────────────

/// Qual sensor de temperatura um canal alimenta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSlot {
    Basking,
    Water,
}

/// Par de sensores de temperatura (°F) compartilhado pelos componentes.
#[derive(Debug, Clone)]
pub struct Sensors {
    pub basking: Arc<ValidatedValue<f64>>,
    pub water: Arc<ValidatedValue<f64>>,
}

impl Sensors {
    pub fn from_config(config: &SensorsConfig) -> Self {
        Self {
            basking: Arc::new(build("Basking", &config.basking)),
            water: Arc::new(build("Water", &config.water)),
        }
    }

    pub fn slot(&self, slot: SensorSlot) -> &Arc<ValidatedValue<f64>> {
        match slot {
            SensorSlot::Basking => &self.basking,
            SensorSlot::Water => &self.water,
        }
    }
}

fn build(name: &str, cfg: &SensorConfig) -> ValidatedValue<f64> {
    ValidatedValue::new(name, cfg.default, ValidRange { min: cfg.min, max: cfg.max })
}
