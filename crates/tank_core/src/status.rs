//! Registro de status thread-safe com leitura sensível à idade.
//!
//! Um único `Mutex` protege o mapa inteiro. Entradas são criadas na primeira
//! escrita, sobrescritas no lugar e nunca removidas; a idade é calculada na
//! leitura, nada é apagado em segundo plano.

use crate::value::Value;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Chaves conhecidas do registro.
pub mod keys {
    /// Heartbeat da conexão MQTT ("connected"/"disconnected").
    pub const MQTT_STATUS: &str = "mqtt_status";
    /// Resultado do ping no ESP (bool).
    pub const ESP_ONLINE: &str = "esp_online";
    pub const ESP_IP: &str = "esp_ip";
    pub const ESP_MQTT: &str = "esp_mqtt";
    pub const HEAP: &str = "heap";
    pub const ESP_UPTIME_MS: &str = "esp_uptime_ms";
    pub const LIGHT_STATUS: &str = "light_status";
    pub const HEAT_STATUS: &str = "heat_status";
    pub const UV_STATUS: &str = "uv_status";
    pub const FEEDER_STATE: &str = "feeder_state";
    pub const FEED_COUNT: &str = "feed_count";
    pub const AUTO_MODE: &str = "auto_mode";
    pub const HEAT_BULB_CURRENT: &str = "heat_bulb_current";
    pub const UV_BULB_CURRENT: &str = "uv_bulb_current";
    pub const HEAT_BULB_STATUS: &str = "heat_bulb_status";
    pub const UV_BULB_STATUS: &str = "uv_bulb_status";
    pub const LIGHT_SCHEDULE_ON: &str = "light_schedule_on";
    pub const LIGHT_SCHEDULE_OFF: &str = "light_schedule_off";

    pub const CONNECTED: &str = "connected";
    pub const DISCONNECTED: &str = "disconnected";
}

#[derive(Debug, Clone)]
struct StatusEntry {
    value: Value,
    updated_at: Instant,
    updated_wall: DateTime<Local>,
}

/// Entrada do [`StatusRegistry::snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub key: String,
    pub value: Value,
    pub age: Duration,
}

/// Mapa chave → (valor, timestamp) compartilhado entre threads.
#[derive(Debug, Default)]
pub struct StatusRegistry {
    entries: Mutex<HashMap<String, StatusEntry>>,
    /// Usado em leituras com fallback que não passam timeout explícito.
    default_timeout: Option<Duration>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_timeout(timeout: Duration) -> Self {
        Self {
            entries: Mutex::default(),
            default_timeout: Some(timeout),
        }
    }

    /// Grava `(value, agora)` sob `key`, substituindo o par inteiro.
    pub fn update_status(&self, key: &str, value: impl Into<Value>) {
        let entry = StatusEntry {
            value: value.into(),
            updated_at: Instant::now(),
            updated_wall: Local::now(),
        };
        self.lock().insert(key.to_owned(), entry);
    }

    /// Leitura completa:
    /// - chave desconhecida → `default`
    /// - `fallback_on_stale` e idade > timeout → `default`
    /// - caso contrário → último valor, por mais velho que seja
    pub fn get_status(
        &self,
        key: &str,
        default: Option<Value>,
        timeout: Option<Duration>,
        fallback_on_stale: bool,
    ) -> Option<Value> {
        self.get_status_at(key, default, timeout, fallback_on_stale, Instant::now())
    }

    /// Último valor, sem checar idade.
    pub fn get_status_or(&self, key: &str, default: impl Into<Value>) -> Value {
        let default = default.into();
        self.get_status(key, Some(default.clone()), None, false)
            .unwrap_or(default)
    }

    /// Valor somente se atualizado dentro de `timeout`.
    pub fn get_fresh_or(&self, key: &str, default: impl Into<Value>, timeout: Duration) -> Value {
        let default = default.into();
        self.get_status(key, Some(default.clone()), Some(timeout), true)
            .unwrap_or(default)
    }

    pub fn get_last_update(&self, key: &str) -> Option<DateTime<Local>> {
        self.lock().get(key).map(|e| e.updated_wall)
    }

    /// Cópia de todas as entradas, ordenadas por chave.
    pub fn snapshot(&self) -> Vec<StatusSnapshot> {
        let now = Instant::now();
        let mut out: Vec<StatusSnapshot> = self
            .lock()
            .iter()
            .map(|(key, e)| StatusSnapshot {
                key: key.clone(),
                value: e.value.clone(),
                age: now.saturating_duration_since(e.updated_at),
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn get_status_at(
        &self,
        key: &str,
        default: Option<Value>,
        timeout: Option<Duration>,
        fallback_on_stale: bool,
        now: Instant,
    ) -> Option<Value> {
        // Clona sob lock e decide fora dele
        let Some(entry) = self.lock().get(key).cloned() else {
            return default;
        };

        if fallback_on_stale {
            if let Some(t) = timeout.or(self.default_timeout) {
                if now.saturating_duration_since(entry.updated_at) > t {
                    return default;
                }
            }
        }
        Some(entry.value)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StatusEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
