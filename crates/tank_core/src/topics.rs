//! Mapa de tópicos MQTT (esquema hierárquico do firmware do ESP).
//!
//! Todos os tópicos ficam sob [`TOPIC_ROOT`]. A tabela [`ROUTES`] define,
//! uma única vez, para onde vai cada canal de entrada e como o payload é
//! convertido.

use crate::protocol::Cast;
use crate::sensor::SensorSlot;
use crate::status::keys;

/// Namespace raiz. Termina com barra.
pub const TOPIC_ROOT: &str = "turtle/";

// ── Sensores ──
pub const TEMP_BASKING: &str = "sensors/temp/basking";
pub const TEMP_WATER: &str = "sensors/temp/water";
pub const CURRENT_HEAT: &str = "sensors/current/heat";
pub const CURRENT_UV: &str = "sensors/current/uv";
pub const CURRENT_HEAT_STATUS: &str = "sensors/current/heat/status";
pub const CURRENT_UV_STATUS: &str = "sensors/current/uv/status";

// ── Luzes ──
pub const LIGHTS_STATUS: &str = "lights/status";
pub const LIGHTS_CMD: &str = "lights/cmd";
pub const LIGHTS_SCHEDULE: &str = "lights/schedule";
pub const LIGHTS_SCHEDULE_CMD: &str = "lights/schedule/cmd";
pub const HEAT_STATUS: &str = "lights/heat/status";
pub const HEAT_CMD: &str = "lights/heat/cmd";
pub const UV_STATUS: &str = "lights/uv/status";
pub const UV_CMD: &str = "lights/uv/cmd";

// ── Alimentador ──
pub const FEEDER_STATE: &str = "feeder/state";
pub const FEEDER_COUNT: &str = "feeder/count";
pub const FEEDER_CMD: &str = "feeder/cmd";

// ── Modo automático ──
pub const AUTO_MODE_STATUS: &str = "auto_mode/status";
pub const AUTO_MODE_CMD: &str = "auto_mode/cmd";

// ── ESP ──
pub const ESP_IP: &str = "esp/ip";
pub const ESP_HEAP: &str = "esp/heap";
pub const ESP_UPTIME: &str = "esp/uptime_ms";
pub const ESP_MQTT: &str = "esp/mqtt";
pub const REBOOT_CMD: &str = "reboot/cmd";

/// Destino de um canal de entrada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Temperatura validada por faixa.
    Sensor(SensorSlot),
    /// Entrada do registro, convertida por `cast`.
    Status { key: &'static str, cast: Cast },
    /// JSON `{"on","off"}` dividido em duas chaves de texto.
    Schedule,
}

/// Sufixo do canal (sem a raiz) → destino.
pub const ROUTES: &[(&str, Route)] = &[
    (TEMP_BASKING, Route::Sensor(SensorSlot::Basking)),
    (TEMP_WATER, Route::Sensor(SensorSlot::Water)),
    (LIGHTS_STATUS, status(keys::LIGHT_STATUS, Cast::Text)),
    (HEAT_STATUS, status(keys::HEAT_STATUS, Cast::Text)),
    (UV_STATUS, status(keys::UV_STATUS, Cast::Text)),
    (FEEDER_STATE, status(keys::FEEDER_STATE, Cast::Text)),
    (FEEDER_COUNT, status(keys::FEED_COUNT, Cast::Int)),
    (AUTO_MODE_STATUS, status(keys::AUTO_MODE, Cast::Text)),
    (ESP_IP, status(keys::ESP_IP, Cast::Text)),
    (ESP_MQTT, status(keys::ESP_MQTT, Cast::Text)),
    (ESP_HEAP, status(keys::HEAP, Cast::Int)),
    (ESP_UPTIME, status(keys::ESP_UPTIME_MS, Cast::Int)),
    (CURRENT_HEAT, status(keys::HEAT_BULB_CURRENT, Cast::Float)),
    (CURRENT_UV, status(keys::UV_BULB_CURRENT, Cast::Float)),
    (CURRENT_HEAT_STATUS, status(keys::HEAT_BULB_STATUS, Cast::Text)),
    (CURRENT_UV_STATUS, status(keys::UV_BULB_STATUS, Cast::Text)),
    (LIGHTS_SCHEDULE, Route::Schedule),
];

const fn status(key: &'static str, cast: Cast) -> Route {
    Route::Status { key, cast }
}

/// Tópico completo a partir do sufixo.
pub fn full(suffix: &str) -> String {
    format!("{TOPIC_ROOT}{suffix}")
}

/// Destino de um tópico completo. Tópicos desconhecidos → `None`.
pub fn route_for(topic: &str) -> Option<Route> {
    let suffix = topic.strip_prefix(TOPIC_ROOT)?;
    ROUTES
        .iter()
        .find(|(s, _)| *s == suffix)
        .map(|(_, route)| *route)
}

/// Todos os tópicos de entrada, para assinar no CONNACK.
pub fn subscriptions() -> Vec<String> {
    ROUTES.iter().map(|(suffix, _)| full(suffix)).collect()
}
