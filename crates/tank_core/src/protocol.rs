//! Conversão de payloads MQTT.
//!
//! Todo payload é texto UTF-8. Entrada: cast para o tipo do canal ou JSON
//! do agendamento das luzes. Saída: [`Command`] vira `(canal, payload, retained)`.

use crate::topics;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Erros de decodificação de payload.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Inteiro inválido: {0:?}")]
    InvalidInt(String),

    #[error("Float inválido: {0:?}")]
    InvalidFloat(String),

    #[error("Agendamento inválido: {0}")]
    InvalidSchedule(String),
}

/// Tipo esperado de um canal de status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    Int,
    Float,
    Text,
}

impl Cast {
    /// Converte o payload. `Text` nunca falha.
    pub fn apply(self, payload: &str) -> Result<Value, DecodeError> {
        match self {
            Cast::Int => payload
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| DecodeError::InvalidInt(payload.to_owned())),
            Cast::Float => parse_float(payload).map(Value::Float),
            Cast::Text => Ok(Value::Text(payload.to_owned())),
        }
    }
}

/// Float finito; "nan"/"inf" são recusados.
pub fn parse_float(payload: &str) -> Result<f64, DecodeError> {
    match payload.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(DecodeError::InvalidFloat(payload.to_owned())),
    }
}

/// Payload como texto; bytes inválidos viram U+FFFD.
pub fn payload_text(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}

// ──────────────────────────────────────────────
// Agendamento das luzes
// ──────────────────────────────────────────────

/// Horários `HH:MM` (24h) de ligar e desligar as luzes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightSchedule {
    pub on: String,
    pub off: String,
}

impl LightSchedule {
    pub fn new(on: impl Into<String>, off: impl Into<String>) -> Result<Self, DecodeError> {
        let schedule = Self {
            on: on.into(),
            off: off.into(),
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Decodifica `{"on":"HH:MM","off":"HH:MM"}`.
    pub fn from_json(payload: &str) -> Result<Self, DecodeError> {
        let schedule: LightSchedule = serde_json::from_str(payload)
            .map_err(|e| DecodeError::InvalidSchedule(e.to_string()))?;
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn to_json(&self) -> String {
        // Struct de duas strings: serialização não falha
        serde_json::json!({ "on": self.on, "off": self.off }).to_string()
    }

    fn validate(&self) -> Result<(), DecodeError> {
        for t in [&self.on, &self.off] {
            if !is_hh_mm(t) {
                return Err(DecodeError::InvalidSchedule(format!("horário {t:?}")));
            }
        }
        Ok(())
    }
}

fn is_hh_mm(s: &str) -> bool {
    let Some((h, m)) = s.split_once(':') else {
        return false;
    };
    if h.len() != 2 || m.len() != 2 {
        return false;
    }
    matches!((h.parse::<u8>(), m.parse::<u8>()), (Ok(h), Ok(m)) if h < 24 && m < 60)
}

// ──────────────────────────────────────────────
// Comandos (UI → ESP)
// ──────────────────────────────────────────────

/// Comando publicado para o ESP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Feed,
    Lights(bool),
    HeatLamp(bool),
    UvLamp(bool),
    AutoMode(bool),
    Schedule(LightSchedule),
    Reboot,
}

/// Mensagem pronta para publicação.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub channel: String,
    pub payload: String,
    pub retained: bool,
}

impl Command {
    pub fn encode(&self) -> Outbound {
        let (suffix, payload, retained) = match self {
            Command::Feed => (topics::FEEDER_CMD, "1".to_owned(), false),
            Command::Lights(on) => (topics::LIGHTS_CMD, on_off_upper(*on), false),
            Command::HeatLamp(on) => (topics::HEAT_CMD, on_off_upper(*on), false),
            Command::UvLamp(on) => (topics::UV_CMD, on_off_upper(*on), false),
            Command::AutoMode(on) => (
                topics::AUTO_MODE_CMD,
                (if *on { "on" } else { "off" }).to_owned(),
                false,
            ),
            Command::Schedule(s) => (topics::LIGHTS_SCHEDULE_CMD, s.to_json(), true),
            Command::Reboot => (topics::REBOOT_CMD, "1".to_owned(), false),
        };
        Outbound {
            channel: topics::full(suffix),
            payload,
            retained,
        }
    }
}

fn on_off_upper(on: bool) -> String {
    (if on { "ON" } else { "OFF" }).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casts_numbers_with_whitespace() {
        assert_eq!(Cast::Int.apply(" 42\n").unwrap(), Value::Int(42));
        assert_eq!(Cast::Float.apply("1.25").unwrap(), Value::Float(1.25));
        assert_eq!(Cast::Text.apply(" OK ").unwrap(), Value::from(" OK "));
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(matches!(Cast::Int.apply("abc"), Err(DecodeError::InvalidInt(_))));
        assert!(matches!(Cast::Int.apply("1.5"), Err(DecodeError::InvalidInt(_))));
        assert!(matches!(Cast::Float.apply(""), Err(DecodeError::InvalidFloat(_))));
        assert!(matches!(Cast::Float.apply("NaN"), Err(DecodeError::InvalidFloat(_))));
    }

    #[test]
    fn lossy_text() {
        assert_eq!(payload_text(b"72.5"), "72.5");
        assert_eq!(payload_text(&[0x37, 0xFF]), "7\u{FFFD}");
    }

    #[test]
    fn schedule_json() {
        let s = LightSchedule::from_json(r#"{"on":"08:00","off":"18:30"}"#).unwrap();
        assert_eq!(s, LightSchedule::new("08:00", "18:30").unwrap());
        let back = LightSchedule::from_json(&s.to_json()).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn schedule_rejects_bad_times() {
        assert!(LightSchedule::from_json(r#"{"on":"24:00","off":"18:00"}"#).is_err());
        assert!(LightSchedule::from_json(r#"{"on":"8:00","off":"18:00"}"#).is_err());
        assert!(LightSchedule::from_json(r#"{"on":"08:00"}"#).is_err());
        assert!(LightSchedule::from_json("not json").is_err());
        assert!(LightSchedule::new("08:60", "09:00").is_err());
    }

    #[test]
    fn command_encoding() {
        let feed = Command::Feed.encode();
        assert_eq!(feed.channel, "turtle/feeder/cmd");
        assert_eq!(feed.payload, "1");
        assert!(!feed.retained);

        assert_eq!(Command::Lights(true).encode().payload, "ON");
        assert_eq!(Command::UvLamp(false).encode().channel, "turtle/lights/uv/cmd");
        assert_eq!(Command::AutoMode(false).encode().payload, "off");

        let sched = Command::Schedule(LightSchedule::new("07:00", "19:00").unwrap()).encode();
        assert_eq!(sched.channel, "turtle/lights/schedule/cmd");
        assert!(sched.retained);
        assert_eq!(LightSchedule::from_json(&sched.payload).unwrap().off, "19:00");
    }
}
