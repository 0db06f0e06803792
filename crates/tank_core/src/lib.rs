//! # Tank Core
//!
//! Crate compartilhada com o modelo de estado do tanque da tartaruga:
//! sensores validados, registro de status com controle de idade, mapa de
//! tópicos MQTT, conversão de payloads e configuração TOML.
//!
//! ## Módulos
//! - [`value`] – Valor dinâmico dos canais de status
//! - [`sensor`] – Leituras com faixa válida e padrão ([`ValidatedValue`])
//! - [`status`] – Registro chave → (valor, timestamp) ([`StatusRegistry`])
//! - [`topics`] – Tópicos MQTT e tabela de rotas de entrada
//! - [`protocol`] – Cast de payloads, agendamento das luzes e comandos
//! - [`config`] – Configuração unificada via TOML

pub mod value;
pub mod sensor;
pub mod status;
pub mod topics;
pub mod protocol;
pub mod config;

// Re-exports convenientes
pub use value::Value;
pub use sensor::{Sensors, ValidRange, ValidatedValue, ValidationRejected};
pub use status::StatusRegistry;
pub use protocol::{Command, DecodeError, LightSchedule};
pub use config::AppConfig;
