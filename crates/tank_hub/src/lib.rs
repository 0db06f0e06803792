//! # Tank Hub
//!
//! Processo que mantém o estado atual do tanque a partir da telemetria do
//! ESP32 via MQTT.
//!
//! ## Componentes
//! - [`bridge`] – Conexão MQTT, decodificação de mensagens e comandos
//! - [`liveness`] – Ping periódico no ESP
//! - [`sampler`] – Log de temperaturas a cada intervalo
//! - [`store`] – Tabela SQLite somente inserção
//! - [`backoff`] – Espera exponencial de reconexão
//! - [`worker`] – Threads de fundo com parada cooperativa

pub mod backoff;
pub mod bridge;
pub mod liveness;
pub mod sampler;
pub mod store;
pub mod worker;

pub use bridge::{ConnectionState, Dispatcher, TransportBridge};
pub use liveness::{LivenessMonitor, PingProber, Prober};
pub use sampler::{PersistenceSampler, SampleOutcome};
pub use store::{StoreError, TemperatureStore};
