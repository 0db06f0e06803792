//! Configuração unificada via TOML.
//!
//! Um único `tank_hub.toml` ao lado do executável. Seções ausentes usam os
//! valores padrão.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Nome do arquivo de config procurado ao lado do executável.
pub const CONFIG_FILE: &str = "tank_hub.toml";

/// Falha ao gravar a config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Falha ao serializar config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Falha ao gravar {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Teto do backoff de reconexão (segundos).
pub const RECONNECT_CEILING_SECS: u64 = 120;

/// Conexão com o broker MQTT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Keepalive MQTT (segundos)
    pub keepalive_secs: u64,
    /// Espera entre tentativas antes da primeira conexão (segundos)
    pub initial_retry_secs: u64,
    /// Backoff de reconexão: mínimo e máximo (segundos)
    pub reconnect_min_secs: u64,
    pub reconnect_max_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "172.22.80.5".into(),
            port: 1883,
            client_id: "turtle-hub".into(),
            keepalive_secs: 60,
            initial_retry_secs: 5,
            reconnect_min_secs: 1,
            reconnect_max_secs: 120,
        }
    }
}

/// Ping periódico no ESP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub interval_secs: f64,
    pub timeout_ms: u64,
    /// Chave do registro onde o ESP anuncia seu IP
    pub ip_key: String,
    /// Chave onde o resultado do ping é gravado
    pub status_key: String,
    /// IP usado enquanto o ESP não anunciou o seu
    pub default_ip: String,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5.0,
            timeout_ms: 1000,
            ip_key: "esp_ip".into(),
            status_key: "esp_online".into(),
            default_ip: "172.22.80.58".into(),
        }
    }
}

/// Logger de temperaturas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Arquivo SQLite
    pub db_path: String,
    /// Intervalo entre gravações (segundos)
    pub interval_secs: f64,
    /// Leituras mais velhas que isso contam como ausentes (segundos)
    pub stale_after_secs: f64,
    /// Intervalo de checagem enquanto espera leituras válidas (segundos)
    pub gate_poll_secs: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            db_path: "turtle.db".into(),
            interval_secs: 1800.0,
            stale_after_secs: 10.0,
            gate_poll_secs: 5.0,
        }
    }
}

/// Faixa e valor padrão de um sensor (°F).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            min: Some(40.0),
            max: Some(130.0),
            default: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    pub basking: SensorConfig,
    pub water: SensorConfig,
}

/// Processo principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Intervalo do resumo de status no log (segundos)
    pub summary_interval_secs: f64,
    /// Idade máxima dos status exibidos como atuais (segundos)
    pub status_timeout_secs: f64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            summary_interval_secs: 30.0,
            status_timeout_secs: 10.0,
        }
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub liveness: LivenessConfig,
    pub sampler: SamplerConfig,
    pub sensors: SensorsConfig,
    pub hub: HubConfig,
}

impl AppConfig {
    /// Lê `path`. Arquivo ausente ou inválido cai no padrão, com aviso.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("{} não encontrado, usando config padrão do hub", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Config do hub ilegível ({}): {e}. Usando padrão", path.display());
                return Self::default();
            }
        };

        toml::from_str(&content)
            .inspect(|_| info!("Config do hub carregada de {}", path.display()))
            .unwrap_or_else(|e| {
                warn!("Config do hub inválida ({}): {e}. Usando padrão", path.display());
                Self::default()
            })
    }

    /// Grava a config atual como TOML legível.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Config do hub salva em {}", path.display());
        Ok(())
    }

    /// `tank_hub.toml` no diretório do executável (ou no atual).
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_FILE)
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let b = &self.broker;

        if b.host.is_empty() {
            errors.push("Host do broker não pode ser vazio".into());
        }
        if b.port == 0 {
            errors.push("Porta do broker não pode ser 0".into());
        }
        if b.keepalive_secs < 5 {
            errors.push(format!("Keepalive inválido: {} (mínimo 5s)", b.keepalive_secs));
        }
        if b.reconnect_min_secs == 0 || b.reconnect_min_secs > b.reconnect_max_secs {
            errors.push(format!(
                "Backoff inválido: {}–{}s",
                b.reconnect_min_secs, b.reconnect_max_secs
            ));
        }
        if b.reconnect_max_secs > RECONNECT_CEILING_SECS {
            errors.push(format!(
                "Backoff máximo {}s acima do teto de {RECONNECT_CEILING_SECS}s",
                b.reconnect_max_secs
            ));
        }
        if self.liveness.interval_secs <= 0.0 {
            errors.push("Intervalo do ping deve ser positivo".into());
        }
        if self.liveness.timeout_ms == 0 {
            errors.push("Timeout do ping não pode ser 0".into());
        }
        if self.sampler.interval_secs <= 0.0 || self.sampler.gate_poll_secs <= 0.0 {
            errors.push("Intervalos do logger devem ser positivos".into());
        }
        for (name, s) in [("basking", &self.sensors.basking), ("water", &self.sensors.water)] {
            if let (Some(min), Some(max)) = (s.min, s.max) {
                if min > max {
                    errors.push(format!("Faixa do sensor {name} invertida: {min}–{max}"));
                }
            }
        }

        errors
    }
}

/// Converte segundos fracionários de config em [`Duration`].
/// Valores negativos ou não finitos viram zero.
pub fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
