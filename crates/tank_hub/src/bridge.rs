//! Ponte MQTT: conexão com o broker, decodificação e publicação de comandos.
//!
//! O event loop do `rumqttc` roda numa thread dedicada (`mqtt-bridge`).
//! Cada mensagem recebida vira um par `(tópico, payload)` entregue de forma
//! síncrona ao [`Dispatcher`], que só faz atualizações em memória.
//!
//! ```text
//! DISCONNECTED ──► CONNECTING ──► CONNECTED
//!       ▲                             │
//!       └──────────── falha ──────────┘
//! ```

use crate::backoff::Backoff;
use crate::worker::{StopSignal, WorkerHandle, spawn_worker};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS, SubscribeFilter};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tank_core::config::BrokerConfig;
use tank_core::protocol::{self, Command, LightSchedule};
use tank_core::sensor::Sensors;
use tank_core::status::{StatusRegistry, keys};
use tank_core::topics::{self, Route};
use tank_core::Value;
use tracing::{debug, error, info, warn};

/// Capacidade da fila de requisições do cliente MQTT.
const REQUEST_CAPACITY: usize = 32;

/// Chave que recebe o payload cru de um agendamento inválido.
pub const LIGHT_SCHEDULE_RAW: &str = "light_schedule";

// ──────────────────────────────────────────────
// Estado da conexão
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Disconnected as u8))
    }

    fn get(&self) -> ConnectionState {
        match self.0.load(Ordering::Acquire) {
            x if x == ConnectionState::Connected as u8 => ConnectionState::Connected,
            x if x == ConnectionState::Connecting as u8 => ConnectionState::Connecting,
            _ => ConnectionState::Disconnected,
        }
    }

    fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

// ──────────────────────────────────────────────
// Decodificação
// ──────────────────────────────────────────────

/// Resultado do despacho de uma mensagem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Temperatura aceita.
    Sensor,
    /// Temperatura fora da faixa, descartada.
    Rejected,
    /// Temperatura ilegível, descartada.
    Invalid,
    /// Status gravado com o tipo do canal.
    Status,
    /// Cast falhou; payload cru gravado.
    Raw,
    /// Agendamento das luzes gravado.
    Schedule,
    /// Tópico sem rota.
    Ignored,
}

/// Aplica mensagens recebidas no registro e nos sensores.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<StatusRegistry>,
    sensors: Sensors,
}

impl Dispatcher {
    pub fn new(registry: Arc<StatusRegistry>, sensors: Sensors) -> Self {
        Self { registry, sensors }
    }

    pub fn registry(&self) -> &Arc<StatusRegistry> {
        &self.registry
    }

    pub fn on_connected(&self) {
        self.registry.update_status(keys::MQTT_STATUS, keys::CONNECTED);
    }

    pub fn on_disconnected(&self) {
        self.registry.update_status(keys::MQTT_STATUS, keys::DISCONNECTED);
    }

    /// Decodifica e aplica uma mensagem. Nunca falha: erros são logados.
    pub fn handle(&self, topic: &str, payload: &[u8]) -> Dispatch {
        // Toda mensagem é heartbeat, mesmo com payload inválido
        self.on_connected();

        let Some(route) = topics::route_for(topic) else {
            debug!("Ignorando tópico {topic}");
            return Dispatch::Ignored;
        };
        let text = protocol::payload_text(payload);

        match route {
            Route::Sensor(slot) => match protocol::parse_float(&text) {
                Ok(v) => match self.sensors.slot(slot).update(v) {
                    Ok(()) => Dispatch::Sensor,
                    Err(_) => Dispatch::Rejected,
                },
                Err(e) => {
                    warn!("Erro ao decodificar {topic}: {e}");
                    Dispatch::Invalid
                }
            },
            Route::Status { key, cast } => match cast.apply(&text) {
                Ok(value) => {
                    self.registry.update_status(key, value);
                    Dispatch::Status
                }
                Err(e) => {
                    warn!("Erro ao decodificar {topic}: {e}. Gravando payload cru");
                    self.registry.update_status(key, Value::Text(text));
                    Dispatch::Raw
                }
            },
            Route::Schedule => match LightSchedule::from_json(&text) {
                Ok(schedule) => {
                    self.registry.update_status(keys::LIGHT_SCHEDULE_ON, schedule.on);
                    self.registry.update_status(keys::LIGHT_SCHEDULE_OFF, schedule.off);
                    Dispatch::Schedule
                }
                Err(e) => {
                    warn!("Erro ao decodificar {topic}: {e}. Gravando payload cru");
                    self.registry.update_status(LIGHT_SCHEDULE_RAW, Value::Text(text));
                    Dispatch::Raw
                }
            },
        }
    }
}

// ──────────────────────────────────────────────
// Ponte
// ──────────────────────────────────────────────

/// Política de espera entre tentativas de conexão.
#[derive(Debug, Clone)]
struct RetryPolicy {
    /// Espera fixa enquanto nunca conectou.
    initial: Duration,
    /// Backoff depois da primeira conexão bem-sucedida.
    backoff: Backoff,
}

/// Dona da conexão MQTT.
pub struct TransportBridge {
    client: Client,
    state: Arc<StateCell>,
    worker: WorkerHandle,
}

impl TransportBridge {
    /// Cria o cliente e inicia o event loop em background. Não bloqueia:
    /// a conexão (e as novas tentativas) acontecem na thread da ponte.
    pub fn start(config: &BrokerConfig, dispatcher: Dispatcher) -> std::io::Result<Self> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keepalive_secs.max(5)));

        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        let state = Arc::new(StateCell::new());
        dispatcher.on_disconnected();

        let retry = RetryPolicy {
            initial: Duration::from_secs(config.initial_retry_secs),
            backoff: Backoff::from_secs(config.reconnect_min_secs, config.reconnect_max_secs),
        };

        info!(
            "Conectando ao broker {}:{} (keepalive {}s)",
            config.host, config.port, config.keepalive_secs
        );

        let loop_client = client.clone();
        let loop_state = Arc::clone(&state);
        let worker = spawn_worker("mqtt-bridge", move |stop| {
            event_loop(connection, &loop_client, &dispatcher, &loop_state, &stop, retry);
        })?;

        Ok(Self {
            client,
            state,
            worker,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Publica sem bloquear. Falhas são logadas, nunca propagadas.
    pub fn publish(&self, channel: &str, payload: &str, retained: bool) {
        match self
            .client
            .try_publish(channel, QoS::AtLeastOnce, retained, payload.as_bytes().to_vec())
        {
            Ok(()) => debug!("→ {channel} = {payload}"),
            Err(e) => error!("Erro ao publicar em {channel}: {e}"),
        }
    }

    /// Publica um comando para o ESP.
    pub fn send(&self, command: &Command) {
        let out = command.encode();
        self.publish(&out.channel, &out.payload, out.retained);
    }

    /// Desconecta e encerra a thread da ponte.
    pub fn shutdown(self) {
        self.worker.stop();
        if let Err(e) = self.client.try_disconnect() {
            debug!("Disconnect não enviado: {e}");
        }
        self.worker.join();
        self.state.set(ConnectionState::Disconnected);
        info!("Ponte MQTT encerrada");
    }
}

fn event_loop(
    mut connection: Connection,
    client: &Client,
    dispatcher: &Dispatcher,
    state: &StateCell,
    stop: &StopSignal,
    mut retry: RetryPolicy,
) {
    let mut ever_connected = false;
    // Assinatura que não coube na fila; refeita no próximo evento
    let mut subscribe_pending = false;
    state.set(ConnectionState::Connecting);

    for notification in connection.iter() {
        if !stop.is_running() {
            break;
        }

        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT conectado");
                ever_connected = true;
                retry.backoff.reset();
                state.set(ConnectionState::Connected);
                dispatcher.on_connected();
                subscribe_pending = !subscribe_all(client);
            }
            Ok(Event::Incoming(Packet::Publish(p))) => {
                dispatcher.handle(&p.topic, &p.payload);
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("Broker encerrou a conexão");
                state.set(ConnectionState::Disconnected);
                dispatcher.on_disconnected();
                subscribe_pending = false;
            }
            Ok(_) => {}
            Err(e) => {
                subscribe_pending = false;
                state.set(ConnectionState::Disconnected);
                dispatcher.on_disconnected();

                let delay = if ever_connected {
                    retry.backoff.next_delay()
                } else {
                    retry.initial
                };
                if ever_connected {
                    warn!("MQTT desconectado: {e}. Reconectando em {}s", delay.as_secs());
                } else {
                    warn!("Falha na conexão inicial: {e}. Tentando novamente em {}s", delay.as_secs());
                }

                if !stop.sleep(delay) {
                    break;
                }
                state.set(ConnectionState::Connecting);
            }
        }

        if subscribe_pending && state.get() == ConnectionState::Connected {
            subscribe_pending = !subscribe_all(client);
        }
    }

    state.set(ConnectionState::Disconnected);
    debug!("Event loop MQTT finalizado");
}

/// Um único SUBSCRIBE com todos os canais: ocupa uma vaga só na fila.
/// Retorna `false` se a requisição não entrou e precisa ser refeita.
fn subscribe_all(client: &Client) -> bool {
    let filters: Vec<SubscribeFilter> = topics::subscriptions()
        .into_iter()
        .map(|topic| SubscribeFilter::new(topic, QoS::AtLeastOnce))
        .collect();
    let count = filters.len();

    // try_*: esta thread é a que esvazia a fila de requisições
    match client.try_subscribe_many(filters) {
        Ok(()) => {
            debug!("Assinatura de {count} canais enviada");
            true
        }
        Err(e) => {
            error!("Falha ao assinar canais, tentando no próximo evento: {e}");
            false
        }
    }
}
