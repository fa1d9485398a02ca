use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use paho_mqtt as mqtt;
use serde_json::json;

use crate::app::config::MQTTConfig;
use crate::error::DispatchError;
use crate::notify::{Message, Transport};

/// Publishes notifications under `<topic_prefix>/<recipient>/...`.
pub struct MqttTransport {
    topic_prefix: String,
    recipient: String,
    mqtt: mqtt::AsyncClient,
}

impl MqttTransport {
    pub fn new(config: &MQTTConfig) -> Result<Self, mqtt::Error> {
        let create = mqtt::CreateOptionsBuilder::new()
            .server_uri(format!("tcp://{}:{}", config.host, config.port))
            .client_id(format!("falldetect-{}", config.recipient))
            .persistence(mqtt::PersistenceType::None)
            .finalize();
        let mqtt = mqtt::AsyncClient::new(create)?;
        Ok(Self {
            topic_prefix: config.topic_prefix.clone(),
            recipient: config.recipient.clone(),
            mqtt,
        })
    }

    /// Connects with the configured credential. A broker that is down at
    /// startup is not fatal, but the client then stays disconnected and every
    /// publish fails and is logged. Automatic reconnect only covers a
    /// connection lost after it was established.
    pub async fn connect(&self, config: &MQTTConfig) {
        let options = mqtt::ConnectOptionsBuilder::new()
            .user_name(config.username.as_str())
            .password(config.password.as_str())
            .keep_alive_interval(Duration::from_secs(30))
            .automatic_reconnect(Duration::from_secs(1), Duration::from_secs(30))
            .finalize();
        match self.mqtt.connect(options).await {
            Ok(_) => tracing::info!(host = %config.host, port = config.port, "connected to broker"),
            Err(err) => tracing::warn!(host = %config.host, %err, "broker not reachable"),
        }
    }

    pub async fn disconnect(&self) {
        if self.mqtt.is_connected() {
            if let Err(err) = self.mqtt.disconnect(None::<mqtt::DisconnectOptions>).await {
                tracing::warn!(%err, "failed to disconnect from broker");
            }
        }
    }

    pub fn text_topic(&self) -> String {
        format!("{}/{}/text", self.topic_prefix, self.recipient)
    }

    pub fn image_topic(&self, filename: &str) -> String {
        format!("{}/{}/image/{}", self.topic_prefix, self.recipient, filename)
    }

    fn to_mqtt(&self, message: Message) -> mqtt::Message {
        match message {
            Message::Text(body) => {
                let payload = json!({ "kind": "text", "body": body }).to_string();
                mqtt::Message::new(self.text_topic(), payload, mqtt::QOS_1)
            }
            Message::Image { body, filename } => {
                mqtt::Message::new(self.image_topic(&filename), body, mqtt::QOS_1)
            }
        }
    }
}

impl Transport for MqttTransport {
    fn deliver(&self, message: Message) -> BoxFuture<'static, Result<(), DispatchError>> {
        let msg = self.to_mqtt(message);
        let token = self.mqtt.publish(msg);
        async move {
            token.await?;
            Ok(())
        }
        .boxed()
    }
}
