//! MQTT Integration Test Helpers
//!
//! Live broker tests expect a broker at localhost:1883 and are `#[ignore]`d by
//! default. Run them with `cargo test -- --ignored`.

use dht22_bridge::transport::mqtt::{parse_broker_url, MqttConnector};
use dht22_bridge::transport::SessionOptions;
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use std::time::Duration;

/// MQTT broker URL - expected at localhost:1883
pub const MQTT_BROKER_URL: &str = "mqtt://localhost:1883";
#[allow(dead_code)]
pub const MQTT_BROKER_PORT: u16 = 1883;

/// Session options pointing to the localhost broker
#[allow(dead_code)]
pub fn session_options(client_id: &str) -> SessionOptions {
    let broker = parse_broker_url(MQTT_BROKER_URL).expect("broker URL should parse");
    SessionOptions::new(client_id, broker)
}

#[allow(dead_code)]
pub fn connector() -> MqttConnector {
    MqttConnector::new(Duration::from_secs(5), Duration::from_millis(200))
}

/// Plain rumqttc subscriber observing what the bridge publishes
#[allow(dead_code)]
pub struct Observer {
    client: AsyncClient,
    event_loop: EventLoop,
}

#[allow(dead_code)]
impl Observer {
    pub async fn subscribe(client_id: &str, filter: &str) -> Self {
        let options = MqttOptions::new(client_id, "localhost", MQTT_BROKER_PORT);
        let (client, mut event_loop) = AsyncClient::new(options, 10);
        client
            .subscribe(filter, QoS::AtLeastOnce)
            .await
            .expect("subscribe request should queue");

        // Wait for the SubAck so nothing published afterwards is missed
        let _ = tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::SubAck(_))) => break,
                    Ok(_) => {}
                    Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
                }
            }
        })
        .await;

        Self { client, event_loop }
    }

    /// Collect `(topic, payload, retain)` until `count` arrive or `within` elapses
    pub async fn collect(&mut self, count: usize, within: Duration) -> Vec<(String, String, bool)> {
        let mut received = Vec::new();
        let _ = tokio::time::timeout(within, async {
            while received.len() < count {
                match self.event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => received.push((
                        String::from_utf8_lossy(&publish.topic).into_owned(),
                        String::from_utf8_lossy(&publish.payload).into_owned(),
                        publish.retain,
                    )),
                    Ok(_) => {}
                    Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
                }
            }
        })
        .await;
        received
    }

    pub async fn close(self) {
        let _ = self.client.disconnect().await;
    }
}
