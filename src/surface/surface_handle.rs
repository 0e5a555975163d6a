use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::control_loop::ControlLoop;
use super::SurfaceEvent;
use crate::config::SurfaceConfig;
use crate::listener::ChannelListener;
use crate::shm::ChannelError;
use crate::widgets::WidgetError;

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("Widget error: {0}")]
    Widget(#[from] WidgetError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Control loop task failed: {0}")]
    Task(String),
}

/// Owner of the running control loop task
///
/// Dropping the handle leaves the loop running; call [`SurfaceHandle::shutdown`]
/// or cancel the token to stop it.
#[derive(Debug)]
pub struct SurfaceHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<(), SurfaceError>>,
}

impl SurfaceHandle {
    /// Builds the loop from `config` and starts it on the tokio runtime.
    /// Every surface event is forwarded to `sender`.
    pub fn spawn(
        config: SurfaceConfig,
        sender: mpsc::Sender<SurfaceEvent>,
    ) -> Result<Self, SurfaceError> {
        info!("Spawning control surface with timing: {:?}", config.timing);

        let cancel = CancellationToken::new();
        let mut control = ControlLoop::create(config, cancel.clone())?;
        control.add_listener(ChannelListener::new("application", sender));
        debug!("Application listener registered");

        let running = control.start();
        let task = tokio::spawn(async move {
            let stopped = running.run().await;
            stopped.shutdown()
        });

        info!("Control surface successfully started");
        Ok(Self { cancel, task })
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops the loop and waits for its channels to close
    pub async fn shutdown(self) -> Result<(), SurfaceError> {
        info!("Stopping control surface");
        self.cancel.cancel();
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                error!("Control loop task ended abnormally: {}", e);
                Err(SurfaceError::Task(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::record::{HardwareEventRecord, RecordKind, RECORD_SIZE};
    use crate::hardware::DomainEvent;
    use crate::shm::ring_buffer::SLOT_COUNT;
    use crate::shm::RingBufferChannel;
    use crate::widgets::element::{ElementSpec, FaderElement};
    use std::time::Duration;

    fn offline_config(dir: &tempfile::TempDir) -> SurfaceConfig {
        let mut config = SurfaceConfig::default();
        config.channels.gpio = dir.path().join("tauwerk_gpio");
        config.channels.ui_commands = dir.path().join("tauwerk_ui_commands");
        config.channels.ui_events = dir.path().join("tauwerk_ui_events");
        config.touch.enabled = false;
        config
    }

    #[tokio::test]
    async fn runs_with_every_channel_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (sender, _receiver) = mpsc::channel(16);
        let handle = SurfaceHandle::spawn(offline_config(&dir), sender).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn forwards_encoder_turns() {
        let dir = tempfile::tempdir().unwrap();
        let config = offline_config(&dir);
        let mut driver = RingBufferChannel::create(&config.channels.gpio, RECORD_SIZE, SLOT_COUNT).unwrap();

        let (sender, mut receiver) = mpsc::channel(16);
        let handle = SurfaceHandle::spawn(config, sender).unwrap();

        let turn = HardwareEventRecord {
            kind: RecordKind::Encoder,
            pin: 5,
            value: 1,
            timestamp: 1000,
        };
        driver.write(&turn.encode()).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            SurfaceEvent::Hardware(DomainEvent::Encoder {
                id: "A_encoder".to_string(),
                pin_name: "a".to_string(),
                direction: 1,
                cumulative_value: 1,
                tick: 1000,
            })
        );
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_layout_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config(&dir);
        config.elements.push(ElementSpec::Fader(FaderElement {
            id: 1,
            ..FaderElement::default()
        }));

        let (sender, _receiver) = mpsc::channel(16);
        assert!(matches!(
            SurfaceHandle::spawn(config, sender),
            Err(SurfaceError::Widget(WidgetError::DuplicateId(1)))
        ));
    }
}
