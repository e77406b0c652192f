// 50 ms serial loop: drain telemetry, send the latest command, poll for more
// Velocity commands arrive on a zenoh callback and wait in a single-slot mailbox
// until the next tick picks them up. There is no idle watchdog: without new
// commands the motors hold their last value.

use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info, warn};

use crate::config::{
    BaseConfig, TOPIC_HEALTH, TOPIC_IMU_ACC, TOPIC_IMU_ATT, TOPIC_VELOCITY_GET,
    TOPIC_VELOCITY_SET,
};
use crate::messages::{RuntimeHealth, VelocityCommand};
use crate::motor::{BaseDriver, DriverError, Transport};
use crate::telemetry::Telemetry;

/// Latest velocity command not yet sent. Writers overwrite, the tick takes.
#[derive(Debug, Default)]
pub struct PendingCommand {
    slot: Mutex<Option<VelocityCommand>>,
}

impl PendingCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a command, replacing any unsent one
    pub fn put(&self, cmd: VelocityCommand) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.replace(cmd).is_some() {
            debug!("Replacing unsent velocity command");
        }
    }

    /// Take the pending command, leaving the slot empty
    pub fn take(&self) -> Option<VelocityCommand> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// Everything one tick produced for the bus
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub telemetry: Vec<Telemetry>,
    pub echo: Option<VelocityCommand>,
    pub health: RuntimeHealth,
}

/// Owns the driver and runs one scheduling step at a time
pub struct Scheduler<T: Transport> {
    driver: BaseDriver<T>,
    pending: Arc<PendingCommand>,
    health: RuntimeHealth,
}

impl<T: Transport> Scheduler<T> {
    pub fn new(driver: BaseDriver<T>, pending: Arc<PendingCommand>) -> Self {
        Self {
            driver,
            pending,
            health: RuntimeHealth::Ok,
        }
    }

    /// One scheduler step
    pub fn tick(&mut self) -> TickOutput {
        // 1. Drain inbound bytes, decode telemetry
        let mut telemetry = Vec::new();
        if let Err(e) = self.driver.drain(&mut telemetry) {
            warn!("Serial read failed: {}", e);
        }

        // 2. Send the pending command, if any
        let mut echo = None;
        if let Some(cmd) = self.pending.take() {
            match self.driver.set_velocity(&cmd) {
                Ok(motors) => {
                    debug!("Sent {:?} as {:?}", cmd, motors.as_array());
                    self.health = RuntimeHealth::Ok;
                    echo = Some(cmd);
                }
                Err(DriverError::Encode(e)) => {
                    warn!("Dropping velocity command {:?}: {}", cmd, e);
                    self.health = RuntimeHealth::CommandRejected;
                }
                Err(e) => warn!("Failed to send motor command: {}", e),
            }
        }

        // 3. Ask for the next round of telemetry
        if let Err(e) = self.driver.request_telemetry() {
            warn!("Failed to query telemetry: {}", e);
        }

        TickOutput {
            telemetry,
            echo,
            health: self.health,
        }
    }

    #[cfg(test)]
    pub(crate) fn driver_mut(&mut self) -> &mut BaseDriver<T> {
        &mut self.driver
    }

    pub fn into_driver(self) -> BaseDriver<T> {
        self.driver
    }
}

/// Bring the base to a known state before the first tick
pub async fn startup<T: Transport>(
    driver: &mut BaseDriver<T>,
    config: &BaseConfig,
) -> Result<(), DriverError> {
    sleep(config.settle_delay).await;
    driver.flush_input()?;
    // Halt all motors (neutral)
    sleep(config.neutral_delay).await;
    driver.set_velocity(&VelocityCommand::zero())?;
    sleep(config.neutral_delay).await;
    Ok(())
}

/// Park the base at neutral and release the transport
pub async fn shutdown<T: Transport>(mut driver: BaseDriver<T>, config: &BaseConfig) {
    if let Err(e) = driver.stop() {
        warn!("Failed to stop motors: {}", e);
    }
    sleep(config.neutral_delay).await;
    info!("Closing serial port {}", config.port);
    drop(driver);
}

async fn publish<V: Serialize>(publisher: &zenoh::pubsub::Publisher<'_>, value: &V) {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize message for {}: {}", publisher.key_expr(), e);
            return;
        }
    };
    if let Err(e) = publisher.put(json).await {
        warn!("Failed to publish on {}: {}", publisher.key_expr(), e);
    }
}

pub async fn run(config: BaseConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut driver = BaseDriver::open(&config)?;
    startup(&mut driver, &config).await?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let pending = Arc::new(PendingCommand::new());
    let intake = Arc::clone(&pending);
    let _subscriber = session
        .declare_subscriber(config.topic(TOPIC_VELOCITY_SET))
        .callback(move |sample: zenoh::sample::Sample| {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<VelocityCommand>(&payload) {
                Ok(cmd) => intake.put(cmd),
                Err(e) => warn!("Failed to parse command: {}", e),
            }
        })
        .await?;
    let pub_echo = session
        .declare_publisher(config.topic(TOPIC_VELOCITY_GET))
        .await?;
    let pub_acc = session.declare_publisher(config.topic(TOPIC_IMU_ACC)).await?;
    let pub_att = session.declare_publisher(config.topic(TOPIC_IMU_ATT)).await?;
    let pub_health = session.declare_publisher(config.topic(TOPIC_HEALTH)).await?;

    let mut scheduler = Scheduler::new(driver, pending);
    let mut tick = interval(config.loop_period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Runtime started: {}ms loop on {}",
        config.loop_period.as_millis(),
        config.port
    );
    info!("Subscribed to: {}", config.topic(TOPIC_VELOCITY_SET));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutting down");
                break;
            }
        }

        let output = scheduler.tick();

        for sample in &output.telemetry {
            match sample {
                Telemetry::Imu(imu) => publish(&pub_acc, imu).await,
                Telemetry::Attitude(att) => publish(&pub_att, att).await,
            }
        }
        if let Some(cmd) = &output.echo {
            publish(&pub_echo, cmd).await;
        }
        publish(&pub_health, &output.health).await;
    }

    shutdown(scheduler.into_driver(), &config).await;
    Ok(())
}
