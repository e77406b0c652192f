// Keyboard teleop: WASD move, Z/X rotate, R/F speed, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use rover_base_runtime::config::{BaseConfig, TOPIC_VELOCITY_SET};
use rover_base_runtime::messages::VelocityCommand;
use std::time::{Duration, Instant};
use tracing::info;

const SPEEDS: [f64; 3] = [0.2, 0.5, 1.0]; // fraction of full speed
const INPUT_TIMEOUT_MS: u64 = 100; // Reset velocities after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let topic = BaseConfig::default().topic(TOPIC_VELOCITY_SET);
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(topic.clone()).await?;

    info!("Publishing to: {}", topic);
    info!("Controls: WASD=move, Z/X=rotate, R/F=speed, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    // Leave the base stopped
    publisher
        .put(serde_json::to_string(&VelocityCommand::zero())?)
        .await?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;
    let mut cmd = VelocityCommand::zero();
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let speed = SPEEDS[speed_idx];

                match code {
                    KeyCode::Char('w') if pressed => cmd.vx = speed,
                    KeyCode::Char('s') if pressed => cmd.vx = -speed,
                    KeyCode::Char('a') if pressed => cmd.vy = speed,
                    KeyCode::Char('d') if pressed => cmd.vy = -speed,
                    KeyCode::Char('z') if pressed => cmd.vr = speed,
                    KeyCode::Char('x') if pressed => cmd.vr = -speed,

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(SPEEDS.len() - 1);
                        print_speed(speed_idx);
                        continue;
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                        continue;
                    }

                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => continue,
                }
                last_movement_input = Instant::now();
            }
        }

        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            cmd = VelocityCommand::zero();
        }

        publisher.put(serde_json::to_string(&cmd)?).await?;
    }

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
