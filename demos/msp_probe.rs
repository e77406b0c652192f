// MSP probe: READ-ONLY check of the motor controller link
//
// Sends only telemetry queries, never motor commands - the wheels will not move.
// Use this first to verify the port, baud rate and IMU before running the runtime.
//
// Usage: cargo run --example msp_probe -- [port] [baud]
// Example: cargo run --example msp_probe -- /dev/ttyACM0 115200

use rover_base_runtime::config::{DEFAULT_BAUD, DEFAULT_PORT};
use rover_base_runtime::motor::msp::{self, Command, Receiver, Response};
use rover_base_runtime::motor::{SerialTransport, Transport};
use std::thread::sleep;
use std::time::{Duration, Instant};

const SAMPLES: usize = 10;
const REPLY_TIMEOUT: Duration = Duration::from_millis(200);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let port = args.next().unwrap_or_else(|| DEFAULT_PORT.to_string());
    let baud = match args.next() {
        Some(b) => b.parse()?,
        None => DEFAULT_BAUD,
    };

    println!("MSP probe (read-only)");
    println!("Serial port: {} @ {}", port, baud);
    println!();

    println!("Step 1: Opening serial port...");
    let mut transport = match SerialTransport::open(&port, baud) {
        Ok(transport) => {
            println!("  ✓ Serial port opened");
            transport
        }
        Err(e) => {
            println!("  ✗ Failed to open serial port: {}", e);
            println!();
            println!("Troubleshooting:");
            println!("  - Check the port path is correct");
            println!("  - Verify the USB cable is connected");
            println!("  - Check you have permission to open the device");
            return Err(e.into());
        }
    };

    // Controller may reset on open
    sleep(Duration::from_secs(2));
    transport.discard_buffers()?;
    println!();

    println!("Step 2: Querying telemetry ({} rounds)...", SAMPLES);
    let mut receiver = Receiver::new();
    let mut imu_seen = 0;
    let mut att_seen = 0;

    for round in 1..=SAMPLES {
        transport.send(&msp::query(Command::RawImu))?;
        transport.send(&msp::query(Command::Attitude))?;

        let deadline = Instant::now() + REPLY_TIMEOUT;
        let mut replies = 0;
        let mut buf = [0u8; 64];
        while replies < 2 && Instant::now() < deadline {
            let n = transport.read_available(&mut buf)?;
            if n == 0 {
                sleep(Duration::from_millis(5));
                continue;
            }
            for &byte in &buf[..n] {
                if !receiver.feed(byte) {
                    continue;
                }
                match receiver.response() {
                    Ok(Response::RawImu(imu)) => {
                        replies += 1;
                        imu_seen += 1;
                        println!(
                            "  [{:2}] acc={:?} gyro={:?} mag={:?}",
                            round, imu.acc, imu.gyro, imu.mag
                        );
                    }
                    Ok(Response::Attitude(att)) => {
                        replies += 1;
                        att_seen += 1;
                        println!(
                            "  [{:2}] angx={} angy={} heading={}",
                            round, att.angx, att.angy, att.heading
                        );
                    }
                    Ok(Response::MotorAck) => {}
                    Err(e) => println!("  [{:2}] skipped frame: {}", round, e),
                }
            }
        }
        if replies < 2 {
            println!("  [{:2}] ✗ timed out waiting for replies", round);
        }
    }

    println!();
    println!(
        "Received {}/{} IMU and {}/{} attitude replies",
        imu_seen, SAMPLES, att_seen, SAMPLES
    );
    if imu_seen == 0 && att_seen == 0 {
        println!("  - Check the baud rate matches the controller");
        println!("  - Check the controller firmware speaks MSP");
    } else {
        println!("Next step: cargo run -- --port {}", port);
    }

    Ok(())
}
