//! gattkit Simulator Binary
//!
//! Runs a peripheral against the simulated driver and plays one peer through
//! a blocking request, a prepared write and a long read.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gattkit::driver::{event_queue, EventLoop, HardwareEvent, Operation, SimBehavior, SimulatedDriver};
use gattkit::gatt::{AttResponse, ExecWriteRequest, ReadRequest, WriteRequest};
use gattkit::{Config, GattError, Peripheral, RequestMode};
use tracing_subscriber::{fmt, EnvFilter};

/// gattkit Simulator
#[derive(Parser, Debug)]
#[command(name = "gattkit-sim")]
#[command(about = "Drive a simulated BLE peripheral")]
#[command(version)]
struct Args {
    /// MTU the simulated peer negotiates
    #[arg(short, long, default_value = "23")]
    mtu: u16,

    /// Size of the value written and read back, in bytes
    #[arg(short, long, default_value = "100")]
    size: usize,

    /// Completion timeout in milliseconds
    #[arg(short, long, default_value = "1000")]
    timeout_ms: u64,

    /// Make the stack stay silent on service start (exercises the timeout)
    #[arg(long)]
    silent_start: bool,
}

const CONN: u16 = 0;
const HANDLE: u16 = 0x002a;

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gattkit=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("gattkit simulator v{}", gattkit::VERSION);

    if let Err(e) = run(&args) {
        tracing::error!("Simulation failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> gattkit::Result<()> {
    let config = Config::builder()
        .completion_timeout_ms(args.timeout_ms)
        .build();

    let (events, queue) = event_queue();
    let driver = SimulatedDriver::new(events);
    if args.silent_start {
        driver.set_behavior(Operation::ServiceStart, SimBehavior::Silent);
    }

    let peripheral = Arc::new(Peripheral::new(config.clone(), driver)?);
    let event_loop = EventLoop::spawn(&config.event_thread_name, queue, Arc::clone(&peripheral))?;

    // Blocking requests
    peripheral.request(Operation::AppRegister, 1, RequestMode::Blocking)?;
    tracing::info!("App registered");

    match peripheral.request(Operation::ServiceStart, 0x0028, RequestMode::Blocking) {
        Ok(()) => tracing::info!("Service started"),
        Err(GattError::OutcomeUnknown { .. }) => {
            tracing::warn!("Service start outcome unknown, continuing")
        }
        Err(e) => return Err(e),
    }

    let attribute = peripheral.attribute_add(HANDLE, Vec::new())?;
    attribute.set_on_write(|conn| tracing::info!(conn, "Value written"));
    attribute.set_on_read(|conn| tracing::info!(conn, "Value read"));

    // Peer connects and negotiates its MTU
    let sim = peripheral.driver();
    sim.inject(HardwareEvent::Connected { conn: CONN, addr: [0x02, 0, 0, 0, 0, 0x01] })?;
    sim.inject(HardwareEvent::MtuChanged { conn: CONN, mtu: args.mtu })?;

    // Prepared write in MTU-sized fragments
    let payload: Vec<u8> = (0..args.size).map(|i| i as u8).collect();
    let fragment_len = (args.mtu as usize).saturating_sub(5).max(1);
    for (index, fragment) in payload.chunks(fragment_len).enumerate() {
        sim.inject(HardwareEvent::Write(WriteRequest {
            conn: CONN,
            trans_id: index as u32,
            handle: HANDLE,
            offset: (index * fragment_len) as u16,
            is_prep: true,
            need_rsp: true,
            value: fragment.to_vec().into(),
        }))?;
        expect_response(sim)?;
    }
    sim.inject(HardwareEvent::ExecWrite(ExecWriteRequest {
        conn: CONN,
        trans_id: 1000,
        commit: true,
    }))?;
    expect_response(sim)?;

    // Long read until a short chunk arrives. The MTU update was handled
    // before the write responses, so the table holds the effective value.
    let limit = peripheral
        .connections()
        .payload_limit(CONN)
        .ok_or(GattError::UnknownConnection(CONN))?;
    let mut read_back = Vec::new();
    let mut round = 0u32;
    loop {
        sim.inject(HardwareEvent::Read(ReadRequest {
            conn: CONN,
            trans_id: 2000 + round,
            handle: HANDLE,
            offset: read_back.len() as u16,
            is_long: round > 0,
            need_rsp: true,
        }))?;
        let chunk = expect_response(sim)?.value;
        read_back.extend_from_slice(&chunk);
        round += 1;
        if chunk.len() < limit {
            break;
        }
    }

    tracing::info!(
        bytes = read_back.len(),
        rounds = round,
        matches = read_back == payload,
        "Long read complete"
    );

    sim.inject(HardwareEvent::Disconnected { conn: CONN })?;

    peripheral.request(Operation::AppUnregister, 1, RequestMode::Blocking)?;
    tracing::info!("App unregistered");

    event_loop.shutdown()
}

fn expect_response(sim: &SimulatedDriver) -> gattkit::Result<AttResponse> {
    sim.responses()
        .recv_timeout(Duration::from_secs(1))
        .map_err(|_| GattError::Driver("no response from peripheral".to_string()))
}
