//! Simulated Run
//!
//! This example tests a small conveyor program running on the in-memory PLC.
//!
//! Key concepts:
//! - Building a Moore model of the expected PLC behavior
//! - A combinatorial transition that holds a state
//! - Running the test on a worker thread
//! - Following progress through an observer channel
//! - Exporting the run report as JSON
//!
//! Run with: cargo run --example simulated_run

use plc_conformance::core::{Model, ModelError, PlcDataType, SignalDraft, StateId};
use plc_conformance::plc::sim::SimulatedPlc;
use plc_conformance::protocol::TestEvent;
use plc_conformance::runner::{TestConfig, TestRunner};

const INPUT_BLOCK: u16 = 10;
const OUTPUT_BLOCK: u16 = 11;

fn conveyor_model() -> Result<Model, ModelError> {
    let mut model = Model::new();

    // Inputs: start/stop buttons and a speed setpoint
    let start = model.add_input(SignalDraft::new("start", PlcDataType::Bit, 0))?.id;
    let stop = model.add_input(SignalDraft::new("stop", PlcDataType::Bit, 0).bit(1))?.id;
    let setpoint = model.add_input(SignalDraft::new("setpoint", PlcDataType::Int, 2))?.id;

    // Outputs: motor contactor and actual speed
    let motor = model.add_output(SignalDraft::new("motor", PlcDataType::Bit, 0))?.id;
    let speed = model.add_output(SignalDraft::new("speed", PlcDataType::Int, 2))?.id;

    let idle = StateId::initial();
    model.set_state_output(&idle, motor, "0", "0")?;
    model.set_state_output(&idle, speed, "0", "0")?;

    let running = model.add_state("running")?;
    model.set_state_output(&running, motor, "1", "1")?;
    model.set_state_output(&running, speed, "120", "120")?;

    let go = model.add_sequential_transition("start pressed", &idle, &running)?;
    model.set_transition_input(&go, start, "1")?;
    model.set_transition_input(&go, setpoint, "120")?;

    let halt = model.add_sequential_transition("stop pressed", &running, &idle)?;
    model.set_transition_input(&halt, stop, "1")?;

    let hold = model.add_combinatorial_transition("keep running", &running, &running, [halt])?;
    model.set_transition_input(&hold, start, "1")?;
    model.set_transition_input(&hold, setpoint, "120")?;

    Ok(model)
}

/// The program under test: the motor runs while start is held and stop is
/// not, and the speed follows the setpoint while it runs.
fn conveyor_plc() -> SimulatedPlc {
    SimulatedPlc::new().with_program(INPUT_BLOCK, OUTPUT_BLOCK, |input, output| {
        output.resize(4, 0);
        let start = input.first().is_some_and(|byte| byte & 0b01 != 0);
        let stop = input.first().is_some_and(|byte| byte & 0b10 != 0);
        let running = start && !stop;
        output[0] = u8::from(running);
        let setpoint = match input.get(2..4) {
            Some(&[high, low]) if running => [high, low],
            _ => [0, 0],
        };
        output[2..4].copy_from_slice(&setpoint);
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Simulated Conformance Run ===\n");

    let model = conveyor_model()?;
    let config = TestConfig {
        input_block: INPUT_BLOCK,
        output_block: OUTPUT_BLOCK,
        cycle_time_ms: 20,
        ..TestConfig::default()
    };

    let runner = TestRunner::new(config);
    println!(
        "Cycle time: {} ms (scaling {})\n",
        runner.config().cycle_time_ms,
        runner.config().scaling_factor
    );
    let mut events = runner.subscribe();
    let worker = runner
        .execute(&model, conveyor_plc())
        .ok_or("a test run is already active")?;

    while let Some(event) = events.recv().await {
        println!("{event}");
        if matches!(event, TestEvent::RunFinished { .. }) {
            break;
        }
    }

    let report = worker.join().map_err(|_| "test worker panicked")?;
    println!("\n{report}");
    println!("{}", report.to_json()?);

    if report.all_passed() {
        println!("\nResult: the PLC program conforms to the model");
    } else {
        println!("\nResult: the PLC program does not conform to the model");
    }

    Ok(())
}
