use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use ultrasonic_array::array::SensorArray;
use ultrasonic_array::config::Config;
use ultrasonic_array::diagnostics::all_sensors_test;
use ultrasonic_array::gpio::fake::{Echo, FakeGpio};
use ultrasonic_array::gpio::{Direction, GpioPort, GpioSession};
use ultrasonic_array::recorder::Recorder;

fn config_for(sensors: &[(&str, u8, u8)]) -> Config {
    Config {
        sensors: sensors.iter().map(|(name, _, _)| name.to_string()).collect(),
        echo_pins: sensors
            .iter()
            .map(|(name, echo, _)| (name.to_string(), *echo))
            .collect::<BTreeMap<_, _>>(),
        trig_pins: sensors
            .iter()
            .map(|(name, _, trig)| (name.to_string(), *trig))
            .collect::<BTreeMap<_, _>>(),
        ..Config::default()
    }
}

fn scripted_board(config: &Config, distances: &[u32]) -> FakeGpio {
    let fake = FakeGpio::default();
    for (sensor, &distance) in config.sensor_configs().unwrap().iter().zip(distances) {
        fake.script_echoes(
            sensor.trig_pin,
            sensor.echo_pin,
            [Echo::at_distance_mm(distance)],
        );
    }
    fake
}

fn scratch_file(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("ultrasonic_array_{}_{name}", std::process::id()))
        .join("records")
        .join("run.csv")
}

#[test]
fn three_sensors_report_in_configured_order() {
    let config = config_for(&[("FrLH", 17, 18), ("Fr", 27, 23), ("FrRH", 22, 24)]);
    let fake = scripted_board(&config, &[100, 200, 300]);
    let clock = fake.clock();
    let mut array = SensorArray::new(GpioSession::new(fake), clock, &config).unwrap();

    let batch = array.measure_all();

    let readings: Vec<_> = batch
        .readings
        .iter()
        .map(|reading| (reading.sensor.as_str(), reading.distance_mm))
        .collect();
    assert_eq!(readings, vec![("FrLH", 100), ("Fr", 200), ("FrRH", 300)]);
}

#[test]
fn two_batches_persist_as_header_and_two_rows() {
    let config = config_for(&[("LH", 5, 25), ("RH", 6, 12)]);
    let fake = scripted_board(&config, &[450, 1200]);
    let clock = fake.clock();
    let mut array = SensorArray::new(GpioSession::new(fake), clock, &config).unwrap();
    let path = scratch_file("two_batches");

    let recorder = Recorder::create(&path, &array.sensor_names()).unwrap();
    let cancel = AtomicBool::new(false);
    for batch in array.run(Some(2), &cancel) {
        recorder.record(batch);
    }
    assert_eq!(recorder.finish().unwrap(), 2);

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Timestamp,LH,RH");
    assert_eq!(lines[1], "0.000,450.000,1200.000");
    assert!(lines[2].ends_with(",450.000,1200.000"));
    fs::remove_dir_all(path.parent().unwrap().parent().unwrap()).ok();
}

#[test]
fn all_sensors_test_records_and_averages() {
    let config = config_for(&[("LH", 5, 25), ("RH", 6, 12)]);
    let fake = scripted_board(&config, &[800, 900]);
    let clock = fake.clock();
    let path = scratch_file("all_sensors");
    let cancel = AtomicBool::new(false);
    let mut shown = 0;

    let report = all_sensors_test(
        GpioSession::new(fake.clone()),
        clock,
        &config,
        4,
        path.clone(),
        &cancel,
        |_, _| shown += 1,
    )
    .unwrap();

    assert_eq!(report.batches, 4);
    assert_eq!(shown, 4);
    assert!(!report.interrupted);
    assert_eq!(report.averages, vec![800.0, 900.0]);
    assert!(fake.is_released());
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 5);
    fs::remove_dir_all(path.parent().unwrap().parent().unwrap()).ok();
}

#[test]
fn cleanup_twice_leaves_pins_as_inputs() {
    let config = config_for(&[("LH", 5, 25), ("RH", 6, 12)]);
    let fake = scripted_board(&config, &[300, 300]);
    let clock = fake.clock();
    let array = SensorArray::new(GpioSession::new(fake.clone()), clock, &config).unwrap();
    assert_eq!(fake.direction(25), Some(Direction::Output));

    array.shutdown();
    let mut handle = fake.clone();
    handle.terminate();

    assert_eq!(fake.terminate_calls(), 2);
    for pin in [5, 25, 6, 12] {
        assert_eq!(fake.direction(pin), Some(Direction::Input));
    }
}

#[test]
fn silent_board_never_panics() {
    let config = config_for(&[("Fr", 27, 23)]);
    let fake = FakeGpio::default();
    fake.script_echoes(23, 27, [Echo::Silent]);
    let clock = fake.clock();
    let mut array = SensorArray::new(GpioSession::new(fake), clock, &config).unwrap();

    let batch = array.measure_all();

    assert_eq!(batch.distances().collect::<Vec<_>>(), vec![config.cutoff_range_mm]);
}
