use clap::{Parser, Subcommand};
use log::{error, warn};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use ultrasonic_array::config::{Config, DEFAULT_CONFIG_PATH};
use ultrasonic_array::diagnostics::{
    all_sensors_test, gpio_io_test, single_sensor_test, AllSensorsReport,
    ALL_SENSORS_MAX_BATCHES, IO_TEST_CYCLES,
};
use ultrasonic_array::error::Result;
use ultrasonic_array::gpio::fake::FakeGpio;
use ultrasonic_array::gpio::rppal_port::RppalGpio;
use ultrasonic_array::gpio::{GpioPort, GpioSession};
use ultrasonic_array::menu::{self, MenuChoice};
use ultrasonic_array::recorder::timestamped_path;
use ultrasonic_array::utils::clock::{Clock, MonotonicClock};
use ultrasonic_array::utils::shutdown;

const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(version, about = "HC-SR04 ultrasonic sensor array: bench tests and CSV acquisition")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run against a simulated board instead of the GPIO hardware
    #[arg(long)]
    simulate: bool,

    /// Without a command, an interactive menu is shown
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Take ten readings from the first configured sensor
    Single,
    /// Measure every sensor and record the batches to CSV
    All {
        /// Number of batches [default: min(20, sampling_times)]
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Record to this file instead of the configured output path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Append a date-time stamp to the output file name
        #[arg(long)]
        timestamped: bool,
    },
    /// Toggle the first trigger pin high and low
    GpioTest,
    /// Print the configuration and pin layout
    ShowConfig,
    /// Write the stock configuration to the --config path
    WriteConfig,
}

/// Work that needs the GPIO port.
enum BoardTask {
    Single,
    All { batches: usize, output: PathBuf },
    GpioTest,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Some(Command::WriteConfig) = cli.command {
        return match Config::default().write_sample(&cli.config) {
            Ok(()) => {
                println!("Sample configuration written to {}", cli.config.display());
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!("{err}");
                ExitCode::FAILURE
            }
        };
    }

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            error!(
                "A sample can be created with `write-config --config {}`",
                cli.config.display()
            );
            return ExitCode::FAILURE;
        }
    };

    let task = match cli.command {
        Some(Command::Single) => BoardTask::Single,
        Some(Command::All {
            count,
            output,
            timestamped,
        }) => all_task(&config, count, output, timestamped),
        Some(Command::GpioTest) => BoardTask::GpioTest,
        Some(Command::ShowConfig) | Some(Command::WriteConfig) => {
            println!("{config}");
            return ExitCode::SUCCESS;
        }
        None => {
            println!("{config}");
            match choose_from_menu(&config) {
                Ok(Some(task)) => task,
                Ok(None) => return ExitCode::SUCCESS,
                Err(err) => {
                    error!("Cannot read menu choice: {err}");
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    // Installed only now so Ctrl+C at the menu still ends the program at once.
    if let Err(err) = shutdown::install_interrupt_handler() {
        warn!("Ctrl+C handler not installed: {err}");
    }

    let result = if cli.simulate {
        FakeGpio::simulating(&config)
            .map_err(Into::into)
            .and_then(|fake| {
                let clock = fake.clock();
                run_task(&task, &config, GpioSession::new(fake), clock)
            })
    } else {
        GpioSession::<RppalGpio>::open()
            .map_err(Into::into)
            .and_then(|session| run_task(&task, &config, session, MonotonicClock::new()))
    };

    match result {
        Ok(()) if shutdown::interrupted() => {
            println!("\nMeasurement interrupted, GPIO released");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Ok(()) => {
            println!("\nTest complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            println!("\nTest failed; check the wiring and the configuration");
            ExitCode::FAILURE
        }
    }
}

fn all_task(
    config: &Config,
    count: Option<usize>,
    output: Option<PathBuf>,
    timestamped: bool,
) -> BoardTask {
    let batches = count.unwrap_or_else(|| config.sampling_times.min(ALL_SENSORS_MAX_BATCHES));
    let output = output.unwrap_or_else(|| config.output_path.clone());
    let output = if timestamped {
        timestamped_path(&output)
    } else {
        output
    };
    BoardTask::All { batches, output }
}

fn choose_from_menu(config: &Config) -> io::Result<Option<BoardTask>> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    loop {
        match menu::prompt(&mut input, &mut output)? {
            Ok(MenuChoice::SingleSensorTest) => return Ok(Some(BoardTask::Single)),
            Ok(MenuChoice::AllSensorsTest) => {
                return Ok(Some(all_task(config, None, None, false)));
            }
            Ok(MenuChoice::GpioTest) => return Ok(Some(BoardTask::GpioTest)),
            Ok(MenuChoice::ShowConfig) => {
                println!("Configuration OK");
                return Ok(None);
            }
            Ok(MenuChoice::Exit) => return Ok(None),
            Err(invalid) => println!("{invalid}"),
        }
    }
}

fn run_task<P: GpioPort, C: Clock>(
    task: &BoardTask,
    config: &Config,
    session: GpioSession<P>,
    clock: C,
) -> Result<()> {
    let cancel = &shutdown::INTERRUPTED;
    match task {
        BoardTask::Single => {
            println!("Measuring... (Ctrl+C to stop)");
            let report = single_sensor_test(session, &clock, config, cancel, |index, distance| {
                println!("Measurement {:2}: {distance:4} mm", index + 1)
            })?;
            println!(
                "\nSingle sensor test on {} done: {} readings",
                report.sensor,
                report.distances.len()
            );
        }
        BoardTask::All { batches, output } => {
            println!("Starting {batches} measurements... (Ctrl+C to stop)");
            let names = &config.sensors;
            let report = all_sensors_test(
                session,
                clock,
                config,
                *batches,
                output.clone(),
                cancel,
                |index, batch| {
                    let distances = names
                        .iter()
                        .zip(batch.distances())
                        .map(|(name, distance)| format!("{name}:{distance:4}mm"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    println!(
                        "[{:2}/{batches}] {:6.2}s: {distances}",
                        index + 1,
                        batch.timestamp.as_secs_f64()
                    );
                },
            )?;
            print_summary(&report);
        }
        BoardTask::GpioTest => {
            let report = gpio_io_test(session, &clock, config, |cycle| {
                println!("  Toggle {}/{IO_TEST_CYCLES} done", cycle + 1)
            })?;
            println!("I/O test on GPIO{} done", report.pin);
        }
    }
    Ok(())
}

fn print_summary(report: &AllSensorsReport) {
    println!("\n=== Results ===");
    println!("Batches:  {}", report.batches);
    println!("Duration: {:.2} s", report.elapsed.as_secs_f64());
    println!("Saved to: {}", report.output.display());
    if !report.averages.is_empty() {
        println!("\nMean distance per sensor:");
        for (name, average) in report.sensors.iter().zip(&report.averages) {
            println!("  {name}: {average:6.1} mm");
        }
    }
}
