// Concurrent read demo
//
// Shows that a blocking read can run on a worker thread while the main
// thread does something else: a 1 second timer runs sequentially first,
// then concurrently with the read. Uses the mock backend so it works
// without hardware.

use mps060602_rs::{AcquisitionParameters, DeviceError, MockBackend, MpsSession};
use std::thread;
use std::time::{Duration, Instant};

fn new_card() -> Result<MpsSession<MockBackend>, Box<dyn std::error::Error>> {
    let mut card = MpsSession::open(MockBackend::new(), 0, 2048)?;
    card.configure(&AcquisitionParameters::default())?;
    card.start()?;
    Ok(card)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let mut card = new_card()?;

    let started = Instant::now();
    thread::sleep(Duration::from_secs(1));
    card.read_to_volt(None)?;
    println!(
        "synchronous `sleep(1); read_to_volt()` elapsed time: {:.1?}",
        started.elapsed()
    );

    let started = Instant::now();
    let reader = thread::spawn(move || -> Result<MpsSession<MockBackend>, DeviceError> {
        card.read_to_volt(None)?;
        Ok(card)
    });
    thread::sleep(Duration::from_secs(1));
    let mut card = reader.join().expect("reader thread panicked")?;
    println!(
        "concurrent `sleep(1) || read_to_volt()` elapsed time: {:.1?}",
        started.elapsed()
    );

    card.suspend()?;
    card.close()?;
    Ok(())
}
