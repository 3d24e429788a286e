// Simple CLI voltmeter
//
// Reads buffers of voltages from the card in a loop and prints the mean,
// variance and standard deviation of each buffer.

use clap::Parser;
use mps060602_rs::{
    host_library_filename, AcquisitionParameters, ChannelMode, DllBackend, MpsSession, PgaGain,
};

#[derive(Parser)]
#[command(about = "CLI voltmeter for the MPS-060602 acquisition card")]
struct Args {
    /// Path to the vendor DLL (defaults to the binary matching this process)
    #[arg(long)]
    library: Option<String>,

    /// Device number, 0 to 9
    #[arg(long, default_value_t = 0)]
    device: i32,

    /// Sample rate in Hz, multiple of 1000 in [1000, 450000]
    #[arg(long, default_value_t = 10_000)]
    sample_rate: u32,

    /// Internal sample buffer capacity
    #[arg(long, default_value_t = 2048)]
    buffer_size: usize,

    /// Number of buffers to read before shutting down
    #[arg(long, default_value_t = 10)]
    iterations: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let library = args
        .library
        .unwrap_or_else(|| host_library_filename().to_string());
    let backend = unsafe { DllBackend::load(&library)? };

    let mut card = MpsSession::open(backend, args.device, args.buffer_size)?;
    let para = AcquisitionParameters::new(ChannelMode::In1, args.sample_rate, PgaGain::Range10V)?;
    card.configure(&para)?;
    card.start()?;

    for _ in 0..args.iterations {
        let volts = card.read_to_volt(None)?;
        let mean = volts.iter().sum::<f64>() / volts.len() as f64;
        let variance = volts.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / volts.len() as f64;

        println!(
            "average {:.2}, variance {:.2}, standard deviation {:.2}",
            mean,
            variance,
            variance.sqrt()
        );
    }

    card.suspend()?;
    card.close()?;
    println!("Card closed.");
    Ok(())
}
