// Waveform peeker
//
// Captures one full buffer, reports the read throughput, and renders the
// waveform as ASCII columns (one column per group of samples).

use clap::Parser;
use mps060602_rs::{
    host_library_filename, AcquisitionParameters, ChannelMode, DllBackend, MpsSession, PgaGain,
};
use std::time::Instant;

const PLOT_COLUMNS: usize = 64;
const PLOT_ROWS: usize = 16;

#[derive(Parser)]
#[command(about = "Capture and print one waveform from the MPS-060602")]
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

    let start = Instant::now();
    let raw = card.data_in(None)?.to_vec();
    let elapsed = start.elapsed();
    println!(
        "read {} samples in {:?}, sample rate {} per second",
        raw.len(),
        elapsed,
        args.sample_rate
    );
    card.suspend()?;

    let volts = raw
        .iter()
        .map(|&sample| card.to_volt(sample))
        .collect::<Result<Vec<_>, _>>()?;
    render(&volts, para.gain().volt_range());

    println!(
        "waveform covers {:.3} s at {} Hz, buffer size {}",
        raw.len() as f64 / f64::from(args.sample_rate),
        args.sample_rate,
        args.buffer_size
    );

    card.close()?;
    Ok(())
}

/// Draw the voltages as a rows x columns ASCII grid, +range at the top.
fn render(volts: &[f64], volt_range: f64) {
    let per_column = volts.len().div_ceil(PLOT_COLUMNS);
    let column_means: Vec<f64> = volts
        .chunks(per_column)
        .map(|chunk| chunk.iter().sum::<f64>() / chunk.len() as f64)
        .collect();

    for row in 0..PLOT_ROWS {
        let upper = volt_range - 2.0 * volt_range * (row as f64 / PLOT_ROWS as f64);
        let lower = volt_range - 2.0 * volt_range * ((row + 1) as f64 / PLOT_ROWS as f64);
        let mut line = String::with_capacity(column_means.len());
        for &mean in &column_means {
            if mean <= upper && mean > lower {
                line.push('*');
            } else {
                line.push(' ');
            }
        }
        println!("{upper:>7.2} V |{line}");
    }
}
