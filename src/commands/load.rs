//! Code RAM commands: load-and-run and plain code writes

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use xhcfw_core::{CodeImage, Device, LoadProgress};

// =============================================================================
// Helper functions
// =============================================================================

/// Read a raw code file, padding odd lengths with one zero byte
pub fn read_code_file(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    println!("Read {} bytes from {:?}", data.len(), path);

    pad_to_words(&mut data);
    Ok(data)
}

fn pad_to_words(data: &mut Vec<u8>) {
    if data.len() % 2 != 0 {
        log::debug!("Padding odd length {} with a zero byte", data.len());
        data.push(0);
    }
}

/// Create a progress bar with custom phase message
fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn print_throughput(bytes: usize, started: Instant) {
    let secs = started.elapsed().as_secs_f64();
    let rate = if secs > 0.0 { bytes as f64 / secs } else { 0.0 };
    println!(
        "Loaded {} bytes in {:.3} seconds ({:.0} bytes/second)",
        bytes, secs, rate
    );
}

// =============================================================================
// Progress reporting
// =============================================================================

/// Progress reporter using indicatif progress bars
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
        }
    }

    fn create_bar(&mut self, total: u64, phase: &'static str) {
        let pb = self.multi.add(
            create_progress_bar_with_phase(total, phase)
                .unwrap_or_else(|_| ProgressBar::new(total)),
        );
        self.current_bar = Some(pb);
    }

    fn finish(&mut self, message: &str) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(message.to_string());
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        // leave a failed transfer's bar where it stopped
        if let Some(pb) = self.current_bar.take() {
            pb.abandon();
        }
    }
}

impl LoadProgress for IndicatifProgress {
    fn writing(&mut self, total_bytes: usize) {
        self.create_bar(total_bytes as u64, "Writing");
    }

    fn write_progress(&mut self, bytes_written: usize) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(bytes_written as u64);
        }
    }

    fn verifying(&mut self, total_bytes: usize) {
        self.finish("Write complete");
        self.create_bar(total_bytes as u64, "Verifying");
    }

    fn verify_progress(&mut self, bytes_read: usize) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(bytes_read as u64);
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Halt the CPU, load the file into code RAM and boot from it
pub fn run_load(
    device: &mut Device,
    input: &Path,
    full_speed: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_code_file(input)?;
    println!("Chip: {}", device.name());

    let started = Instant::now();
    let mut progress = IndicatifProgress::new();
    device
        .cpu()?
        .load_and_run_with_progress(&data, !full_speed, &mut progress)?;
    progress.finish("Load complete");

    print_throughput(data.len(), started);
    println!(
        "CPU released, running from code RAM at {} speed",
        if full_speed { "full" } else { "half" }
    );
    Ok(())
}

/// Write the file into code RAM at `address`, leaving the CPU alone
pub fn run_code_write(
    device: &mut Device,
    input: &Path,
    address: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_code_file(input)?;
    let image = CodeImage::new(address, &data);
    image.validate(device.profile()?)?;

    let started = Instant::now();
    let mut progress = IndicatifProgress::new();
    let mut loader = device.code_loader()?;
    let verified = loader.verifies();
    loader.load_with_progress(&image, &mut progress)?;
    progress.finish(if verified {
        "Verify complete"
    } else {
        "Write complete"
    });

    print_throughput(data.len(), started);
    if !verified {
        println!("Note: this controller cannot read code RAM back, image not verified");
    }
    Ok(())
}

/// Read `length` bytes of code RAM at `address` into a file
pub fn run_code_read(
    device: &mut Device,
    output: &Path,
    address: u32,
    length: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let code_size = device.profile()?.code_size;
    let length = length.unwrap_or_else(|| code_size.saturating_sub(address)) as usize;

    let data = device.code_loader()?.read_back(address, length)?;
    std::fs::write(output, &data)?;
    println!("Wrote {} bytes of code RAM to {:?}", data.len(), output);
    Ok(())
}
