use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    Warning,
    Skipped,
}

/// Numbered progress lines for the project creation steps.
pub struct ProgressIndicator {
    total: usize,
    started: usize,
    done: usize,
    warned: usize,
    skipped: usize,
    start_time: Instant,
}

impl ProgressIndicator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            started: 0,
            done: 0,
            warned: 0,
            skipped: 0,
            start_time: Instant::now(),
        }
    }

    pub fn start_step(&mut self, name: &str) {
        self.started += 1;
        println!("[{}/{}] {}...", self.started, self.total, name);
    }

    pub fn finish_step(&mut self, status: StepStatus) {
        match status {
            StepStatus::Done => self.done += 1,
            StepStatus::Warning => self.warned += 1,
            StepStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn finish(&self) {
        let elapsed = self.start_time.elapsed();
        println!("\n{}", "=".repeat(60));
        println!("Summary:");
        println!("  Steps:     {}", self.total);
        println!("  Done:      {}", self.done);
        if self.warned > 0 {
            println!("  Warnings:  {}", self.warned);
        }
        if self.skipped > 0 {
            println!("  Skipped:   {}", self.skipped);
        }
        println!("  Duration:  {:.2}s", elapsed.as_secs_f64());
        println!("{}", "=".repeat(60));
    }
}
