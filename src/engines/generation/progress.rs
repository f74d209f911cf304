use super::evolution_engine::{GenerationRecord, ProgressCallback, RunReport};
use log::info;
use std::sync::mpsc::Sender;

/// Reports progress through the `log` facade
pub struct ConsoleProgressCallback {
    /// Log every n-th generation
    every: usize,
}

impl ConsoleProgressCallback {
    pub fn new(every: usize) -> Self {
        Self { every: every.max(1) }
    }
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_run_start(&mut self, run: usize) {
        info!("Run {} starting...", run + 1);
    }

    fn on_generation_complete(&mut self, record: &GenerationRecord) {
        if record.generation % self.every == 0 {
            info!(
                "Generation {} complete. Evaluations: {}, average: {:.4}, best: {:.4}",
                record.generation, record.evaluations, record.average_primary, record.best_primary
            );
        }
    }

    fn on_run_complete(&mut self, report: &RunReport) {
        info!(
            "Run {} complete after {} generations. Best: {}",
            report.run + 1,
            report.generations.len(),
            report.best
        );
    }
}

/// Progress forwarded to another thread
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    RunStart(usize),
    GenerationComplete(GenerationRecord),
    RunComplete { run: usize, evaluations: usize, best_primary: f64 },
}

pub struct ChannelProgressCallback {
    sender: Sender<ProgressMessage>,
}

impl ChannelProgressCallback {
    pub fn new(sender: Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_run_start(&mut self, run: usize) {
        let _ = self.sender.send(ProgressMessage::RunStart(run));
    }

    fn on_generation_complete(&mut self, record: &GenerationRecord) {
        let _ = self
            .sender
            .send(ProgressMessage::GenerationComplete(record.clone()));
    }

    fn on_run_complete(&mut self, report: &RunReport) {
        let _ = self.sender.send(ProgressMessage::RunComplete {
            run: report.run,
            evaluations: report.evaluations,
            best_primary: report.best.objectives.primary,
        });
    }
}
