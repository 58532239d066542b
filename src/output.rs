use std::io::{self, Write};

use serde::Serialize;

use crate::app::{
    BuildResult, HubsResult, ListResult, PairAnalysis, PopulateResult, ProgressEvent,
    ProgressSink, SeedReport, SingleAnalysis,
};

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_build(result: &BuildResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_seeds(result: &SeedReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_single(result: &SingleAnalysis) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_pair(result: &PairAnalysis) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_hubs(result: &HubsResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_populate(result: &PopulateResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_json(&mut stdout, value)
    }

    pub fn write_json<W: Write, T: Serialize>(writer: &mut W, value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Progress lines on stderr, keeping stdout for the JSON result.
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("[{:>7.1}s] {}", elapsed.as_secs_f64(), event.message),
            None => eprintln!("{}", event.message),
        }
    }
}
