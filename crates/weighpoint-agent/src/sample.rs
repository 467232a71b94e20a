//! Weight sample sources and the scale line parser.
//!
//! Serial scales speak a zoo of line formats: `ST,GS,+  12.345 g`,
//! `12.345 kg`, or a bare number. Every format is normalised to grams
//! before it reaches the stability detector.

use std::{
  fs::File,
  io::{BufRead, BufReader},
  path::Path,
};

use anyhow::{Context, Result, bail};
use regex::Regex;

/// One gross reading in grams, or `None` when the device produced a line
/// with no usable weight in it.
pub trait SampleSource: Send {
  fn next_sample(&mut self) -> Result<Option<f64>>;
}

// ─── Parsing ──────────────────────────────────────────────────────────────────

/// Parses raw scale output lines into grams.
pub struct WeightParser {
  with_unit: Regex,
  bare:      Regex,
}

impl WeightParser {
  pub fn new() -> Self {
    // Unwraps are fine: both patterns are fixed and known-good.
    Self {
      with_unit: Regex::new(r"(?i)([+-]?\d+\.?\d*)\s*(g|kg|lb|oz)\b").unwrap(),
      bare:      Regex::new(r"([+-]?\d+\.?\d*)").unwrap(),
    }
  }

  /// Extract a weight in grams from one line of scale output.
  pub fn parse_grams(&self, line: &str) -> Option<f64> {
    if let Some(caps) = self.with_unit.captures(line) {
      let value: f64 = caps[1].parse().ok()?;
      let factor = match caps[2].to_ascii_lowercase().as_str() {
        "g" => 1.0,
        "kg" => 1000.0,
        "lb" => 453.592,
        "oz" => 28.3495,
        _ => return None,
      };
      return Some(value * factor);
    }
    // Fall back to the last bare number on the line (status prefixes like
    // `ST,GS,` put the weight in the final field).
    self
      .bare
      .captures_iter(line)
      .last()
      .and_then(|caps| caps[1].parse().ok())
  }
}

impl Default for WeightParser {
  fn default() -> Self { Self::new() }
}

// ─── Device source ────────────────────────────────────────────────────────────

/// Reads newline-delimited scale output from a device file.
pub struct DeviceLineSource {
  reader: BufReader<File>,
  parser: WeightParser,
}

impl DeviceLineSource {
  pub fn open(path: &Path) -> Result<Self> {
    let file = File::open(path)
      .with_context(|| format!("failed to open scale device {path:?}"))?;
    Ok(Self {
      reader: BufReader::new(file),
      parser: WeightParser::new(),
    })
  }
}

impl SampleSource for DeviceLineSource {
  fn next_sample(&mut self) -> Result<Option<f64>> {
    let mut line = String::new();
    let read = self
      .reader
      .read_line(&mut line)
      .context("failed to read from scale device")?;
    if read == 0 {
      bail!("scale device closed the stream");
    }
    Ok(self.parser.parse_grams(line.trim()))
  }
}

// ─── Simulated source ─────────────────────────────────────────────────────────

/// Cycles through a fixed list of readings; stands in for a real scale in
/// development.
pub struct SimulatedSource {
  values: Vec<f64>,
  cursor: usize,
}

impl SimulatedSource {
  pub fn new(values: Vec<f64>) -> Result<Self> {
    if values.is_empty() {
      bail!("simulated source needs at least one value");
    }
    Ok(Self { values, cursor: 0 })
  }
}

impl SampleSource for SimulatedSource {
  fn next_sample(&mut self) -> Result<Option<f64>> {
    let value = self.values[self.cursor % self.values.len()];
    self.cursor += 1;
    Ok(Some(value))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_plain_grams() {
    let parser = WeightParser::new();
    assert_eq!(parser.parse_grams("12.345 g"), Some(12.345));
    assert_eq!(parser.parse_grams("-0.02g"), Some(-0.02));
  }

  #[test]
  fn converts_other_units_to_grams() {
    let parser = WeightParser::new();
    assert_eq!(parser.parse_grams("1.5 kg"), Some(1500.0));
    assert_eq!(parser.parse_grams("1 lb"), Some(453.592));
    assert_eq!(parser.parse_grams("2 OZ"), Some(56.699));
  }

  #[test]
  fn parses_status_prefixed_lines() {
    let parser = WeightParser::new();
    assert_eq!(parser.parse_grams("ST,GS,+  12.345 g"), Some(12.345));
    // No unit: last number on the line wins.
    assert_eq!(parser.parse_grams("ST,GS,   47.20"), Some(47.20));
  }

  #[test]
  fn parses_bare_numbers() {
    let parser = WeightParser::new();
    assert_eq!(parser.parse_grams("47.2"), Some(47.2));
    assert_eq!(parser.parse_grams("+0.00"), Some(0.0));
  }

  #[test]
  fn garbage_lines_yield_nothing() {
    let parser = WeightParser::new();
    assert_eq!(parser.parse_grams(""), None);
    assert_eq!(parser.parse_grams("ERR: overload"), None);
  }

  #[test]
  fn simulated_source_cycles() {
    let mut source = SimulatedSource::new(vec![1.0, 2.0]).unwrap();
    assert_eq!(source.next_sample().unwrap(), Some(1.0));
    assert_eq!(source.next_sample().unwrap(), Some(2.0));
    assert_eq!(source.next_sample().unwrap(), Some(1.0));
  }

  #[test]
  fn empty_simulation_is_rejected() {
    assert!(SimulatedSource::new(vec![]).is_err());
  }
}
