//! Render frames and their persistence.
//!
//! [`JsonLinesRenderer`] implements every renderer trait by writing one JSON
//! object per frame. [`write_records`] exports bucket views as CSV.

use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use tracing::{debug, error};

use crate::analyzers::types::{RadarSeries, StudentActivity};
use crate::coordinator::{Notifier, ProfileRenderer, RadarRenderer};
use csv::WriterBuilder;

/// Everything a renderer can be asked to show. Each frame fully replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    RadarInit { mount: String },
    Radar(RadarSeries),
    Profile(StudentActivity),
    ProfileClear,
    Alert { message: String },
}

/// Writes each frame as a single JSON line.
pub struct JsonLinesRenderer<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn emit(&mut self, frame: &Frame) {
        if let Err(e) = write_frame(&mut self.writer, frame) {
            error!(error = %e, "Failed to write frame");
        }
    }
}

fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<()> {
    serde_json::to_writer(&mut *writer, frame)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

impl<W: Write> RadarRenderer for JsonLinesRenderer<W> {
    fn init(&mut self, mount: &str) {
        self.emit(&Frame::RadarInit {
            mount: mount.to_string(),
        });
    }

    fn update(&mut self, labels: &[String], personal: &[f64], class_average: &[f64]) {
        self.emit(&Frame::Radar(RadarSeries {
            labels: labels.to_vec(),
            personal: personal.to_vec(),
            class_average: class_average.to_vec(),
        }));
    }
}

impl<W: Write> ProfileRenderer for JsonLinesRenderer<W> {
    fn update(&mut self, activity: &StudentActivity) {
        self.emit(&Frame::Profile(activity.clone()));
    }

    fn clear(&mut self) {
        self.emit(&Frame::ProfileClear);
    }
}

impl<W: Write> Notifier for JsonLinesRenderer<W> {
    fn alert(&mut self, message: &str) {
        self.emit(&Frame::Alert {
            message: message.to_string(),
        });
    }
}

/// Prints a frame to stdout as pretty-printed JSON.
pub fn print_json(frame: &Frame) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(frame)?);
    Ok(())
}

/// Writes `rows` to a new CSV file at `path`, replacing any existing file.
pub fn write_records<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    debug!(path, rows = rows.len(), "Writing CSV records");

    let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}
