use std::io::{self, Write};

use crate::engine::EntityKind;
use crate::unify::{format_count, CanonicalResult};

/// Consumes a finished batch of canonical results.
///
/// The pipeline never depends on how results are shown; this is the whole
/// contract between the two.
pub trait ResultSink {
    fn render(&mut self, results: &[CanonicalResult]);

    fn render_empty(&mut self, message: &str);
}

/// Plain-text card renderer for the CLI
pub struct TextRenderer<W: Write> {
    out: W,
}

impl TextRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write_result(&mut self, index: usize, result: &CanonicalResult) -> io::Result<()> {
        writeln!(
            self.out,
            "{}. {} — {} [{}]",
            index + 1,
            result.title,
            result.artist_label(),
            result.kind
        )?;

        if result.kind != EntityKind::Artist {
            let album = result.album.as_deref().unwrap_or("Unknown Album");
            write!(self.out, "   album: {}", album)?;
            if let Some(duration) = &result.duration {
                write!(self.out, "   duration: {}", duration)?;
            }
            writeln!(self.out)?;
        }

        if let Some(pop) = result.popularity {
            writeln!(self.out, "   {}: {}", pop.kind, format_count(pop.value))?;
        }

        if let Some(isrc) = &result.isrc {
            writeln!(self.out, "   isrc: {}", isrc)?;
        }

        for (platform, url) in result.links.entries() {
            writeln!(self.out, "   {:<14} {}", platform, url)?;
        }

        writeln!(self.out)
    }
}

impl<W: Write> ResultSink for TextRenderer<W> {
    fn render(&mut self, results: &[CanonicalResult]) {
        for (index, result) in results.iter().enumerate() {
            if self.write_result(index, result).is_err() {
                // stdout is gone; nothing sensible left to do
                return;
            }
        }
    }

    fn render_empty(&mut self, message: &str) {
        let _ = writeln!(self.out, "{}", message);
    }
}

/// Machine-readable renderer, one JSON array on stdout
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl JsonRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ResultSink for JsonRenderer<W> {
    fn render(&mut self, results: &[CanonicalResult]) {
        if let Ok(body) = serde_json::to_string_pretty(results) {
            let _ = writeln!(self.out, "{}", body);
        }
    }

    fn render_empty(&mut self, _message: &str) {
        let _ = writeln!(self.out, "[]");
    }
}
