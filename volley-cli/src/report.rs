use anyhow::Context;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use volley_core::{FinalReport, RunConfig};

const BODY_PREVIEW_CHARS: usize = 50;

/// Writes the end-of-run report to the terminal or to a file.
pub struct Reporter {
    out: Box<dyn Write>,
    output: Option<String>,
}

impl Reporter {
    /// `None`, an empty path and `"stdout"` all mean the terminal.
    pub fn open(output: Option<&str>) -> anyhow::Result<Self> {
        match output {
            None | Some("") | Some("stdout") => Ok(Self {
                out: Box::new(io::stdout()),
                output: None,
            }),
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("failed to create output file {path:?}"))?;
                Ok(Self {
                    out: Box::new(BufWriter::new(file)),
                    output: Some(path.to_string()),
                })
            }
        }
    }

    pub fn write(&mut self, config: &RunConfig, report: &FinalReport) -> io::Result<()> {
        if !config.quiet() {
            write_config(&mut self.out, config, self.output.as_deref())?;
            writeln!(self.out)?;
        }
        write_final(&mut self.out, report)?;
        self.out.flush()
    }
}

fn write_config<W: Write>(w: &mut W, config: &RunConfig, output: Option<&str>) -> io::Result<()> {
    writeln!(w, "Started stress test with the following configuration:")?;
    writeln!(w, "   URL:          {}", config.url())?;
    writeln!(w, "   Method:       {}", config.method())?;
    if !config.raw_headers().is_empty() {
        writeln!(w, "   Headers:      {:?}", config.raw_headers())?;
    }
    if !config.body().is_empty() {
        writeln!(w, "   Body:         {:?}", body_preview(config.body()))?;
    }
    writeln!(w, "   Concurrency:  {} workers", config.concurrency())?;
    match config.rate() {
        Some(rate) => writeln!(w, "   Rate:         {rate} RPS")?,
        None => writeln!(w, "   Rate:         unlimited (burst)")?,
    }
    let stop = config.stop();
    if let Some(duration) = stop.duration() {
        writeln!(w, "   Duration:     {}", humantime::format_duration(duration))?;
    }
    if let Some(total) = stop.budget() {
        writeln!(w, "   Total:        {total} requests")?;
    }
    writeln!(
        w,
        "   Timeout:      {}",
        humantime::format_duration(config.timeout())
    )?;
    writeln!(w, "   Keep-alive:   {}", config.keep_alive())?;
    if let Some(output) = output {
        writeln!(w, "   Output:       {output}")?;
    }
    Ok(())
}

fn write_final<W: Write>(w: &mut W, report: &FinalReport) -> io::Result<()> {
    let counters = report.counters;
    writeln!(w, "\nFinal Report")?;
    writeln!(w, "==============")?;
    writeln!(w, "Total Requests:    {}", counters.total)?;
    writeln!(
        w,
        "Successful:        {} ({:.2}%)",
        counters.success,
        report.success_rate * 100.
    )?;
    writeln!(
        w,
        "Failed:            {} ({:.2}%)",
        counters.failed,
        report.failure_rate() * 100.
    )?;
    writeln!(w, "Duration:          {:.3} s", report.duration.as_secs_f64())?;
    writeln!(w, "Avg RPS:           {:.2}", report.rps)?;

    if counters.total == 0 {
        return writeln!(w, "Latency:           N/A (no completed requests)");
    }
    let latency = &report.latency;
    writeln!(w, "Avg Latency:       {:.2} ms", latency.avg_ms)?;
    writeln!(w, "Min Latency:       {:.2} ms", latency.min_ms)?;
    writeln!(w, "Max Latency:       {:.2} ms", latency.max_ms)?;
    writeln!(w, "P95 Latency:       {:.2} ms", latency.p95_ms)?;
    writeln!(w, "P99 Latency:       {:.2} ms", latency.p99_ms)
}

fn body_preview(body: &[u8]) -> String {
    let body = String::from_utf8_lossy(body);
    if body.chars().count() > BODY_PREVIEW_CHARS {
        let mut preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        preview.push_str("...");
        preview
    } else {
        body.into_owned()
    }
}
