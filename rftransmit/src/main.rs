/*!
# Telegram Transmit Tool

Transmit-side counterpart of rfgrabber: builds a remote-control command
frame from the command line, renders it through the waveform transmitter
and writes the resulting edge trace as JSON.

The trace carries the exact wire timing, so `rfgrabber capture --replay`
decodes it like a live signal. Driving a physical pin instead only takes
swapping the recording rig for a line/clock pair backed by real
hardware; the waveform code is identical.

## Usage

```bash
rftransmit --station-id 0x200A55A --state on --output trace.json
rftransmit --station-id 0x200A55A --state off --unit 2 --repeats 6 > trace.json
```
*/

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;

use shared::frame::parse_station_id;
use shared::protocol::DEFAULT_REPEATS;
use shared::{Edge, Frame, MonotonicClock, RecordingLine, VirtualClock, WaveformTransmitter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SwitchState {
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "rftransmit")]
#[command(about = "OOK remote-control transmitter: frame to timed edge trace")]
#[command(version)]
struct Cli {
    /// Station identifier, decimal or 0x-prefixed hex (26 bits)
    #[arg(long, value_parser = parse_station_id)]
    station_id: u32,

    /// Address the whole group instead of a single unit
    #[arg(long)]
    group: bool,

    /// Switch the addressed unit on or off
    #[arg(long, value_enum, default_value_t = SwitchState::On)]
    state: SwitchState,

    /// Channel selector (2 bits); Nexa remotes use 3
    #[arg(long, default_value_t = 3)]
    channel: u8,

    /// Unit selector (2 bits); Nexa unit #1 is 3, #2 is 2, #3 is 1
    #[arg(long, default_value_t = 3)]
    unit: u8,

    /// Telegrams to send; receivers expect several per keypress
    #[arg(long, default_value_t = DEFAULT_REPEATS)]
    repeats: u32,

    /// Trace output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Log to stderr so stdout stays clean for the trace
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    if cli.repeats == 0 {
        anyhow::bail!("--repeats must be at least 1");
    }

    let frame = Frame::new(
        cli.station_id,
        cli.group,
        cli.state == SwitchState::Off,
        cli.channel,
        cli.unit,
    )
    .context("invalid frame fields")?;

    let edges = render_trace(&frame, cli.repeats);
    let duration_micros = edges.last().map(|e| e.at_micros).unwrap_or(0);
    info!(
        "📡 Rendered {} telegram(s): {} ({} edges, {:.1}ms)",
        cli.repeats,
        frame,
        edges.len(),
        duration_micros as f64 / 1000.0
    );

    match cli.output {
        Some(path) => {
            let mut writer = BufWriter::new(
                File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?,
            );
            serde_json::to_writer(&mut writer, &edges)?;
            writer.flush()?;
            info!("💾 Trace written to {}", path.display());
        }
        None => {
            println!("{}", serde_json::to_string(&edges)?);
        }
    }

    Ok(())
}

/// Render `repeats` telegrams on the recording rig.
///
/// A receiver only classifies a pause once the line rises again, which on
/// the air is the next keypress's sync. The trace ends with that rising
/// edge so the final telegram stays decodable on replay.
fn render_trace(frame: &Frame, repeats: u32) -> Vec<Edge> {
    let clock = VirtualClock::new();
    let mut transmitter = WaveformTransmitter::new(RecordingLine::new(clock.clone()), clock.clone());
    transmitter.transmit_repeated(frame, repeats);

    let mut edges = transmitter.into_line().take_edges();
    edges.push(Edge {
        level: true,
        at_micros: clock.now_micros(),
    });
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::T_MICROS;

    #[test]
    fn test_render_trace_shape() {
        let frame = Frame::new(0x200A55A, false, true, 3, 3).unwrap();
        let edges = render_trace(&frame, 2);

        // Two telegrams of 132 edges plus the closing rise
        assert_eq!(edges.len(), 2 * 132 + 1);
        assert!(edges[0].level);
        assert_eq!(edges[0].at_micros, 0);
        assert!(edges.last().unwrap().level);
        assert_eq!(edges.last().unwrap().at_micros, 2 * 308 * T_MICROS);
    }

    #[test]
    fn test_trace_serializes_to_json() {
        let frame = Frame::new(1, false, false, 0, 0).unwrap();
        let edges = render_trace(&frame, 1);
        let json = serde_json::to_string(&edges).unwrap();
        let parsed: Vec<Edge> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, edges);
    }
}
