use std::fs::File;
use std::io::{Read, stdin};
use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::Table;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use flate2::read::GzDecoder;
use spclink::image::{BOOT_STUB_LEN, ComposeOptions, EchoRegion, compose};
use spclink::spc::Snapshot;

/// Read an SPC file into memory, transparently decompressing gzipped input
/// (sniffed by magic bytes). Use '-' for stdin.
pub fn read_spc_as_vec(path: &Path) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    if path.as_os_str() == "-" {
        stdin()
            .read_to_end(&mut raw)
            .context("failed to read stdin")?;
    } else {
        File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?
            .read_to_end(&mut raw)
            .with_context(|| format!("failed to read {}", path.display()))?;
    }

    if raw.len() >= 2 && raw[0] == 0x1F && raw[1] == 0x8B {
        let mut decompressed = Vec::new();
        GzDecoder::new(&raw[..])
            .read_to_end(&mut decompressed)
            .with_context(|| format!("failed to decompress {}", path.display()))?;
        return Ok(decompressed);
    }
    Ok(raw)
}

/// Print a register and ID666 summary for an SPC file.
pub fn info(path: &Path, bytes: &[u8]) -> Result<()> {
    let snapshot: Snapshot = bytes
        .try_into()
        .with_context(|| format!("failed to parse SPC file: {}", path.display()))?;

    println!("=== SPC File: {} ===", path.display());
    println!(
        "PC: {:#06X}  A: {:#04X}  X: {:#04X}  Y: {:#04X}  PSW: {:#04X}  SP: {:#04X}",
        snapshot.pc, snapshot.a, snapshot.x, snapshot.y, snapshot.psw, snapshot.sp
    );
    let echo = EchoRegion::from_dsp(&snapshot.dsp);
    println!("Echo buffer: {:#06X} (+{:#X} bytes)", echo.start, echo.size);
    println!();

    match &snapshot.id666 {
        Some(id666) => {
            let mut table = Table::new();
            table.set_header(vec!["Field", "Value"]);
            let mut row = |field: &str, value: &Option<String>| {
                if let Some(value) = value {
                    table.add_row(vec![field.to_string(), truncate_display(value, 48)]);
                }
            };
            row("Song", &id666.song_title);
            row("Game", &id666.game_title);
            row("Artist", &id666.artist);
            row("Dumper", &id666.dumper);
            row("Date", &id666.dump_date);
            row("Comments", &id666.comments);
            if let Some(seconds) = id666.seconds {
                table.add_row(vec!["Length".to_string(), format!("{} s", seconds)]);
            }
            if let Some(fade_ms) = id666.fade_ms {
                table.add_row(vec!["Fade".to_string(), format!("{} ms", fade_ms)]);
            }
            println!("{table}");
        }
        None => println!("No ID666 metadata."),
    }
    Ok(())
}

/// Dry-run composition: report where the boot stub would land and what the
/// patched stubs look like, without touching any hardware.
pub fn check(path: &Path, bytes: &[u8]) -> Result<()> {
    let snapshot: Snapshot = bytes
        .try_into()
        .with_context(|| format!("failed to parse SPC file: {}", path.display()))?;

    let echo = EchoRegion::from_dsp(&snapshot.dsp);
    let set = compose(&snapshot, &ComposeOptions::default())
        .with_context(|| format!("cannot compose {}", path.display()))?;

    println!("=== Composition for {} ===", path.display());
    println!("Echo buffer:  {:#06X} (+{:#X} bytes)", echo.start, echo.size);
    println!("Boot stub:    {:#06X} ({} bytes)", set.boot_entry, BOOT_STUB_LEN);
    println!("Port values:  {:02X?}", set.port_values);
    println!();
    println!("Boot stub bytes:");
    hex_dump(set.boot_entry as usize, &set.boot_stub);
    println!();
    println!("DSP stub bytes:");
    hex_dump(0, &set.dsp_stub);
    Ok(())
}

fn hex_dump(base: usize, bytes: &[u8]) {
    for (i, row) in bytes.chunks(16).enumerate() {
        let line: Vec<String> = row.iter().map(|b| format!("{:02X}", b)).collect();
        println!("  {:#06X}: {}", base + i * 16, line.join(" "));
    }
}

/// Truncate a tag string to a display width, appending an ellipsis when it
/// does not fit.
fn truncate_display(s: &str, max: usize) -> String {
    if UnicodeWidthStr::width(s) <= max {
        return s.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + cw > max.saturating_sub(1) {
            break;
        }
        out.push(ch);
        width += cw;
    }
    out.push('…');
    out
}
