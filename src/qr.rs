//! Terminal rendering of pairing QR codes.

use anyhow::{Context, Result};
use qrcode::render::unicode::Dense1x2;
use qrcode::{EcLevel, QrCode};

/// Render `code` as half-block characters, two modules per character cell.
///
/// Colors are inverted (light modules drawn as blocks) so the code scans on
/// the usual dark terminal background.
pub fn render(code: &str) -> Result<String> {
    let qr = QrCode::with_error_correction_level(code.as_bytes(), EcLevel::L)
        .context("Failed to encode pairing code as QR")?;

    Ok(qr
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}
