use anyhow::Context;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use time::{macros::format_description, OffsetDateTime};

/// Text of the certificate, top to bottom. Kept separate from rendering so
/// the wording is testable without decoding a PDF.
pub fn lines(
    participant: &str,
    event_title: &str,
    event_date: OffsetDateTime,
) -> anyhow::Result<Vec<String>> {
    let format = format_description!("[month repr:long] [day], [year] [hour]:[minute] UTC");
    let date = event_date.format(&format).context("format event date")?;
    Ok(vec![
        "Certificate of Participation".to_string(),
        format!("This certifies that {participant} attended the event: {event_title}"),
        format!("Event date: {date}"),
        "Thank you for attending!".to_string(),
    ])
}

/// Renders a one-page landscape A4 certificate. Builtin Helvetica keeps the
/// renderer free of font files on disk.
pub fn render(
    participant: &str,
    event_title: &str,
    event_date: OffsetDateTime,
) -> anyhow::Result<Vec<u8>> {
    let lines = lines(participant, event_title, event_date)?;

    let (doc, page, layer) = PdfDocument::new(
        "Certificate of Participation",
        Mm(297.0),
        Mm(210.0),
        "certificate",
    );
    let title_font = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| anyhow::anyhow!("load builtin font: {e}"))?;
    let body_font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| anyhow::anyhow!("load builtin font: {e}"))?;

    let layer = doc.get_page(page).get_layer(layer);
    for (i, line) in lines.iter().enumerate() {
        let (font, size) = if i == 0 {
            (&title_font, 26.0)
        } else {
            (&body_font, 16.0)
        };
        let y = Mm(150.0 - 22.0 * i as f32);
        layer.use_text(line.clone(), size, Mm(30.0), y, font);
    }

    doc.save_to_bytes()
        .map_err(|e| anyhow::anyhow!("render certificate pdf: {e}"))
}
