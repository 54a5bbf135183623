use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use bant_crypt::MemoryImage;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Render `image` as JSON; unread pages are zero-filled in `data`.
pub fn render(image: &MemoryImage) -> String {
    let data: Vec<u8> = image
        .pages()
        .iter()
        .flat_map(|page| page.unwrap_or_default())
        .collect();

    format!(
        "{{\"uid\": \"{}\", \"complete\": {}, \"pages_read\": {}, \"pages_total\": {}, \"data\": \"{}\"}}\n",
        hex::encode_upper(image.uid()),
        image.is_complete(),
        image.pages_read(),
        image.pages_total(),
        B64.encode(data),
    )
}

/// Write the dump of `image` to `path`, or stdout when no path is given.
pub fn write(image: &MemoryImage, path: Option<&Path>) -> Result<()> {
    let json = render(image);

    match path {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("failed to write dump to {}", path.display()))?;
            log::info!("wrote dump to {}", path.display());
        }
        None => std::io::stdout()
            .write_all(json.as_bytes())
            .context("failed to write dump to stdout")?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_marks_incomplete_and_zero_fills() {
        let image = MemoryImage::new(
            [0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
            vec![Some(*b"BANT"), None],
        );
        assert_eq!(
            render(&image),
            "{\"uid\": \"04112233445566\", \"complete\": false, \"pages_read\": 1, \
             \"pages_total\": 2, \"data\": \"QkFOVAAAAAA=\"}\n"
        );
    }
}
