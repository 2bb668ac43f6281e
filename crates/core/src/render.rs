//! PNG preview of a map document.
//!
//! Tile layers are drawn in document order; each non-empty cell is cropped
//! from its tileset image and alpha-composited over what is already there.

use std::collections::HashMap;
use std::path::PathBuf;

use image::{imageops, RgbaImage};

use crate::catalog::TileCatalog;
use crate::document::TiledDocument;
use crate::{Error, Result};

/// Render every tile layer of `doc` using the tiles in `catalog`.
pub fn render_document(doc: &TiledDocument, catalog: &TileCatalog) -> Result<RgbaImage> {
    let mut out = RgbaImage::new(doc.width * doc.tilewidth, doc.height * doc.tileheight);
    let mut sheets: HashMap<PathBuf, RgbaImage> = HashMap::new();

    for layer in doc.tile_layers() {
        for (x, y, gid) in layer.tiles() {
            let source = catalog.locate(gid).ok_or(Error::UnknownTile(gid))?;
            if !sheets.contains_key(&source.image) {
                log::debug!("Loading spritesheet {}", source.image.display());
                let sheet = image::open(&source.image)?.to_rgba8();
                sheets.insert(source.image.clone(), sheet);
            }
            let Some(sheet) = sheets.get(&source.image) else {
                continue;
            };
            let tile =
                imageops::crop_imm(sheet, source.x, source.y, source.width, source.height)
                    .to_image();
            imageops::overlay(
                &mut out,
                &tile,
                i64::from(x * doc.tilewidth),
                i64::from(y * doc.tileheight),
            );
        }
    }

    Ok(out)
}
