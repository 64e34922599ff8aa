//! Metadata persistence on the reserved metadata row
//!
//! The record is written twice in one batch: whole, as a checksummed blob,
//! and field by field as text cells. Readers prefer the blob and rebuild from
//! the fields when the blob is missing or fails its checksum.

use crate::error::{Result, VaultError};
use crate::metadata::{Classification, PixelBounds, PyramidMetadata};
use crate::tile::{Bounds, TileBounds};

use super::{Cell, KvStore, BLOB_FAMILY, BLOB_QUALIFIER, METADATA_ROW};

const ZOOM_LEVEL: &str = "zoomLevel";
const BOUNDS: &str = "bounds";
const TILE_BOUNDS: &str = "tileBounds";
const PIXEL_BOUNDS: &str = "pixelBounds";
const BANDS: &str = "bands";
const CLASSIFICATION: &str = "classification";
const DEFAULT_VALUES: &str = "defaultValues";
const IMAGE_STRING: &str = "imageString";
const TILE_SIZE: &str = "tileSize";
const NAME: &str = "name";

/// The full, deterministic mutation set for `metadata`
///
/// Per-zoom fields (`tileBounds`, `pixelBounds`, `imageString`) use the zoom
/// as qualifier; every other field uses the max zoom.
pub fn metadata_mutations(metadata: &PyramidMetadata, visibility: &str) -> Result<Vec<Cell>> {
    let max_zoom = metadata.max_zoom.to_string();
    let cell = |family: &str, qualifier: &str, value: String| {
        Cell::new(METADATA_ROW, family, qualifier, visibility, value.into_bytes())
    };

    let mut mutations = vec![Cell::new(
        METADATA_ROW,
        BLOB_FAMILY,
        BLOB_QUALIFIER,
        visibility,
        metadata.to_blob()?,
    )];

    mutations.push(cell(ZOOM_LEVEL, &max_zoom, max_zoom.clone()));
    mutations.push(cell(BOUNDS, &max_zoom, metadata.bounds.to_string()));
    for (zoom, bounds) in &metadata.tile_bounds {
        mutations.push(cell(TILE_BOUNDS, &zoom.to_string(), bounds.to_string()));
    }
    for (zoom, bounds) in &metadata.pixel_bounds {
        mutations.push(cell(PIXEL_BOUNDS, &zoom.to_string(), bounds.to_string()));
    }
    mutations.push(cell(BANDS, &max_zoom, metadata.bands.to_string()));
    mutations.push(cell(
        CLASSIFICATION,
        &max_zoom,
        metadata.classification.to_string(),
    ));

    let defaults: Vec<String> = metadata.default_values.iter().map(f64::to_string).collect();
    mutations.push(cell(DEFAULT_VALUES, &max_zoom, defaults.join(",")));

    for (zoom, image) in &metadata.image_names {
        mutations.push(cell(IMAGE_STRING, &zoom.to_string(), image.clone()));
    }
    mutations.push(cell(TILE_SIZE, &max_zoom, metadata.tile_size.to_string()));
    mutations.push(cell(NAME, &max_zoom, metadata.name.clone()));

    Ok(mutations)
}

/// Store `metadata` in `table` as one atomic batch
///
/// Every cell carries `visibility`. Safe to retry: the same record always
/// produces the same cells.
pub fn write_metadata<S: KvStore + ?Sized>(
    store: &S,
    table: &str,
    metadata: &PyramidMetadata,
    visibility: &str,
) -> Result<()> {
    let mutations = metadata_mutations(metadata, visibility)?;
    let count = mutations.len();

    store.apply(table, mutations)?;

    tracing::debug!(table, pyramid = %metadata.name, cells = count, "Wrote metadata");
    Ok(())
}

/// Load the metadata stored in `table`
///
/// Uses the blob when it is present and intact, otherwise rebuilds from the
/// field cells. A missing table yields the default record; backend failures
/// propagate.
pub fn read_metadata<S: KvStore + ?Sized>(store: &S, table: &str) -> Result<PyramidMetadata> {
    let cells = match store.scan(table, METADATA_ROW, METADATA_ROW, None) {
        Ok(cells) => cells,
        Err(VaultError::TableNotFound(_)) => {
            tracing::debug!(table, "Metadata table not found, using defaults");
            return Ok(PyramidMetadata::default());
        }
        Err(e) => return Err(e),
    };

    let blob = cells
        .iter()
        .find(|c| c.family == BLOB_FAMILY && c.qualifier == BLOB_QUALIFIER);

    if let Some(blob) = blob {
        match PyramidMetadata::from_blob(&blob.value) {
            Ok(metadata) => return Ok(metadata),
            Err(e) => {
                tracing::warn!(table, error = %e, "Metadata blob unreadable, rebuilding from fields");
            }
        }
    }

    Ok(build_from_fields(&cells))
}

/// Rebuild a record from field cells
///
/// Any subset of fields is accepted. Cells that do not parse are skipped with
/// a warning; unknown families are ignored.
///
/// A rewrite at a new max zoom leaves the previous record's single-valued
/// fields behind under the old qualifier. Cells are applied in ascending
/// numeric qualifier order, so the highest max zoom wins.
pub fn build_from_fields(cells: &[Cell]) -> PyramidMetadata {
    let mut metadata = PyramidMetadata::default();

    let mut ordered: Vec<&Cell> = cells.iter().collect();
    ordered.sort_by_key(|cell| cell.qualifier.parse::<u32>().ok());

    for cell in ordered {
        if let Err(e) = apply_field(&mut metadata, cell) {
            tracing::warn!(
                family = %cell.family,
                qualifier = %cell.qualifier,
                error = %e,
                "Skipping unparseable metadata field"
            );
        }
    }

    metadata
}

fn apply_field(metadata: &mut PyramidMetadata, cell: &Cell) -> Result<()> {
    let value = std::str::from_utf8(&cell.value)
        .map_err(|e| VaultError::Serialization(format!("value is not utf-8: {}", e)))?;

    match cell.family.as_str() {
        ZOOM_LEVEL => metadata.max_zoom = parse(value)?,
        BOUNDS => metadata.bounds = value.parse::<Bounds>()?,
        TILE_BOUNDS => {
            let zoom = parse(&cell.qualifier)?;
            metadata.tile_bounds.insert(zoom, TileBounds::parse(zoom, value)?);
        }
        PIXEL_BOUNDS => {
            let zoom = parse(&cell.qualifier)?;
            metadata.pixel_bounds.insert(zoom, value.parse::<PixelBounds>()?);
        }
        BANDS => metadata.bands = parse(value)?,
        CLASSIFICATION => metadata.classification = value.parse::<Classification>()?,
        DEFAULT_VALUES => {
            metadata.default_values = if value.is_empty() {
                Vec::new()
            } else {
                value
                    .split(',')
                    .map(|v| parse::<f64>(v.trim()))
                    .collect::<Result<_>>()?
            };
        }
        IMAGE_STRING => {
            let zoom = parse(&cell.qualifier)?;
            metadata.image_names.insert(zoom, value.to_string());
        }
        TILE_SIZE => metadata.tile_size = parse(value)?,
        NAME => metadata.name = value.to_string(),
        _ => {}
    }

    Ok(())
}

fn parse<T>(s: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| VaultError::Serialization(format!("{:?}: {}", s, e)))
}
