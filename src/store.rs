//! Pyramid Store Module
//!
//! File-tree facade over segments, split indexes, stitching and metadata.
//!
//! ## Responsibilities
//! - Write tiles as new segments and keep each level's split index current
//! - Load (and, when empty, regenerate) split indexes
//! - Plan stitched multi-pyramid jobs and execute one partition of a plan
//! - Read and write pyramid metadata through the metadata cache

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::index::{RangeIndex, SegmentInfo, INDEX_FILENAME};
use crate::kv::{self, KvStore};
use crate::metadata::{MetadataCache, PyramidMetadata};
use crate::raster::RasterBlock;
use crate::stitch::{stitch, StitchInput, StitchedPartition};
use crate::storage::SegmentManager;
use crate::tile::{tile_coords, TileBounds, TileId, TileRange};

/// (pyramid, zoom)
type LevelKey = (String, u32);

/// The file-backed pyramid store
///
/// ## Concurrency Model
/// - Level managers and loaded indexes are cached behind RwLocks until
///   `refresh`; other processes' writes are not observed before that
/// - Segment readers lock their own file handle, so reads run concurrently
/// - Writes to one level are expected from a single writer
pub struct PyramidStore {
    config: Config,

    /// Open segment managers, one per level directory
    levels: RwLock<HashMap<LevelKey, Arc<SegmentManager>>>,

    /// Loaded split indexes
    indexes: RwLock<HashMap<LevelKey, Arc<RangeIndex>>>,

    metadata_cache: MetadataCache,
}

impl PyramidStore {
    const METADATA_FILENAME: &'static str = "metadata.bin";

    /// Open or create a store rooted at `config.data_dir`
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let metadata_cache =
            MetadataCache::new(config.metadata_cache_capacity, config.metadata_cache_ttl);

        tracing::info!(data_dir = %config.data_dir.display(), "Opened pyramid store");

        Ok(Self {
            config,
            levels: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
            metadata_cache,
        })
    }

    /// Open with default config and the given data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    // =========================================================================
    // Tiles
    // =========================================================================

    /// Write `tiles` as one new segment of `pyramid` at `zoom`
    ///
    /// Tiles may arrive in any order but ids must be distinct, on the zoom's
    /// grid, and outside every existing segment's range. The level's split
    /// index is regenerated afterwards. An empty batch writes nothing.
    pub fn write_tiles(
        &self,
        pyramid: &str,
        zoom: u32,
        tiles: impl IntoIterator<Item = (TileId, RasterBlock)>,
    ) -> Result<Option<SegmentInfo>> {
        let mut encoded: Vec<(TileId, Bytes)> = Vec::new();
        for (tile_id, raster) in tiles {
            tile_coords(zoom, tile_id)?;
            encoded.push((tile_id, raster.into_bytes()));
        }
        if encoded.is_empty() {
            return Ok(None);
        }

        encoded.sort_by_key(|(tile_id, _)| *tile_id);
        if let Some(pair) = encoded.windows(2).find(|p| p[0].0 == p[1].0) {
            return Err(VaultError::Storage(format!(
                "duplicate tile {} in batch for {} zoom {}",
                pair[0].0, pyramid, zoom
            )));
        }

        let level = self.level(pyramid, zoom)?;
        let batch = TileRange::new(encoded[0].0, encoded[encoded.len() - 1].0);
        if let Some(existing) = level
            .segment_infos()
            .into_iter()
            .find(|s| batch.intersects(&TileRange::new(s.min_tile, s.max_tile)))
        {
            return Err(VaultError::InconsistentSegments(format!(
                "new tiles [{}, {}] overlap segment {} [{}, {}]",
                batch.start, batch.end, existing.name, existing.min_tile, existing.max_tile
            )));
        }

        let segment = level.write_segment(&encoded)?;
        self.regenerate_index(pyramid, zoom)?;

        Ok(segment.map(|s| s.info()))
    }

    /// Read one tile through the level's split index
    pub fn read_tile(&self, pyramid: &str, zoom: u32, tile_id: TileId) -> Result<RasterBlock> {
        let index = self.load_index(pyramid, zoom)?;
        let entry = index.lookup(tile_id)?;

        let level = self.level(pyramid, zoom)?;
        let reader = level.reader(&entry.segment).ok_or_else(|| {
            VaultError::Storage(format!(
                "split index names missing segment {} in {}",
                entry.segment,
                level.level_dir().display()
            ))
        })?;

        let raster = reader
            .get(tile_id)?
            .ok_or(VaultError::TileNotFound(tile_id))?;
        RasterBlock::deserialize(&raster)
    }

    // =========================================================================
    // Split Indexes
    // =========================================================================

    /// Rebuild a level's split index from its segments and persist it
    pub fn regenerate_index(&self, pyramid: &str, zoom: u32) -> Result<Arc<RangeIndex>> {
        let level = self.level(pyramid, zoom)?;
        let index = RangeIndex::generate(zoom, level.segment_infos())?;
        index.persist(&level.level_dir().join(INDEX_FILENAME))?;

        tracing::info!(pyramid, zoom, entries = index.len(), "Regenerated split index");

        let index = Arc::new(index);
        self.indexes
            .write()
            .insert((pyramid.to_string(), zoom), Arc::clone(&index));
        Ok(index)
    }

    /// The level's split index
    ///
    /// Served from memory after the first load, for the lifetime of this
    /// store: segments written by another process stay invisible until
    /// [`PyramidStore::refresh`]. An empty or missing index file is
    /// regenerated from the segments when `Config::regenerate_empty_index`
    /// is set; a level that does not exist yields an empty index.
    pub fn load_index(&self, pyramid: &str, zoom: u32) -> Result<Arc<RangeIndex>> {
        let key = (pyramid.to_string(), zoom);
        if let Some(index) = self.indexes.read().get(&key) {
            return Ok(Arc::clone(index));
        }

        let level_dir = self.level_dir(pyramid, zoom)?;
        if !level_dir.is_dir() {
            tracing::debug!(pyramid, zoom, "No such level, using empty index");
            return Ok(Arc::new(RangeIndex::empty(zoom)));
        }

        let index = RangeIndex::load(zoom, &level_dir.join(INDEX_FILENAME))?;
        if index.is_empty() && self.config.regenerate_empty_index {
            return self.regenerate_index(pyramid, zoom);
        }

        let index = Arc::new(index);
        self.indexes.write().insert(key, Arc::clone(&index));
        Ok(index)
    }

    /// Drop the cached segment list and split index of one level
    ///
    /// The next access rediscovers segments and reloads `splits.idx` from
    /// disk.
    pub fn refresh(&self, pyramid: &str, zoom: u32) {
        let key = (pyramid.to_string(), zoom);
        self.levels.write().remove(&key);
        self.indexes.write().remove(&key);
        tracing::debug!(pyramid, zoom, "Dropped cached level");
    }

    /// Zoom levels present for `pyramid`, ascending
    pub fn levels(&self, pyramid: &str) -> Result<Vec<u32>> {
        let dir = self.pyramid_dir(pyramid)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut zooms = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(zoom) = entry.file_name().to_str().and_then(|n| n.parse().ok()) {
                    zooms.push(zoom);
                }
            }
        }
        zooms.sort_unstable();
        Ok(zooms)
    }

    // =========================================================================
    // Stitched Jobs
    // =========================================================================

    /// Plan a job reading `inputs` at `zoom`, earliest input winning overlaps
    pub fn plan(
        &self,
        inputs: &[&str],
        zoom: u32,
        crop: Option<&TileBounds>,
    ) -> Result<Vec<StitchedPartition>> {
        let inputs = inputs
            .iter()
            .map(|name| {
                let index = self.load_index(name, zoom)?;
                Ok(StitchInput::new(*name, RangeIndex::clone(&index)))
            })
            .collect::<Result<Vec<_>>>()?;

        stitch(&inputs, crop)
    }

    /// Execute one partition: the tiles it owns, ascending
    pub fn read_partition(&self, partition: &StitchedPartition) -> Result<Vec<(TileId, RasterBlock)>> {
        let entry = partition.entry();
        let level = self.level(partition.input_name(), partition.zoom())?;
        let reader = level.reader(&entry.segment).ok_or_else(|| {
            VaultError::Storage(format!(
                "partition {} of {} names missing segment {}",
                entry.partition,
                partition.input_name(),
                entry.segment
            ))
        })?;

        let mut tiles = Vec::new();
        for range in partition.owned_ranges() {
            for item in reader.iter_range(range)? {
                let (tile_id, raster) = item?;
                if partition.should_emit(tile_id) {
                    tiles.push((tile_id, RasterBlock::deserialize(&raster)?));
                }
            }
        }

        tracing::debug!(
            pyramid = partition.input_name(),
            partition = entry.partition,
            tiles = tiles.len(),
            "Read partition"
        );
        Ok(tiles)
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Persist `metadata` for `pyramid` and refresh the cache
    pub fn write_metadata(&self, pyramid: &str, metadata: &PyramidMetadata) -> Result<()> {
        let dir = self.pyramid_dir(pyramid)?;
        fs::create_dir_all(&dir)?;

        let path = dir.join(Self::METADATA_FILENAME);
        let tmp_path = path.with_extension("bin.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&metadata.to_blob()?)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        self.metadata_cache.insert(pyramid, metadata.clone());
        tracing::debug!(pyramid, "Wrote metadata");
        Ok(())
    }

    /// Metadata for `pyramid`, cached
    ///
    /// A pyramid without stored metadata yields the default record.
    pub fn read_metadata(&self, pyramid: &str) -> Result<Arc<PyramidMetadata>> {
        let path = self.pyramid_dir(pyramid)?.join(Self::METADATA_FILENAME);

        self.metadata_cache.get_or_load(pyramid, || match fs::read(&path) {
            Ok(blob) => PyramidMetadata::from_blob(&blob),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(PyramidMetadata::default()),
            Err(e) => Err(e.into()),
        })
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Copy a pyramid's metadata and every level's tiles into a key-value table
    ///
    /// Cells carry `Config::default_visibility`. Each level is one atomic
    /// batch per segment. Returns the number of tiles written.
    pub fn export_to_kv<S: KvStore + ?Sized>(&self, pyramid: &str, kv_store: &S, table: &str) -> Result<u64> {
        let visibility = self.config.default_visibility.as_str();
        let metadata = self.read_metadata(pyramid)?;
        kv::write_metadata(kv_store, table, &metadata, visibility)?;

        let mut written = 0u64;
        for zoom in self.levels(pyramid)? {
            let index = self.load_index(pyramid, zoom)?;
            let level = self.level(pyramid, zoom)?;

            for entry in index.iter() {
                let reader = level.reader(&entry.segment).ok_or_else(|| {
                    VaultError::Storage(format!("split index names missing segment {}", entry.segment))
                })?;

                let mut batch = Vec::new();
                for item in reader.iter_range(entry.range())? {
                    let (tile_id, raster) = item?;
                    batch.push((tile_id, RasterBlock::deserialize(&raster)?));
                }
                kv::write_tiles(kv_store, table, zoom, &batch, visibility)?;
                written += batch.len() as u64;
            }
        }

        tracing::info!(pyramid, table, tiles = written, "Exported pyramid");
        Ok(written)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn metadata_cache(&self) -> &MetadataCache {
        &self.metadata_cache
    }

    /// Open (or reuse) the segment manager of one level
    pub fn level(&self, pyramid: &str, zoom: u32) -> Result<Arc<SegmentManager>> {
        let key = (pyramid.to_string(), zoom);
        if let Some(level) = self.levels.read().get(&key) {
            return Ok(Arc::clone(level));
        }

        let mut levels = self.levels.write();
        if let Some(level) = levels.get(&key) {
            return Ok(Arc::clone(level));
        }
        let level = Arc::new(SegmentManager::open(&self.level_dir(pyramid, zoom)?)?);
        levels.insert(key, Arc::clone(&level));
        Ok(level)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn pyramid_dir(&self, pyramid: &str) -> Result<PathBuf> {
        let valid = !pyramid.is_empty()
            && pyramid != "."
            && pyramid != ".."
            && !pyramid.contains(['/', '\\']);
        if !valid {
            return Err(VaultError::Config(format!(
                "invalid pyramid name: {:?}",
                pyramid
            )));
        }
        Ok(self.config.data_dir.join(pyramid))
    }

    fn level_dir(&self, pyramid: &str, zoom: u32) -> Result<PathBuf> {
        Ok(self.pyramid_dir(pyramid)?.join(zoom.to_string()))
    }
}
