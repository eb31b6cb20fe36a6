use cams3_core::{
    CardType, DirEntry, DriverError, DriverResult, SpiBusConfig, VolumeDriver, WriteMode,
};
use std::collections::{BTreeMap, BTreeSet};

/// Parent directory of an absolute volume path (`/a/b` -> `/a`, `/a` -> `/`)
fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

/// In-memory FAT volume
#[derive(Debug)]
pub struct SimVolume {
    card: CardType,
    capacity: u64,
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    bus: Option<SpiBusConfig>,
    mounted: bool,
    attach_error: Option<DriverError>,
    mount_error: Option<DriverError>,
    short_write: Option<usize>,
    fail_open: bool,
    write_calls: u32,
}

impl Default for SimVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl SimVolume {
    /// 16 GiB SDHC card
    pub fn new() -> Self {
        Self {
            card: CardType::Sdhc,
            capacity: 16 * 1024 * 1024 * 1024,
            files: BTreeMap::new(),
            dirs: BTreeSet::new(),
            bus: None,
            mounted: false,
            attach_error: None,
            mount_error: None,
            short_write: None,
            fail_open: false,
            write_calls: 0,
        }
    }

    /// Card reported in the slot (`CardType::None`: empty slot)
    pub fn with_card(mut self, card: CardType) -> Self {
        self.card = card;
        self
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn fail_attach(mut self, error: DriverError) -> Self {
        self.attach_error = Some(error);
        self
    }

    pub fn fail_mount(mut self, error: DriverError) -> Self {
        self.mount_error = Some(error);
        self
    }

    /// Accept at most `max` bytes per write (`None`: accept everything that fits)
    pub fn set_short_write(&mut self, max: Option<usize>) {
        self.short_write = max;
    }

    /// Make every write fail to open its file
    pub fn set_fail_open(&mut self, fail: bool) {
        self.fail_open = fail;
    }

    pub fn bus(&self) -> Option<&SpiBusConfig> {
        self.bus.as_ref()
    }

    pub fn bus_attached(&self) -> bool {
        self.bus.is_some()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn write_calls(&self) -> u32 {
        self.write_calls
    }

    fn require_mounted(&self) -> DriverResult<()> {
        if self.mounted {
            Ok(())
        } else {
            Err(DriverError::INVALID_STATE)
        }
    }

    fn is_dir(&self, path: &str) -> bool {
        path == "/" || self.dirs.contains(path)
    }

    fn used(&self) -> u64 {
        self.files.values().map(|f| f.len() as u64).sum()
    }
}

impl VolumeDriver for SimVolume {
    fn attach_bus(&mut self, bus: &SpiBusConfig) -> DriverResult<()> {
        if let Some(error) = self.attach_error {
            return Err(error);
        }
        if self.bus.is_some() {
            return Err(DriverError::INVALID_STATE);
        }
        self.bus = Some(*bus);
        Ok(())
    }

    fn detach_bus(&mut self) {
        self.bus = None;
    }

    fn mount(&mut self) -> DriverResult<()> {
        if self.bus.is_none() {
            return Err(DriverError::INVALID_STATE);
        }
        if let Some(error) = self.mount_error {
            return Err(error);
        }
        self.mounted = true;
        Ok(())
    }

    fn unmount(&mut self) {
        self.mounted = false;
    }

    fn card_type(&self) -> CardType {
        if self.bus.is_some() {
            self.card
        } else {
            CardType::None
        }
    }

    fn total_bytes(&self) -> u64 {
        self.capacity
    }

    fn used_bytes(&self) -> u64 {
        self.used()
    }

    fn write(&mut self, path: &str, data: &[u8], mode: WriteMode) -> DriverResult<usize> {
        self.require_mounted()?;
        self.write_calls += 1;
        if self.fail_open || self.is_dir(path) {
            return Err(DriverError::FAIL);
        }
        if !self.is_dir(parent(path)) {
            return Err(DriverError::NOT_FOUND);
        }

        let existing = match mode {
            WriteMode::Truncate => self.files.get(path).map_or(0, |f| f.len() as u64),
            WriteMode::Append => 0,
        };
        let free = self
            .capacity
            .saturating_sub(self.used().saturating_sub(existing));

        let mut accepted = data.len().min(usize::try_from(free).unwrap_or(usize::MAX));
        if let Some(max) = self.short_write {
            accepted = accepted.min(max);
        }

        let file = self.files.entry(path.to_string()).or_default();
        if mode == WriteMode::Truncate {
            file.clear();
        }
        file.extend_from_slice(&data[..accepted]);
        Ok(accepted)
    }

    fn read(&mut self, path: &str, buf: &mut [u8]) -> DriverResult<usize> {
        self.require_mounted()?;
        let file = self.files.get(path).ok_or(DriverError::NOT_FOUND)?;
        let n = file.len().min(buf.len());
        buf[..n].copy_from_slice(&file[..n]);
        Ok(n)
    }

    fn exists(&self, path: &str) -> bool {
        self.mounted && (self.files.contains_key(path) || self.is_dir(path))
    }

    fn remove(&mut self, path: &str) -> DriverResult<()> {
        self.require_mounted()?;
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or(DriverError::NOT_FOUND)
    }

    fn rename(&mut self, from: &str, to: &str) -> DriverResult<()> {
        self.require_mounted()?;
        if self.exists(to) || !self.is_dir(parent(to)) {
            return Err(DriverError::FAIL);
        }

        if let Some(data) = self.files.remove(from) {
            self.files.insert(to.to_string(), data);
            return Ok(());
        }
        if self.dirs.remove(from) {
            // Move everything below the directory along with it
            let prefix = format!("{from}/");
            let moved: Vec<String> = self
                .files
                .keys()
                .filter(|k| k.starts_with(&prefix))
                .cloned()
                .collect();
            for old in moved {
                if let Some(data) = self.files.remove(&old) {
                    self.files.insert(format!("{to}/{}", &old[prefix.len()..]), data);
                }
            }
            let subdirs: Vec<String> = self
                .dirs
                .iter()
                .filter(|d| d.starts_with(&prefix))
                .cloned()
                .collect();
            for old in subdirs {
                self.dirs.remove(&old);
                self.dirs.insert(format!("{to}/{}", &old[prefix.len()..]));
            }
            self.dirs.insert(to.to_string());
            return Ok(());
        }
        Err(DriverError::NOT_FOUND)
    }

    fn mkdir(&mut self, path: &str) -> DriverResult<()> {
        self.require_mounted()?;
        if self.exists(path) {
            return Err(DriverError::FAIL);
        }
        if !self.is_dir(parent(path)) {
            return Err(DriverError::NOT_FOUND);
        }
        self.dirs.insert(path.to_string());
        Ok(())
    }

    fn rmdir(&mut self, path: &str) -> DriverResult<()> {
        self.require_mounted()?;
        if !self.dirs.contains(path) {
            return Err(DriverError::NOT_FOUND);
        }
        let has_children = self.files.keys().any(|k| parent(k) == path)
            || self.dirs.iter().any(|d| parent(d) == path);
        if has_children {
            return Err(DriverError::INVALID_STATE);
        }
        self.dirs.remove(path);
        Ok(())
    }

    fn file_size(&self, path: &str) -> DriverResult<u64> {
        self.require_mounted()?;
        self.files
            .get(path)
            .map(|f| f.len() as u64)
            .ok_or(DriverError::NOT_FOUND)
    }

    fn list_dir(&self, path: &str) -> DriverResult<Vec<DirEntry>> {
        self.require_mounted()?;
        let dir = if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        };
        if !self.is_dir(dir) {
            return Err(DriverError::NOT_FOUND);
        }

        let dirs = self
            .dirs
            .iter()
            .filter(|d| parent(d) == dir)
            .map(|d| DirEntry::dir(d.clone()));
        let files = self
            .files
            .iter()
            .filter(|(k, _)| parent(k) == dir)
            .map(|(k, v)| DirEntry::file(k.clone(), v.len() as u64));

        let mut entries: Vec<DirEntry> = dirs.chain(files).collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}
