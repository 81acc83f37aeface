// Panel Store
// Supplies adjusted per-field panels and derives the forward return panel

use common::{AlphaError, NaiveDate, Panel, Result};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::csv_io::read_panel;

/// Field holding the realized (unshifted) percentage price change
pub const RETURN_FIELD: &str = "return";
pub const CLOSE_FIELD: &str = "close";

/// Source of per-field panels sharing one date/instrument universe
pub trait PanelStore {
    /// Load one field, e.g. `close` or `volume`
    fn load_field(&self, field: &str) -> Result<Panel>;

    /// Fields this store can serve
    fn fields(&self) -> Result<Vec<String>>;
}

/// One CSV file per field under a root directory: `{root}/{field}.csv`
pub struct CsvPanelStore {
    root: PathBuf,
    cache: RefCell<HashMap<String, Panel>>,
}

impl CsvPanelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn field_path(&self, field: &str) -> PathBuf {
        self.root.join(format!("{}.csv", field))
    }
}

impl PanelStore for CsvPanelStore {
    fn load_field(&self, field: &str) -> Result<Panel> {
        if let Some(panel) = self.cache.borrow().get(field) {
            debug!(field = field, "Panel served from cache");
            return Ok(panel.clone());
        }

        let path = self.field_path(field);
        if !path.exists() {
            return Err(AlphaError::PanelShape(format!(
                "field '{}' not loaded: no file at {}",
                field,
                path.display()
            )));
        }

        let panel = read_panel(&path)?;
        info!(
            field = field,
            dates = panel.n_dates(),
            instruments = panel.n_columns(),
            "Loaded panel"
        );
        self.cache
            .borrow_mut()
            .insert(field.to_string(), panel.clone());
        Ok(panel)
    }

    fn fields(&self) -> Result<Vec<String>> {
        let mut fields = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    fields.push(stem.to_string());
                }
            }
        }
        fields.sort();
        Ok(fields)
    }
}

/// Store backed by panels held in memory (for testing and development)
#[derive(Debug, Clone, Default)]
pub struct InMemoryPanelStore {
    panels: BTreeMap<String, Panel>,
}

impl InMemoryPanelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: &str, panel: Panel) -> Self {
        self.insert(field, panel);
        self
    }

    pub fn insert(&mut self, field: &str, panel: Panel) {
        self.panels.insert(field.to_string(), panel);
    }
}

impl PanelStore for InMemoryPanelStore {
    fn load_field(&self, field: &str) -> Result<Panel> {
        self.panels
            .get(field)
            .cloned()
            .ok_or_else(|| AlphaError::PanelShape(format!("field '{}' not loaded", field)))
    }

    fn fields(&self) -> Result<Vec<String>> {
        Ok(self.panels.keys().cloned().collect())
    }
}

/// Loaded fields plus the shared `date` and `id` index
#[derive(Debug, Clone)]
pub struct PanelSet {
    dates: Vec<NaiveDate>,
    ids: Vec<String>,
    fields: BTreeMap<String, Panel>,
}

impl PanelSet {
    /// Load `fields` from a store and check they share one index universe
    pub fn load(store: &dyn PanelStore, fields: &[&str]) -> Result<Self> {
        let mut loaded = BTreeMap::new();
        let mut index: Option<(Vec<NaiveDate>, Vec<String>)> = None;

        for field in fields {
            let panel = store.load_field(field)?;
            match &index {
                None => index = Some((panel.dates().to_vec(), panel.columns().to_vec())),
                Some((dates, ids)) => {
                    if panel.dates() != dates.as_slice() || panel.columns() != ids.as_slice() {
                        return Err(AlphaError::IndexMismatch(format!(
                            "field '{}' does not share the panel index",
                            field
                        )));
                    }
                }
            }
            loaded.insert(field.to_string(), panel);
        }

        let (dates, ids) = index.unwrap_or_default();
        Ok(Self {
            dates,
            ids,
            fields: loaded,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn get(&self, field: &str) -> Option<&Panel> {
        self.fields.get(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    /// Forward return panel from the `return` field, or from `close` when
    /// no return field was loaded
    pub fn forward_returns(&self) -> Result<Panel> {
        if let Some(realized) = self.fields.get(RETURN_FIELD) {
            return Ok(forward_returns(realized));
        }
        let close = self.fields.get(CLOSE_FIELD).ok_or_else(|| {
            AlphaError::PanelShape("neither 'return' nor 'close' was loaded".to_string())
        })?;
        Ok(forward_returns(&realized_returns(close)))
    }
}

/// Percentage change of the close price, stored at the date it is realized
pub fn realized_returns(close: &Panel) -> Panel {
    close.pct_change()
}

/// Return realized after holding from date t, stored at row t
pub fn forward_returns(realized: &Panel) -> Panel {
    realized.shift(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_io::write_panel;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 6, day).unwrap()
    }

    fn close() -> Panel {
        Panel::from_rows(
            vec![d(1), d(2), d(3)],
            vec!["A".to_string(), "B".to_string()],
            vec![vec![10.0, 20.0], vec![11.0, 19.0], vec![12.1, f64::NAN]],
        )
        .unwrap()
    }

    #[test]
    fn test_forward_returns_align_to_holding_date() {
        let fwd = forward_returns(&realized_returns(&close()));

        assert!((fwd.get(d(1), "A").unwrap() - 0.1).abs() < 1e-12);
        assert!((fwd.get(d(1), "B").unwrap() + 0.05).abs() < 1e-12);
        assert!((fwd.get(d(2), "A").unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(fwd.get(d(2), "B"), None);
        assert_eq!(fwd.row(2), &[None, None]);
    }

    #[test]
    fn test_csv_store_loads_and_lists_fields() {
        let dir = tempfile::tempdir().unwrap();
        write_panel(&dir.path().join("close.csv"), &close()).unwrap();
        write_panel(&dir.path().join("volume.csv"), &close()).unwrap();

        let store = CsvPanelStore::new(dir.path());
        assert_eq!(store.fields().unwrap(), vec!["close", "volume"]);
        assert_eq!(store.load_field("close").unwrap(), close());

        // served from cache even after the file disappears
        std::fs::remove_file(dir.path().join("close.csv")).unwrap();
        assert!(store.load_field("close").is_ok());
        assert!(matches!(
            store.load_field("open"),
            Err(AlphaError::PanelShape(msg)) if msg.contains("'open' not loaded")
        ));
    }

    #[test]
    fn test_panel_set_requires_shared_index() {
        let shorter = close().slice_dates(d(1), d(2));
        let store = InMemoryPanelStore::new()
            .with_field("close", close())
            .with_field("open", shorter);

        let result = PanelSet::load(&store, &["close", "open"]);
        assert!(matches!(result, Err(AlphaError::IndexMismatch(_))));

        let unknown = PanelSet::load(&store, &["close", "vwap"]);
        assert!(matches!(unknown, Err(AlphaError::PanelShape(msg)) if msg == "field 'vwap' not loaded"));

        let set = PanelSet::load(&store, &["close"]).unwrap();
        assert_eq!(set.dates(), &[d(1), d(2), d(3)]);
        assert_eq!(set.ids(), &["A".to_string(), "B".to_string()]);
        assert_eq!(set.forward_returns().unwrap().n_dates(), 3);
    }
}
