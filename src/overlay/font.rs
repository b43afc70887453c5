use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Result, anyhow};
use tracing::{debug, warn};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

use crate::error::{OverlayError, OverlayResult};

/// Family used when a resolved font measures nothing at all.
pub const FALLBACK_FAMILY: &str = "sans-serif";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFamily {
    Inter,
    Poppins,
    Montserrat,
    Oswald,
    ProductSans,
}

impl FontFamily {
    pub const ALL: [FontFamily; 5] = [
        FontFamily::Inter,
        FontFamily::Poppins,
        FontFamily::Montserrat,
        FontFamily::Oswald,
        FontFamily::ProductSans,
    ];

    pub fn parse(value: &str) -> OverlayResult<Self> {
        let normalized = value
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "inter" => Ok(FontFamily::Inter),
            "poppins" => Ok(FontFamily::Poppins),
            "montserrat" => Ok(FontFamily::Montserrat),
            "oswald" => Ok(FontFamily::Oswald),
            "productsans" => Ok(FontFamily::ProductSans),
            _ => Err(OverlayError::UnknownFontFamily(value.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FontFamily::Inter => "Inter",
            FontFamily::Poppins => "Poppins",
            FontFamily::Montserrat => "Montserrat",
            FontFamily::Oswald => "Oswald",
            FontFamily::ProductSans => "Product Sans",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            FontFamily::Inter => "Inter-Bold.ttf",
            FontFamily::Poppins => "Poppins-Bold.ttf",
            FontFamily::Montserrat => "Montserrat-Bold.ttf",
            FontFamily::Oswald => "Oswald-Bold.ttf",
            FontFamily::ProductSans => "ProductSans-Bold.ttf",
        }
    }
}

pub trait TextMeasurer {
    /// Advance width of `text` in pixels at `font_size`.
    fn measure(&self, text: &str, font_size: f32) -> f32;
}

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
    face_index: u32,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    /// Metrics of the first parseable face in `data` (a single font or a collection).
    pub fn from_data(data: Arc<Vec<u8>>) -> Result<Self> {
        let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        for index in 0..count {
            let Ok(face) = Face::parse(&data, index) else {
                continue;
            };
            let units_per_em = face.units_per_em().max(1);
            let space_advance = face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2);
            return Ok(FontMetrics {
                family: extract_family_name(&face),
                data: data.clone(),
                units_per_em,
                space_advance,
                face_index: index,
            });
        }
        Err(anyhow!("failed to parse font data"))
    }
}

impl TextMeasurer for FontMetrics {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return 0.0;
        };
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            if ch == ' ' {
                advance = advance.saturating_add(self.space_advance as u32);
                continue;
            }
            if let Some(glyph) = face.glyph_index(ch) {
                let glyph_advance = face.glyph_hor_advance(glyph).unwrap_or(self.space_advance);
                advance = advance.saturating_add(glyph_advance as u32);
            } else {
                advance = advance.saturating_add(self.space_advance as u32);
            }
        }
        let units = self.units_per_em.max(1) as f32;
        advance as f32 * (font_size / units)
    }
}

/// Per-character width estimate standing in for a face we cannot read.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatedMetrics;

impl TextMeasurer for EstimatedMetrics {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        text.chars().map(estimate_char_units).sum::<f32>() * font_size
    }
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.9
    }
}

#[derive(Clone)]
pub struct ResolvedFont {
    /// Family name usable in `font-family` once registration has settled.
    pub family: String,
    pub has_weight_variants: bool,
    pub metrics: Option<FontMetrics>,
    /// False when the database holds no face under `family`; such a font measures zero.
    pub drawable: bool,
}

impl ResolvedFont {
    pub fn fallback() -> Self {
        Self {
            family: FALLBACK_FAMILY.to_string(),
            has_weight_variants: false,
            metrics: None,
            drawable: true,
        }
    }

    pub fn weight_attr(&self) -> &'static str {
        if self.has_weight_variants {
            "700"
        } else {
            "bold"
        }
    }
}

impl TextMeasurer for ResolvedFont {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        match &self.metrics {
            _ if !self.drawable => 0.0,
            Some(metrics) => metrics.measure(text, font_size),
            None => EstimatedMetrics.measure(text, font_size),
        }
    }
}

/// Maps family names to drawable fonts and owns the database the rasterizer reads.
pub trait FontResolver: Send + Sync {
    fn resolve(&self, family: FontFamily) -> OverlayResult<ResolvedFont>;
    fn database(&self) -> Arc<fontdb::Database>;
}

pub fn resolve_font(resolver: &dyn FontResolver, name: &str) -> OverlayResult<ResolvedFont> {
    let family = FontFamily::parse(name)?;
    resolver.resolve(family)
}

struct RegistryState {
    db: Arc<fontdb::Database>,
    resolved: HashMap<FontFamily, ResolvedFont>,
}

/// Process-wide, append-only font registry backed by bundled font files.
pub struct FontRegistry {
    font_dir: PathBuf,
    state: RwLock<RegistryState>,
}

impl FontRegistry {
    pub fn new(font_dir: impl Into<PathBuf>) -> Self {
        Self::with_database(font_dir, fontdb::Database::new())
    }

    /// Also loads system fonts, so the `sans-serif` fallback has something to draw with.
    pub fn with_system_fonts(font_dir: impl Into<PathBuf>) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        ensure_sans_serif(&mut db);
        Self::with_database(font_dir, db)
    }

    fn with_database(font_dir: impl Into<PathBuf>, db: fontdb::Database) -> Self {
        Self {
            font_dir: font_dir.into(),
            state: RwLock::new(RegistryState {
                db: Arc::new(db),
                resolved: HashMap::new(),
            }),
        }
    }

    pub fn font_path(&self, family: FontFamily) -> PathBuf {
        self.font_dir.join(family.file_name())
    }

    fn read_state(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FontResolver for FontRegistry {
    fn resolve(&self, family: FontFamily) -> OverlayResult<ResolvedFont> {
        if let Some(found) = self.read_state().resolved.get(&family) {
            return Ok(found.clone());
        }

        let path = self.font_path(family);
        let data = Arc::new(read_font_file(&path)?);
        let metrics = match FontMetrics::from_data(data.clone()) {
            Ok(metrics) => Some(metrics),
            Err(err) => {
                warn!("font {} is not parseable: {}", path.display(), err);
                None
            }
        };

        let mut state = self.write_state();
        // Another caller may have registered the family while we were reading the file.
        if let Some(found) = state.resolved.get(&family) {
            return Ok(found.clone());
        }
        let db = Arc::make_mut(&mut state.db);

        let requested = family.name();
        let forced = register_under_name(db, data.clone(), requested);
        debug!("font {}: registered {} face(s) as '{}'", path.display(), forced, requested);

        let mut effective = requested.to_string();
        if count_faces(db, requested) == 0 {
            let ids = db.load_font_source(fontdb::Source::Binary(data.clone()));
            let internal = metrics
                .as_ref()
                .and_then(|metrics| metrics.family())
                .map(|name| name.to_string())
                .or_else(|| {
                    ids.iter().find_map(|id| {
                        db.face(*id)
                            .and_then(|face| face.families.first())
                            .map(|(name, _)| name.clone())
                    })
                });
            match internal {
                Some(name) if count_faces(db, &name) > 0 => {
                    debug!("font {}: using embedded family '{}'", path.display(), name);
                    effective = name;
                }
                _ => warn!(
                    "font {}: no usable faces registered; drawing with '{}' anyway",
                    path.display(),
                    requested
                ),
            }
        }

        ensure_sans_serif(db);

        let resolved = ResolvedFont {
            has_weight_variants: has_weight_variants(db, &effective),
            drawable: count_faces(db, &effective) > 0,
            family: effective,
            metrics,
        };
        state.resolved.insert(family, resolved.clone());
        Ok(resolved)
    }

    fn database(&self) -> Arc<fontdb::Database> {
        self.read_state().db.clone()
    }
}

fn read_font_file(path: &Path) -> OverlayResult<Vec<u8>> {
    let unavailable = |source: std::io::Error| OverlayError::FontFileUnavailable {
        path: path.to_path_buf(),
        source,
    };
    let meta = std::fs::metadata(path).map_err(unavailable)?;
    if !meta.is_file() {
        return Err(unavailable(std::io::Error::other("not a regular file")));
    }
    std::fs::read(path).map_err(unavailable)
}

fn register_under_name(db: &mut fontdb::Database, data: Arc<Vec<u8>>, name: &str) -> usize {
    let ids = db.load_font_source(fontdb::Source::Binary(data));
    let mut registered = 0;
    for id in ids {
        let Some(mut face) = db.face(id).cloned() else {
            continue;
        };
        db.remove_face(id);
        face.families = vec![(name.to_string(), fontdb::Language::English_UnitedStates)];
        db.push_face_info(face);
        registered += 1;
    }
    registered
}

/// Families tried, in order, when the configured `sans-serif` family has no faces.
const SANS_SERIF_CANDIDATES: [&str; 6] = [
    "Arial",
    "Helvetica",
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "Roboto",
];

/// Points the generic `sans-serif` family at a face the database actually holds,
/// so the fallback font draws something whenever any font is loaded.
fn ensure_sans_serif(db: &mut fontdb::Database) {
    let current = db.family_name(&fontdb::Family::SansSerif).to_string();
    if count_faces(db, &current) > 0 {
        return;
    }
    let candidate = SANS_SERIF_CANDIDATES
        .iter()
        .find(|name| count_faces(db, name) > 0)
        .map(|name| name.to_string())
        .or_else(|| {
            db.faces()
                .find_map(|face| face.families.first().map(|(name, _)| name.clone()))
        });
    if let Some(name) = candidate {
        debug!("sans-serif now maps to '{}'", name);
        db.set_sans_serif_family(name);
    }
}

fn faces_named<'a>(
    db: &'a fontdb::Database,
    name: &'a str,
) -> impl Iterator<Item = &'a fontdb::FaceInfo> + 'a {
    db.faces().filter(move |face| {
        face.families
            .iter()
            .any(|(family, _)| family.eq_ignore_ascii_case(name))
    })
}

fn count_faces(db: &fontdb::Database, name: &str) -> usize {
    faces_named(db, name).count()
}

fn has_weight_variants(db: &fontdb::Database, name: &str) -> bool {
    faces_named(db, name).any(|face| face.weight != fontdb::Weight::NORMAL)
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
