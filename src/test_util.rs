/// Copies the first installed TrueType/OpenType font with Latin glyphs into a temp
/// directory under every bundled font file name, then runs `func` with that directory.
/// Returns `None` when the machine has no suitable system font to borrow.
#[cfg(test)]
pub(crate) fn with_font_dir<F, R>(func: F) -> Option<R>
where
    F: FnOnce(&std::path::Path) -> R,
{
    use crate::overlay::FontFamily;
    use usvg::fontdb;

    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    let source = db
        .faces()
        .filter_map(|face| match &face.source {
            fontdb::Source::File(path) => {
                let ext = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.to_ascii_lowercase());
                matches!(ext.as_deref(), Some("ttf" | "otf")).then(|| path.clone())
            }
            _ => None,
        })
        .find(|path| {
            std::fs::read(path)
                .ok()
                .and_then(|data| {
                    ttf_parser::Face::parse(&data, 0)
                        .ok()
                        .map(|face| face.glyph_index('M').is_some())
                })
                .unwrap_or(false)
        })?;

    let dir = tempfile::tempdir().expect("tempdir");
    for family in FontFamily::ALL {
        std::fs::copy(&source, dir.path().join(family.file_name())).expect("copy font");
    }
    Some(func(dir.path()))
}
