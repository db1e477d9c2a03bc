// ============================================================================
// EDITOR - owns the session state, routes every edit through history
// ============================================================================

use uuid::Uuid;

use crate::canvas::{CropRegion, PixelBuffer};
use crate::components::history::{HistoryManager, HistorySnapshot};
use crate::error::Result;
use crate::io;
use crate::ops::effects::{self, Kernel3x3};
use crate::ops::filters::{self, FilterPreset, FilterState};
use crate::ops::text::{FontRasterizer, GlyphRasterizer, TextOverlayPatch, TextOverlays};
use crate::ops::transform::{self, FlipAxis, ResizeSpec};
use crate::settings::EditorSettings;
use crate::{log_err, log_info};

/// One user action. [`Editor::handle`] is the single entry point for these.
#[derive(Clone, Debug)]
pub enum EditCommand {
    Load { bytes: Vec<u8>, mime: Option<String> },
    SetFilters(FilterState),
    ApplyPreset(FilterPreset),
    SetCropRegion(CropRegion),
    SetCropActive(bool),
    ApplyCrop,
    SetResizeWidth(u32),
    SetResizeHeight(u32),
    SetAspectLock(bool),
    ApplyResize,
    Flip(FlipAxis),
    ApplyKernel(Kernel3x3),
    Emboss,
    AddText,
    UpdateText(Uuid, TextOverlayPatch),
    RemoveText(Uuid),
    SelectText(Option<Uuid>),
    BakeFilters,
    Flatten,
    Undo,
    Redo,
    ResetToOriginal,
    Close,
}

impl EditCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EditCommand::Load { .. } => "load",
            EditCommand::SetFilters(_) => "set-filters",
            EditCommand::ApplyPreset(_) => "apply-preset",
            EditCommand::SetCropRegion(_) => "set-crop-region",
            EditCommand::SetCropActive(_) => "set-crop-active",
            EditCommand::ApplyCrop => "apply-crop",
            EditCommand::SetResizeWidth(_) => "set-resize-width",
            EditCommand::SetResizeHeight(_) => "set-resize-height",
            EditCommand::SetAspectLock(_) => "set-aspect-lock",
            EditCommand::ApplyResize => "apply-resize",
            EditCommand::Flip(_) => "flip",
            EditCommand::ApplyKernel(_) => "apply-kernel",
            EditCommand::Emboss => "emboss",
            EditCommand::AddText => "add-text",
            EditCommand::UpdateText(..) => "update-text",
            EditCommand::RemoveText(_) => "remove-text",
            EditCommand::SelectText(_) => "select-text",
            EditCommand::BakeFilters => "bake-filters",
            EditCommand::Flatten => "flatten",
            EditCommand::Undo => "undo",
            EditCommand::Redo => "redo",
            EditCommand::ResetToOriginal => "reset-to-original",
            EditCommand::Close => "close",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Nothing to do: no image, history boundary, unknown id, nothing pending.
    NoOp,
    TextAdded(Uuid),
}

impl Outcome {
    fn from_bool(applied: bool) -> Self {
        if applied { Outcome::Applied } else { Outcome::NoOp }
    }
}

/// Encoded result of [`Editor::export`].
#[derive(Clone, Debug)]
pub struct ExportedImage {
    pub filename: String,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A single image-editing session.
///
/// `buffer` is the committed raster. Filters and text overlays live beside
/// it and only reach it through an explicit bake, flatten or export, each of
/// which commits to history.
pub struct Editor {
    settings: EditorSettings,
    original: Option<PixelBuffer>,
    buffer: Option<PixelBuffer>,
    filters: FilterState,
    crop: CropRegion,
    resize: ResizeSpec,
    overlays: TextOverlays,
    history: HistoryManager,
    rasterizer: Box<dyn GlyphRasterizer>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

impl Editor {
    /// Editor drawing text with system fonts.
    pub fn new(settings: EditorSettings) -> Self {
        Self::with_rasterizer(settings, Box::new(FontRasterizer::new()))
    }

    pub fn with_rasterizer(settings: EditorSettings, rasterizer: Box<dyn GlyphRasterizer>) -> Self {
        let history = HistoryManager::new(settings.max_undo_steps)
            .with_memory_limit(settings.max_history_bytes());
        let overlays = TextOverlays::new(&settings.default_font);
        Self {
            settings,
            original: None,
            buffer: None,
            filters: FilterState::default(),
            crop: CropRegion::default(),
            resize: ResizeSpec::for_dimensions(0, 0),
            overlays,
            history,
            rasterizer,
        }
    }

    /// Apply one command. Every command is logged with its outcome.
    pub fn handle(&mut self, command: EditCommand) -> Result<Outcome> {
        let name = command.name();
        let result = match command {
            EditCommand::Load { bytes, mime } => self.load(&bytes, mime.as_deref()),
            EditCommand::SetFilters(f) => Ok(self.set_filters(f)),
            EditCommand::ApplyPreset(p) => Ok(self.apply_preset(p)),
            EditCommand::SetCropRegion(r) => Ok(self.set_crop_region(r)),
            EditCommand::SetCropActive(a) => Ok(self.set_crop_active(a)),
            EditCommand::ApplyCrop => Ok(self.apply_crop()),
            EditCommand::SetResizeWidth(w) => Ok(self.set_resize_width(w)),
            EditCommand::SetResizeHeight(h) => Ok(self.set_resize_height(h)),
            EditCommand::SetAspectLock(l) => Ok(self.set_aspect_lock(l)),
            EditCommand::ApplyResize => Ok(self.apply_resize()),
            EditCommand::Flip(axis) => Ok(self.flip(axis)),
            EditCommand::ApplyKernel(k) => Ok(self.apply_kernel(&k)),
            EditCommand::Emboss => Ok(self.emboss()),
            EditCommand::AddText => Ok(self.add_text().map_or(Outcome::NoOp, Outcome::TextAdded)),
            EditCommand::UpdateText(id, patch) => Ok(self.update_text(id, patch)),
            EditCommand::RemoveText(id) => Ok(self.remove_text(id)),
            EditCommand::SelectText(id) => Ok(self.select_text(id)),
            EditCommand::BakeFilters => Ok(self.bake_filters()),
            EditCommand::Flatten => Ok(self.flatten()),
            EditCommand::Undo => Ok(self.undo()),
            EditCommand::Redo => Ok(self.redo()),
            EditCommand::ResetToOriginal => Ok(self.reset_to_original()),
            EditCommand::Close => Ok(self.close()),
        };
        match &result {
            Ok(outcome) => {
                log_info!("editor: {} -> {:?}", name, outcome);
            }
            Err(e) => {
                log_err!("editor: {} failed: {}", name, e);
            }
        }
        result
    }

    // ------------------------------------------------------------------
    //  State access
    // ------------------------------------------------------------------

    pub fn settings(&self) -> &EditorSettings { &self.settings }

    pub fn has_image(&self) -> bool { self.buffer.is_some() }

    pub fn buffer(&self) -> Option<&PixelBuffer> { self.buffer.as_ref() }

    pub fn original(&self) -> Option<&PixelBuffer> { self.original.as_ref() }

    pub fn filters(&self) -> &FilterState { &self.filters }

    pub fn crop_region(&self) -> &CropRegion { &self.crop }

    pub fn resize_spec(&self) -> &ResizeSpec { &self.resize }

    pub fn overlays(&self) -> &TextOverlays { &self.overlays }

    pub fn history(&self) -> &HistoryManager { &self.history }

    /// The rendered surface: filters plus overlays over the committed buffer.
    /// `None` when no image is loaded.
    pub fn preview(&mut self) -> Option<PixelBuffer> {
        filters::preview(
            self.buffer.as_ref(),
            &self.filters,
            self.overlays.as_slice(),
            self.rasterizer.as_mut(),
        )
    }

    // ------------------------------------------------------------------
    //  Session lifecycle
    // ------------------------------------------------------------------

    /// Decode `bytes` and start a fresh session on it. On error the current
    /// session is left exactly as it was.
    pub fn load(&mut self, bytes: &[u8], mime: Option<&str>) -> Result<Outcome> {
        let decoded = io::decode_image(bytes, mime, self.settings.max_dimension)?;
        log_info!(
            "editor: decoded {}x{} image ({} bytes in)",
            decoded.width(),
            decoded.height(),
            bytes.len()
        );
        self.start_session(decoded);
        Ok(Outcome::Applied)
    }

    /// Start a session on an already-decoded buffer.
    pub fn load_buffer(&mut self, buffer: PixelBuffer) -> Outcome {
        if buffer.is_empty() {
            return Outcome::NoOp;
        }
        self.start_session(buffer);
        Outcome::Applied
    }

    fn start_session(&mut self, buffer: PixelBuffer) {
        self.history.seed(HistorySnapshot::new("Open image", buffer.clone()));
        self.original = Some(buffer.clone());
        self.buffer = Some(buffer);
        self.reset_side_state();
    }

    /// Drop the image, its history and all pending edits.
    pub fn close(&mut self) -> Outcome {
        if self.buffer.is_none() {
            return Outcome::NoOp;
        }
        self.buffer = None;
        self.original = None;
        self.history.clear();
        self.filters = FilterState::default();
        self.overlays.clear();
        self.crop = CropRegion::default();
        self.resize = ResizeSpec::for_dimensions(0, 0);
        Outcome::Applied
    }

    /// Back to the decoded source: default filters, no overlays, history
    /// re-seeded with a single snapshot.
    pub fn reset_to_original(&mut self) -> Outcome {
        let Some(original) = self.original.clone() else {
            return Outcome::NoOp;
        };
        self.history.seed(HistorySnapshot::new("Reset to original", original.clone()));
        self.buffer = Some(original);
        self.reset_side_state();
        Outcome::Applied
    }

    fn reset_side_state(&mut self) {
        self.filters = FilterState::default();
        self.overlays.clear();
        self.sync_geometry(true);
    }

    /// Re-seed crop and resize specs from the buffer size. The aspect-lock
    /// choice survives unless `reset_lock`.
    fn sync_geometry(&mut self, reset_lock: bool) {
        let (w, h) = self.buffer.as_ref().map_or((0, 0), |b| b.dimensions());
        let lock = reset_lock || self.resize.lock_aspect;
        self.crop = CropRegion::full(w, h);
        self.resize = ResizeSpec::for_dimensions(w, h);
        self.resize.set_lock_aspect(lock);
    }

    /// Replace the buffer and record it in history.
    fn commit(&mut self, description: &str, next: PixelBuffer) -> Outcome {
        let resized = self.buffer.as_ref().map(|b| b.dimensions()) != Some(next.dimensions());
        self.history.commit(HistorySnapshot::new(description, next.clone()));
        log_info!(
            "editor: committed '{}' ({}x{}), history {}/{}",
            description,
            next.width(),
            next.height(),
            self.history.index() + 1,
            self.history.len()
        );
        self.buffer = Some(next);
        if resized {
            self.sync_geometry(false);
        }
        Outcome::Applied
    }

    /// Put a history snapshot back as the live buffer. Filters and overlays
    /// are not part of history and stay as they are.
    fn restore(&mut self, snapshot: PixelBuffer) {
        let resized = self.buffer.as_ref().map(|b| b.dimensions()) != Some(snapshot.dimensions());
        self.buffer = Some(snapshot);
        if resized {
            self.sync_geometry(false);
        }
    }

    pub fn undo(&mut self) -> Outcome {
        match self.history.undo().map(|s| s.pixels().clone()) {
            Some(pixels) => {
                self.restore(pixels);
                Outcome::Applied
            }
            None => Outcome::NoOp,
        }
    }

    pub fn redo(&mut self) -> Outcome {
        match self.history.redo().map(|s| s.pixels().clone()) {
            Some(pixels) => {
                self.restore(pixels);
                Outcome::Applied
            }
            None => Outcome::NoOp,
        }
    }

    // ------------------------------------------------------------------
    //  Non-destructive state
    // ------------------------------------------------------------------

    pub fn set_filters(&mut self, filters: FilterState) -> Outcome {
        if self.buffer.is_none() {
            return Outcome::NoOp;
        }
        self.filters = filters;
        Outcome::Applied
    }

    pub fn apply_preset(&mut self, preset: FilterPreset) -> Outcome {
        let outcome = self.set_filters(preset.filters());
        if outcome == Outcome::Applied {
            log_info!("editor: preset '{}' -> {}", preset.label(), self.filters.describe());
        }
        outcome
    }

    pub fn set_crop_region(&mut self, region: CropRegion) -> Outcome {
        if self.buffer.is_none() {
            return Outcome::NoOp;
        }
        self.crop = region;
        Outcome::Applied
    }

    pub fn set_crop_active(&mut self, active: bool) -> Outcome {
        if self.buffer.is_none() {
            return Outcome::NoOp;
        }
        self.crop.active = active;
        Outcome::Applied
    }

    pub fn set_resize_width(&mut self, width: u32) -> Outcome {
        if self.buffer.is_none() {
            return Outcome::NoOp;
        }
        self.resize.set_width(width);
        Outcome::Applied
    }

    pub fn set_resize_height(&mut self, height: u32) -> Outcome {
        if self.buffer.is_none() {
            return Outcome::NoOp;
        }
        self.resize.set_height(height);
        Outcome::Applied
    }

    pub fn set_aspect_lock(&mut self, lock: bool) -> Outcome {
        if self.buffer.is_none() {
            return Outcome::NoOp;
        }
        self.resize.set_lock_aspect(lock);
        Outcome::Applied
    }

    /// Add a default overlay and select it. `None` without an image.
    pub fn add_text(&mut self) -> Option<Uuid> {
        self.buffer.as_ref()?;
        Some(self.overlays.add())
    }

    pub fn update_text(&mut self, id: Uuid, patch: TextOverlayPatch) -> Outcome {
        Outcome::from_bool(self.overlays.update(id, patch))
    }

    pub fn remove_text(&mut self, id: Uuid) -> Outcome {
        Outcome::from_bool(self.overlays.remove(id))
    }

    /// Select an overlay, or clear the selection with `None`. An unknown id
    /// clears it too and reports `NoOp`.
    pub fn select_text(&mut self, id: Option<Uuid>) -> Outcome {
        self.overlays.set_active(id);
        Outcome::from_bool(self.overlays.active() == id)
    }

    // ------------------------------------------------------------------
    //  Destructive operations
    // ------------------------------------------------------------------

    /// Crop with the stored region, only while it is active. Deactivates
    /// the region afterwards.
    pub fn apply_crop(&mut self) -> Outcome {
        if !self.crop.active {
            return Outcome::NoOp;
        }
        let region = self.crop;
        let outcome = self.crop(&region);
        self.crop.active = false;
        outcome
    }

    /// Crop to `region` (clamped into the buffer) regardless of the stored
    /// region's active flag.
    pub fn crop(&mut self, region: &CropRegion) -> Outcome {
        let Some(next) = self.buffer.as_ref().and_then(|b| transform::crop(b, region)) else {
            return Outcome::NoOp;
        };
        self.commit("Crop", next)
    }

    /// Resize to the stored [`ResizeSpec`] target.
    pub fn apply_resize(&mut self) -> Outcome {
        let (w, h) = self.resize.target(self.settings.max_dimension);
        self.resize(w, h)
    }

    /// Resample to `width`×`height`, each clamped to [1, max_dimension].
    pub fn resize(&mut self, width: u32, height: u32) -> Outcome {
        let Some(buf) = self.buffer.as_ref() else {
            return Outcome::NoOp;
        };
        let max = self.settings.max_dimension.max(1);
        let (w, h) = (width.clamp(1, max), height.clamp(1, max));
        let next = transform::resize(buf, w, h, self.settings.interpolation);
        self.commit("Resize", next)
    }

    pub fn flip(&mut self, axis: FlipAxis) -> Outcome {
        let Some(buf) = self.buffer.as_ref() else {
            return Outcome::NoOp;
        };
        let next = transform::flip(buf, axis);
        let label = match axis {
            FlipAxis::Horizontal => "Flip horizontal",
            FlipAxis::Vertical => "Flip vertical",
        };
        self.commit(label, next)
    }

    pub fn apply_kernel(&mut self, kernel: &Kernel3x3) -> Outcome {
        let Some(buf) = self.buffer.as_ref() else {
            return Outcome::NoOp;
        };
        let next = effects::apply_kernel(buf, kernel);
        self.commit("Apply filter", next)
    }

    pub fn emboss(&mut self) -> Outcome {
        let Some(buf) = self.buffer.as_ref() else {
            return Outcome::NoOp;
        };
        let next = effects::emboss(buf);
        self.commit("Emboss", next)
    }

    /// Burn the current filters into the buffer and reset them. Overlays are
    /// left alone.
    pub fn bake_filters(&mut self) -> Outcome {
        if self.filters.is_identity() {
            return Outcome::NoOp;
        }
        let Some(buf) = self.buffer.as_ref() else {
            return Outcome::NoOp;
        };
        let next = filters::apply_filters(buf, &self.filters);
        let outcome = self.commit("Apply filters", next);
        self.filters = FilterState::default();
        outcome
    }

    /// Burn filters and text overlays into the buffer, then reset filters and
    /// clear overlays. No-op when nothing is pending.
    pub fn flatten(&mut self) -> Outcome {
        if self.filters.is_identity() && self.overlays.is_empty() {
            return Outcome::NoOp;
        }
        let Some(next) = self.preview() else {
            return Outcome::NoOp;
        };
        let outcome = self.commit("Flatten", next);
        self.filters = FilterState::default();
        self.overlays.clear();
        outcome
    }

    /// Flatten anything pending and encode the buffer as PNG.
    /// `Ok(None)` when no image is loaded.
    pub fn export(&mut self) -> Result<Option<ExportedImage>> {
        self.flatten();
        let Some(buf) = self.buffer.as_ref() else {
            return Ok(None);
        };
        let png = io::encode_png(buf)?;
        log_info!(
            "editor: exported {}x{} as {} ({} bytes)",
            buf.width(),
            buf.height(),
            self.settings.export_filename,
            png.len()
        );
        Ok(Some(ExportedImage {
            filename: self.settings.export_filename.clone(),
            png,
            width: buf.width(),
            height: buf.height(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditorError;
    use crate::ops::text::{RasterizedText, TextOverlay};
    use image::Rgba;

    /// One solid block per visible character, so text always changes pixels.
    struct BlockRasterizer;

    impl GlyphRasterizer for BlockRasterizer {
        fn rasterize(&mut self, o: &TextOverlay, _: u32, _: u32) -> RasterizedText {
            let n = o.text.chars().filter(|c| !c.is_whitespace()).count() as u32;
            if n == 0 {
                return RasterizedText::empty();
            }
            let cell = (o.font_size / 2.0).max(1.0) as u32;
            let (w, h) = (cell * n, cell * 2);
            RasterizedText {
                buf: o.color.repeat((w * h) as usize),
                buf_w: w,
                buf_h: h,
                off_x: o.x as i32,
                off_y: o.y as i32,
            }
        }
    }

    fn editor() -> Editor {
        Editor::with_rasterizer(EditorSettings::default(), Box::new(BlockRasterizer))
    }

    fn fixture(w: u32, h: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                buf.put_pixel(x, y, Rgba([(x * 2) as u8, (y * 2) as u8, 100, 255]));
            }
        }
        buf
    }

    fn loaded(w: u32, h: u32) -> Editor {
        let mut ed = editor();
        let png = io::encode_png(&fixture(w, h)).unwrap();
        assert_eq!(ed.load(&png, Some("image/png")).unwrap(), Outcome::Applied);
        ed
    }

    #[test]
    fn load_seeds_a_fresh_session() {
        let ed = loaded(20, 10);
        assert_eq!(ed.buffer().unwrap().dimensions(), (20, 10));
        assert_eq!(ed.history().len(), 1);
        assert_eq!(ed.history().index(), 0);
        assert!(ed.filters().is_identity());
        assert_eq!(ed.resize_spec().width, 20);
        assert!(!ed.crop_region().active);
    }

    #[test]
    fn failed_load_keeps_previous_session() {
        let mut ed = loaded(20, 10);
        ed.flip(FlipAxis::Horizontal);
        let before = ed.buffer().unwrap().clone();

        let err = ed.load(b"%PDF-1.4 not an image", Some("application/pdf")).unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedMime(_)));
        assert_eq!(ed.buffer().unwrap(), &before);
        assert_eq!(ed.history().len(), 2);
    }

    #[test]
    fn destructive_ops_without_image_are_no_ops() {
        let mut ed = editor();
        assert_eq!(ed.flip(FlipAxis::Vertical), Outcome::NoOp);
        assert_eq!(ed.crop(&CropRegion::new(0, 0, 5, 5)), Outcome::NoOp);
        assert_eq!(ed.resize(10, 10), Outcome::NoOp);
        assert_eq!(ed.emboss(), Outcome::NoOp);
        assert_eq!(ed.undo(), Outcome::NoOp);
        assert_eq!(ed.handle(EditCommand::AddText).unwrap(), Outcome::NoOp);
        assert!(ed.preview().is_none());
        assert!(ed.export().unwrap().is_none());
    }

    #[test]
    fn crop_commits_and_leaves_filters_alone() {
        let mut ed = loaded(30, 30);
        let filters = FilterState::default().with_brightness(150.0);
        ed.set_filters(filters);
        assert_eq!(ed.crop(&CropRegion::new(10, 10, 50, 50)), Outcome::Applied);

        assert_eq!(ed.buffer().unwrap().dimensions(), (20, 20));
        assert_eq!(ed.filters(), &filters);
        assert_eq!(ed.history().len(), 2);
        assert_eq!(ed.buffer().unwrap().get_pixel(0, 0), fixture(30, 30).get_pixel(10, 10));
    }

    #[test]
    fn apply_crop_needs_an_active_region() {
        let mut ed = loaded(30, 30);
        assert_eq!(ed.apply_crop(), Outcome::NoOp);

        ed.handle(EditCommand::SetCropRegion(CropRegion::new(5, 5, 10, 10))).unwrap();
        assert_eq!(ed.handle(EditCommand::ApplyCrop).unwrap(), Outcome::Applied);
        assert_eq!(ed.buffer().unwrap().dimensions(), (10, 10));
        assert!(!ed.crop_region().active);
        assert_eq!(ed.apply_crop(), Outcome::NoOp);
    }

    #[test]
    fn undo_redo_walk_history_and_stop_at_the_ends() {
        let mut ed = loaded(16, 8);
        let original = ed.buffer().unwrap().clone();
        ed.flip(FlipAxis::Horizontal);
        let flipped = ed.buffer().unwrap().clone();

        assert_eq!(ed.undo(), Outcome::Applied);
        assert_eq!(ed.buffer().unwrap(), &original);
        assert_eq!(ed.undo(), Outcome::NoOp);
        assert_eq!(ed.redo(), Outcome::Applied);
        assert_eq!(ed.buffer().unwrap(), &flipped);
        assert_eq!(ed.redo(), Outcome::NoOp);
    }

    #[test]
    fn commit_after_undo_discards_redo_branch() {
        let mut ed = loaded(16, 8);
        ed.flip(FlipAxis::Horizontal);
        ed.flip(FlipAxis::Vertical);
        ed.undo();
        ed.emboss();
        assert_eq!(ed.history().len(), 3);
        assert_eq!(ed.redo(), Outcome::NoOp);
    }

    #[test]
    fn undo_restores_crop_and_resize_dimensions() {
        let mut ed = loaded(40, 20);
        ed.crop(&CropRegion::new(0, 0, 10, 10));
        assert_eq!(ed.resize_spec().original_width, 10);
        ed.undo();
        assert_eq!(ed.buffer().unwrap().dimensions(), (40, 20));
        assert_eq!(ed.resize_spec().original_width, 40);
        assert_eq!(ed.crop_region().width, 40);
    }

    #[test]
    fn resize_follows_aspect_lock() {
        let mut ed = loaded(40, 30);
        ed.handle(EditCommand::SetResizeWidth(20)).unwrap();
        assert_eq!(ed.resize_spec().height, 15);
        ed.handle(EditCommand::ApplyResize).unwrap();
        assert_eq!(ed.buffer().unwrap().dimensions(), (20, 15));

        ed.handle(EditCommand::SetAspectLock(false)).unwrap();
        ed.handle(EditCommand::SetResizeHeight(40)).unwrap();
        ed.handle(EditCommand::ApplyResize).unwrap();
        assert_eq!(ed.buffer().unwrap().dimensions(), (20, 40));
        assert!(!ed.resize_spec().lock_aspect);
    }

    #[test]
    fn resize_is_clamped_to_max_dimension() {
        let settings = EditorSettings { max_dimension: 64, ..EditorSettings::default() };
        let mut ed = Editor::with_rasterizer(settings, Box::new(BlockRasterizer));
        ed.load_buffer(fixture(10, 10));
        ed.resize(1000, 0);
        assert_eq!(ed.buffer().unwrap().dimensions(), (64, 1));
    }

    #[test]
    fn bake_filters_resets_state_and_commits() {
        let mut ed = loaded(8, 8);
        assert_eq!(ed.bake_filters(), Outcome::NoOp);

        ed.apply_preset(FilterPreset::BlackAndWhite);
        let expected = ed.preview().unwrap();
        assert_eq!(ed.bake_filters(), Outcome::Applied);
        assert!(ed.filters().is_identity());
        assert_eq!(ed.buffer().unwrap(), &expected);
        assert_eq!(ed.history().len(), 2);
    }

    #[test]
    fn flatten_burns_overlays_and_filters() {
        let mut ed = loaded(40, 40);
        assert_eq!(ed.flatten(), Outcome::NoOp);

        let id = ed.add_text().unwrap();
        ed.update_text(id, TextOverlayPatch {
            text: Some("Hi".into()),
            x: Some(2.0),
            y: Some(2.0),
            color: Some([255, 0, 0, 255]),
            ..Default::default()
        });
        ed.set_filters(FilterState::default().with_invert(100.0));
        let expected = ed.preview().unwrap();

        assert_eq!(ed.flatten(), Outcome::Applied);
        assert_eq!(ed.buffer().unwrap(), &expected);
        assert_eq!(ed.buffer().unwrap().get_pixel(3, 3), Rgba([255, 0, 0, 255]));
        assert!(ed.overlays().is_empty());
        assert!(ed.filters().is_identity());
    }

    #[test]
    fn text_commands_report_unknown_ids() {
        let mut ed = loaded(10, 10);
        let Outcome::TextAdded(id) = ed.handle(EditCommand::AddText).unwrap() else {
            panic!("expected a new overlay id");
        };
        assert_eq!(ed.overlays().active(), Some(id));
        let stranger = Uuid::new_v4();
        assert_eq!(ed.update_text(stranger, TextOverlayPatch::default()), Outcome::NoOp);
        assert_eq!(ed.remove_text(stranger), Outcome::NoOp);
        assert_eq!(ed.remove_text(id), Outcome::Applied);
        assert_eq!(ed.overlays().active(), None);
    }

    #[test]
    fn select_text_goes_through_handle() {
        let mut ed = loaded(10, 10);
        let Outcome::TextAdded(first) = ed.handle(EditCommand::AddText).unwrap() else {
            panic!("expected a new overlay id");
        };
        let Outcome::TextAdded(second) = ed.handle(EditCommand::AddText).unwrap() else {
            panic!("expected a new overlay id");
        };
        assert_eq!(ed.overlays().active(), Some(second));

        assert_eq!(ed.handle(EditCommand::SelectText(Some(first))).unwrap(), Outcome::Applied);
        assert_eq!(ed.overlays().active(), Some(first));
        assert_eq!(ed.handle(EditCommand::SelectText(Some(Uuid::new_v4()))).unwrap(), Outcome::NoOp);
        assert_eq!(ed.overlays().active(), None);
        assert_eq!(ed.handle(EditCommand::SelectText(None)).unwrap(), Outcome::Applied);
    }

    #[test]
    fn reset_to_original_reseeds_history() {
        let mut ed = loaded(12, 12);
        let original = ed.buffer().unwrap().clone();
        ed.crop(&CropRegion::new(2, 2, 4, 4));
        ed.emboss();
        ed.set_filters(FilterState::default().with_sepia(50.0));
        ed.add_text();

        assert_eq!(ed.reset_to_original(), Outcome::Applied);
        assert_eq!(ed.buffer().unwrap(), &original);
        assert_eq!(ed.history().len(), 1);
        assert!(!ed.history().can_undo());
        assert!(ed.filters().is_identity());
        assert!(ed.overlays().is_empty());
    }

    #[test]
    fn export_encodes_png_with_default_name() {
        let mut ed = loaded(9, 7);
        let out = ed.export().unwrap().unwrap();
        assert_eq!(out.filename, "edited-image.png");
        assert_eq!((out.width, out.height), (9, 7));
        let decoded = io::decode_image(&out.png, Some("image/png"), 100).unwrap();
        assert_eq!(&decoded, ed.buffer().unwrap());
        // Nothing pending, so no extra history entry.
        assert_eq!(ed.history().len(), 1);
    }

    #[test]
    fn close_releases_the_session() {
        let mut ed = loaded(5, 5);
        assert_eq!(ed.handle(EditCommand::Close).unwrap(), Outcome::Applied);
        assert!(!ed.has_image());
        assert!(ed.history().is_empty());
        assert_eq!(ed.close(), Outcome::NoOp);
    }
}
