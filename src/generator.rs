//! Drives a [`Converter`] through the two-phase load and owns everything it produced.
//!
//! Phase 1 converts the source into a [`TextDocument`] in the pending state together
//! with a queue of structural events. Phase 2 forces the layout pass, after which the
//! queued positions are resolved into viewports and attached to pages, the synopsis
//! and the document info.

use std::collections::HashMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use log::{debug, error, info, warn};

use crate::converter::{
    ConversionError, Converter, ConverterEvent, EventQueue, LinkTarget, StructuralEvent,
};
use crate::layout::{
    BlockKind, LaidOutLine, LayoutComplete, LayoutError, PageSetup, TextDocument, TextPosition,
};
use crate::model::{
    Action, Annotation, DocumentInfo, ExportFormat, NormalizedRect, ObjectRect, Page, TextEntity,
    TextPage,
};
use crate::notification::{Notification, NotificationManager};
use crate::render::{CacheKey, Pixmap, PixmapCache, PixmapRequest, RequestIdGenerator};
use crate::settings::Settings;
use crate::synopsis::{ATTR_VIEWPORT, DocumentSynopsis, ElementId};
use crate::viewport::Viewport;

/// Metadata key under which named viewports are looked up
pub const META_NAMED_VIEWPORT: &str = "NamedViewport";
pub const META_DOCUMENT_TITLE: &str = "DocumentTitle";

const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([96, 96, 96]);
const HEADING_INK: Rgb<u8> = Rgb([24, 24, 24]);

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("layout has not completed, positions cannot be resolved yet")]
    LayoutNotReady,

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("page {page} is out of range ({count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("unresolved reference {0:?}")]
    UnresolvedReference(String),

    #[error("cannot write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 8192 x 8192
pub const DEFAULT_MAX_PIXMAP_PIXELS: u64 = 1 << 26;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorSettings {
    pub page_setup: PageSetup,
    pub page_width_px: u32,
    pub page_height_px: u32,
    pub cache_size: usize,
    pub notification_duration: Duration,
    /// Largest `width * height` a single pixmap may have
    pub max_pixmap_pixels: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl GeneratorSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            page_setup: settings.page_setup,
            page_width_px: settings.page_width_px.max(1),
            page_height_px: settings.page_height_px.max(1),
            cache_size: settings.pixmap_cache_size,
            notification_duration: settings.notification_duration(),
            max_pixmap_pixels: DEFAULT_MAX_PIXMAP_PIXELS,
        }
    }
}

pub struct TextDocumentGenerator {
    converter: Box<dyn Converter>,
    settings: GeneratorSettings,
    notifications: NotificationManager,
    document: Option<TextDocument<LayoutComplete>>,
    source: Option<PathBuf>,
    info: DocumentInfo,
    synopsis: DocumentSynopsis,
    named_viewports: HashMap<String, Viewport>,
    cache: PixmapCache,
    request_ids: RequestIdGenerator,
}

impl TextDocumentGenerator {
    pub fn new(converter: Box<dyn Converter>, settings: GeneratorSettings) -> Self {
        Self {
            converter,
            notifications: NotificationManager::with_default_duration(
                settings.notification_duration,
            ),
            settings,
            document: None,
            source: None,
            info: DocumentInfo::new(),
            synopsis: DocumentSynopsis::new(),
            named_viewports: HashMap::new(),
            cache: PixmapCache::new(settings.cache_size),
            request_ids: RequestIdGenerator::default(),
        }
    }

    pub fn converter_name(&self) -> &str {
        self.converter.name()
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationManager {
        &mut self.notifications
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Convert `path`, lay it out and resolve every structural event into pages
    pub fn load_document(&mut self, path: &Path) -> Result<Vec<Page>, ConversionError> {
        self.close_document();
        info!(
            "Loading {path:?} with the {} converter",
            self.converter.name()
        );

        let mut events = EventQueue::new();
        let converted = self.converter.convert(path, &mut events);
        // diagnostics reach the user even when conversion fails
        let structural = self.forward_diagnostics(&mut events);
        let pending = match converted {
            Ok(document) => document,
            Err(e) => {
                error!("Conversion of {path:?} failed: {e}");
                return Err(e);
            }
        };

        let document = pending.force_layout(&self.settings.page_setup);
        let mut pages: Vec<Page> = (0..document.page_count())
            .map(|n| Page::new(n, self.settings.page_width_px, self.settings.page_height_px))
            .collect();

        self.collect_anchors(&document, &structural);

        let mut titles = TitleNesting::default();
        for event in structural {
            match event {
                StructuralEvent::Link { target, begin, end } => {
                    let Some(action) = self.link_action(target) else {
                        continue;
                    };
                    self.add_link(&document, &mut pages, action, begin..end);
                }
                StructuralEvent::Annotation {
                    annotation,
                    begin,
                    end,
                } => Self::add_annotation(&document, &mut pages, annotation, begin..end),
                StructuralEvent::Title {
                    level,
                    text,
                    position,
                } => match document.calculate_viewport(position) {
                    Ok(viewport) => {
                        let id = titles.place(&mut self.synopsis, level, text);
                        self.synopsis
                            .set_attribute(id, ATTR_VIEWPORT, viewport.to_string());
                    }
                    Err(e) => warn!("Skipping title {text:?}: {e}"),
                },
                StructuralEvent::MetaData { key, value, title } => {
                    self.info.set(key, value, title);
                }
                StructuralEvent::Anchor { .. } => {}
            }
        }

        debug!(
            "Loaded {} pages, {} outline entries, {} metadata entries",
            pages.len(),
            self.synopsis.len(),
            self.info.len()
        );
        self.document = Some(document);
        self.source = Some(path.to_path_buf());
        Ok(pages)
    }

    /// Push diagnostics to the message surface and keep the structural events in order
    fn forward_diagnostics(&mut self, events: &mut EventQueue) -> Vec<StructuralEvent> {
        let mut structural = Vec::with_capacity(events.len());
        for event in events.drain() {
            match event {
                ConverterEvent::Structural(event) => structural.push(event),
                ConverterEvent::Diagnostic(notification) => {
                    debug!(
                        "Converter {:?}: {}",
                        notification.level, notification.message
                    );
                    self.notifications.show(notification);
                }
            }
        }
        structural
    }

    fn collect_anchors(
        &mut self,
        document: &TextDocument<LayoutComplete>,
        events: &[StructuralEvent],
    ) {
        for event in events {
            if let StructuralEvent::Anchor { name, position } = event {
                match document.calculate_viewport(*position) {
                    Ok(viewport) => {
                        self.named_viewports.insert(name.clone(), viewport);
                    }
                    Err(e) => warn!("Skipping anchor {name:?}: {e}"),
                }
            }
        }
    }

    fn link_action(&mut self, target: LinkTarget) -> Option<Action> {
        match target {
            LinkTarget::Action(action) => Some(action),
            LinkTarget::Anchor(name) => match self.named_viewports.get(&name) {
                Some(viewport) => Some(Action::goto(*viewport)),
                None => {
                    warn!("Dropping link to unknown anchor {name:?}");
                    let duration = self.notifications.default_duration();
                    self.notifications.show(Notification::warning(
                        format!("Link target #{name} does not exist"),
                        duration,
                    ));
                    None
                }
            },
        }
    }

    fn add_link(
        &self,
        document: &TextDocument<LayoutComplete>,
        pages: &mut [Page],
        action: Action,
        range: Range<TextPosition>,
    ) {
        match document.line_rects(range) {
            Ok(rects) => {
                for (page, rect) in rects {
                    if let Some(page) = pages.get_mut(page) {
                        page.object_rects.push(ObjectRect {
                            rect,
                            action: action.clone(),
                        });
                    }
                }
            }
            Err(e) => warn!("Skipping link {action:?}: {e}"),
        }
    }

    fn add_annotation(
        document: &TextDocument<LayoutComplete>,
        pages: &mut [Page],
        mut annotation: Annotation,
        range: Range<TextPosition>,
    ) {
        let rects = match document.line_rects(range) {
            Ok(rects) => rects,
            Err(e) => {
                warn!("Skipping annotation {:?}: {e}", annotation.contents);
                return;
            }
        };
        let Some(&(first_page, first_rect)) = rects.first() else {
            return;
        };
        annotation.boundary = rects
            .iter()
            .filter(|(page, _)| *page == first_page)
            .fold(first_rect, |acc, (_, rect)| acc.united(rect));
        if let Some(page) = pages.get_mut(first_page) {
            page.annotations.push(annotation);
        }
    }

    /// Release the laid out document and everything derived from it
    pub fn close_document(&mut self) {
        if self.document.is_none() && self.synopsis.is_empty() && self.info.is_empty() {
            return;
        }
        debug!("Closing {:?}", self.source);
        self.document = None;
        self.source = None;
        self.info.clear();
        self.synopsis = DocumentSynopsis::new();
        self.named_viewports.clear();
        self.cache.invalidate_all();
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn can_generate_pixmap(&self) -> bool {
        self.document.is_some()
    }

    pub fn page_count(&self) -> usize {
        self.document.as_ref().map_or(0, TextDocument::page_count)
    }

    /// Build a request tagged with a fresh id
    pub fn request_pixmap(&mut self, page: usize, width: u32, height: u32) -> PixmapRequest {
        let request = PixmapRequest::new(self.request_ids.next_id(), page, width, height);
        self.cache.register(&request);
        request
    }

    /// Rasterize one page. Out-of-range pages yield `None`.
    pub fn generate_pixmap(&mut self, request: &PixmapRequest) -> Option<Pixmap> {
        let Some(document) = self.document.as_ref() else {
            warn!("Pixmap requested for page {} with no document", request.page);
            return None;
        };
        if request.page >= document.page_count() {
            warn!(
                "Pixmap requested for page {} but the document has {} pages",
                request.page,
                document.page_count()
            );
            return None;
        }

        let (width, height) = (request.width.max(1), request.height.max(1));
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.settings.max_pixmap_pixels {
            warn!(
                "Pixmap {width}x{height} for page {} exceeds the {} pixel limit",
                request.page, self.settings.max_pixmap_pixels
            );
            return None;
        }

        let key = CacheKey::from_request(request);
        if let Some(cached) = self.cache.get(&key) {
            if cached.request.id >= request.id {
                return Some(cached.clone());
            }
        }

        let image = rasterize(
            document.page_lines(request.page),
            document.page_setup(),
            width,
            height,
        );
        let pixmap = Pixmap {
            request: *request,
            image: Arc::new(image),
        };
        self.cache.accept(pixmap.clone());
        Some(pixmap)
    }

    pub fn pixmap_cache(&self) -> &PixmapCache {
        &self.cache
    }

    pub fn document_info(&self) -> &DocumentInfo {
        &self.info
    }

    /// Title-derived outline, absent when no titles were reported
    pub fn document_synopsis(&self) -> Option<&DocumentSynopsis> {
        if self.synopsis.is_empty() {
            None
        } else {
            Some(&self.synopsis)
        }
    }

    pub fn meta_data(&self, key: &str, option: &str) -> Option<String> {
        match key {
            META_NAMED_VIEWPORT => self.named_viewports.get(option).map(Viewport::to_string),
            META_DOCUMENT_TITLE => self.info.get("title").map(str::to_string),
            other => self.info.get(other).map(str::to_string),
        }
    }

    pub fn named_viewport(&self, name: &str) -> Result<Viewport, GeneratorError> {
        self.named_viewports
            .get(name)
            .copied()
            .ok_or_else(|| GeneratorError::UnresolvedReference(name.to_string()))
    }

    /// Resolve a converter position against the completed layout
    pub fn resolve_position(&self, position: TextPosition) -> Result<Viewport, GeneratorError> {
        let document = self.document.as_ref().ok_or(GeneratorError::LayoutNotReady)?;
        Ok(document.calculate_viewport(position)?)
    }

    pub fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::PlainText]
    }

    pub fn export_to(&self, path: &Path, format: ExportFormat) -> Result<(), GeneratorError> {
        let document = self.document.as_ref().ok_or(GeneratorError::LayoutNotReady)?;
        let body = match format {
            ExportFormat::PlainText => document.plain_text(),
        };
        fs::write(path, body).map_err(|source| GeneratorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Exported {} to {path:?}", format.description());
        Ok(())
    }

    /// Word geometry for one page
    pub fn text_page(&self, page: usize) -> Result<TextPage, GeneratorError> {
        let document = self.document.as_ref().ok_or(GeneratorError::LayoutNotReady)?;
        if page >= document.page_count() {
            return Err(GeneratorError::PageOutOfRange {
                page,
                count: document.page_count(),
            });
        }
        let setup = document.page_setup();
        let columns = setup.columns as f64;
        let rows = setup.lines_per_page as f64;

        let mut entities = Vec::new();
        for line in document.page_lines(page) {
            let top = line.line_in_page as f64 / rows;
            let mut column = 0;
            for word in line.text.split(' ') {
                let width = word.chars().count();
                if width > 0 {
                    entities.push(TextEntity {
                        text: word.to_string(),
                        area: NormalizedRect::new(
                            column as f64 / columns,
                            top,
                            (column + width) as f64 / columns,
                            top + 1.0 / rows,
                        ),
                    });
                }
                column += width + 1;
            }
        }
        Ok(TextPage { entities })
    }
}

/// Parent tracking for titles: the parent is the nearest preceding title of lower level
#[derive(Default)]
struct TitleNesting {
    stack: Vec<(usize, ElementId)>,
}

impl TitleNesting {
    fn place(&mut self, synopsis: &mut DocumentSynopsis, level: usize, text: String) -> ElementId {
        while self.stack.last().is_some_and(|(open, _)| *open >= level) {
            self.stack.pop();
        }
        let id = match self.stack.last() {
            Some(&(_, parent)) => synopsis.push_child(parent, text),
            None => synopsis.push_root(text),
        };
        self.stack.push((level, id));
        id
    }
}

fn rasterize(
    lines: &[LaidOutLine],
    setup: PageSetup,
    width: u32,
    height: u32,
) -> RgbImage {
    let mut image = RgbImage::from_pixel(width, height, PAPER);
    let cell_w = f64::from(width) / setup.columns as f64;
    let cell_h = f64::from(height) / setup.lines_per_page as f64;

    for line in lines {
        let color = match line.kind {
            BlockKind::Heading(_) => HEADING_INK,
            _ => INK,
        };
        let y0 = (line.line_in_page as f64 * cell_h + cell_h * 0.2) as u32;
        let y1 = ((line.line_in_page as f64 + 1.0) * cell_h - cell_h * 0.2).ceil() as u32;
        for (col, ch) in line.text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let x0 = (col as f64 * cell_w) as u32;
            let x1 = (((col + 1) as f64) * cell_w).ceil() as u32;
            for y in y0..y1.min(height) {
                for x in x0..x1.min(width) {
                    image.put_pixel(x, y, color);
                }
            }
        }
    }
    image
}
