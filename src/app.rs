// ============================================================================
// PerlerPad editor window: egui host around the document, controller and
// CPU renderer
// ============================================================================

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use eframe::egui;

use crate::canvas::{MoveDirection, Symmetry, SymmetryAxis, MAX_GRID_DIM};
use crate::components::tools::{Hover, InteractionController, PointerEvent, Tool};
use crate::io;
use crate::palette::{BeadColor, Palette, FROSTED};
use crate::project::Project;
use crate::render::{
    standard_guides, BackgroundImage, GridRenderer, Redraw, RenderConfig, RenderConfigUpdate,
    Theme,
};
use crate::settings::AppSettings;
use crate::viewport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ViewMode {
    Edit,
    /// Bead-placement view: click cells to tick them off.
    Mark,
}

pub struct PerlerPadApp {
    settings: AppSettings,
    palette: Arc<Palette>,
    project: Project,
    controller: InteractionController,
    renderer: Option<GridRenderer>,

    texture: Option<egui::TextureHandle>,
    uploaded_generation: Option<u64>,
    /// Document generation last drawn; `None` forces a redraw.
    rendered_generation: Option<u64>,

    mode: ViewMode,
    zoom: f32,
    show_guides: bool,
    hovered: Option<crate::canvas::CellId>,
    pointer_inside: bool,
    last_pointer: Option<egui::Pos2>,

    custom_rgb: [u8; 3],
    hidden_colors: HashSet<BeadColor>,
    background_path: String,
    background_opacity: f32,

    file_path: String,
    new_width: u32,
    new_height: u32,
    untitled_counter: usize,
    structure_index: u32,
    status: String,
}

impl PerlerPadApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings = AppSettings::load();
        let palette = match settings.palette_path() {
            Some(path) => match Palette::load(&path) {
                Ok(p) => {
                    crate::log_info!("Palette loaded: {} colors from {}", p.len(), path.display());
                    p
                }
                Err(e) => {
                    crate::log_err!("Failed to load palette {}: {}", path.display(), e);
                    Palette::default()
                }
            },
            None => Palette::default(),
        };

        apply_visuals(&cc.egui_ctx, settings.theme);

        let project = Project::new_untitled(1, 29, 29).with_max_undo(settings.max_undo_steps);
        let mut controller = InteractionController::new();
        controller.selected_color = Some(BeadColor::rgb(0, 0, 0));

        Self {
            settings,
            palette: Arc::new(palette),
            project,
            controller,
            renderer: None,
            texture: None,
            uploaded_generation: None,
            rendered_generation: None,
            mode: ViewMode::Edit,
            zoom: 1.0,
            show_guides: true,
            hovered: None,
            pointer_inside: false,
            last_pointer: None,
            custom_rgb: [0, 0, 0],
            hidden_colors: HashSet::new(),
            background_path: String::new(),
            background_opacity: 50.0,
            file_path: String::new(),
            new_width: 29,
            new_height: 29,
            untitled_counter: 1,
            structure_index: 0,
            status: String::new(),
        }
    }

    // ========================================================================
    // RENDER SYNC
    // ========================================================================

    fn desired_config(&self, ctx: &egui::Context) -> RenderConfig {
        let (w, h) = (self.project.width(), self.project.height());
        let mut config = RenderConfig::new(w, h, self.settings.base_cell_size * self.zoom);
        config.device_pixel_ratio = ctx.pixels_per_point();
        config.theme = self.settings.theme;
        config.show_labels = self.settings.show_labels;
        config.show_center_mark = self.settings.show_center_mark;
        if self.show_guides {
            config.horizontal_guides = standard_guides(h);
            config.vertical_guides = standard_guides(w);
        }
        config.symmetry = self.controller.symmetry;
        // Hover is only drawn by the marking view; keep edit-mode redraws rare.
        if self.mode == ViewMode::Mark {
            config.hovered_cell = self.hovered;
            config.hidden_colors = self.hidden_colors.clone();
        }
        config.background_image = (!self.background_path.trim().is_empty()).then(|| {
            BackgroundImage {
                source: self.background_path.trim().to_string(),
                opacity_percent: self.background_opacity,
            }
        });
        config
    }

    /// Bring the renderer in line with the app state and redraw if needed.
    fn sync_renderer(&mut self, ctx: &egui::Context) {
        let desired = self.desired_config(ctx);
        let mut needs_full = self.rendered_generation != Some(self.project.state.dirty_generation);

        if self.renderer.is_none() {
            match GridRenderer::configure(desired) {
                Ok(r) => {
                    self.renderer = Some(r.with_palette(Arc::clone(&self.palette)));
                    needs_full = true;
                }
                Err(e) => {
                    self.status = format!("Renderer unavailable: {}", e);
                    return;
                }
            }
        } else if !self.controller.is_painting()
            // A config change mid-stroke would wipe the preview.
            && let Some(renderer) = self.renderer.as_mut()
        {
            match renderer.update_config(config_update(desired)) {
                Ok(Redraw::None) => {}
                Ok(_) => needs_full = true,
                Err(e) => self.status = format!("Renderer: {}", e),
            }
        }

        let Some(renderer) = self.renderer.as_mut() else { return };
        let background_changed =
            !self.controller.is_painting() && renderer.poll_background(self.project.grid());
        if renderer.background_loading() {
            ctx.request_repaint_after(std::time::Duration::from_millis(50));
        }

        if (needs_full || (background_changed && self.mode == ViewMode::Mark))
            && !self.controller.is_painting()
        {
            match self.mode {
                ViewMode::Edit => renderer.render_full(self.project.grid()),
                ViewMode::Mark => renderer.render_marking(self.project.grid(), self.project.marks()),
            }
            self.rendered_generation = Some(self.project.state.dirty_generation);
        }
    }

    /// Returns `true` when a new frame was uploaded.
    fn upload_texture(&mut self, ctx: &egui::Context) -> bool {
        let Some(renderer) = &self.renderer else { return false };
        if self.uploaded_generation == Some(renderer.generation()) && self.texture.is_some() {
            return false;
        }
        let image = renderer.surface().image();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(
            [image.width() as usize, image.height() as usize],
            image.as_raw(),
        );
        if let Some(tex) = self.texture.as_mut() {
            tex.set(color_image, egui::TextureOptions::NEAREST);
        } else {
            self.texture =
                Some(ctx.load_texture("perlerpad_grid", color_image, egui::TextureOptions::NEAREST));
        }
        self.uploaded_generation = Some(renderer.generation());
        true
    }

    fn invalidate(&mut self) {
        self.rendered_generation = None;
    }

    // ========================================================================
    // DOCUMENT ACTIONS
    // ========================================================================

    fn new_project(&mut self) {
        self.untitled_counter += 1;
        self.project = Project::new_untitled(self.untitled_counter, self.new_width, self.new_height)
            .with_max_undo(self.settings.max_undo_steps);
        self.hidden_colors.clear();
        self.invalidate();
        self.status = format!("New {}x{} grid", self.new_width, self.new_height);
    }

    fn open_project(&mut self) {
        let path = PathBuf::from(self.file_path.trim());
        let loaded = io::load_project(&path).and_then(|file| Project::from_file(file, &self.palette));
        match loaded {
            Ok(mut project) => {
                project.path = Some(path.clone());
                project.history.set_max_history_size(self.settings.max_undo_steps);
                crate::log_info!(
                    "Opened {} ({}x{})",
                    path.display(),
                    project.width(),
                    project.height()
                );
                self.status = format!("Opened {}", project.name);
                self.project = project;
                self.hidden_colors.clear();
                self.invalidate();
            }
            Err(e) => {
                crate::log_err!("Failed to open {}: {}", path.display(), e);
                self.status = format!("Open failed: {}", e);
            }
        }
    }

    fn save_project(&mut self) {
        let path = PathBuf::from(self.file_path.trim());
        match io::save_project(&self.project.to_file(&self.palette), &path) {
            Ok(()) => {
                self.project.path = Some(path.clone());
                self.project.mark_clean();
                crate::log_info!("Saved {}", path.display());
                self.status = format!("Saved {}", path.display());
            }
            Err(e) => {
                crate::log_err!("Failed to save {}: {}", path.display(), e);
                self.status = format!("Save failed: {}", e);
            }
        }
    }

    fn export_png(&mut self) {
        let Some(renderer) = &self.renderer else { return };
        let path = PathBuf::from(self.file_path.trim()).with_extension("png");
        match io::export_image(renderer.surface().image(), &path) {
            Ok(()) => self.status = format!("Exported {}", path.display()),
            Err(e) => {
                crate::log_err!("PNG export failed: {}", e);
                self.status = format!("Export failed: {}", e);
            }
        }
    }

    fn undo(&mut self) {
        if self.controller.is_painting() {
            return;
        }
        if !self.project.undo() {
            self.status = "Nothing to undo".into();
        }
    }

    fn redo(&mut self) {
        if self.controller.is_painting() {
            return;
        }
        if !self.project.redo() {
            self.status = "Nothing to redo".into();
        }
    }

    fn set_theme(&mut self, ctx: &egui::Context, theme: Theme) {
        if self.settings.theme != theme {
            self.settings.theme = theme;
            apply_visuals(ctx, theme);
            self.settings.save();
        }
    }

    // ========================================================================
    // INPUT
    // ========================================================================

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (command, shift, z, y, arrows) = ctx.input(|i| {
            (
                i.modifiers.command,
                i.modifiers.shift,
                i.key_pressed(egui::Key::Z),
                i.key_pressed(egui::Key::Y),
                [
                    (egui::Key::ArrowUp, MoveDirection::Up),
                    (egui::Key::ArrowDown, MoveDirection::Down),
                    (egui::Key::ArrowLeft, MoveDirection::Left),
                    (egui::Key::ArrowRight, MoveDirection::Right),
                ]
                .into_iter()
                .filter(|(k, _)| i.key_pressed(*k))
                .map(|(_, d)| d)
                .collect::<Vec<_>>(),
            )
        });

        if command && z && !shift {
            self.undo();
        } else if command && ((z && shift) || y) {
            self.redo();
        }
        if self.mode == ViewMode::Edit && !self.controller.is_painting() {
            for direction in arrows {
                self.project.move_grid(direction);
            }
        }
    }

    /// Translate egui pointer state over the grid into controller events.
    /// `rect` is the whole grid in screen space, `visible` the part not
    /// scrolled out of view.
    fn handle_pointer(&mut self, ctx: &egui::Context, rect: egui::Rect, visible: egui::Rect) {
        let (pos, pressed, released) = ctx.input(|i| {
            (
                i.pointer.hover_pos(),
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
            )
        });
        let inside = pos.is_some_and(|p| visible.contains(p));
        let local = pos.map(|p| p - rect.min);
        let viewport = match &self.renderer {
            Some(r) => r.config().viewport(),
            None => return,
        };

        if self.mode == ViewMode::Mark {
            self.hovered = if inside {
                local.and_then(|l| viewport::cell_at(l.x, l.y, &viewport))
            } else {
                None
            };
            if pressed
                && inside
                && let Some(cell) = self.hovered
            {
                self.project.toggle_mark(cell);
            }
            self.pointer_inside = inside;
            return;
        }

        let mut events = Vec::new();
        if inside && let Some(l) = local {
            if pressed {
                events.push(PointerEvent::Down { x: l.x, y: l.y });
            } else if self.last_pointer != pos {
                events.push(PointerEvent::Move { x: l.x, y: l.y });
            }
        }
        if released {
            events.push(PointerEvent::Up);
        }
        if self.pointer_inside && !inside {
            events.push(PointerEvent::Leave);
        }
        self.pointer_inside = inside;
        self.last_pointer = pos;

        let Some(renderer) = self.renderer.as_mut() else { return };
        for event in events {
            let response = self.controller.handle(event, &viewport, &mut self.project, &mut *renderer);
            match response.hover {
                Some(Hover::Cell(cell)) => self.hovered = Some(cell),
                Some(Hover::Outside) => self.hovered = None,
                None => {}
            }
        }
    }

    // ========================================================================
    // PANELS
    // ========================================================================

    fn toolbar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            ui.label("File:");
            ui.add(egui::TextEdit::singleline(&mut self.file_path).desired_width(220.0));
            if ui.button("Open").clicked() {
                self.open_project();
            }
            if ui.button("Save").clicked() {
                self.save_project();
            }
            if ui.button("Export PNG").clicked() {
                self.export_png();
            }
            ui.separator();

            ui.add(egui::DragValue::new(&mut self.new_width).clamp_range(1..=MAX_GRID_DIM));
            ui.label("×");
            ui.add(egui::DragValue::new(&mut self.new_height).clamp_range(1..=MAX_GRID_DIM));
            if ui.button("New").clicked() {
                self.new_project();
            }
            ui.separator();

            let undo_hover = self.project.undo_description().unwrap_or("").to_string();
            if ui
                .add_enabled(self.project.undo_count() > 0, egui::Button::new("Undo"))
                .on_hover_text(undo_hover)
                .clicked()
            {
                self.undo();
            }
            let redo_hover = self.project.history.redo_description().unwrap_or("").to_string();
            if ui
                .add_enabled(self.project.redo_count() > 0, egui::Button::new("Redo"))
                .on_hover_text(redo_hover)
                .clicked()
            {
                self.redo();
            }
            ui.separator();

            ui.selectable_value(&mut self.mode, ViewMode::Edit, "Edit");
            if ui.selectable_value(&mut self.mode, ViewMode::Mark, "Mark").changed() {
                self.invalidate();
            }
            ui.separator();

            ui.label("Zoom");
            ui.add(egui::Slider::new(&mut self.zoom, 0.25..=4.0).logarithmic(true));
            ui.separator();

            let mut dark = self.settings.theme == Theme::Dark;
            if ui.checkbox(&mut dark, "Dark").changed() {
                let theme = if dark { Theme::Dark } else { Theme::Light };
                self.set_theme(ctx, theme);
            }
            if ui.checkbox(&mut self.settings.show_labels, "Labels").changed()
                | ui.checkbox(&mut self.settings.show_center_mark, "Center").changed()
            {
                self.settings.save();
            }
            ui.checkbox(&mut self.show_guides, "Guides");
        });
    }

    fn tools_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Tools");
        for tool in Tool::all() {
            ui.selectable_value(&mut self.controller.tool, *tool, tool.label());
        }

        ui.separator();
        ui.label("Color");
        ui.horizontal(|ui| {
            if ui.color_edit_button_srgb(&mut self.custom_rgb).changed() {
                let [r, g, b] = self.custom_rgb;
                self.controller.selected_color = Some(BeadColor::rgb(r, g, b));
            }
            if ui.button("Frosted").clicked() {
                self.controller.selected_color = Some(FROSTED);
            }
            if ui.button("None").clicked() {
                self.controller.selected_color = None;
            }
        });
        match &self.controller.selected_color {
            Some(color) => {
                let id = self.palette.color_id(color).unwrap_or("-");
                ui.label(format!("{} {}", id, color));
            }
            None => {
                ui.label("None (erases)");
            }
        }
        self.palette_picker(ui);

        ui.separator();
        let mut enabled = self.controller.symmetry.enabled;
        let mut axis = self.controller.symmetry.axis;
        ui.checkbox(&mut enabled, "Symmetry");
        ui.horizontal(|ui| {
            ui.selectable_value(&mut axis, SymmetryAxis::X, "Left/Right");
            ui.selectable_value(&mut axis, SymmetryAxis::Y, "Top/Bottom");
        });
        self.controller.symmetry = Symmetry { enabled, axis };

        ui.separator();
        ui.label("Grid");
        ui.horizontal(|ui| {
            ui.label("Index");
            let max = self.project.width().max(self.project.height());
            ui.add(egui::DragValue::new(&mut self.structure_index).clamp_range(0..=max));
        });
        let idx = self.structure_index;
        ui.horizontal(|ui| {
            if ui.button("+ Row").clicked() {
                self.project.insert_row(idx);
            }
            if ui.button("− Row").clicked() {
                self.project.delete_row(idx);
            }
        });
        ui.horizontal(|ui| {
            if ui.button("+ Column").clicked() {
                self.project.insert_column(idx);
            }
            if ui.button("− Column").clicked() {
                self.project.delete_column(idx);
            }
        });
        ui.horizontal(|ui| {
            if ui.button("Flip H").clicked() {
                self.project.flip_horizontal();
            }
            if ui.button("Flip V").clicked() {
                self.project.flip_vertical();
            }
            if ui.button("Clear").clicked() {
                self.project.clear();
            }
        });

        ui.separator();
        ui.label("Background image");
        ui.add(egui::TextEdit::singleline(&mut self.background_path).hint_text("path to image"));
        ui.add(egui::Slider::new(&mut self.background_opacity, 0.0..=100.0).text("opacity"));
    }

    fn palette_picker(&mut self, ui: &mut egui::Ui) {
        if self.palette.is_empty() {
            return;
        }
        let palette = Arc::clone(&self.palette);
        egui::ScrollArea::vertical()
            .id_source("palette_scroll")
            .max_height(220.0)
            .show(ui, |ui| {
                for (group, ids) in palette.groups() {
                    egui::CollapsingHeader::new(group.as_str()).default_open(false).show(ui, |ui| {
                        ui.horizontal_wrapped(|ui| {
                            for id in ids {
                                let Some(color) = palette.color_for_id(id) else { continue };
                                let fill = swatch(&color);
                                let text = egui::RichText::new(id.as_str()).color(contrast(&color));
                                if ui.add(egui::Button::new(text).fill(fill)).clicked() {
                                    self.controller.selected_color = Some(color);
                                }
                            }
                        });
                    });
                }
            });
    }

    fn stats_panel(&mut self, ui: &mut egui::Ui) {
        let stats = self.project.color_stats(&self.palette);
        ui.heading(format!("Beads: {}", stats.total));
        if self.mode == ViewMode::Mark {
            ui.label(format!("Placed: {}", self.project.marks().len()));
            if ui.button("Reset marks").clicked() {
                self.project.reset_marks();
            }
        }
        ui.separator();

        let mut replace: Option<(BeadColor, Option<BeadColor>)> = None;
        let mut hidden_changed = false;
        egui::ScrollArea::vertical().id_source("stats_scroll").show(ui, |ui| {
            for (color, count) in &stats.entries {
                ui.horizontal(|ui| {
                    let id = self.palette.color_id(color).unwrap_or("-");
                    let (rect, _) =
                        ui.allocate_exact_size(egui::vec2(14.0, 14.0), egui::Sense::hover());
                    ui.painter().rect_filled(rect, 2.0, swatch(color));
                    ui.label(format!("{} {} × {}", id, color, count));

                    if self.mode == ViewMode::Mark {
                        let mut hidden = self.hidden_colors.contains(color);
                        if ui.checkbox(&mut hidden, "hide").changed() {
                            if hidden {
                                self.hidden_colors.insert(color.clone());
                            } else {
                                self.hidden_colors.remove(color);
                            }
                            hidden_changed = true;
                        }
                    } else {
                        if ui.small_button("→ current").clicked() {
                            replace = Some((color.clone(), self.controller.selected_color.clone()));
                        }
                        if ui.small_button("✕").clicked() {
                            replace = Some((color.clone(), None));
                        }
                    }
                });
            }
        });

        if let Some((old, new)) = replace {
            self.project.replace_color(&old, new.as_ref());
        }
        if hidden_changed {
            self.invalidate();
        }
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(self.project.display_title());
            ui.separator();
            ui.label(format!("{} × {}", self.project.width(), self.project.height()));
            ui.separator();
            match self.hovered {
                Some(cell) => {
                    let color = self
                        .project
                        .grid()
                        .color_at(cell.x, cell.y)
                        .map(|c| self.palette.encode(c))
                        .unwrap_or_else(|| "empty".into());
                    ui.label(format!("({}, {}) {}", cell.x, cell.y, color));
                }
                None => {
                    ui.label("-");
                }
            }
            if !self.status.is_empty() {
                ui.separator();
                ui.label(self.status.as_str());
            }
        });
    }
}

impl eframe::App for PerlerPadApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!(
            "PerlerPad - {}",
            self.project.display_title()
        )));

        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ctx, ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.status_bar(ui));
        egui::SidePanel::left("tools").resizable(false).show(ctx, |ui| self.tools_panel(ui));
        egui::SidePanel::right("stats").show(ctx, |ui| self.stats_panel(ui));

        self.sync_renderer(ctx);
        self.upload_texture(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(texture) = self.texture.clone() else { return };
            let Some((lw, lh)) = self.renderer.as_ref().map(|r| r.config().logical_size()) else {
                return;
            };
            let mut grid_rect = None;
            egui::ScrollArea::both().show(ui, |ui| {
                let (rect, _) =
                    ui.allocate_exact_size(egui::vec2(lw, lh), egui::Sense::click_and_drag());
                ui.painter().image(
                    texture.id(),
                    rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
                grid_rect = Some((rect, rect.intersect(ui.clip_rect())));
            });
            if let Some((rect, visible)) = grid_rect {
                self.handle_pointer(ctx, rect, visible);
            }
        });

        // Pointer handling above may have changed the surface.
        self.sync_renderer(ctx);
        if self.upload_texture(ctx) {
            ctx.request_repaint();
        }
    }
}

fn config_update(c: RenderConfig) -> RenderConfigUpdate {
    RenderConfigUpdate {
        width: Some(c.width),
        height: Some(c.height),
        cell_size: Some(c.cell_size),
        offset_x: Some(c.offset_x),
        offset_y: Some(c.offset_y),
        device_pixel_ratio: Some(c.device_pixel_ratio),
        theme: Some(c.theme),
        show_labels: Some(c.show_labels),
        show_center_mark: Some(c.show_center_mark),
        horizontal_guides: Some(c.horizontal_guides),
        vertical_guides: Some(c.vertical_guides),
        symmetry: Some(c.symmetry),
        hovered_cell: Some(c.hovered_cell),
        background_image: Some(c.background_image),
        hidden_colors: Some(c.hidden_colors),
    }
}

fn apply_visuals(ctx: &egui::Context, theme: Theme) {
    ctx.set_visuals(match theme {
        Theme::Light => egui::Visuals::light(),
        Theme::Dark => egui::Visuals::dark(),
    });
}

fn swatch(color: &BeadColor) -> egui::Color32 {
    match color.to_rgba() {
        Some(c) => egui::Color32::from_rgb(c[0], c[1], c[2]),
        None => egui::Color32::GRAY,
    }
}

fn contrast(color: &BeadColor) -> egui::Color32 {
    let c = color.contrast_color();
    egui::Color32::from_rgb(c[0], c[1], c[2])
}
