//! Interactive side view of a scene
//!
//! Draws the x/y plane of the simulation and reloads the scene file
//! whenever it changes on disk.

use eframe::egui;
use notify::{Event, RecommendedWatcher, Watcher};
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::{info, warn};

use crate::scene::{self, LoadedScene};

pub struct ViewerApp {
    scene_path: PathBuf,
    loaded: Option<LoadedScene>,
    frame: usize,
    last_load_error: Option<String>,
    playing: bool,
    speed_multiplier: f32,
    #[allow(dead_code)] // Kept alive to maintain file watching
    file_watcher: Option<RecommendedWatcher>,
    file_receiver: mpsc::Receiver<notify::Result<Event>>,
}

impl ViewerApp {
    pub fn new(scene_path: PathBuf, _cc: &eframe::CreationContext<'_>) -> Self {
        // Watcher events carry absolute paths
        let scene_path = scene_path.canonicalize().unwrap_or(scene_path);
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .ok();

        if let Some(ref mut w) = watcher {
            if let Err(e) = w.watch(&scene_path, notify::RecursiveMode::NonRecursive) {
                warn!(path = %scene_path.display(), error = %e, "hot reload disabled");
            }
        }

        let mut app = Self {
            scene_path,
            loaded: None,
            frame: 0,
            last_load_error: None,
            playing: false,
            speed_multiplier: 1.0,
            file_watcher: watcher,
            file_receiver: rx,
        };
        app.reload();
        app
    }

    fn reload(&mut self) {
        self.frame = 0;
        match scene::load(&self.scene_path) {
            Ok(loaded) => {
                self.loaded = Some(loaded);
                self.last_load_error = None;
            }
            Err(e) => {
                self.last_load_error = Some(e.to_string());
                self.loaded = None;
                self.playing = false;
            }
        }
    }

    fn check_file_changes(&mut self) {
        let mut changed = false;
        while let Ok(event) = self.file_receiver.try_recv() {
            match event {
                Ok(Event { kind: notify::EventKind::Modify(_), paths, .. }) => {
                    changed |= paths.contains(&self.scene_path);
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "file watcher error"),
            }
        }
        if changed {
            info!(path = %self.scene_path.display(), "scene changed, reloading");
            self.reload();
        }
    }

    /// Advance one frame. Returns true once the scene's frame count is reached.
    fn step(&mut self) -> bool {
        let Some(loaded) = self.loaded.as_mut() else {
            return true;
        };
        loaded.sim.update(loaded.dt);
        self.frame += 1;
        self.frame >= loaded.frames
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_file_changes();

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button(if self.playing { "⏸ Pause" } else { "▶ Play" }).clicked() {
                    self.playing = !self.playing;
                }
                if ui.button("⏮ Reset").clicked() {
                    self.reload();
                    self.playing = false;
                }
                if ui.button("⏭ Step").clicked() {
                    self.step();
                }

                ui.separator();
                ui.label("Speed:");
                ui.add(egui::Slider::new(&mut self.speed_multiplier, 0.1..=10.0));

                ui.separator();
                if let Some(ref loaded) = self.loaded {
                    ui.label(format!("Frame: {} / {}", self.frame, loaded.frames));
                    ui.label(format!("Energy: {:.3} J", loaded.sim.system_potential_energy()));
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let rect = ui.max_rect();
            let painter = ui.painter();

            // World x/y in roughly [-5, 5] metres
            let world_range = 10.0;
            let center = rect.center();
            let scale = (rect.width().min(rect.height()) / world_range) * 0.9;
            let to_screen = |p: glam::Vec3| center + egui::vec2(p.x * scale, -p.y * scale);

            // Water surface
            painter.line_segment(
                [egui::pos2(rect.left(), center.y), egui::pos2(rect.right(), center.y)],
                egui::Stroke::new(1.0, egui::Color32::DARK_BLUE),
            );

            if let Some(ref loaded) = self.loaded {
                let sim = &loaded.sim;
                for &key in sim.connections() {
                    let Some(connection) = sim.connection(key) else {
                        continue;
                    };
                    let (Some(a), Some(b)) = (sim.mass(connection.mass1()), sim.mass(connection.mass2())) else {
                        continue;
                    };
                    painter.line_segment(
                        [to_screen(a.position()), to_screen(b.position())],
                        egui::Stroke::new(1.0, egui::Color32::GRAY),
                    );
                }

                for &key in &loaded.masses {
                    let Some(mass) = sim.mass(key) else {
                        continue;
                    };
                    let screen_pos = to_screen(mass.position());
                    let radius = (mass.radius() * scale).clamp(3.0, 20.0);
                    let fill = if mass.is_kinematic() { egui::Color32::GOLD } else { egui::Color32::LIGHT_BLUE };
                    painter.circle_filled(screen_pos, radius, fill);
                    painter.circle_stroke(screen_pos, radius, egui::Stroke::new(1.0, egui::Color32::BLUE));
                    painter.text(
                        screen_pos + egui::vec2(0.0, radius + 10.0),
                        egui::Align2::CENTER_TOP,
                        format!("{:?}-{}", mass.mass_type(), mass.uid().0),
                        egui::FontId::default(),
                        egui::Color32::WHITE,
                    );
                }
            }

            if let Some(ref error) = self.last_load_error {
                ui.vertical_centered(|ui| {
                    ui.add_space(rect.height() * 0.4);
                    ui.label(egui::RichText::new(format!("Error: {}", error)).color(egui::Color32::RED).size(16.0));
                });
            }
        });

        if self.playing {
            let frames_per_update = self.speed_multiplier.max(0.1).round().max(1.0) as usize;
            for _ in 0..frames_per_update {
                if self.step() {
                    self.playing = false;
                    break;
                }
            }
            ctx.request_repaint();
        }
    }
}
