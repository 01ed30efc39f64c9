use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use eframe::egui::{self, Context, Pos2, Vec2};
use tracing::{error, info};

use crate::config::{Config, FetchConfig};
use crate::graph::TreeSeed;
use crate::registry::{EntityId, FetchError, OwnershipSource};
use crate::session::{ExpandRequest, FetchWorker, FocalRef, GraphSession, load_seed};

mod graph;
mod render_utils;
mod ui;

type SeedResult = Result<TreeSeed, FetchError>;

pub struct AksjegrafApp {
    config: Config,
    focal: FocalRef,
    worker: FetchWorker,
    state: AppState,
    refocus_rx: Option<(EntityId, Receiver<SeedResult>)>,
}

enum AppState {
    Loading { rx: Receiver<SeedResult> },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    session: GraphSession,
    node_menu: Option<NodeMenu>,
    drag_offset: Vec2,
    show_help: bool,
}

struct NodeMenu {
    id: EntityId,
    anchor: Pos2,
}

/// Work the view asked for during a frame that the app has to hand off to
/// background threads.
#[derive(Default)]
struct FrameRequests {
    expand: Vec<ExpandRequest>,
    refocus: Option<EntityId>,
}

impl AksjegrafApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        source: Arc<dyn OwnershipSource>,
        config: Config,
        focal: FocalRef,
    ) -> Self {
        let worker = FetchWorker::new(source);
        let state = Self::start_load(worker.source(), focal.clone(), config.fetch);
        Self {
            config,
            focal,
            worker,
            state,
            refocus_rx: None,
        }
    }

    fn spawn_load(
        source: Arc<dyn OwnershipSource>,
        focal: FocalRef,
        fetch: FetchConfig,
    ) -> Receiver<SeedResult> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = load_seed(source.as_ref(), &focal, fetch);
            if let Err(error) = &result {
                error!(?focal, %error, "failed to load focal entity");
            }
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(
        source: Arc<dyn OwnershipSource>,
        focal: FocalRef,
        fetch: FetchConfig,
    ) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(source, focal, fetch),
        }
    }
}

impl eframe::App for AksjegrafApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(Ok(seed)) => {
                        transition = Some(AppState::Ready(Box::new(ViewModel::new(
                            &self.config,
                            seed,
                        ))));
                    }
                    Ok(Err(error)) => transition = Some(AppState::Error(error.to_string())),
                    Err(TryRecvError::Empty) => {
                        ctx.request_repaint_after(Duration::from_millis(50));
                    }
                    Err(TryRecvError::Disconnected) => {
                        transition = Some(AppState::Error(
                            "Background load worker disconnected".to_owned(),
                        ));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading ownership graph...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load ownership graph");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(
                            self.worker.source(),
                            self.focal.clone(),
                            self.config.fetch,
                        ));
                    }
                });
            }
            AppState::Ready(model) => {
                for outcome in self.worker.drain() {
                    model.session.apply_fetch(outcome);
                }

                let mut requests = FrameRequests::default();
                let is_refocusing = self.refocus_rx.is_some();
                model.show(ctx, &mut requests, is_refocusing);

                for request in requests.expand {
                    self.worker.spawn(request);
                }

                if let Some(id) = requests.refocus
                    && self.refocus_rx.is_none()
                {
                    info!(focal = %id, "refocusing graph");
                    let rx = Self::spawn_load(
                        self.worker.source(),
                        FocalRef::Id(id.clone()),
                        self.config.fetch,
                    );
                    self.refocus_rx = Some((id, rx));
                }

                if let Some((target, rx)) = self.refocus_rx.take() {
                    match rx.try_recv() {
                        Ok(Ok(seed)) => {
                            self.focal = FocalRef::Id(seed.focal.id.clone());
                            model.node_menu = None;
                            model.session.set_focal(seed);
                        }
                        Ok(Err(error)) => model.session.refocus_failed(&target, &error),
                        Err(TryRecvError::Empty) => {
                            self.refocus_rx = Some((target, rx));
                        }
                        Err(TryRecvError::Disconnected) => {
                            transition = Some(AppState::Error(
                                "Background load worker disconnected".to_owned(),
                            ));
                        }
                    }
                }

                if model.session.has_pending_fetches() || self.refocus_rx.is_some() {
                    ctx.request_repaint_after(Duration::from_millis(50));
                }
            }
        }

        if let Some(next_state) = transition {
            self.refocus_rx = None;
            self.state = next_state;
        }
    }
}
