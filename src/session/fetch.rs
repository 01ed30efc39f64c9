use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::graph::{Direction, TreeSeed};
use crate::registry::{Entity, EntityId, FetchError, OwnershipSource, Ownership};

/// How the focal entity was named on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FocalRef {
    Id(EntityId),
    RegistryNumber(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub anchor: EntityId,
    pub direction: Direction,
    pub skip: usize,
}

/// One page of investors or investments to fetch for `anchor`. Carries the
/// session generation it was issued in so stale results can be recognised.
#[derive(Clone, Debug)]
pub struct ExpandRequest {
    pub anchor: Entity,
    pub direction: Direction,
    pub year: u16,
    pub limit: usize,
    pub skip: usize,
    pub generation: u64,
}

#[derive(Clone, Debug)]
pub struct FetchOutcome {
    pub request: ExpandRequest,
    pub result: Result<Vec<Ownership>, FetchError>,
}

impl ExpandRequest {
    pub fn key(&self) -> RequestKey {
        RequestKey {
            anchor: self.anchor.id.clone(),
            direction: self.direction,
            skip: self.skip,
        }
    }

    pub fn execute(self, source: &dyn OwnershipSource) -> FetchOutcome {
        let result = match self.direction {
            Direction::Investors => {
                source.list_investors(&self.anchor, self.year, self.limit, self.skip)
            }
            Direction::Investments => {
                source.list_investments(&self.anchor, self.year, self.limit, self.skip)
            }
        };
        FetchOutcome {
            request: self,
            result,
        }
    }
}

/// Resolves the focal entity and its first page of neighbours in both
/// directions.
pub fn load_seed(
    source: &dyn OwnershipSource,
    focal: &FocalRef,
    fetch: FetchConfig,
) -> Result<TreeSeed, FetchError> {
    let focal = match focal {
        FocalRef::Id(id) => source.resolve_entity(id)?,
        FocalRef::RegistryNumber(registry_number) => {
            source.resolve_company_by_registry_number(registry_number)?
        }
    };

    let investors = source.list_investors(&focal, fetch.year, fetch.limit, 0)?;
    let investments = source.list_investments(&focal, fetch.year, fetch.limit, 0)?;
    debug!(
        focal = %focal.id,
        investors = investors.len(),
        investments = investments.len(),
        "loaded tree seed"
    );

    Ok(TreeSeed {
        focal,
        investors,
        investments,
    })
}

/// Runs registry calls on background threads and hands the results back to
/// the UI thread, which drains them between frames.
pub struct FetchWorker {
    source: Arc<dyn OwnershipSource>,
    tx: Sender<FetchOutcome>,
    rx: Receiver<FetchOutcome>,
}

impl FetchWorker {
    pub fn new(source: Arc<dyn OwnershipSource>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { source, tx, rx }
    }

    pub fn source(&self) -> Arc<dyn OwnershipSource> {
        Arc::clone(&self.source)
    }

    pub fn spawn(&self, request: ExpandRequest) {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = request.execute(source.as_ref());
            let _ = tx.send(outcome);
        });
    }

    pub fn drain(&self) -> Vec<FetchOutcome> {
        let mut outcomes = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(outcome) => outcomes.push(outcome),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("fetch channel disconnected");
                    break;
                }
            }
        }
        outcomes
    }
}
