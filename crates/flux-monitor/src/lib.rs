pub mod classify;
pub mod diff;
pub mod factory;
pub mod poller;
pub mod reconcile;
pub mod snapshot;
pub mod source;
pub mod store;

pub use classify::{Classification, ClassificationError, Classifier, Rule};
pub use diff::{diff, DiffResult, TransitionEvent};
pub use factory::{AlertFactory, CheckResult, DEFAULT_TIMEOUT};
pub use poller::{Cycle, CycleReport, Poller};
pub use reconcile::{Action, ReconcileReport, Reconciliation};
pub use snapshot::{Check, CheckValue, InstanceInfo, InstanceSnapshot, SnapshotBuilder};
pub use source::{HttpInstanceSource, InstanceSource, RawInstance, RawStatus, SourceError, SourceId};
pub use store::{AlertStore, HttpAlertStore, StoreError, StoredAlert};
